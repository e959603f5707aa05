//! Normalized persistence batch
//!
//! Flattens a [`DaySchedule`] into the shape an external store expects:
//! distinct, sorted vocabularies (classes, subjects, rooms, teachers), the
//! period table, holiday ranges and one flat entry per lesson slot.

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

use crate::error::Result;
use crate::models::{DaySchedule, Period};

/// `planart` value of teacher-keyed files
pub const TEACHER_PLAN_KIND: &str = "L";

/// Fixed-date public holidays observed nationwide, as (month, day)
const FIXED_HOLIDAYS: &[(u32, u32)] = &[(1, 1), (5, 1), (10, 3), (12, 25), (12, 26)];

/// Contiguous run of free days
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HolidayRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// One lesson slot in flat form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonEntry {
    pub id: u32,
    pub day: NaiveDate,
    pub period: u32,
    pub class_name: String,
    pub class_changed: bool,
    pub teacher: Option<String>,
    pub teacher_changed: bool,
    pub subject: Option<String>,
    pub subject_changed: bool,
    pub room: Option<String>,
    pub room_changed: bool,
    pub change_details: Option<String>,
}

/// Batch handed to a [`BatchSink`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedBatch {
    pub plan_kind: String,
    pub plan_date: NaiveDate,
    pub timestamp: DateTime<Utc>,
    pub classes: Vec<String>,
    pub subjects: Vec<String>,
    pub rooms: Vec<String>,
    pub teachers: Vec<String>,
    pub periods: Vec<Period>,
    pub holiday_ranges: Vec<HolidayRange>,
    pub entries: Vec<LessonEntry>,
}

/// Build the normalized batch for one day
///
/// Teacher-keyed files (`planart` `L`) list teachers in the class slot, so
/// the class and teacher roles are swapped.
pub fn normalize(schedule: &DaySchedule) -> NormalizedBatch {
    let teacher_keyed = schedule.plan_kind == TEACHER_PLAN_KIND;

    let slots = || {
        schedule
            .classes
            .iter()
            .flat_map(|class| class.lesson_slots.iter().map(move |slot| (class, slot)))
    };

    let subjects: BTreeSet<String> = slots().filter_map(|(_, s)| s.subject.clone()).collect();
    let rooms: BTreeSet<String> = slots().filter_map(|(_, s)| s.room.clone()).collect();
    let slot_teachers: BTreeSet<String> = slots().filter_map(|(_, s)| s.teacher.clone()).collect();
    let titles: BTreeSet<String> = schedule
        .classes
        .iter()
        .map(|class| class.title.clone())
        .filter(|title| !title.is_empty())
        .collect();

    let (class_names, teachers) = if teacher_keyed {
        (slot_teachers, titles)
    } else {
        (titles, slot_teachers)
    };

    let mut periods: Vec<Period> = Vec::new();
    for period in schedule.classes.iter().flat_map(|class| class.periods.iter()) {
        if !periods.contains(period) {
            periods.push(period.clone());
        }
    }

    let mut entries: Vec<LessonEntry> = slots()
        .map(|(class, slot)| {
            let change_details = if slot.is_changed() {
                slot.info.clone()
            } else {
                None
            };

            if teacher_keyed {
                LessonEntry {
                    id: slot.subject_id.unwrap_or(0),
                    day: schedule.date,
                    period: slot.period,
                    class_name: slot.teacher.clone().unwrap_or_default(),
                    class_changed: slot.teacher_changed,
                    teacher: Some(class.title.clone()),
                    teacher_changed: false,
                    subject: slot.subject.clone(),
                    subject_changed: slot.subject_changed,
                    room: slot.room.clone(),
                    room_changed: slot.room_changed,
                    change_details,
                }
            } else {
                LessonEntry {
                    id: slot.subject_id.unwrap_or(0),
                    day: schedule.date,
                    period: slot.period,
                    class_name: class.title.clone(),
                    class_changed: false,
                    teacher: slot.teacher.clone(),
                    teacher_changed: slot.teacher_changed,
                    subject: slot.subject.clone(),
                    subject_changed: slot.subject_changed,
                    room: slot.room.clone(),
                    room_changed: slot.room_changed,
                    change_details,
                }
            }
        })
        .collect();
    entries.sort_by_key(|entry| entry.id);

    NormalizedBatch {
        plan_kind: schedule.plan_kind.clone(),
        plan_date: schedule.date,
        timestamp: schedule.last_modified_at,
        classes: expand_class_names(class_names.iter().map(String::as_str)),
        subjects: subjects.into_iter().collect(),
        rooms: rooms.into_iter().collect(),
        teachers: teachers.into_iter().collect(),
        periods,
        holiday_ranges: group_holiday_ranges(&schedule.free_days),
        entries,
    }
}

/// Expand compound class labels into single classes
///
/// `"10a,10b"` is split on commas and `"10a-10c"` is expanded over the last
/// character of each bound. The result is deduplicated and sorted.
///
/// # Examples
///
/// ```
/// use vertretung::export::expand_class_names;
///
/// let classes = expand_class_names(["10a-10e,10s"]);
/// assert_eq!(classes, vec!["10a", "10b", "10c", "10d", "10e", "10s"]);
/// ```
pub fn expand_class_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut expanded = BTreeSet::new();

    for part in names.into_iter().flat_map(|name| name.split(',')) {
        match part.split_once('-') {
            Some((from, to)) => expand_range(from.trim(), to.trim(), &mut expanded),
            None => {
                let part = part.trim();
                if !part.is_empty() {
                    expanded.insert(part.to_string());
                }
            }
        }
    }

    expanded.into_iter().collect()
}

fn expand_range(from: &str, to: &str, out: &mut BTreeSet<String>) {
    let (Some(first), Some(last)) = (from.chars().last(), to.chars().last()) else {
        return;
    };
    let prefix = &from[..from.len() - first.len_utf8()];

    for ch in first..=last {
        out.insert(format!("{prefix}{ch}"));
    }
}

/// Group free days into ranges of consecutive school days
///
/// Two free days belong to the same range when the second is the next school
/// day after the first. Weekends and fixed-date public holidays in between do
/// not break a range.
pub fn group_holiday_ranges(days: &BTreeSet<NaiveDate>) -> Vec<HolidayRange> {
    let mut ranges: Vec<HolidayRange> = Vec::new();

    for &day in days {
        match ranges.last_mut() {
            Some(range) if next_school_day(range.end) == day => range.end = day,
            _ => ranges.push(HolidayRange {
                start: day,
                end: day,
            }),
        }
    }

    ranges
}

fn next_school_day(date: NaiveDate) -> NaiveDate {
    let mut next = date + Duration::days(1);
    while is_non_school_day(next) {
        next += Duration::days(1);
    }
    next
}

fn is_non_school_day(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
        || FIXED_HOLIDAYS.contains(&(date.month(), date.day()))
}

/// Destination for normalized batches
#[async_trait]
pub trait BatchSink: Send + Sync {
    /// Insert or replace the batch of one institution and date
    async fn upsert(&self, institution: &str, batch: &NormalizedBatch) -> Result<()>;
}

/// Sink writing each batch as a JSON file named `<institution>-<date>.json`
pub struct JsonDirectorySink {
    dir: PathBuf,
}

impl JsonDirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl BatchSink for JsonDirectorySink {
    async fn upsert(&self, institution: &str, batch: &NormalizedBatch) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.dir.join(format!("{institution}-{}.json", batch.plan_date));
        let body = serde_json::to_vec_pretty(batch)?;
        tokio::fs::write(&path, body).await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ClassDay, LessonSlot};
    use chrono::TimeZone;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn slot(period: u32, id: u32, teacher: &str, room: Option<&str>, changed: bool) -> LessonSlot {
        LessonSlot {
            period,
            subject: Some("MA".into()),
            subject_changed: false,
            teacher: Some(teacher.into()),
            teacher_changed: changed,
            room: room.map(str::to_string),
            room_changed: false,
            subject_id: Some(id),
            info: Some("Vertretung".into()),
            course: None,
            start_time: None,
            end_time: None,
        }
    }

    fn schedule(plan_kind: &str, classes: Vec<(&str, Vec<LessonSlot>)>) -> DaySchedule {
        DaySchedule {
            date: ymd(2024, 9, 5),
            last_modified_at: Utc.with_ymd_and_hms(2024, 9, 4, 7, 40, 0).unwrap(),
            plan_kind: plan_kind.into(),
            free_days: [ymd(2024, 10, 2), ymd(2024, 10, 4)].into_iter().collect(),
            classes: classes
                .into_iter()
                .map(|(title, lesson_slots)| ClassDay {
                    title: title.into(),
                    sort_key: title.into(),
                    subjects: Vec::new(),
                    courses: Vec::new(),
                    lesson_slots,
                    supervisions: Vec::new(),
                    periods: vec![Period {
                        number: 1,
                        start: "07:45".into(),
                        end: "08:30".into(),
                    }],
                })
                .collect(),
            messages: Vec::new(),
        }
    }

    #[test]
    fn test_expand_class_names() {
        assert_eq!(expand_class_names(["10a,10b,10c"]), vec!["10a", "10b", "10c"]);
        assert_eq!(expand_class_names(["10a-10c"]), vec!["10a", "10b", "10c"]);
        assert_eq!(
            expand_class_names(["10a-10e,10s"]),
            vec!["10a", "10b", "10c", "10d", "10e", "10s"]
        );
        assert_eq!(expand_class_names(["5b", "5a", "5a-5b"]), vec!["5a", "5b"]);
    }

    #[test]
    fn test_group_holiday_ranges_skips_weekends() {
        let days: BTreeSet<_> = [ymd(2024, 11, 15), ymd(2024, 11, 18), ymd(2024, 11, 20)]
            .into_iter()
            .collect();
        let ranges = group_holiday_ranges(&days);

        assert_eq!(
            ranges,
            vec![
                HolidayRange {
                    start: ymd(2024, 11, 15),
                    end: ymd(2024, 11, 18)
                },
                HolidayRange {
                    start: ymd(2024, 11, 20),
                    end: ymd(2024, 11, 20)
                },
            ]
        );
    }

    #[test]
    fn test_group_holiday_ranges_christmas() {
        let days: BTreeSet<_> = [ymd(2024, 12, 27), ymd(2024, 12, 23), ymd(2024, 12, 24)]
            .into_iter()
            .collect();
        let ranges = group_holiday_ranges(&days);

        assert_eq!(ranges.len(), 1);
        assert_eq!(ranges[0].start, ymd(2024, 12, 23));
        assert_eq!(ranges[0].end, ymd(2024, 12, 27));
    }

    #[test]
    fn test_normalize_class_plan() {
        let day = schedule(
            "K",
            vec![
                ("5a", vec![slot(2, 20, "Mei", Some("101"), true), slot(1, 10, "Mül", None, false)]),
                ("5b", vec![slot(1, 15, "Mei", Some("102"), false)]),
            ],
        );
        let batch = normalize(&day);

        assert_eq!(batch.classes, vec!["5a", "5b"]);
        assert_eq!(batch.teachers, vec!["Mei", "Mül"]);
        assert_eq!(batch.rooms, vec!["101", "102"]);
        assert_eq!(batch.subjects, vec!["MA"]);
        assert_eq!(batch.periods.len(), 1);
        assert_eq!(batch.holiday_ranges.len(), 1);

        let ids: Vec<_> = batch.entries.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![10, 15, 20]);

        let changed = &batch.entries[2];
        assert_eq!(changed.class_name, "5a");
        assert!(changed.teacher_changed);
        assert_eq!(changed.change_details.as_deref(), Some("Vertretung"));
        assert_eq!(batch.entries[0].change_details, None);
    }

    #[test]
    fn test_normalize_teacher_plan_swaps_roles() {
        let day = schedule("L", vec![("Mei", vec![slot(1, 1, "10a-10b", Some("101"), true)])]);
        let batch = normalize(&day);

        assert_eq!(batch.classes, vec!["10a", "10b"]);
        assert_eq!(batch.teachers, vec!["Mei"]);

        let entry = &batch.entries[0];
        assert_eq!(entry.class_name, "10a-10b");
        assert!(entry.class_changed);
        assert_eq!(entry.teacher.as_deref(), Some("Mei"));
        assert!(!entry.teacher_changed);
    }

    #[tokio::test]
    async fn test_json_directory_sink() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonDirectorySink::new(dir.path().join("batches"));
        let batch = normalize(&schedule("K", vec![("5a", vec![])]));

        sink.upsert("demo", &batch).await.unwrap();

        let written = std::fs::read_to_string(dir.path().join("batches/demo-2024-09-05.json")).unwrap();
        let parsed: NormalizedBatch = serde_json::from_str(&written).unwrap();
        assert_eq!(parsed, batch);
    }

    #[tokio::test]
    async fn test_json_directory_sink_reports_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocked = dir.path().join("batches");
        std::fs::write(&blocked, b"not a directory").unwrap();

        let sink = JsonDirectorySink::new(&blocked);
        let batch = normalize(&schedule("K", vec![("5a", vec![])]));

        let err = sink.upsert("demo", &batch).await.unwrap_err();
        assert!(matches!(err, crate::error::Error::Io(_)));
    }
}
