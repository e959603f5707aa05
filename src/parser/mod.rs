//! Plan file parsing and postprocessing
//!
//! A plan file passes through two stages:
//!
//! 1. [`reader`] checks the XML against the structural schema and produces a
//!    [`schema::PlanDocument`]
//! 2. the postprocessor in this module turns that document into a
//!    [`DaySchedule`], decoding dates, normalizing placeholder values and
//!    enforcing the cross-field invariants
//!
//! Parsing is a pure function of its input: the same text and options always
//! yield the same result.

pub mod dates;
pub mod reader;
pub mod sanitize;
pub mod schema;

pub use dates::Locale;
pub use reader::read_and_validate;

use chrono_tz::Tz;
use regex::Regex;
use std::collections::{BTreeSet, HashSet};
use std::sync::LazyLock;

use crate::models::{ClassDay, Course, DaySchedule, LessonSlot, Period, Subject, Supervision, SupervisionKind};
use crate::utils::error::ParseError;
use sanitize::{is_valid_class_name, parse_number_field, sanitize_empty_value};
use schema::{ClassElement, LessonElement, PlanDocument, SupervisionElement};

static NUMBERED_CLASS_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]* [a-z]*$").unwrap());

/// Options controlling how a plan file is interpreted
#[derive(Debug, Clone, Copy)]
pub struct ParseOptions {
    pub locale: Locale,
    pub timezone: Tz,
    /// Skip the class name allow-list, for teacher-keyed feeds
    pub relaxed_class_names: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            locale: Locale::De,
            timezone: chrono_tz::Europe::Berlin,
            relaxed_class_names: false,
        }
    }
}

/// Parse raw plan file text into a [`DaySchedule`]
///
/// # Errors
///
/// Fails on schema violations, unparsable dates, duplicate keys, dangling
/// course references and unknown supervision markers. Nothing is recovered
/// partially.
pub fn parse_plan_file(input: &str, options: &ParseOptions) -> Result<DaySchedule, ParseError> {
    let document = read_and_validate(input)?;
    postprocess(document, options)
}

/// Convert a validated document into a [`DaySchedule`]
pub fn postprocess(document: PlanDocument, options: &ParseOptions) -> Result<DaySchedule, ParseError> {
    let date = dates::parse_plan_date(&document.head.plan_date, options.locale)?;
    let last_modified_at = dates::parse_timestamp(&document.head.timestamp, options.timezone)?;

    let mut free_days = BTreeSet::new();
    for token in &document.free_days {
        let day = dates::parse_free_day(token)?;
        if !free_days.insert(day) {
            return Err(ParseError::DuplicateKey {
                kind: "free day",
                key: token.clone(),
            });
        }
    }

    let messages = document
        .messages
        .into_iter()
        .flatten()
        .filter(|line| !line.is_empty())
        .collect();

    let mut seen_titles = HashSet::new();
    let mut classes = Vec::with_capacity(document.classes.len());
    for element in document.classes {
        if !seen_titles.insert(element.short_name.clone()) {
            return Err(ParseError::DuplicateKey {
                kind: "class",
                key: element.short_name,
            });
        }
        classes.push(convert_class(element, options)?);
    }

    assign_sort_keys(&mut classes);

    Ok(DaySchedule {
        date,
        last_modified_at,
        plan_kind: document.head.plan_kind,
        free_days,
        classes,
        messages,
    })
}

fn convert_class(element: ClassElement, options: &ParseOptions) -> Result<ClassDay, ParseError> {
    let title = element.short_name;

    if !options.relaxed_class_names && !is_valid_class_name(&title) {
        return Err(ParseError::InvalidClassName(title));
    }

    let mut subjects = Vec::with_capacity(element.subjects.len());
    let mut subject_ids = HashSet::new();
    for item in element.subjects {
        let id = parse_number_field("subject id", &item.number)?;
        if !subject_ids.insert(id) {
            return Err(ParseError::DuplicateKey {
                kind: "subject id",
                key: item.number,
            });
        }
        subjects.push(Subject {
            id,
            subject: item.subject,
            teacher: item.teacher,
        });
    }

    let mut courses: Vec<Course> = Vec::with_capacity(element.courses.len());
    for item in element.courses {
        if courses.iter().all(|course| course.name != item.name) {
            courses.push(Course {
                name: item.name,
                teacher: item.teacher,
            });
        }
    }

    let lesson_slots = element
        .lessons
        .into_iter()
        .map(|lesson| convert_lesson(lesson, &title, &courses))
        .collect::<Result<Vec<_>, _>>()?;

    let supervisions = element
        .supervisions
        .into_iter()
        .map(convert_supervision)
        .collect::<Result<Vec<_>, _>>()?;

    let mut periods: Vec<Period> = Vec::with_capacity(element.periods.len());
    for item in element.periods {
        let period = Period {
            number: parse_number_field("period number", &item.number)?,
            start: item.from,
            end: item.to,
        };
        if !periods.contains(&period) {
            periods.push(period);
        }
    }

    Ok(ClassDay {
        sort_key: title.clone(),
        title,
        subjects,
        courses,
        lesson_slots,
        supervisions,
        periods,
    })
}

fn convert_lesson(
    lesson: LessonElement,
    class: &str,
    courses: &[Course],
) -> Result<LessonSlot, ParseError> {
    // classes without course declarations still carry a copy of the subject
    // in Ku2, which is not a course reference
    let course = if courses.is_empty() {
        None
    } else {
        match lesson.course {
            Some(name) if courses.iter().any(|course| course.name == name) => Some(name),
            Some(name) => {
                return Err(ParseError::InvalidReference {
                    class: class.to_string(),
                    course: name,
                })
            }
            None => None,
        }
    };

    Ok(LessonSlot {
        period: parse_number_field("period", &lesson.period)?,
        subject: sanitize_empty_value(lesson.subject.text),
        subject_changed: lesson.subject.changed,
        teacher: sanitize_empty_value(lesson.teacher.text),
        teacher_changed: lesson.teacher.changed,
        room: sanitize_empty_value(lesson.room.text),
        room_changed: lesson.room.changed,
        subject_id: lesson
            .number
            .map(|nr| parse_number_field("subject id", &nr))
            .transpose()?,
        info: lesson.info,
        course,
        start_time: lesson.start,
        end_time: lesson.end,
    })
}

fn convert_supervision(item: SupervisionElement) -> Result<Supervision, ParseError> {
    let kind = match item.marker.as_deref() {
        None => SupervisionKind::Regular,
        Some("AuVertretung") => SupervisionKind::Substituted,
        Some("AuAusfall") => SupervisionKind::Cancelled,
        Some(other) => {
            return Err(ParseError::InvalidEnumValue {
                field: "supervision marker",
                value: other.to_string(),
            })
        }
    };

    let preceding_period = item
        .preceding_period
        .trim()
        .parse::<i64>()
        .map_err(|_| ParseError::InvalidNumber {
            field: "supervision period",
            value: item.preceding_period.clone(),
        })?;

    Ok(Supervision {
        kind,
        preceding_period,
        time1: item.time1,
        time2: item.time2,
        location: item.location,
        replacement_for: item.replacement_for,
        info: item.info,
    })
}

/// Zero-pad numeric prefixes when every title looks like `<number> <letters>`
fn assign_sort_keys(classes: &mut [ClassDay]) {
    let numbered = !classes.is_empty()
        && classes
            .iter()
            .all(|class| NUMBERED_CLASS_REGEX.is_match(&class.title));

    if !numbered {
        for class in classes.iter_mut() {
            class.sort_key = class.title.clone();
        }
        return;
    }

    let width = classes
        .iter()
        .map(|class| number_prefix(&class.title).len())
        .max()
        .unwrap_or(0);

    for class in classes.iter_mut() {
        let prefix = number_prefix(&class.title);
        let suffix = &class.title[prefix.len()..];
        class.sort_key = format!("{prefix:0>width$}{suffix}");
    }
}

fn number_prefix(title: &str) -> &str {
    title.split(' ').next().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(classes: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="utf-8"?>
<VpMobil>
  <Kopf>
    <planart>K</planart>
    <zeitstempel>04.09.2019, 09:40</zeitstempel>
    <DatumPlan>Donnerstag, 05. September 2019</DatumPlan>
    <datei>PlanKl20190905.xml</datei>
  </Kopf>
  <FreieTage><ft>190801</ft><ft>190802</ft></FreieTage>
  <Klassen>{classes}</Klassen>
  <ZusatzInfo><ZiZeile>Erste Zeile</ZiZeile><ZiZeile/><ZiZeile>Zweite Zeile</ZiZeile></ZusatzInfo>
</VpMobil>"#
        )
    }

    fn class(name: &str, body: &str) -> String {
        format!("<Kl><Kurz>{name}</Kurz>{body}</Kl>")
    }

    fn lesson(period: &str, extra: &str) -> String {
        format!(
            "<Std><St>{period}</St><Fa>MA</Fa><Le>Mei</Le><Ra>101</Ra><If/>{extra}</Std>"
        )
    }

    #[test]
    fn test_header_and_messages() {
        let input = plan(&class("5a", "<Pl/>"));
        let schedule = parse_plan_file(&input, &ParseOptions::default()).unwrap();

        assert_eq!(schedule.date.to_string(), "2019-09-05");
        assert_eq!(schedule.last_modified_at.to_rfc3339(), "2019-09-04T07:40:00+00:00");
        assert_eq!(schedule.plan_kind, "K");
        assert_eq!(schedule.free_days.len(), 2);
        assert_eq!(schedule.messages, vec!["Erste Zeile", "Zweite Zeile"]);
    }

    #[test]
    fn test_changed_flag_independent_of_text() {
        let body = "<Pl><Std><St>1</St><Fa FaAe=\"FaGeaendert\">---</Fa><Le LeAe=\"LeGeaendert\">Mül</Le><Ra>&amp;nbsp;</Ra><If/></Std></Pl>";
        let input = plan(&class("5a", body));
        let schedule = parse_plan_file(&input, &ParseOptions::default()).unwrap();

        let slot = &schedule.classes[0].lesson_slots[0];
        assert_eq!(slot.subject, None);
        assert!(slot.subject_changed);
        assert_eq!(slot.teacher.as_deref(), Some("Mül"));
        assert!(slot.teacher_changed);
        assert_eq!(slot.room, None);
        assert!(!slot.room_changed);
    }

    #[test]
    fn test_duplicate_free_day() {
        let input = plan(&class("5a", "<Pl/>")).replace("190802", "190801");
        let err = parse_plan_file(&input, &ParseOptions::default()).unwrap_err();
        assert!(matches!(err, ParseError::DuplicateKey { kind: "free day", .. }));
    }

    #[test]
    fn test_duplicate_class_title() {
        let classes = format!("{}{}", class("5a", "<Pl/>"), class("5a", "<Pl/>"));
        let err = parse_plan_file(&plan(&classes), &ParseOptions::default()).unwrap_err();
        assert!(matches!(err, ParseError::DuplicateKey { kind: "class", .. }));
    }

    #[test]
    fn test_duplicate_subject_id() {
        let body = "<Unterricht><Ue><UeNr UeLe=\"A\" UeFa=\"MA\">3</UeNr></Ue><Ue><UeNr UeLe=\"B\" UeFa=\"DE\">3</UeNr></Ue></Unterricht><Pl/>";
        let err = parse_plan_file(&plan(&class("5a", body)), &ParseOptions::default()).unwrap_err();
        assert!(matches!(err, ParseError::DuplicateKey { kind: "subject id", .. }));
    }

    #[test]
    fn test_class_name_allow_list_and_relaxed_mode() {
        let input = plan(&class("Mül-ler", "<Pl/>"));
        let err = parse_plan_file(&input, &ParseOptions::default()).unwrap_err();
        assert!(matches!(err, ParseError::InvalidClassName(_)));

        let relaxed = ParseOptions {
            relaxed_class_names: true,
            ..ParseOptions::default()
        };
        assert!(parse_plan_file(&input, &relaxed).is_ok());
    }

    #[test]
    fn test_courses_deduplicated_and_referenced() {
        let body = format!(
            "<Kurse><Ku><KKz KLe=\"Mei\">ma1</KKz></Ku><Ku><KKz KLe=\"Other\">ma1</KKz></Ku></Kurse><Pl>{}{}</Pl>",
            lesson("1", "<Ku2>ma1</Ku2>"),
            lesson("2", "")
        );
        let schedule = parse_plan_file(&plan(&class("10a", &body)), &ParseOptions::default()).unwrap();
        let class = &schedule.classes[0];

        assert_eq!(class.courses.len(), 1);
        assert_eq!(class.courses[0].teacher, "Mei");
        assert_eq!(class.lesson_slots[0].course.as_deref(), Some("ma1"));
        assert_eq!(class.lesson_slots[1].course, None);
    }

    #[test]
    fn test_undeclared_course_reference() {
        let body = format!(
            "<Kurse><Ku><KKz KLe=\"Mei\">ma1</KKz></Ku></Kurse><Pl>{}</Pl>",
            lesson("1", "<Ku2>ph1</Ku2>")
        );
        let err = parse_plan_file(&plan(&class("10a", &body)), &ParseOptions::default()).unwrap_err();
        match err {
            ParseError::InvalidReference { class, course } => {
                assert_eq!(class, "10a");
                assert_eq!(course, "ph1");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_course_copy_without_declarations_is_dropped() {
        let body = format!("<Pl>{}</Pl>", lesson("1", "<Ku2>MA</Ku2>"));
        let schedule = parse_plan_file(&plan(&class("5a", &body)), &ParseOptions::default()).unwrap();
        assert_eq!(schedule.classes[0].lesson_slots[0].course, None);
    }

    #[test]
    fn test_supervision_kinds() {
        let supervision = |marker: &str| {
            format!(
                "<Aufsicht {marker}><AuVorStunde>2</AuVorStunde><AuUhrzeit>09:20</AuUhrzeit><AuZeit>09:20 - 09:40</AuZeit><AuOrt>Hof</AuOrt><AuFuer>Mül</AuFuer></Aufsicht>"
            )
        };
        let body = format!(
            "<Pl/><Aufsichten>{}{}{}</Aufsichten>",
            supervision(""),
            supervision("AuAe=\"AuVertretung\""),
            supervision("AuAe=\"AuAusfall\"")
        );
        let schedule = parse_plan_file(&plan(&class("5a", &body)), &ParseOptions::default()).unwrap();
        let kinds: Vec<_> = schedule.classes[0]
            .supervisions
            .iter()
            .map(|s| s.kind)
            .collect();

        assert_eq!(
            kinds,
            vec![
                SupervisionKind::Regular,
                SupervisionKind::Substituted,
                SupervisionKind::Cancelled
            ]
        );
        assert_eq!(schedule.classes[0].supervisions[0].preceding_period, 2);
        assert_eq!(
            schedule.classes[0].supervisions[0].replacement_for.as_deref(),
            Some("Mül")
        );

        let bad = format!("<Pl/><Aufsichten>{}</Aufsichten>", supervision("AuAe=\"AuSonstwas\""));
        let err = parse_plan_file(&plan(&class("5a", &bad)), &ParseOptions::default()).unwrap_err();
        assert!(matches!(err, ParseError::InvalidEnumValue { .. }));
    }

    #[test]
    fn test_sort_keys_padded_for_numbered_titles() {
        let classes = format!(
            "{}{}{}",
            class("5 a", "<Pl/>"),
            class("10 b", "<Pl/>"),
            class("12 ", "<Pl/>")
        );
        let schedule = parse_plan_file(&plan(&classes), &ParseOptions::default()).unwrap();
        let keys: Vec<_> = schedule.classes.iter().map(|c| c.sort_key.as_str()).collect();
        assert_eq!(keys, vec!["05 a", "10 b", "12 "]);
    }

    #[test]
    fn test_sort_keys_fall_back_to_title() {
        let classes = format!("{}{}", class("5 a", "<Pl/>"), class("10a", "<Pl/>"));
        let schedule = parse_plan_file(&plan(&classes), &ParseOptions::default()).unwrap();
        let keys: Vec<_> = schedule.classes.iter().map(|c| c.sort_key.as_str()).collect();
        assert_eq!(keys, vec!["5 a", "10a"]);
    }

    #[test]
    fn test_periods_and_subject_ids() {
        let body = format!(
            "<KlStunden><KlSt ZeitVon=\"07:45\" ZeitBis=\"08:30\">1</KlSt><KlSt ZeitVon=\"07:45\" ZeitBis=\"08:30\">1</KlSt></KlStunden><Pl>{}</Pl>",
            lesson("1", "<Nr>12</Nr><Beginn>07:45</Beginn><Ende>08:30</Ende>")
        );
        let schedule = parse_plan_file(&plan(&class("5a", &body)), &ParseOptions::default()).unwrap();
        let class = &schedule.classes[0];

        assert_eq!(class.periods.len(), 1);
        assert_eq!(class.periods[0].start, "07:45");
        assert_eq!(class.lesson_slots[0].subject_id, Some(12));
        assert_eq!(class.lesson_slots[0].start_time.as_deref(), Some("07:45"));
    }

    #[test]
    fn test_parsing_is_deterministic() {
        let body = format!(
            "<Kurse><Ku><KKz KLe=\"Mei\">ma1</KKz></Ku></Kurse><Pl>{}{}</Pl>",
            lesson("1", "<Ku2>ma1</Ku2>"),
            lesson("2", "")
        );
        let input = plan(&format!("{}{}", class("10a", &body), class("5b", "<Pl/>")));

        let first = parse_plan_file(&input, &ParseOptions::default()).unwrap();
        let second = parse_plan_file(&input, &ParseOptions::default()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_invalid_period_number() {
        let body = format!("<Pl>{}</Pl>", lesson("01", ""));
        let err = parse_plan_file(&plan(&class("5a", &body)), &ParseOptions::default()).unwrap_err();
        assert!(matches!(err, ParseError::InvalidNumber { field: "period", .. }));
    }
}
