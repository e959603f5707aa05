// Core data structures for the schedule crawler

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One institution's schedule for a single date
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaySchedule {
    pub date: NaiveDate,
    pub last_modified_at: DateTime<Utc>,
    /// `planart` header value, `K` for class plans and `L` for teacher plans
    pub plan_kind: String,
    pub free_days: BTreeSet<NaiveDate>,
    pub classes: Vec<ClassDay>,
    pub messages: Vec<String>,
}

/// One class (or teacher, for teacher-keyed feeds) within a day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassDay {
    pub title: String,
    pub sort_key: String,
    pub subjects: Vec<Subject>,
    pub courses: Vec<Course>,
    pub lesson_slots: Vec<LessonSlot>,
    pub supervisions: Vec<Supervision>,
    pub periods: Vec<Period>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub id: u32,
    pub subject: String,
    pub teacher: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub name: String,
    pub teacher: String,
}

/// Start and end time of a numbered period
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Period {
    pub number: u32,
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonSlot {
    pub period: u32,
    pub subject: Option<String>,
    pub subject_changed: bool,
    pub teacher: Option<String>,
    pub teacher_changed: bool,
    pub room: Option<String>,
    pub room_changed: bool,
    pub subject_id: Option<u32>,
    pub info: Option<String>,
    pub course: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
}

impl LessonSlot {
    /// Whether any field of this slot deviates from the regular timetable
    pub fn is_changed(&self) -> bool {
        self.subject_changed || self.teacher_changed || self.room_changed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SupervisionKind {
    Regular,
    Cancelled,
    Substituted,
}

impl SupervisionKind {
    /// Label shown to users in the schedule's locale
    pub fn label(&self) -> &'static str {
        match self {
            Self::Regular => "regulär",
            Self::Cancelled => "entfällt",
            Self::Substituted => "Vertretung",
        }
    }
}

/// A break or hallway supervision duty
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Supervision {
    pub kind: SupervisionKind,
    pub preceding_period: i64,
    pub time1: String,
    pub time2: String,
    pub location: String,
    pub replacement_for: Option<String>,
    pub info: Option<String>,
}

/// Multi-day schedule produced by the merge engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedSchedule {
    pub free_days: BTreeSet<NaiveDate>,
    pub classes: Vec<MergedClass>,
    pub days: Vec<MergedDay>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedClass {
    pub name: String,
    pub courses: Vec<MergedCourse>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedCourse {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub teacher: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedDay {
    pub date: NaiveDate,
    pub last_modified_at: DateTime<Utc>,
    pub classes: Vec<MergedClassDay>,
    pub messages: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergedClassDay {
    pub title: String,
    pub lesson_slots: Vec<LessonSlot>,
    pub supervisions: Vec<Supervision>,
}

impl MergedSchedule {
    /// Look up the per-day entry of a class
    pub fn class_day(&self, date: NaiveDate, title: &str) -> Option<&MergedClassDay> {
        self.days
            .iter()
            .find(|day| day.date == date)?
            .classes
            .iter()
            .find(|class| class.title == title)
    }
}
