//! Common test utilities

#![allow(dead_code)]

use chrono::{Datelike, NaiveDate, Weekday};
use vertretung::config::{FeedConfig, InstitutionConfig, WorkerConfig};
use vertretung::parser::Locale;

const MONTHS: [&str; 12] = [
    "Januar",
    "Februar",
    "März",
    "April",
    "Mai",
    "Juni",
    "Juli",
    "August",
    "September",
    "Oktober",
    "November",
    "Dezember",
];

pub fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

fn german_weekday(date: NaiveDate) -> &'static str {
    match date.weekday() {
        Weekday::Mon => "Montag",
        Weekday::Tue => "Dienstag",
        Weekday::Wed => "Mittwoch",
        Weekday::Thu => "Donnerstag",
        Weekday::Fri => "Freitag",
        Weekday::Sat => "Samstag",
        Weekday::Sun => "Sonntag",
    }
}

/// `Donnerstag, 05. September 2024`
pub fn german_date(date: NaiveDate) -> String {
    format!(
        "{}, {:02}. {} {}",
        german_weekday(date),
        date.day(),
        MONTHS[date.month0() as usize],
        date.year()
    )
}

/// Complete plan file for `date`
pub fn plan_xml(date: NaiveDate, classes: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<VpMobil>
  <Kopf>
    <planart>K</planart>
    <zeitstempel>{}, 07:15</zeitstempel>
    <DatumPlan>{}</DatumPlan>
    <datei>PlanKl{}.xml</datei>
  </Kopf>
  <FreieTage><ft>241003</ft><ft>241004</ft></FreieTage>
  <Klassen>{classes}</Klassen>
  <ZusatzInfo><ZiZeile>Stand {}</ZiZeile></ZusatzInfo>
</VpMobil>"#,
        date.format("%d.%m.%Y"),
        german_date(date),
        date.format("%Y%m%d"),
        date.format("%d.%m."),
    )
}

pub fn class_xml(name: &str, body: &str) -> String {
    format!("<Kl><Kurz>{name}</Kurz>{body}</Kl>")
}

pub fn courses_xml(courses: &[(&str, &str)]) -> String {
    let items: String = courses
        .iter()
        .map(|(name, teacher)| format!("<Ku><KKz KLe=\"{teacher}\">{name}</KKz></Ku>"))
        .collect();
    format!("<Kurse>{items}</Kurse>")
}

pub fn lesson_xml(period: u32, subject: &str, teacher: &str, course: Option<&str>) -> String {
    let course = course
        .map(|name| format!("<Ku2>{name}</Ku2>"))
        .unwrap_or_default();
    format!(
        "<Std><St>{period}</St><Fa>{subject}</Fa><Le>{teacher}</Le><Ra>101</Ra><If/>{course}</Std>"
    )
}

/// Two classes, listed out of order, one of them with courses
pub fn standard_classes() -> String {
    let upper = class_xml(
        "10 b",
        &format!(
            "{}<Pl>{}{}</Pl>",
            courses_xml(&[("ma1", "Mei"), ("de2", "Mül")]),
            lesson_xml(1, "MA", "Mei", Some("ma1")),
            lesson_xml(2, "SP", "Sch", None),
        ),
    );
    let lower = class_xml("5 a", &format!("<Pl>{}</Pl>", lesson_xml(1, "DE", "Mül", None)));
    format!("{upper}{lower}")
}

pub fn feed(url: &str) -> FeedConfig {
    FeedConfig {
        url: url.to_string(),
        username: "schueler".to_string(),
        password: "geheim".to_string(),
        requested_password: None,
        with_courses: None,
        plan_prefix: None,
        fallback_file: None,
    }
}

pub fn institution(url: &str) -> InstitutionConfig {
    InstitutionConfig {
        id: "demo".to_string(),
        title: "Demo-Gymnasium".to_string(),
        timezone: "Europe/Berlin".to_string(),
        locale: Locale::De,
        legacy: false,
        student: feed(url),
        teacher: None,
    }
}

pub fn worker_config() -> WorkerConfig {
    WorkerConfig {
        startup_jitter_secs: 0,
        request_timeout_secs: 5,
        ..WorkerConfig::default()
    }
}
