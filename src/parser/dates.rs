//! Locale-aware date handling for plan file headers

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::utils::error::ParseError;

/// Language of the human-readable plan date
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    De,
    En,
}

impl FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "de" => Ok(Self::De),
            "en" => Ok(Self::En),
            other => Err(format!("unsupported locale: {other}")),
        }
    }
}

impl Locale {
    fn weekday_name(self, weekday: Weekday) -> &'static str {
        let index = weekday.num_days_from_monday() as usize;
        match self {
            Self::De => [
                "Montag",
                "Dienstag",
                "Mittwoch",
                "Donnerstag",
                "Freitag",
                "Samstag",
                "Sonntag",
            ][index],
            Self::En => [
                "Monday",
                "Tuesday",
                "Wednesday",
                "Thursday",
                "Friday",
                "Saturday",
                "Sunday",
            ][index],
        }
    }

    fn months(self) -> [&'static str; 12] {
        match self {
            Self::De => [
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
            ],
            Self::En => [
                "January",
                "February",
                "March",
                "April",
                "May",
                "June",
                "July",
                "August",
                "September",
                "October",
                "November",
                "December",
            ],
        }
    }
}

/// Parse a plan date like `Donnerstag, 05. September 2019`
///
/// The weekday must agree with the calendar date.
pub fn parse_plan_date(value: &str, locale: Locale) -> Result<NaiveDate, ParseError> {
    let invalid = || ParseError::DateFormat {
        field: "plan date",
        value: value.to_string(),
    };

    let (weekday, rest) = value.split_once(", ").ok_or_else(invalid)?;
    let mut parts = rest.split(' ');
    let (day, month, year) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(day), Some(month), Some(year), None) => (day, month, year),
        _ => return Err(invalid()),
    };

    let day = day
        .strip_suffix('.')
        .filter(|digits| digits.len() == 2 && digits.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|digits| digits.parse::<u32>().ok())
        .ok_or_else(invalid)?;
    let month = locale
        .months()
        .iter()
        .position(|name| *name == month)
        .ok_or_else(invalid)? as u32
        + 1;
    let year = Some(year)
        .filter(|digits| digits.len() == 4 && digits.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|digits| digits.parse::<i32>().ok())
        .ok_or_else(invalid)?;

    let date = NaiveDate::from_ymd_opt(year, month, day).ok_or_else(invalid)?;
    if locale.weekday_name(date.weekday()) != weekday {
        return Err(invalid());
    }

    Ok(date)
}

/// Parse a `DD.MM.YYYY, HH:mm` timestamp in the institution's timezone
///
/// Ambiguous local times during the autumn DST switch resolve to the earlier
/// instant. Local times skipped by the spring switch are rejected.
pub fn parse_timestamp(value: &str, timezone: Tz) -> Result<DateTime<Utc>, ParseError> {
    let invalid = || ParseError::DateFormat {
        field: "timestamp",
        value: value.to_string(),
    };

    if value.len() != "DD.MM.YYYY, HH:mm".len() {
        return Err(invalid());
    }

    let local = NaiveDateTime::parse_from_str(value, "%d.%m.%Y, %H:%M").map_err(|_| invalid())?;

    timezone
        .from_local_datetime(&local)
        .earliest()
        .map(|time| time.with_timezone(&Utc))
        .ok_or_else(invalid)
}

/// Parse a `YYMMDD` free day token
pub fn parse_free_day(value: &str) -> Result<NaiveDate, ParseError> {
    let invalid = || ParseError::DateFormat {
        field: "free day",
        value: value.to_string(),
    };

    if value.len() != 6 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    NaiveDate::parse_from_str(value, "%y%m%d").map_err(|_| invalid())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono_tz::Europe::Berlin;

    #[test]
    fn test_parse_german_plan_date() {
        let date = parse_plan_date("Donnerstag, 05. September 2019", Locale::De).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2019, 9, 5).unwrap());

        let date = parse_plan_date("Montag, 03. März 2025", Locale::De).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2025, 3, 3).unwrap());
    }

    #[test]
    fn test_parse_english_plan_date() {
        let date = parse_plan_date("Thursday, 05. September 2019", Locale::En).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2019, 9, 5).unwrap());
    }

    #[test]
    fn test_plan_date_weekday_mismatch() {
        assert!(parse_plan_date("Freitag, 05. September 2019", Locale::De).is_err());
    }

    #[test]
    fn test_plan_date_strict_format() {
        for input in [
            "Donnerstag, 5. September 2019",
            "Donnerstag 05. September 2019",
            "Donnerstag, 05 September 2019",
            "Donnerstag, 05. Sept 2019",
            "Donnerstag, 05. September 19",
            "Donnerstag, 05. September 2019 ",
        ] {
            assert!(parse_plan_date(input, Locale::De).is_err(), "{input}");
        }
    }

    #[test]
    fn test_parse_timestamp_summer_time() {
        let ts = parse_timestamp("04.09.2019, 09:40", Berlin).unwrap();
        assert_eq!(ts.to_rfc3339(), "2019-09-04T07:40:00+00:00");
    }

    #[test]
    fn test_parse_timestamp_winter_time() {
        let ts = parse_timestamp("10.01.2024, 07:05", Berlin).unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-01-10T06:05:00+00:00");
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        assert!(parse_timestamp("2019-09-04 09:40", Berlin).is_err());
        assert!(parse_timestamp("4.9.2019, 9:40", Berlin).is_err());
        // skipped by the spring DST switch
        assert!(parse_timestamp("31.03.2024, 02:30", Berlin).is_err());
    }

    #[test]
    fn test_parse_free_day() {
        let date = parse_free_day("241223").unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 12, 23).unwrap());

        assert!(parse_free_day("20241223").is_err());
        assert!(parse_free_day("241323").is_err());
        assert!(parse_free_day("24122a").is_err());
    }

    #[test]
    fn test_locale_from_str() {
        assert_eq!("de".parse::<Locale>().unwrap(), Locale::De);
        assert_eq!("EN".parse::<Locale>().unwrap(), Locale::En);
        assert!("fr".parse::<Locale>().is_err());
    }
}
