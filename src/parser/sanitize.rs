//! Value sanitization for plan file fields
//!
//! Indiware fills empty cells with placeholder markers instead of leaving
//! them blank. The helpers here turn those into proper absent values and
//! enforce the strict numeric format used for period and subject numbers.

use regex::Regex;
use std::sync::LazyLock;

use crate::utils::error::ParseError;

static CLASS_NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9/ a-zA-Z]*$").unwrap());

/// Placeholders written for empty cells
const EMPTY_MARKERS: &[&str] = &["---", "&nbsp;", "\u{a0}"];

/// Map placeholder values to `None`
///
/// # Examples
///
/// ```
/// use vertretung::parser::sanitize::sanitize_empty_value;
///
/// assert_eq!(sanitize_empty_value(Some("---".into())), None);
/// assert_eq!(sanitize_empty_value(Some("MA".into())), Some("MA".to_string()));
/// ```
pub fn sanitize_empty_value(value: Option<String>) -> Option<String> {
    value.filter(|text| !EMPTY_MARKERS.contains(&text.as_str()))
}

/// Parse a decimal field that must round-trip exactly
///
/// `"7"` is accepted while `"07"`, `"+7"`, `" 7"` and `"7a"` are rejected, so
/// a value that looks numeric but carries extra formatting is never silently
/// reinterpreted.
pub fn parse_number_field(field: &'static str, value: &str) -> Result<u32, ParseError> {
    value
        .parse::<u32>()
        .ok()
        .filter(|number| number.to_string() == value)
        .ok_or_else(|| ParseError::InvalidNumber {
            field,
            value: value.to_string(),
        })
}

/// Check a class title against the allow-list of digits, ASCII letters,
/// slash and space
pub fn is_valid_class_name(name: &str) -> bool {
    CLASS_NAME_REGEX.is_match(name)
}
