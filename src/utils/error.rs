//! Error types for the schedule crawler
//!
//! This module defines the domain error types used by the reader, the merge
//! engine, the fetcher and the servable-content compiler.

use chrono::NaiveDate;
use thiserror::Error;

/// Errors raised while reading, validating and postprocessing a plan file
#[derive(Error, Debug)]
pub enum ParseError {
    /// The document is not well-formed XML
    #[error("Malformed XML: {0}")]
    Xml(#[from] roxmltree::Error),

    /// The document does not match the structural schema
    #[error("Schema validation failed at {path}: {reason}")]
    SchemaValidation { path: String, reason: String },

    /// A date or timestamp could not be parsed
    #[error("Invalid {field}: {value}")]
    DateFormat { field: &'static str, value: String },

    /// A key that must be unique appeared twice
    #[error("Duplicate {kind}: {key}")]
    DuplicateKey { kind: &'static str, key: String },

    /// A lesson slot references a course the class does not declare
    #[error("Class {class} references undeclared course {course}")]
    InvalidReference { class: String, course: String },

    /// An attribute carries a value outside the known set
    #[error("Unexpected value for {field}: {value}")]
    InvalidEnumValue { field: &'static str, value: String },

    /// A numeric field is not a plain decimal integer
    #[error("Unexpected {field}: {value}")]
    InvalidNumber { field: &'static str, value: String },

    /// A class title contains characters outside the allow-list
    #[error("Unexpected class name: {0}")]
    InvalidClassName(String),
}

impl ParseError {
    pub(crate) fn schema(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SchemaValidation {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Errors that can occur during HTTP fetching operations
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Request timeout
    #[error("Request timeout")]
    Timeout,

    /// The request was cancelled by a shutdown signal
    #[error("Request cancelled")]
    Cancelled,

    /// Status outside the recognized set
    #[error("Unexpected HTTP status {status} for {url}")]
    UnexpectedHttpStatus { url: String, status: u16 },

    /// Neither the window nor the fallback file yielded a schedule
    #[error("No data available, fallback {url} is missing")]
    NoDataAvailable { url: String },

    /// The file declares a different date than requested
    #[error("Requested plan for {requested} but got data for {actual}")]
    DateMismatch {
        requested: NaiveDate,
        actual: NaiveDate,
    },

    /// Content decoding error
    #[error("Decoding error: {0}")]
    Decode(String),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The body was fetched but could not be parsed
    #[error("Failed to parse {url}: {source}")]
    Parse {
        url: String,
        #[source]
        source: ParseError,
    },
}

/// Errors raised by the merge engine
#[derive(Error, Debug)]
pub enum MergeError {
    /// Two inputs declare the same plan date
    #[error("Duplicate plan files for {date}")]
    DuplicateKey { date: NaiveDate },
}

/// Errors raised while compiling servable content
#[derive(Error, Debug)]
pub enum ContentError {
    /// Two tenants produced the same id in one map
    #[error("Duplicate key {key} in {map}")]
    DuplicateKey { map: &'static str, key: String },

    /// The start screen id does not name a config screen
    #[error("Unknown start screen: {0}")]
    UnknownStartScreen(String),

    /// The canonical start screen id is already taken
    #[error("Cannot rename start screen to {0}: id already in use")]
    StartScreenConflict(String),

    /// Legacy naming cannot host a second tenant
    #[error("Legacy mode does not support a teacher feed")]
    LegacyWithTeacher,
}
