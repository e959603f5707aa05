//! Unified error handling for the vertretung crate
//!
//! This module provides a unified error type that consolidates all domain-specific
//! errors into a single `Error` enum, while maintaining the ability to use
//! domain-specific errors when needed.
//!
//! # Architecture
//!
//! - [`CrawlErrorTrait`] - Common interface implemented by all error types
//! - [`ErrorCategory`] - Classification of errors for handling strategies
//! - [`Error`] - Unified error enum wrapping all domain-specific errors
//!
//! # Usage
//!
//! ```rust,ignore
//! use vertretung::error::{CrawlErrorTrait, Error};
//!
//! fn handle_error(err: Error) {
//!     if err.is_recoverable() {
//!         tracing::warn!(category = %err.category(), "cycle failed: {err}");
//!     } else {
//!         tracing::error!("fatal error: {err}");
//!     }
//! }
//! ```

use std::io;
use thiserror::Error;

pub use crate::utils::error::{ContentError, FetchError, MergeError, ParseError};

/// Common trait for all crawler error types
pub trait CrawlErrorTrait: std::error::Error {
    /// Check if this error is recoverable (the next cycle may succeed)
    fn is_recoverable(&self) -> bool;

    /// Get the error category for handling strategies
    fn category(&self) -> ErrorCategory;
}

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Network-related errors (HTTP, timeout, unexpected status)
    Network,
    /// XML reading and schema errors
    Parsing,
    /// Inconsistent schedule data (duplicates, dangling references)
    Data,
    /// Configuration and validation errors
    Config,
    /// I/O errors
    Storage,
    /// Other/unknown errors
    Other,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Network => "network",
            Self::Parsing => "parsing",
            Self::Data => "data",
            Self::Config => "config",
            Self::Storage => "storage",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

impl CrawlErrorTrait for ParseError {
    fn is_recoverable(&self) -> bool {
        // upstream may publish a corrected file in a later cycle
        true
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Xml(_) | Self::SchemaValidation { .. } | Self::DateFormat { .. } => {
                ErrorCategory::Parsing
            }
            Self::InvalidNumber { .. } | Self::InvalidEnumValue { .. } => ErrorCategory::Parsing,
            Self::DuplicateKey { .. }
            | Self::InvalidReference { .. }
            | Self::InvalidClassName(_) => ErrorCategory::Data,
        }
    }
}

impl CrawlErrorTrait for FetchError {
    fn is_recoverable(&self) -> bool {
        !matches!(self, Self::InvalidUrl(_))
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Http(_)
            | Self::Timeout
            | Self::Cancelled
            | Self::UnexpectedHttpStatus { .. }
            | Self::Decode(_) => ErrorCategory::Network,
            Self::NoDataAvailable { .. } | Self::DateMismatch { .. } => ErrorCategory::Data,
            Self::InvalidUrl(_) => ErrorCategory::Config,
            Self::Parse { source, .. } => source.category(),
        }
    }
}

impl CrawlErrorTrait for MergeError {
    fn is_recoverable(&self) -> bool {
        true
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Data
    }
}

impl CrawlErrorTrait for ContentError {
    fn is_recoverable(&self) -> bool {
        !matches!(self, Self::LegacyWithTeacher)
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::LegacyWithTeacher => ErrorCategory::Config,
            _ => ErrorCategory::Data,
        }
    }
}

/// Unified error type for the vertretung crate
#[derive(Error, Debug)]
pub enum Error {
    /// Plan file reading and postprocessing errors
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Fetch-specific errors
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Merge engine errors
    #[error("Merge error: {0}")]
    Merge(#[from] MergeError),

    /// Servable-content compiler errors
    #[error("Content error: {0}")]
    Content(#[from] ContentError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// Generic error with context
    #[error("{context}")]
    Other {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl CrawlErrorTrait for Error {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Parse(e) => e.is_recoverable(),
            Self::Fetch(e) => e.is_recoverable(),
            Self::Merge(e) => e.is_recoverable(),
            Self::Content(e) => e.is_recoverable(),
            Self::Io(_) => true,
            Self::Json(_) => false,
            Self::Config(_) => false,
            Self::Other { .. } => false,
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Parse(e) => e.category(),
            Self::Fetch(e) => e.category(),
            Self::Merge(e) => e.category(),
            Self::Content(e) => e.category(),
            Self::Io(_) => ErrorCategory::Storage,
            Self::Json(_) => ErrorCategory::Parsing,
            Self::Config(_) => ErrorCategory::Config,
            Self::Other { .. } => ErrorCategory::Other,
        }
    }
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a generic error with context and source
    pub fn with_source(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Other {
            context: context.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
