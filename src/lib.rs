//! vertretung - Indiware schedule crawler
//!
//! Polls the mobile XML export of school timetable software, validates and
//! merges the per-day substitution plans, and compiles them into content
//! buckets that a thin API layer can serve to clients.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration management and settings
//! - [`parser`] - XML reading, schema validation and postprocessing
//! - [`merge`] - Combining day schedules into one multi-day schedule
//! - [`content`] - Servable-content compiler (config screens, buckets, conditions)
//! - [`crawler`] - HTTP fetching and the per-institution polling workers
//! - [`export`] - Normalized batches for external persistence
//! - [`models`] - Core data structures and types
//! - [`utils`] - Common utilities and helpers
//!
//! # Example
//!
//! ```no_run
//! use vertretung::config::Config;
//! use vertretung::crawler::WorkerRegistry;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     config.validate()?;
//!     let registry = WorkerRegistry::start(&config)?;
//!     println!("{}", registry.status_report());
//!     registry.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod content;
pub mod crawler;
pub mod error;
pub mod export;
pub mod merge;
pub mod models;
pub mod parser;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::content::{build_servable_content, Access, ServableContent, TenantSource};
    pub use crate::crawler::{CycleStatus, InstitutionWorker, Snapshot, WorkerHandle, WorkerRegistry};
    pub use crate::error::{CrawlErrorTrait, Error, ErrorCategory, Result};
    pub use crate::merge::{merge_day_schedules, MergeOptions};
    pub use crate::models::{DaySchedule, MergedSchedule};
    pub use crate::parser::{parse_plan_file, ParseOptions};
}

// Direct re-exports for convenience
pub use models::{DaySchedule, MergedSchedule};
