//! Schedule crawling
//!
//! This module fetches the dated plan files of every configured institution
//! and keeps the latest compiled snapshot per institution available.
//!
//! - [`fetcher`] issues the conditional per-date requests of one feed
//! - [`worker`] runs the polling loop of one institution and publishes
//!   snapshots

pub mod fetcher;
pub mod worker;

pub use fetcher::{DateOutcome, PlanFetcher, WindowFetch};
pub use worker::{CycleStatus, InstitutionWorker, Snapshot, WorkerHandle, WorkerRegistry};
