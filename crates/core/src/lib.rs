//! jobdock core data models.
//!
//! This crate defines the job record, its lifecycle state machine and the
//! typed job specification shared by the store, the runner and the engine.

#![warn(missing_docs)]

// Core identities
mod id;

// Job lifecycle
mod job;
mod spec;
mod summary;

// Re-exports
pub use id::*;

pub use job::{JobRecord, JobStatus, TransitionError};
pub use spec::{ArgValue, JobArgs, JobSpec};
pub use summary::ResultSummary;

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;

/// Current time, clamped so it never precedes `after`.
///
/// Lifecycle timestamps must stay ordered even if the wall clock steps back.
pub fn now_after(after: Time) -> Time {
    chrono::Utc::now().max(after)
}
