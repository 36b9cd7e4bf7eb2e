//! Job lifecycle engine - submission, execution, cancellation and queries.

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod engine;
pub mod summary;
pub mod query;

pub use config::{ConfigError, EngineConfig};
pub use error::{ErrorKind, JobError};
pub use engine::{CancelAck, JobEngine};
pub use summary::ResultSummarizer;
pub use query::{JobList, JobListEntry, JobResultView, JobStatusView, LogTail};

#[cfg(all(test, unix))]
mod testing;
