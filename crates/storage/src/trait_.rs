//! Storage trait abstraction.

use async_trait::async_trait;
use jobdock_core::{JobId, JobRecord, ResultSummary};
use std::path::PathBuf;

/// Error type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Durable per-job storage.
///
/// Every job owns an isolated namespace keyed by its id. A missing record is
/// reported as `Ok(None)`, never as an error, so callers can tell an unknown
/// job apart from a storage fault.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Save a job record (create or replace). Readers never observe a
    /// partially written record.
    async fn save(&self, record: &JobRecord) -> Result<()>;

    /// Load a job record by ID.
    async fn load(&self, id: JobId) -> Result<Option<JobRecord>>;

    /// List every stored job record.
    async fn list(&self) -> Result<Vec<JobRecord>>;

    /// Save the result summary of a job.
    async fn save_summary(&self, summary: &ResultSummary) -> Result<()>;

    /// Load the result summary of a job.
    async fn load_summary(&self, id: JobId) -> Result<Option<ResultSummary>>;

    /// Namespace directory of a job.
    fn job_dir(&self, id: JobId) -> PathBuf;

    /// Combined stdout/stderr log of a job.
    fn log_path(&self, id: JobId) -> PathBuf;
}
