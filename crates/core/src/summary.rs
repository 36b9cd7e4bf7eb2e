//! Result summary - manifest of a completed job's output files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::id::JobId;
use crate::Time;

/// Manifest of the files a job produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSummary {
    /// Job the summary belongs to
    pub job_id: JobId,

    /// When the summary was built
    pub completed_at: Time,

    /// Directory that was scanned
    pub output_directory: PathBuf,

    /// Paths relative to `output_directory`, `/`-separated and sorted
    pub files_created: Vec<String>,

    /// File names matching the configured artifact extensions
    pub highlighted: Vec<String>,
}

impl ResultSummary {
    /// Create an empty summary for a directory.
    pub fn empty(job_id: JobId, output_directory: impl Into<PathBuf>) -> Self {
        Self {
            job_id,
            completed_at: chrono::Utc::now(),
            output_directory: output_directory.into(),
            files_created: Vec::new(),
            highlighted: Vec::new(),
        }
    }
}
