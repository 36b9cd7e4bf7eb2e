//! Read-only queries over persisted jobs.

use std::path::PathBuf;

use jobdock_core::{JobId, JobStatus, ResultSummary, Time};
use jobdock_storage::StorageError;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::engine::JobEngine;
use crate::error::JobError;

/// Projection of a job record returned by [`JobEngine::get_status`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct JobStatusView {
    pub job_id: JobId,
    pub job_name: String,
    pub status: JobStatus,
    pub submitted_at: Time,
    pub started_at: Option<Time>,
    pub completed_at: Option<Time>,
    /// Only present for failed jobs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Hint for running and completed jobs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Outcome of a completed job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobResultView {
    /// The persisted result summary
    Summary(ResultSummary),
    /// No summary was written; points at where results should be
    #[allow(missing_docs)]
    Pointer {
        message: String,
        output_directory: PathBuf,
        note: String,
    },
}

/// Tail of a job's log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogTail {
    /// Job the log belongs to
    pub job_id: JobId,
    /// Requested lines, oldest first
    pub lines: Vec<String>,
    /// Line count of the whole log
    pub total_lines: usize,
}

/// One row of [`JobList`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct JobListEntry {
    pub job_id: JobId,
    pub job_name: String,
    pub status: JobStatus,
    pub submitted_at: Time,
    /// File name of the job's target
    pub target: String,
}

/// Jobs known to the store, newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobList {
    /// Matching jobs
    pub jobs: Vec<JobListEntry>,
    /// Number of matching jobs
    pub total: usize,
}

impl JobEngine {
    /// Current status of a job.
    pub async fn get_status(&self, job_id: JobId) -> Result<JobStatusView, JobError> {
        let record = self
            .store()
            .load(job_id)
            .await?
            .ok_or(JobError::NotFound(job_id))?;

        let message = match record.status {
            JobStatus::Running => Some("Job is currently running. Use get_job_log() to see progress."),
            JobStatus::Completed => Some("Job completed successfully. Use get_job_result() to get results."),
            _ => None,
        };
        let error = match record.status {
            JobStatus::Failed => record.error,
            _ => None,
        };

        Ok(JobStatusView {
            job_id: record.job_id,
            job_name: record.job_name,
            status: record.status,
            submitted_at: record.submitted_at,
            started_at: record.started_at,
            completed_at: record.completed_at,
            error,
            message: message.map(str::to_string),
        })
    }

    /// Results of a completed job.
    ///
    /// Falls back to a pointer at the output directory when no summary was
    /// written or it cannot be read.
    pub async fn get_result(&self, job_id: JobId) -> Result<JobResultView, JobError> {
        let record = self
            .store()
            .load(job_id)
            .await?
            .ok_or(JobError::NotFound(job_id))?;

        if record.status != JobStatus::Completed {
            return Err(JobError::NotCompleted {
                job_id,
                status: record.status,
            });
        }

        match self.store().load_summary(job_id).await {
            Ok(Some(summary)) => return Ok(JobResultView::Summary(summary)),
            Ok(None) => {}
            Err(e) => warn!("Unreadable result summary for job {}: {}", job_id, e),
        }

        let output_directory = record
            .output_dir
            .unwrap_or_else(|| self.adapter().output_dir(&record.spec, &self.store().job_dir(job_id)));
        Ok(JobResultView::Pointer {
            message: "Job completed successfully".to_string(),
            output_directory,
            note: "Check the output directory for results".to_string(),
        })
    }

    /// Last `tail` lines of a job's log, or all of them when `tail` is
    /// `None` or zero.
    pub async fn get_log(&self, job_id: JobId, tail: Option<usize>) -> Result<LogTail, JobError> {
        let path = self.store().log_path(job_id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(if self.store().load(job_id).await?.is_some() {
                    JobError::LogNotFound(job_id)
                } else {
                    JobError::NotFound(job_id)
                });
            }
            Err(e) => return Err(StorageError::Io(e).into()),
        };

        let text = String::from_utf8_lossy(&bytes);
        let all: Vec<&str> = text.lines().collect();
        let total_lines = all.len();
        let skip = match tail {
            Some(n) if n > 0 => total_lines.saturating_sub(n),
            _ => 0,
        };

        Ok(LogTail {
            job_id,
            lines: all[skip..].iter().map(|line| line.to_string()).collect(),
            total_lines,
        })
    }

    /// All known jobs, optionally filtered by status, newest first.
    pub async fn list_jobs(&self, status: Option<JobStatus>) -> Result<JobList, JobError> {
        let mut jobs: Vec<JobListEntry> = self
            .store()
            .list()
            .await?
            .into_iter()
            .filter(|record| status.map_or(true, |s| record.status == s))
            .map(|record| JobListEntry {
                job_id: record.job_id,
                target: record.spec.target_name().to_string(),
                job_name: record.job_name,
                status: record.status,
                submitted_at: record.submitted_at,
            })
            .collect();

        jobs.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at).then(b.job_id.cmp(&a.job_id)));
        let total = jobs.len();
        Ok(JobList { jobs, total })
    }
}
