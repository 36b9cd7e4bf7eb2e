//! Job model - the persisted record of one external computation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::id::JobId;
use crate::spec::JobSpec;
use crate::{now_after, Time};

/// Job status.
///
/// ```text
/// Pending -> Running -> Completed | Failed | Cancelled
/// Pending -> Failed            (execution could not be prepared)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Submitted, execution not started yet
    Pending,
    /// Process is running
    Running,
    /// Process exited with code 0
    Completed,
    /// Process exited nonzero or could not be run
    Failed,
    /// Cancelled while running
    Cancelled,
}

impl JobStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [JobStatus; 5] = [
        JobStatus::Pending,
        JobStatus::Running,
        JobStatus::Completed,
        JobStatus::Failed,
        JobStatus::Cancelled,
    ];

    /// Whether no further transition is permitted.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether `next` is a legal transition from this status.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Pending, Self::Failed)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Failed)
                | (Self::Running, Self::Cancelled)
        )
    }

    /// Lowercase name as persisted.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown job status: {}", s))
    }
}

/// A rejected status change.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid transition from {from} to {to}")]
pub struct TransitionError {
    /// Status the record was in
    pub from: JobStatus,
    /// Status that was requested
    pub to: JobStatus,
}

/// The persisted record of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Unique identifier
    pub job_id: JobId,

    /// Display name (not unique)
    pub job_name: String,

    /// What to run
    pub spec: JobSpec,

    /// Current status
    pub status: JobStatus,

    /// When submitted
    pub submitted_at: Time,

    /// When the process was started
    pub started_at: Option<Time>,

    /// When a terminal status was reached
    pub completed_at: Option<Time>,

    /// Diagnostic text (failed jobs only)
    #[serde(default)]
    pub error: Option<String>,

    /// Output directory derived by the execution adapter
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// Exit code, when the process exited on its own
    #[serde(default)]
    pub exit_code: Option<i32>,

    /// Pid of the orchestrator process that owns the job while it is
    /// pending or running
    #[serde(default)]
    pub owner_pid: Option<u32>,
}

impl JobRecord {
    /// Create a pending record. Unnamed jobs are called `job_<id>`.
    pub fn new(spec: JobSpec, job_name: Option<String>) -> Self {
        let job_id = JobId::new();
        let job_name = job_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| format!("job_{}", job_id));

        Self {
            job_id,
            job_name,
            spec,
            status: JobStatus::Pending,
            submitted_at: chrono::Utc::now(),
            started_at: None,
            completed_at: None,
            error: None,
            output_dir: None,
            exit_code: None,
            owner_pid: None,
        }
    }

    /// Whether the record is in a terminal status.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Pending -> Running.
    pub fn start(&mut self) -> Result<(), TransitionError> {
        self.transition(JobStatus::Running)?;
        self.started_at = Some(now_after(self.submitted_at));
        Ok(())
    }

    /// Running -> Completed.
    pub fn complete(&mut self, exit_code: i32) -> Result<(), TransitionError> {
        self.transition(JobStatus::Completed)?;
        self.exit_code = Some(exit_code);
        self.finish();
        Ok(())
    }

    /// Pending | Running -> Failed.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), TransitionError> {
        self.transition(JobStatus::Failed)?;
        self.error = Some(error.into());
        self.finish();
        Ok(())
    }

    /// Running -> Cancelled.
    pub fn cancel(&mut self) -> Result<(), TransitionError> {
        self.transition(JobStatus::Cancelled)?;
        self.finish();
        Ok(())
    }

    fn transition(&mut self, next: JobStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    fn finish(&mut self) {
        let floor = self.started_at.unwrap_or(self.submitted_at);
        self.completed_at = Some(now_after(floor));
    }
}
