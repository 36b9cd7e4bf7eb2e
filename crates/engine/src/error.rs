//! Engine errors.

use jobdock_core::{JobId, JobStatus, TransitionError};
use jobdock_runner::AdapterError;
use jobdock_storage::StorageError;
use serde::{Deserialize, Serialize};

/// Coarse error category callers can branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Unknown job or missing artifact
    NotFound,
    /// Operation not valid for the job's current status
    InvalidState,
    /// The external process could not be prepared, spawned or waited on
    ExecutionFailure,
    /// The metadata store failed
    PersistenceFailure,
}

/// Errors returned by engine operations.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// Unknown job id
    #[error("Job {0} not found")]
    NotFound(JobId),

    /// The job has not written a log yet
    #[error("Log not found for job {0}")]
    LogNotFound(JobId),

    /// Results requested before completion
    #[error("Job not completed. Current status: {status}")]
    NotCompleted {
        /// Job id
        job_id: JobId,
        /// Current status
        status: JobStatus,
    },

    /// Cancel requested for a job that already finished
    #[error("Job {job_id} is not running (status: {status})")]
    NotRunning {
        /// Job id
        job_id: JobId,
        /// Current status
        status: JobStatus,
    },

    /// Cancel requested for a job with no live process here
    #[error("Job {0} not found in running jobs")]
    NotInRunningJobs(JobId),

    /// Illegal status change
    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),

    /// The adapter rejected the job spec
    #[error("Invalid job spec: {0}")]
    Adapter(#[from] AdapterError),

    /// The process could not be started
    #[error("Failed to start process: {0}")]
    Spawn(#[source] std::io::Error),

    /// I/O error while running the job
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Metadata store error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl JobError {
    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) | Self::LogNotFound(_) => ErrorKind::NotFound,
            Self::NotCompleted { .. }
            | Self::NotRunning { .. }
            | Self::NotInRunningJobs(_)
            | Self::InvalidTransition(_) => ErrorKind::InvalidState,
            Self::Adapter(_) | Self::Spawn(_) | Self::Io(_) => ErrorKind::ExecutionFailure,
            Self::Storage(_) => ErrorKind::PersistenceFailure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_status() {
        let id = JobId::new();
        let err = JobError::NotRunning { job_id: id, status: JobStatus::Completed };
        assert_eq!(err.to_string(), format!("Job {} is not running (status: completed)", id));

        let err = JobError::NotCompleted { job_id: id, status: JobStatus::Running };
        assert_eq!(err.to_string(), "Job not completed. Current status: running");
    }

    #[test]
    fn test_kinds() {
        let id = JobId::new();
        assert_eq!(JobError::NotFound(id).kind(), ErrorKind::NotFound);
        assert_eq!(JobError::LogNotFound(id).kind(), ErrorKind::NotFound);
        assert_eq!(JobError::NotInRunningJobs(id).kind(), ErrorKind::InvalidState);
        assert_eq!(JobError::Adapter(AdapterError::EmptyTarget).kind(), ErrorKind::ExecutionFailure);
        assert_eq!(
            JobError::Spawn(std::io::Error::from(std::io::ErrorKind::NotFound)).kind(),
            ErrorKind::ExecutionFailure
        );
        assert_eq!(
            JobError::Storage(StorageError::Other("disk".to_string())).kind(),
            ErrorKind::PersistenceFailure
        );
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&ErrorKind::InvalidState).unwrap(),
            "\"invalid_state\""
        );
    }
}
