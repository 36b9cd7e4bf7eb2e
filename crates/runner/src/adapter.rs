//! Execution adapter abstraction.

use jobdock_core::JobSpec;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Errors raised while turning a spec into an invocation.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// The job spec has no target
    #[error("job target is empty")]
    EmptyTarget,

    /// Argument key is not a valid flag name
    #[error("invalid argument key '{0}': keys must match [A-Za-z0-9][A-Za-z0-9_-]*")]
    InvalidKey(String),

    /// Argument key collides with a flag the adapter sets itself
    #[error("argument key '{0}' is reserved")]
    ReservedKey(String),

    /// A list item cannot be encoded
    #[error("invalid value '{item}' in list argument '{key}': items must be non-empty and contain no ','")]
    InvalidListItem {
        /// Argument key
        key: String,
        /// Offending item
        item: String,
    },

    /// I/O error while resolving paths
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A concrete, runnable command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invocation {
    /// Program to execute
    pub program: String,

    /// Arguments passed to the program
    pub args: Vec<String>,

    /// Working directory of the process
    pub working_dir: PathBuf,

    /// Directory the process writes its outputs to
    pub output_dir: PathBuf,
}

impl Invocation {
    /// The command as a single printable line.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Translates a generic job spec into a runnable invocation.
///
/// Implementations must derive the output directory deterministically from
/// the spec and the job directory: the engine and the query surface rely on
/// `output_dir` returning the same path `prepare` used.
pub trait ExecutionAdapter: Send + Sync {
    /// Adapter name, for logs.
    fn name(&self) -> &str;

    /// Build the invocation for a job.
    fn prepare(&self, spec: &JobSpec, job_dir: &Path) -> Result<Invocation, AdapterError>;

    /// Output directory for a job.
    fn output_dir(&self, spec: &JobSpec, job_dir: &Path) -> PathBuf;
}
