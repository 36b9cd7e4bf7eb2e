//! Process execution for jobdock.
//!
//! Turns a job spec into a runnable invocation, spawns it with its output
//! redirected to the job log, and tracks live processes so they can be
//! cancelled.

#![warn(missing_docs)]

pub mod adapter;
pub mod script;
pub mod process;
pub mod registry;

pub use adapter::{AdapterError, ExecutionAdapter, Invocation};
pub use script::{ScriptAdapter, ScriptAdapterConfig};
pub use process::{process_alive, spawn_logged, terminate};
pub use registry::{ProcessHandle, ProcessRegistry};
