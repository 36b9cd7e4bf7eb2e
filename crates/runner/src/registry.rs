//! Registry of live job processes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use jobdock_core::{JobId, Time};
use tokio::sync::{Notify, RwLock};

/// Handle to a running job process.
///
/// Clones share state: a termination requested through any clone is seen by
/// the execution path holding the child.
#[derive(Debug, Clone)]
pub struct ProcessHandle {
    inner: Arc<HandleInner>,
}

#[derive(Debug)]
struct HandleInner {
    pid: Option<u32>,
    started_at: Time,
    requested: AtomicBool,
    finalizing: AtomicBool,
    notify: Notify,
}

impl ProcessHandle {
    /// Create a handle for a process.
    pub fn new(pid: Option<u32>) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                pid,
                started_at: chrono::Utc::now(),
                requested: AtomicBool::new(false),
                finalizing: AtomicBool::new(false),
                notify: Notify::new(),
            }),
        }
    }

    /// OS process id, if known.
    pub fn pid(&self) -> Option<u32> {
        self.inner.pid
    }

    /// When the process was registered.
    pub fn started_at(&self) -> Time {
        self.inner.started_at
    }

    /// Request termination. Repeated requests are no-ops.
    pub fn terminate(&self) {
        if !self.inner.requested.swap(true, Ordering::SeqCst) {
            // notify_one stores a permit when nobody is waiting yet
            self.inner.notify.notify_one();
        }
    }

    /// Whether termination has been requested.
    pub fn is_terminating(&self) -> bool {
        self.inner.requested.load(Ordering::SeqCst)
    }

    /// Claim the right to write the job's terminal record.
    ///
    /// Exactly one caller across all clones gets `true`; the execution path
    /// and a concurrent cancel use this to decide who finalizes the job.
    pub fn claim_finalization(&self) -> bool {
        !self.inner.finalizing.swap(true, Ordering::SeqCst)
    }

    /// Resolves once termination has been requested.
    pub async fn termination_requested(&self) {
        if self.is_terminating() {
            return;
        }
        self.inner.notify.notified().await;
    }
}

/// Concurrency-safe map from job id to its live process.
///
/// Each engine owns its registry; clones share the same map. An absent entry
/// means the job is not running in this process, either because it has not
/// started yet or because it has already finished.
#[derive(Debug, Clone, Default)]
pub struct ProcessRegistry {
    handles: Arc<RwLock<HashMap<JobId, ProcessHandle>>>,
}

impl ProcessRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handle, returning any handle it replaced.
    pub async fn register(&self, id: JobId, handle: ProcessHandle) -> Option<ProcessHandle> {
        self.handles.write().await.insert(id, handle)
    }

    /// Look up the handle of a running job.
    pub async fn lookup(&self, id: JobId) -> Option<ProcessHandle> {
        self.handles.read().await.get(&id).cloned()
    }

    /// Remove the handle of a job.
    pub async fn unregister(&self, id: JobId) -> Option<ProcessHandle> {
        self.handles.write().await.remove(&id)
    }

    /// Whether a job has a live handle.
    pub async fn contains(&self, id: JobId) -> bool {
        self.handles.read().await.contains_key(&id)
    }

    /// Number of live handles.
    pub async fn len(&self) -> usize {
        self.handles.read().await.len()
    }

    /// Whether no job is running.
    pub async fn is_empty(&self) -> bool {
        self.handles.read().await.is_empty()
    }

    /// Ids of all running jobs.
    pub async fn running_ids(&self) -> Vec<JobId> {
        self.handles.read().await.keys().copied().collect()
    }
}
