//! The job engine - runs each job's lifecycle on its own task.
//!
//! ```text
//! submit ─► Pending ─► Running ─► Completed | Failed | Cancelled
//!              └────────────────► Failed   (adapter rejected the job)
//! ```
//!
//! `submit` persists the pending record and returns; a detached task then
//! prepares, spawns and waits on the process. The persisted record is the
//! only channel through which the outcome is observable.

use std::sync::Arc;
use std::time::{Duration, Instant};

use jobdock_core::{JobId, JobRecord, JobSpec, JobStatus, TransitionError};
use jobdock_runner::{
    process_alive, spawn_logged, terminate, ExecutionAdapter, ProcessHandle, ProcessRegistry,
};
use jobdock_storage::JobStore;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::error::JobError;
use crate::query::JobStatusView;
use crate::summary::ResultSummarizer;

const ORPHANED_ERROR: &str = "orphaned: orchestrator stopped before the job finished";
const ABANDONED_ERROR: &str = "abandoned: orchestrator gave up waiting for the job to start";

/// Acknowledgement of a successful cancellation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelAck {
    /// Cancelled job
    pub job_id: JobId,
    /// Status after cancellation
    pub status: JobStatus,
    /// Human readable confirmation
    pub message: String,
}

/// How a job's process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    Code(i32),
    Signal,
    Cancelled,
}

/// The job lifecycle engine.
///
/// Clones share the same store, registry and adapter, so an engine can be
/// handed to every task it spawns.
#[derive(Clone)]
pub struct JobEngine {
    store: Arc<dyn JobStore>,
    registry: ProcessRegistry,
    adapter: Arc<dyn ExecutionAdapter>,
    summarizer: ResultSummarizer,
    config: EngineConfig,
}

impl JobEngine {
    /// Create an engine with a fresh process registry and default config.
    pub fn new(store: Arc<dyn JobStore>, adapter: Arc<dyn ExecutionAdapter>) -> Self {
        let config = EngineConfig::default();
        Self {
            store,
            registry: ProcessRegistry::new(),
            adapter,
            summarizer: ResultSummarizer::new(&config.highlight_extensions),
            config,
        }
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.summarizer = ResultSummarizer::new(&config.highlight_extensions);
        self.config = config;
        self
    }

    /// Use an existing process registry.
    pub fn with_registry(mut self, registry: ProcessRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Finish startup, reconciling orphaned jobs if configured.
    pub async fn start(self) -> Result<Self, JobError> {
        if self.config.reconcile_on_startup {
            let orphans = self.reconcile_orphans().await?;
            if !orphans.is_empty() {
                info!("Reconciled {} orphaned jobs on startup", orphans.len());
            }
        }
        Ok(self)
    }

    /// The metadata store.
    pub fn store(&self) -> &Arc<dyn JobStore> {
        &self.store
    }

    /// The process registry.
    pub fn registry(&self) -> &ProcessRegistry {
        &self.registry
    }

    /// The execution adapter.
    pub fn adapter(&self) -> &Arc<dyn ExecutionAdapter> {
        &self.adapter
    }

    /// The configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Submit a job for background execution.
    ///
    /// The pending record is durable before this returns; execution starts
    /// on a detached task. Must be called within a Tokio runtime.
    pub async fn submit(&self, spec: JobSpec, job_name: Option<String>) -> Result<JobId, JobError> {
        let record = self.enqueue(spec, job_name).await?;
        let job_id = record.job_id;

        let engine = self.clone();
        tokio::spawn(async move { engine.execute(record).await });

        Ok(job_id)
    }

    /// Persist a pending job without starting it. Pair with [`Self::run`]
    /// to execute it, possibly from another engine.
    pub async fn enqueue(&self, spec: JobSpec, job_name: Option<String>) -> Result<JobRecord, JobError> {
        let mut record = JobRecord::new(spec, job_name);
        record.owner_pid = Some(std::process::id());
        self.store.save(&record).await?;
        info!("Submitted job {} ({}) target={}", record.job_id, record.job_name, record.spec.target);
        Ok(record)
    }

    /// Execute a pending job on the current task and wait for it to finish.
    pub async fn run(&self, job_id: JobId) -> Result<JobStatusView, JobError> {
        let record = self
            .store
            .load(job_id)
            .await?
            .ok_or(JobError::NotFound(job_id))?;
        if record.status != JobStatus::Pending {
            return Err(TransitionError {
                from: record.status,
                to: JobStatus::Running,
            }
            .into());
        }

        self.clone().execute(record).await;
        self.get_status(job_id).await
    }

    /// Cancel a running job.
    ///
    /// Termination is requested, not awaited: the record turns `cancelled`
    /// immediately while the process is stopped in the background. If the
    /// process already exited and its execution path is finalizing the job,
    /// this waits for that outcome and reports it.
    pub async fn cancel(&self, job_id: JobId) -> Result<CancelAck, JobError> {
        let Some(handle) = self.registry.lookup(job_id).await else {
            return match self.store.load(job_id).await? {
                Some(record) if record.is_terminal() => Err(JobError::NotRunning {
                    job_id,
                    status: record.status,
                }),
                Some(_) => Err(JobError::NotInRunningJobs(job_id)),
                None => Err(JobError::NotFound(job_id)),
            };
        };

        if !handle.claim_finalization() {
            while self.registry.contains(job_id).await {
                tokio::time::sleep(self.config.poll_interval()).await;
            }
            let record = self
                .store
                .load(job_id)
                .await?
                .ok_or(JobError::NotFound(job_id))?;
            return match record.status {
                JobStatus::Cancelled => Ok(Self::cancel_ack(job_id)),
                status => {
                    debug!("Cancel of job {} lost the race to {}", job_id, status);
                    Err(JobError::NotRunning { job_id, status })
                }
            };
        }

        handle.terminate();
        let mut record = self
            .store
            .load(job_id)
            .await?
            .ok_or(JobError::NotFound(job_id))?;
        if record.is_terminal() {
            return Err(JobError::NotRunning {
                job_id,
                status: record.status,
            });
        }
        record.cancel()?;
        self.store.save(&record).await?;

        info!("Job {} cancelled", job_id);
        Ok(Self::cancel_ack(job_id))
    }

    fn cancel_ack(job_id: JobId) -> CancelAck {
        CancelAck {
            job_id,
            status: JobStatus::Cancelled,
            message: format!("Job {} cancelled", job_id),
        }
    }

    /// Cancel a job this engine started and wait until it is terminal and
    /// its process is gone.
    ///
    /// Unlike [`Self::cancel`], a job that has not reached the registry yet
    /// is waited for rather than rejected. A job still not terminal after
    /// `timeout` is marked failed.
    pub async fn cancel_and_settle(
        &self,
        job_id: JobId,
        timeout: Duration,
    ) -> Result<JobStatusView, JobError> {
        let deadline = Instant::now() + timeout;
        let mut requested = false;
        loop {
            let status = self.get_status(job_id).await?;
            let live = self.registry.contains(job_id).await;
            if status.status.is_terminal() && !live {
                return Ok(status);
            }

            if live && !requested {
                match self.cancel(job_id).await {
                    Ok(_) | Err(JobError::NotRunning { .. }) => requested = true,
                    Err(JobError::NotInRunningJobs(_)) => {}
                    Err(e) => return Err(e),
                }
                continue;
            }

            if Instant::now() >= deadline {
                let mut record = self
                    .store
                    .load(job_id)
                    .await?
                    .ok_or(JobError::NotFound(job_id))?;
                if !record.is_terminal() {
                    warn!("Job {} still {} after cancellation; marking failed", job_id, record.status);
                    record.fail(ABANDONED_ERROR)?;
                    self.store.save(&record).await?;
                }
                return self.get_status(job_id).await;
            }
            tokio::time::sleep(self.config.poll_interval()).await;
        }
    }

    /// Poll a job until it is terminal or `timeout` elapses.
    ///
    /// Returns `None` on timeout.
    pub async fn wait_for_completion(
        &self,
        job_id: JobId,
        timeout: Duration,
    ) -> Result<Option<JobStatusView>, JobError> {
        let start = Instant::now();
        loop {
            let status = self.get_status(job_id).await?;
            if status.status.is_terminal() {
                return Ok(Some(status));
            }
            if start.elapsed() >= timeout {
                return Ok(None);
            }
            tokio::time::sleep(self.config.poll_interval()).await;
        }
    }

    /// Mark every pending or running job whose owning orchestrator is gone
    /// as failed. Returns the ids that were changed.
    ///
    /// A job is spared while it is in this engine's registry or while the
    /// process recorded as its owner is still alive.
    pub async fn reconcile_orphans(&self) -> Result<Vec<JobId>, JobError> {
        let mut reconciled = Vec::new();
        for mut record in self.store.list().await? {
            if record.is_terminal() || self.registry.contains(record.job_id).await {
                continue;
            }
            if let Some(owner) = record.owner_pid.filter(|&pid| process_alive(pid)) {
                debug!("Job {} is {} under live owner pid {}", record.job_id, record.status, owner);
                continue;
            }
            warn!("Job {} was left {}; marking failed", record.job_id, record.status);
            record.fail(ORPHANED_ERROR)?;
            self.store.save(&record).await?;
            reconciled.push(record.job_id);
        }
        Ok(reconciled)
    }

    /// Execution path of one job. Never returns an error: every fault ends
    /// in a terminal record.
    async fn execute(self, mut record: JobRecord) {
        let job_id = record.job_id;

        let outcome = self.run_process(&mut record).await;

        if let Some(handle) = self.registry.lookup(job_id).await {
            if !handle.claim_finalization() {
                debug!("Job {} was finalized by cancel", job_id);
                self.registry.unregister(job_id).await;
                return;
            }
        }

        let finished = match outcome {
            Ok(Exit::Cancelled) => record.cancel(),
            Ok(Exit::Code(0)) => {
                self.write_summary(&record).await;
                record.complete(0)
            }
            Ok(Exit::Code(code)) => {
                record.exit_code = Some(code);
                record.fail(format!("Process exited with code {}", code))
            }
            Ok(Exit::Signal) => record.fail("Process terminated by signal"),
            Err(e) => {
                error!("Job {} failed: {}", job_id, e);
                record.fail(e.to_string())
            }
        };

        match finished {
            Ok(()) => self.persist_final(&record).await,
            Err(e) => error!("Job {} could not be finalized: {}", job_id, e),
        }

        self.registry.unregister(job_id).await;
    }

    /// Prepare, start and wait on the job's process.
    async fn run_process(&self, record: &mut JobRecord) -> Result<Exit, JobError> {
        let job_id = record.job_id;
        let job_dir = self.store.job_dir(job_id);

        let invocation = self.adapter.prepare(&record.spec, &job_dir)?;

        // Someone else may have settled the job while it was queued
        if let Some(stored) = self.store.load(job_id).await? {
            if stored.is_terminal() {
                return Err(TransitionError {
                    from: stored.status,
                    to: JobStatus::Running,
                }
                .into());
            }
        }

        record.start()?;
        record.output_dir = Some(invocation.output_dir.clone());
        record.owner_pid = Some(std::process::id());
        self.store.save(record).await?;
        info!("Job {} running via {}: {}", job_id, self.adapter.name(), invocation.command_line());

        tokio::fs::create_dir_all(&invocation.output_dir).await?;
        let mut child = spawn_logged(&invocation, &self.store.log_path(job_id)).map_err(JobError::Spawn)?;

        let handle = ProcessHandle::new(child.id());
        self.registry.register(job_id, handle.clone()).await;

        // None means termination was requested before the process exited
        let waited = tokio::select! {
            status = child.wait() => Some(status?),
            _ = handle.termination_requested() => None,
        };

        let exit = match waited {
            Some(_) if handle.is_terminating() => Exit::Cancelled,
            Some(status) => status.code().map(Exit::Code).unwrap_or(Exit::Signal),
            None => {
                info!("Terminating job {} (pid {:?})", job_id, handle.pid());
                if let Err(e) = terminate(&mut child, self.config.kill_grace_period()).await {
                    warn!("Failed to stop job {}: {}", job_id, e);
                }
                Exit::Cancelled
            }
        };

        debug!("Job {} exited: {:?}", job_id, exit);
        Ok(exit)
    }

    async fn write_summary(&self, record: &JobRecord) {
        let output_dir = record
            .output_dir
            .clone()
            .unwrap_or_else(|| self.adapter.output_dir(&record.spec, &self.store.job_dir(record.job_id)));

        match self.summarizer.summarize(record.job_id, &output_dir).await {
            Ok(summary) => {
                if let Err(e) = self.store.save_summary(&summary).await {
                    warn!("Failed to save result summary for job {}: {}", record.job_id, e);
                }
            }
            Err(e) => warn!("Failed to create result summary for job {}: {}", record.job_id, e),
        }
    }

    /// Persist a terminal record unless the stored one is already terminal.
    async fn persist_final(&self, record: &JobRecord) {
        match self.store.load(record.job_id).await {
            Ok(Some(stored)) if stored.is_terminal() => {
                debug!(
                    "Job {} already {}, not overwriting with {}",
                    record.job_id, stored.status, record.status
                );
                return;
            }
            Ok(_) => {}
            Err(e) => warn!("Could not re-read job {} before finalizing: {}", record.job_id, e),
        }

        match self.store.save(record).await {
            Ok(()) => info!("Job {} finished: {}", record.job_id, record.status),
            Err(e) => error!("Failed to persist final state of job {}: {}", record.job_id, e),
        }
    }
}
