//! Shared fixtures for engine tests.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use jobdock_core::{JobId, JobRecord, JobStatus, ResultSummary};
use jobdock_runner::{ScriptAdapter, ScriptAdapterConfig};
use jobdock_storage::{JobStore, JsonJobStore, Result, StorageError};
use tempfile::TempDir;
use tokio::sync::Notify;

use crate::config::EngineConfig;
use crate::engine::JobEngine;

/// Prelude that turns `--output DIR` into `$OUT`.
const PRELUDE: &str = r#"OUT=""
while [ $# -gt 0 ]; do
  case "$1" in
    --output) OUT="$2"; shift 2 ;;
    *) shift ;;
  esac
done
"#;

pub struct Fixture {
    pub dir: TempDir,
    pub store: Arc<dyn JobStore>,
    pub engine: JobEngine,
}

impl Fixture {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("scripts")).unwrap();
        let store: Arc<dyn JobStore> = Arc::new(JsonJobStore::new(dir.path().join("jobs")).await.unwrap());
        let engine = engine(store.clone());
        Self { dir, store, engine }
    }
}

/// Engine running scripts through `sh`, with short timings.
pub fn engine(store: Arc<dyn JobStore>) -> JobEngine {
    let adapter = ScriptAdapter::new(ScriptAdapterConfig::default().with_interpreter("sh"));
    JobEngine::new(store, Arc::new(adapter)).with_config(
        EngineConfig::default()
            .with_poll_interval(Duration::from_millis(20))
            .with_kill_grace(Duration::from_millis(500))
            .with_highlight_extensions(["pdb"]),
    )
}

/// Write a shell script into the fixture and return its path.
pub fn script(fx: &Fixture, name: &str, body: &str) -> String {
    let path = fx.dir.path().join("scripts").join(name);
    std::fs::write(&path, format!("{}{}\n", PRELUDE, body)).unwrap();
    path.to_string_lossy().into_owned()
}

/// Poll until a job reaches `status`.
pub async fn wait_for_status(engine: &JobEngine, id: JobId, status: JobStatus) {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        let current = engine.get_status(id).await.unwrap().status;
        if current == status {
            return;
        }
        assert!(
            Instant::now() < deadline && !current.is_terminal(),
            "job {} stuck at {} waiting for {}",
            id,
            current,
            status
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Store wrapper that fails selected writes.
pub struct FlakyStore {
    pub inner: Arc<dyn JobStore>,
    pub fail_saves: bool,
    pub fail_summaries: bool,
}

#[async_trait]
impl JobStore for FlakyStore {
    async fn save(&self, record: &JobRecord) -> Result<()> {
        if self.fail_saves {
            return Err(StorageError::Other("disk full".to_string()));
        }
        self.inner.save(record).await
    }

    async fn load(&self, id: JobId) -> Result<Option<JobRecord>> {
        self.inner.load(id).await
    }

    async fn list(&self) -> Result<Vec<JobRecord>> {
        self.inner.list().await
    }

    async fn save_summary(&self, summary: &ResultSummary) -> Result<()> {
        if self.fail_summaries {
            return Err(StorageError::Other("disk full".to_string()));
        }
        self.inner.save_summary(summary).await
    }

    async fn load_summary(&self, id: JobId) -> Result<Option<ResultSummary>> {
        self.inner.load_summary(id).await
    }

    fn job_dir(&self, id: JobId) -> PathBuf {
        self.inner.job_dir(id)
    }

    fn log_path(&self, id: JobId) -> PathBuf {
        self.inner.log_path(id)
    }
}

/// Store wrapper that parks `save_summary` until released, holding a job
/// between process exit and its terminal record.
pub struct GatedStore {
    pub inner: Arc<dyn JobStore>,
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
}

#[async_trait]
impl JobStore for GatedStore {
    async fn save(&self, record: &JobRecord) -> Result<()> {
        self.inner.save(record).await
    }

    async fn load(&self, id: JobId) -> Result<Option<JobRecord>> {
        self.inner.load(id).await
    }

    async fn list(&self) -> Result<Vec<JobRecord>> {
        self.inner.list().await
    }

    async fn save_summary(&self, summary: &ResultSummary) -> Result<()> {
        self.entered.notify_one();
        self.release.notified().await;
        self.inner.save_summary(summary).await
    }

    async fn load_summary(&self, id: JobId) -> Result<Option<ResultSummary>> {
        self.inner.load_summary(id).await
    }

    fn job_dir(&self, id: JobId) -> PathBuf {
        self.inner.job_dir(id)
    }

    fn log_path(&self, id: JobId) -> PathBuf {
        self.inner.log_path(id)
    }
}
