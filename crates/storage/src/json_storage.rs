//! JSON file storage implementation.
//!
//! Stores one directory per job under the storage root:
//!
//! ```text
//! <root>/<job_id>/metadata.json         job record
//! <root>/<job_id>/job.log               combined stdout/stderr
//! <root>/<job_id>/results_summary.json  optional result manifest
//! ```
//!
//! Records are replaced atomically: the new contents are written to a
//! uniquely named temp file in the same directory and renamed over the old
//! file, so a concurrent reader sees either the old or the new record.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use jobdock_core::{JobId, JobRecord, ResultSummary};
use serde::{de::DeserializeOwned, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::{JobStore, Result, StorageError};

const METADATA_FILE: &str = "metadata.json";
const LOG_FILE: &str = "job.log";
const SUMMARY_FILE: &str = "results_summary.json";

/// File-based JSON job store.
#[derive(Debug, Clone)]
pub struct JsonJobStore {
    root: PathBuf,
}

impl JsonJobStore {
    /// Create the store, creating the root directory if needed.
    pub async fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    /// Storage root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn metadata_path(&self, id: JobId) -> PathBuf {
        self.job_dir(id).join(METADATA_FILE)
    }

    fn summary_path(&self, id: JobId) -> PathBuf {
        self.job_dir(id).join(SUMMARY_FILE)
    }
}

#[async_trait]
impl JobStore for JsonJobStore {
    async fn save(&self, record: &JobRecord) -> Result<()> {
        fs::create_dir_all(self.job_dir(record.job_id)).await?;
        write_json_atomic(&self.metadata_path(record.job_id), record).await?;
        debug!("Saved job {} ({})", record.job_id, record.status);
        Ok(())
    }

    async fn load(&self, id: JobId) -> Result<Option<JobRecord>> {
        read_json(&self.metadata_path(id)).await
    }

    async fn list(&self) -> Result<Vec<JobRecord>> {
        let mut records = Vec::new();
        let mut rd = fs::read_dir(&self.root).await?;
        while let Some(entry) = rd.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let Some(id) = entry.file_name().to_str().and_then(|name| name.parse::<JobId>().ok()) else {
                continue;
            };
            match self.load(id).await {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(e) => warn!("Skipping unreadable job {}: {}", id, e),
            }
        }
        Ok(records)
    }

    async fn save_summary(&self, summary: &ResultSummary) -> Result<()> {
        fs::create_dir_all(self.job_dir(summary.job_id)).await?;
        write_json_atomic(&self.summary_path(summary.job_id), summary).await
    }

    async fn load_summary(&self, id: JobId) -> Result<Option<ResultSummary>> {
        read_json(&self.summary_path(id)).await
    }

    fn job_dir(&self, id: JobId) -> PathBuf {
        self.root.join(id.to_string())
    }

    fn log_path(&self, id: JobId) -> PathBuf {
        self.job_dir(id).join(LOG_FILE)
    }
}

async fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    let parent = path
        .parent()
        .ok_or_else(|| StorageError::Other(format!("{} has no parent directory", path.display())))?;
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("record");
    let temp_path = parent.join(format!(".{}.tmp-{}", file_name, ulid::Ulid::new()));

    if let Err(e) = write_synced(&temp_path, json.as_bytes()).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(e.into());
    }
    if let Err(e) = fs::rename(&temp_path, path).await {
        let _ = fs::remove_file(&temp_path).await;
        return Err(e.into());
    }
    Ok(())
}

/// Write and flush to disk, so a rename never lands ahead of the data.
async fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read_to_string(path).await {
        Ok(json) => {
            let value = serde_json::from_str(&json)?;
            Ok(Some(value))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jobdock_core::{JobSpec, JobStatus};

    fn pending(target: &str) -> JobRecord {
        JobRecord::new(JobSpec::new(target), None)
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonJobStore::new(dir.path()).await.unwrap();

        let record = pending("scripts/run.sh");
        store.save(&record).await.unwrap();

        let loaded = store.load(record.job_id).await.unwrap().unwrap();
        assert_eq!(loaded, record);
        assert!(dir
            .path()
            .join(record.job_id.to_string())
            .join("metadata.json")
            .exists());
    }

    #[tokio::test]
    async fn test_load_unknown_job_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonJobStore::new(dir.path()).await.unwrap();

        assert!(store.load(JobId::new()).await.unwrap().is_none());
        assert!(store.load_summary(JobId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_overwrites_and_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonJobStore::new(dir.path()).await.unwrap();

        let mut record = pending("scripts/run.sh");
        store.save(&record).await.unwrap();
        record.start().unwrap();
        store.save(&record).await.unwrap();

        let loaded = store.load(record.job_id).await.unwrap().unwrap();
        assert_eq!(loaded.status, JobStatus::Running);
        assert!(loaded.started_at.is_some());

        let names: Vec<String> = std::fs::read_dir(store.job_dir(record.job_id))
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["metadata.json".to_string()]);
    }

    #[tokio::test]
    async fn test_corrupt_record_is_an_error_not_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonJobStore::new(dir.path()).await.unwrap();

        let id = JobId::new();
        std::fs::create_dir_all(store.job_dir(id)).unwrap();
        std::fs::write(store.job_dir(id).join("metadata.json"), "{ not json").unwrap();

        assert!(matches!(store.load(id).await, Err(StorageError::Json(_))));
    }

    #[tokio::test]
    async fn test_list_skips_foreign_and_corrupt_entries() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonJobStore::new(dir.path()).await.unwrap();

        let a = pending("a.sh");
        let b = pending("b.sh");
        store.save(&a).await.unwrap();
        store.save(&b).await.unwrap();

        std::fs::create_dir_all(dir.path().join("not-a-job")).unwrap();
        std::fs::write(dir.path().join("stray.txt"), "x").unwrap();
        let corrupt = JobId::new();
        std::fs::create_dir_all(store.job_dir(corrupt)).unwrap();
        std::fs::write(store.job_dir(corrupt).join("metadata.json"), "[]").unwrap();
        // A job directory whose record was never written
        std::fs::create_dir_all(store.job_dir(JobId::new())).unwrap();

        let mut ids: Vec<JobId> = store.list().await.unwrap().into_iter().map(|r| r.job_id).collect();
        ids.sort();
        let mut expected = vec![a.job_id, b.job_id];
        expected.sort();
        assert_eq!(ids, expected);
    }

    #[tokio::test]
    async fn test_summary_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonJobStore::new(dir.path()).await.unwrap();

        let record = pending("a.sh");
        let mut summary = ResultSummary::empty(record.job_id, store.job_dir(record.job_id).join("results"));
        summary.files_created.push("model.pdb".to_string());
        summary.highlighted.push("model.pdb".to_string());
        summary.completed_at = chrono::Utc::now();

        store.save_summary(&summary).await.unwrap();
        let loaded = store.load_summary(record.job_id).await.unwrap().unwrap();
        assert_eq!(loaded, summary);
    }

    #[tokio::test]
    async fn test_jobs_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonJobStore::new(dir.path()).await.unwrap();

        let a = pending("a.sh");
        let b = pending("b.sh");
        assert_ne!(store.job_dir(a.job_id), store.job_dir(b.job_id));
        assert_eq!(store.log_path(a.job_id), store.job_dir(a.job_id).join("job.log"));

        let (ra, rb) = tokio::join!(store.save(&a), store.save(&b));
        ra.unwrap();
        rb.unwrap();
        assert_eq!(store.load(a.job_id).await.unwrap().unwrap().spec.target, "a.sh");
        assert_eq!(store.load(b.job_id).await.unwrap().unwrap().spec.target, "b.sh");
    }

    #[tokio::test]
    async fn test_atomic_write_replaces_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("value.json");

        let long: Vec<u32> = (0..2_000).collect();
        write_json_atomic(&path, &long).await.unwrap();
        write_json_atomic(&path, &vec![7u32]).await.unwrap();

        let loaded: Vec<u32> = read_json(&path).await.unwrap().unwrap();
        assert_eq!(loaded, vec![7]);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_failed_write_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("value.json");

        let err = write_json_atomic(&path, &1u32).await.unwrap_err();
        assert!(matches!(err, StorageError::Io(_)));
        assert!(!dir.path().join("missing").exists());
    }
}
