//! Result summarizer - manifest of a completed job's output directory.

use std::path::{Component, Path};

use jobdock_core::{JobId, ResultSummary};
use tokio::fs;

/// Builds [`ResultSummary`] manifests.
#[derive(Debug, Clone, Default)]
pub struct ResultSummarizer {
    // lowercase, without leading dot
    highlight_extensions: Vec<String>,
}

impl ResultSummarizer {
    /// Create a summarizer highlighting files with the given extensions.
    /// Extensions match case-insensitively, with or without a leading dot.
    pub fn new<I, S>(highlight_extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            highlight_extensions: highlight_extensions
                .into_iter()
                .map(|ext| ext.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
                .filter(|ext| !ext.is_empty())
                .collect(),
        }
    }

    /// Whether a file is a highlighted artifact.
    pub fn is_highlighted(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let ext = ext.to_ascii_lowercase();
                self.highlight_extensions.iter().any(|h| *h == ext)
            })
            .unwrap_or(false)
    }

    /// Walk `output_dir` and list every file in it.
    ///
    /// A missing output directory yields an empty summary.
    pub async fn summarize(&self, job_id: JobId, output_dir: &Path) -> std::io::Result<ResultSummary> {
        let mut summary = ResultSummary::empty(job_id, output_dir);

        match fs::metadata(output_dir).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Ok(summary),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(summary),
            Err(e) => return Err(e),
        }

        let mut pending = vec![output_dir.to_path_buf()];
        while let Some(dir) = pending.pop() {
            let mut rd = fs::read_dir(&dir).await?;
            while let Some(entry) = rd.next_entry().await? {
                let path = entry.path();
                let file_type = entry.file_type().await?;

                let is_file = if file_type.is_dir() {
                    pending.push(path);
                    continue;
                } else if file_type.is_symlink() {
                    fs::metadata(&path).await.map(|m| m.is_file()).unwrap_or(false)
                } else {
                    file_type.is_file()
                };
                if !is_file {
                    continue;
                }

                summary.files_created.push(relative_display(output_dir, &path));
                if self.is_highlighted(&path) {
                    if let Some(name) = path.file_name() {
                        summary.highlighted.push(name.to_string_lossy().into_owned());
                    }
                }
            }
        }

        summary.files_created.sort();
        summary.highlighted.sort();
        summary.completed_at = chrono::Utc::now();
        Ok(summary)
    }
}

fn relative_display(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
