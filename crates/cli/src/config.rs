//! CLI configuration file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use jobdock_engine::EngineConfig;
use jobdock_runner::ScriptAdapterConfig;
use serde::{Deserialize, Serialize};

/// Looked up in the current directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "jobdock.json";

/// Top-level configuration of the `jobdock` binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root of the per-job directories
    pub jobs_dir: PathBuf,

    /// Lifecycle engine settings
    pub engine: EngineConfig,

    /// How targets are turned into commands
    pub adapter: ScriptAdapterConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            jobs_dir: PathBuf::from(".jobdock/jobs"),
            engine: EngineConfig::default(),
            adapter: ScriptAdapterConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration.
    ///
    /// An explicit path must exist. Without one, `jobdock.json` in the
    /// current directory is used if present, otherwise defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILE);
                if fallback.is_file() {
                    Self::from_file(fallback)?
                } else {
                    Self::default()
                }
            }
        };
        config.engine.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("Invalid config file {}", path.display()))
    }
}
