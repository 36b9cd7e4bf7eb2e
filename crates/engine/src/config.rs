//! Engine configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Invalid configuration value.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A value that must be positive is zero
    #[error("{0} must be greater than 0")]
    Zero(&'static str),

    /// A highlight extension is blank
    #[error("highlight extensions cannot be empty")]
    EmptyExtension,
}

/// Configuration for the job engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How often `wait_for_completion` re-reads a job, in milliseconds
    pub poll_interval_ms: u64,

    /// How long a cancelled process gets to exit after SIGTERM, in milliseconds
    pub kill_grace_ms: u64,

    /// File extensions highlighted in result summaries (e.g. `pdb`)
    pub highlight_extensions: Vec<String>,

    /// Log lines returned when a caller does not ask for a tail size
    pub default_log_tail: usize,

    /// Mark orphaned pending/running jobs as failed when the engine starts
    pub reconcile_on_startup: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 200,
            kill_grace_ms: 5_000,
            highlight_extensions: Vec::new(),
            default_log_tail: 50,
            reconcile_on_startup: false,
        }
    }
}

impl EngineConfig {
    /// Poll interval as a duration.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Kill grace period as a duration.
    pub fn kill_grace_period(&self) -> Duration {
        Duration::from_millis(self.kill_grace_ms)
    }

    /// Set the highlighted extensions.
    pub fn with_highlight_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.highlight_extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Set the kill grace period.
    pub fn with_kill_grace(mut self, grace: Duration) -> Self {
        self.kill_grace_ms = grace.as_millis() as u64;
        self
    }

    /// Set the poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Enable or disable reconciliation on startup.
    pub fn with_reconcile_on_startup(mut self, enabled: bool) -> Self {
        self.reconcile_on_startup = enabled;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Zero("poll_interval_ms"));
        }
        if self.default_log_tail == 0 {
            return Err(ConfigError::Zero("default_log_tail"));
        }
        if self
            .highlight_extensions
            .iter()
            .any(|ext| ext.trim_start_matches('.').trim().is_empty())
        {
            return Err(ConfigError::EmptyExtension);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.poll_interval(), Duration::from_millis(200));
        assert_eq!(config.kill_grace_period(), Duration::from_secs(5));
        assert_eq!(config.default_log_tail, 50);
        assert!(!config.reconcile_on_startup);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = EngineConfig::default();

        config.poll_interval_ms = 0;
        assert!(config.validate().is_err());
        config.poll_interval_ms = 100;

        config.default_log_tail = 0;
        assert!(config.validate().is_err());
        config.default_log_tail = 10;

        config = config.with_highlight_extensions([".pdb", "."]);
        assert!(matches!(config.validate(), Err(ConfigError::EmptyExtension)));

        config = config.with_highlight_extensions(["pdb"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"highlight_extensions": ["pdb"], "kill_grace_ms": 250}"#).unwrap();
        assert_eq!(config.highlight_extensions, vec!["pdb"]);
        assert_eq!(config.kill_grace_period(), Duration::from_millis(250));
        assert_eq!(config.poll_interval_ms, 200);
    }
}
