//! Script adapter - runs a target script with flag-style arguments.
//!
//! The produced command line is
//!
//! ```text
//! [interpreter] <target> <args...> <output_flag> <output_dir> <extra_args...>
//! ```
//!
//! Argument encoding:
//! - key `foo_bar` becomes the flag `--foo-bar`
//! - text, integer and float values are passed as `--flag <value>`
//! - `true` is passed as a bare `--flag`, `false` omits the flag
//! - lists are comma-joined: `--flag a,b,c`

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use jobdock_core::{ArgValue, JobArgs, JobSpec};
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::adapter::{AdapterError, ExecutionAdapter, Invocation};

/// Configuration for [`ScriptAdapter`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptAdapterConfig {
    /// Interpreter to run the target with (e.g. `python`); `None` executes
    /// the target directly
    pub interpreter: Option<String>,

    /// Flag that carries the output directory
    pub output_flag: String,

    /// Output directory name inside the job directory
    pub output_subdir: String,

    /// Fixed working directory; defaults to the target's project root
    pub working_dir: Option<PathBuf>,

    /// Arguments appended after everything else
    pub extra_args: Vec<String>,
}

impl Default for ScriptAdapterConfig {
    fn default() -> Self {
        Self {
            interpreter: None,
            output_flag: "--output".to_string(),
            output_subdir: "results".to_string(),
            working_dir: None,
            extra_args: Vec::new(),
        }
    }
}

impl ScriptAdapterConfig {
    /// Set the interpreter.
    pub fn with_interpreter(mut self, interpreter: impl Into<String>) -> Self {
        self.interpreter = Some(interpreter.into());
        self
    }

    /// Append a fixed trailing argument.
    pub fn with_extra_arg(mut self, arg: impl Into<String>) -> Self {
        self.extra_args.push(arg.into());
        self
    }
}

/// Adapter that runs a script, optionally through an interpreter.
#[derive(Debug, Clone, Default)]
pub struct ScriptAdapter {
    config: ScriptAdapterConfig,
}

impl ScriptAdapter {
    /// Create an adapter.
    pub fn new(config: ScriptAdapterConfig) -> Self {
        Self { config }
    }

    /// Adapter configuration.
    pub fn config(&self) -> &ScriptAdapterConfig {
        &self.config
    }

    /// Encode arguments into flags, validating keys and list items.
    pub fn encode_args(&self, args: &JobArgs) -> Result<Vec<String>, AdapterError> {
        let mut encoded = Vec::new();
        for (key, value) in args.iter() {
            if !key_pattern().is_match(key) {
                return Err(AdapterError::InvalidKey(key.clone()));
            }
            let flag = format!("--{}", key.replace('_', "-"));
            if flag == self.config.output_flag {
                return Err(AdapterError::ReservedKey(key.clone()));
            }

            match value {
                ArgValue::Bool(true) => encoded.push(flag),
                ArgValue::Bool(false) => {}
                ArgValue::Integer(v) => encoded.extend([flag, v.to_string()]),
                ArgValue::Float(v) => encoded.extend([flag, v.to_string()]),
                ArgValue::Text(v) => encoded.extend([flag, v.clone()]),
                ArgValue::List(items) => {
                    if let Some(bad) = items.iter().find(|item| item.is_empty() || item.contains(',')) {
                        return Err(AdapterError::InvalidListItem {
                            key: key.clone(),
                            item: bad.clone(),
                        });
                    }
                    encoded.extend([flag, items.join(",")]);
                }
            }
        }
        Ok(encoded)
    }

    fn resolve_target(&self, target: &str) -> Result<PathBuf, AdapterError> {
        let path = Path::new(target);
        if path.exists() {
            Ok(std::path::absolute(path)?)
        } else {
            Ok(path.to_path_buf())
        }
    }

    fn working_dir(&self, target: &Path) -> PathBuf {
        if let Some(dir) = &self.config.working_dir {
            return dir.clone();
        }
        let non_empty = |p: &Path| !p.as_os_str().is_empty();
        let parent = target.parent().filter(|p| non_empty(p));
        parent
            .and_then(|p| p.parent())
            .filter(|p| non_empty(p))
            .or(parent)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

impl ExecutionAdapter for ScriptAdapter {
    fn name(&self) -> &str {
        "script"
    }

    fn prepare(&self, spec: &JobSpec, job_dir: &Path) -> Result<Invocation, AdapterError> {
        if spec.target.trim().is_empty() {
            return Err(AdapterError::EmptyTarget);
        }

        let target = self.resolve_target(&spec.target)?;
        let output_dir = self.output_dir(spec, job_dir);
        let target_arg = target.to_string_lossy().into_owned();

        let (program, mut args) = match &self.config.interpreter {
            Some(interpreter) => (interpreter.clone(), vec![target_arg]),
            None => (target_arg, Vec::new()),
        };
        args.extend(self.encode_args(&spec.args)?);
        args.push(self.config.output_flag.clone());
        args.push(output_dir.to_string_lossy().into_owned());
        args.extend(self.config.extra_args.iter().cloned());

        Ok(Invocation {
            program,
            args,
            working_dir: self.working_dir(&target),
            output_dir,
        })
    }

    fn output_dir(&self, _spec: &JobSpec, job_dir: &Path) -> PathBuf {
        job_dir.join(&self.config.output_subdir)
    }
}

fn key_pattern() -> &'static Regex {
    static KEY: OnceLock<Regex> = OnceLock::new();
    KEY.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]*$").expect("argument key pattern is valid"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter() -> ScriptAdapter {
        ScriptAdapter::new(ScriptAdapterConfig::default().with_interpreter("python"))
    }

    #[test]
    fn test_encoding_rules() {
        let spec = JobSpec::new("predict.py")
            .with_arg("max_recycles", 3i64)
            .with_arg("threshold", 0.5)
            .with_arg("model_name", "v2")
            .with_arg("verbose", true)
            .with_arg("dry_run", false)
            .with_arg("inputs", vec!["a.fasta".to_string(), "b.fasta".to_string()]);

        let args = adapter().encode_args(&spec.args).unwrap();
        assert_eq!(
            args,
            vec![
                "--inputs", "a.fasta,b.fasta",
                "--max-recycles", "3",
                "--model-name", "v2",
                "--threshold", "0.5",
                "--verbose",
            ]
        );
    }

    #[test]
    fn test_prepare_builds_full_command() {
        let dir = tempfile::tempdir().unwrap();
        let scripts = dir.path().join("scripts");
        std::fs::create_dir_all(&scripts).unwrap();
        let script = scripts.join("predict.py");
        std::fs::write(&script, "").unwrap();

        let adapter = ScriptAdapter::new(
            ScriptAdapterConfig::default()
                .with_interpreter("python")
                .with_extra_arg("--production"),
        );
        let job_dir = dir.path().join("jobs").join("j1");
        let spec = JobSpec::new(script.to_string_lossy()).with_arg("seed", 7i64);

        let invocation = adapter.prepare(&spec, &job_dir).unwrap();
        let output_dir = job_dir.join("results");

        assert_eq!(invocation.program, "python");
        assert_eq!(
            invocation.args,
            vec![
                script.to_string_lossy().into_owned(),
                "--seed".to_string(),
                "7".to_string(),
                "--output".to_string(),
                output_dir.to_string_lossy().into_owned(),
                "--production".to_string(),
            ]
        );
        assert_eq!(invocation.output_dir, output_dir);
        assert_eq!(invocation.working_dir, dir.path());
        assert_eq!(adapter.output_dir(&spec, &job_dir), invocation.output_dir);
    }

    #[test]
    fn test_without_interpreter_target_is_program() {
        let adapter = ScriptAdapter::default();
        let invocation = adapter.prepare(&JobSpec::new("run-model"), Path::new("/jobs/j1")).unwrap();
        assert_eq!(invocation.program, "run-model");
        assert_eq!(invocation.args, vec!["--output", "/jobs/j1/results"]);
        assert_eq!(invocation.working_dir, PathBuf::from("."));
    }

    #[test]
    fn test_configured_working_dir_wins() {
        let adapter = ScriptAdapter::new(ScriptAdapterConfig {
            working_dir: Some(PathBuf::from("/srv/models")),
            ..Default::default()
        });
        let invocation = adapter.prepare(&JobSpec::new("/opt/x/run.sh"), Path::new("/jobs/j1")).unwrap();
        assert_eq!(invocation.working_dir, PathBuf::from("/srv/models"));
    }

    #[test]
    fn test_rejects_empty_target() {
        let err = adapter().prepare(&JobSpec::new("  "), Path::new("/jobs/j1")).unwrap_err();
        assert!(matches!(err, AdapterError::EmptyTarget));
    }

    #[test]
    fn test_rejects_invalid_keys() {
        for key in ["", "-x", "has space", "semi;colon"] {
            let spec = JobSpec::new("run.py").with_arg(key, "v");
            let err = adapter().prepare(&spec, Path::new("/jobs/j1")).unwrap_err();
            assert!(matches!(err, AdapterError::InvalidKey(_)), "{:?}", key);
        }
    }

    #[test]
    fn test_rejects_output_flag_key() {
        let spec = JobSpec::new("run.py").with_arg("output", "/elsewhere");
        let err = adapter().prepare(&spec, Path::new("/jobs/j1")).unwrap_err();
        assert!(matches!(err, AdapterError::ReservedKey(key) if key == "output"));
    }

    #[test]
    fn test_rejects_unencodable_list_items() {
        for item in ["a,b", ""] {
            let spec = JobSpec::new("run.py").with_arg("inputs", vec!["ok".to_string(), item.to_string()]);
            let err = adapter().prepare(&spec, Path::new("/jobs/j1")).unwrap_err();
            assert!(matches!(err, AdapterError::InvalidListItem { .. }));
        }
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: ScriptAdapterConfig = serde_json::from_str(r#"{"interpreter": "python3"}"#).unwrap();
        assert_eq!(config.interpreter.as_deref(), Some("python3"));
        assert_eq!(config.output_flag, "--output");
        assert_eq!(config.output_subdir, "results");
        assert!(config.extra_args.is_empty());
    }
}
