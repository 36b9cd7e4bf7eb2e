//! Job specification - what to run and with which arguments.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What a caller asks to run.
///
/// The engine never looks inside a spec; only the execution adapter
/// interprets `target` and `args`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    /// Script path or other target identifier
    pub target: String,

    /// Typed arguments for the target
    #[serde(default)]
    pub args: JobArgs,
}

impl JobSpec {
    /// Create a spec with no arguments.
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            args: JobArgs::default(),
        }
    }

    /// Add an argument.
    pub fn with_arg(mut self, key: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.args.insert(key, value);
        self
    }

    /// File name of the target, used for listings.
    pub fn target_name(&self) -> &str {
        std::path::Path::new(&self.target)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(&self.target)
    }
}

/// A single typed argument value.
///
/// Multi-valued arguments are carried as `List` and encoded by the adapter;
/// nothing is inferred from the contents of a `Text` value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgValue {
    /// Boolean switch
    Bool(bool),
    /// Integer value
    Integer(i64),
    /// Floating point value
    Float(f64),
    /// Free-form text
    Text(String),
    /// Multiple values (e.g. a list of input locations)
    List(Vec<String>),
}

impl From<bool> for ArgValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for ArgValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for ArgValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for ArgValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<String>> for ArgValue {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

/// Ordered key/value argument map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobArgs(BTreeMap<String, ArgValue>);

impl JobArgs {
    /// Create an empty argument map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an argument.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ArgValue>) -> Option<ArgValue> {
        self.0.insert(key.into(), value.into())
    }

    /// Get an argument by key.
    pub fn get(&self, key: &str) -> Option<&ArgValue> {
        self.0.get(key)
    }

    /// Iterate arguments in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ArgValue)> {
        self.0.iter()
    }

    /// Number of arguments.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no arguments.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<ArgValue>> FromIterator<(K, V)> for JobArgs {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arg_values_deserialize_by_shape() {
        let args: JobArgs = serde_json::from_str(
            r#"{"flag": true, "count": 3, "ratio": 0.5, "name": "x", "inputs": ["a", "b"]}"#,
        )
        .unwrap();

        assert_eq!(args.get("flag"), Some(&ArgValue::Bool(true)));
        assert_eq!(args.get("count"), Some(&ArgValue::Integer(3)));
        assert_eq!(args.get("ratio"), Some(&ArgValue::Float(0.5)));
        assert_eq!(args.get("name"), Some(&ArgValue::Text("x".to_string())));
        assert_eq!(
            args.get("inputs"),
            Some(&ArgValue::List(vec!["a".to_string(), "b".to_string()]))
        );
    }

    #[test]
    fn test_args_iterate_in_key_order() {
        let args: JobArgs = [("zeta", "1"), ("alpha", "2")].into_iter().collect();
        let keys: Vec<_> = args.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_target_name() {
        assert_eq!(JobSpec::new("/opt/scripts/predict.py").target_name(), "predict.py");
        assert_eq!(JobSpec::new("predict").target_name(), "predict");
    }
}
