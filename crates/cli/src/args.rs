//! Building job arguments from command-line flags.

use anyhow::{anyhow, bail, Context, Result};
use jobdock_core::{ArgValue, JobArgs};

/// Split `key=value`.
fn split_pair(raw: &str) -> Result<(&str, &str)> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("expected key=value, got '{}'", raw))?;
    let key = key.trim();
    if key.is_empty() {
        bail!("argument key is empty in '{}'", raw);
    }
    Ok((key, value))
}

/// Collect typed arguments.
///
/// `--args-json` is applied first so individual flags can override it.
/// Plain `--arg` values are always text; numbers and booleans need
/// `--args-json` or `--flag`.
pub fn collect_args(
    args_json: Option<&str>,
    text: &[String],
    lists: &[String],
    flags: &[String],
) -> Result<JobArgs> {
    let mut args = match args_json {
        Some(json) => serde_json::from_str::<JobArgs>(json).context("Invalid --args-json")?,
        None => JobArgs::new(),
    };

    for raw in text {
        let (key, value) = split_pair(raw)?;
        args.insert(key, ArgValue::Text(value.to_string()));
    }
    for raw in lists {
        let (key, value) = split_pair(raw)?;
        let items = value
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect::<Vec<_>>();
        args.insert(key, ArgValue::List(items));
    }
    for key in flags {
        args.insert(key.trim(), ArgValue::Bool(true));
    }

    Ok(args)
}
