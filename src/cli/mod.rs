//! CLI subcommands for the `action-batcher` binary.
//!
//! ## Usage
//!
//! ```bash
//! action-batcher send '{"type":"activate","id":"1"}' '{"type":"activate","id":"2"}'
//! action-batcher config show [--json] [--config FILE]
//! action-batcher config defaults
//! ```

pub mod config_cmd;
#[cfg(feature = "http")]
pub mod send_cmd;

use std::path::Path;

use thiserror::Error;

use crate::config::{self, ConfigError, EnvConfig};

#[derive(Debug, Error)]
pub enum CliError {
    #[error("no actions given")]
    NoActions,
    #[error("action #{index} is not valid JSON: {reason}")]
    InvalidAction { index: usize, reason: String },
    #[error("missing value for {0}")]
    MissingValue(&'static str),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Value following `flag` in `args`, if the flag is present.
pub fn flag_value<'a>(args: &'a [String], flag: &'static str) -> Result<Option<&'a str>, CliError> {
    match args.iter().position(|a| a == flag) {
        None => Ok(None),
        Some(i) => args
            .get(i + 1)
            .map(|v| Some(v.as_str()))
            .ok_or(CliError::MissingValue(flag)),
    }
}

/// Load configuration, from `--config FILE` when given, else the environment.
pub fn load_config(args: &[String]) -> Result<EnvConfig, CliError> {
    match flag_value(args, "--config")? {
        Some(path) => Ok(config::load_file(Path::new(path))?),
        None => Ok(config::load()),
    }
}

/// Flags that are followed by a value.
const VALUE_FLAGS: &[&str] = &["--config"];

/// Parse positional JSON actions, skipping flags and the values of
/// [`VALUE_FLAGS`].
pub fn parse_actions(args: &[String]) -> Result<Vec<serde_json::Value>, CliError> {
    let mut actions = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if VALUE_FLAGS.contains(&arg.as_str()) {
            iter.next();
            continue;
        }
        if arg.starts_with("--") {
            continue;
        }
        let value = serde_json::from_str(arg).map_err(|e| CliError::InvalidAction {
            index: actions.len() + 1,
            reason: e.to_string(),
        })?;
        actions.push(value);
    }
    if actions.is_empty() {
        return Err(CliError::NoActions);
    }
    Ok(actions)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_actions_in_order() {
        let parsed = parse_actions(&args(&[r#"{"id":"1"}"#, r#"{"id":"2"}"#])).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1]["id"], "2");
    }

    #[test]
    fn test_parse_actions_skips_flags() {
        let parsed = parse_actions(&args(&["--config", "batcher.toml", r#"{"id":"1"}"#])).unwrap();
        assert_eq!(parsed, vec![serde_json::json!({"id": "1"})]);
    }

    #[test]
    fn test_parse_actions_keeps_action_after_bare_flag() {
        let parsed = parse_actions(&args(&["--json", r#"{"id":"1"}"#, "--verbose"])).unwrap();
        assert_eq!(parsed, vec![serde_json::json!({"id": "1"})]);
    }

    #[test]
    fn test_parse_actions_reports_bad_index() {
        let err = parse_actions(&args(&[r#"{"id":"1"}"#, "{oops"])).unwrap_err();
        assert!(matches!(err, CliError::InvalidAction { index: 2, .. }));
    }

    #[test]
    fn test_parse_actions_requires_one() {
        assert!(matches!(parse_actions(&[]), Err(CliError::NoActions)));
    }

    #[test]
    fn test_flag_value_missing() {
        let a = args(&["--config"]);
        assert!(matches!(flag_value(&a, "--config"), Err(CliError::MissingValue("--config"))));
        assert_eq!(flag_value(&args(&["x"]), "--config").unwrap(), None);
    }
}
