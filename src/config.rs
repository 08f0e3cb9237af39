//! Configuration loading from environment variables and TOML files.
//!
//! Values come from `ACTION_BATCHER_*` environment variables with sensible
//! defaults. Invalid values fall back to the default (or to the file value)
//! without crashing.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `ACTION_BATCHER_ENDPOINT` | `http://127.0.0.1:3000/api/batch` | Batch endpoint URL |
//! | `ACTION_BATCHER_DEBOUNCE_MS` | 300 | Quiet period before a batch is sent |
//! | `ACTION_BATCHER_PER_ACTION_RESULTS` | false | Attribute results per action when aligned |
//! | `ACTION_BATCHER_SHUTDOWN_TIMEOUT` | 30 | Wait for an in-flight batch on shutdown (secs) |
//! | `ACTION_BATCHER_AUTH_TOKEN` | unset | Bearer token for the bundled HTTP sender |
//! | `ACTION_BATCHER_LOG_FORMAT` | json | `json` or `pretty` |
//! | `ACTION_BATCHER_LOG_LEVEL` | info | `EnvFilter` directive |
//! | `ACTION_BATCHER_LOG_FILE` | unset | Log to this file instead of stderr |

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::coordinator::{CoordinatorConfig, DispatchPolicy};
use crate::telemetry::{LogConfig, LogFormat};

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:3000/api/batch";
const DEFAULT_SHUTDOWN_SECS: u64 = 30;
/// Upper bound for the debounce window.
const MAX_DEBOUNCE_MS: u64 = 60_000;

/// Effective configuration summary (serializable).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EffectiveConfig {
    pub endpoint: String,
    pub debounce_ms: u64,
    pub rearm_ms: u64,
    pub dispatch_policy: DispatchPolicy,
    pub shutdown_timeout_secs: u64,
    pub auth_token_set: bool,
    pub log_format: LogFormat,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
}

/// All configuration for the batcher and its binary.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub coordinator: CoordinatorConfig,
    pub shutdown_timeout: Duration,
    pub auth_token: Option<String>,
    pub log: LogConfig,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            coordinator: CoordinatorConfig::new(DEFAULT_ENDPOINT),
            shutdown_timeout: Duration::from_secs(DEFAULT_SHUTDOWN_SECS),
            auth_token: None,
            log: LogConfig::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {reason}")]
    Read { path: PathBuf, reason: String },
    #[error("invalid config file {path}: {reason}")]
    Parse { path: PathBuf, reason: String },
}

/// On-disk layout. Every key is optional; missing keys keep the default.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    endpoint: Option<String>,
    debounce_ms: Option<u64>,
    per_action_results: Option<bool>,
    shutdown_timeout_secs: Option<u64>,
    auth_token: Option<String>,
    #[serde(default)]
    log: FileLogConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileLogConfig {
    format: Option<LogFormat>,
    level: Option<String>,
    file: Option<PathBuf>,
}

/// Parse a `u64` env var, returning `default` on missing or invalid.
fn parse_u64(key: &str, default: u64) -> u64 {
    match std::env::var(key) {
        Ok(val) => val.trim().parse::<u64>().unwrap_or(default),
        Err(_) => default,
    }
}

/// Parse a boolean env var (`1/0`, `true/false`, `yes/no`).
fn parse_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => match val.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        },
        Err(_) => default,
    }
}

/// Non-empty string env var.
fn parse_string(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn policy_for(per_action: bool) -> DispatchPolicy {
    if per_action {
        DispatchPolicy::PerActionWhenAligned
    } else {
        DispatchPolicy::WholeBatch
    }
}

fn debounce_from_ms(ms: u64) -> Duration {
    Duration::from_millis(ms.min(MAX_DEBOUNCE_MS))
}

impl EnvConfig {
    fn apply_file(&mut self, file: FileConfig) {
        if let Some(endpoint) = file.endpoint.filter(|e| !e.trim().is_empty()) {
            self.coordinator.batch_endpoint = endpoint;
        }
        if let Some(ms) = file.debounce_ms {
            self.coordinator.debounce_delay = debounce_from_ms(ms);
        }
        if let Some(per_action) = file.per_action_results {
            self.coordinator.dispatch_policy = policy_for(per_action);
        }
        if let Some(secs) = file.shutdown_timeout_secs {
            self.shutdown_timeout = Duration::from_secs(secs.max(1));
        }
        if let Some(token) = file.auth_token.filter(|t| !t.is_empty()) {
            self.auth_token = Some(token);
        }
        if let Some(format) = file.log.format {
            self.log.format = format;
        }
        if let Some(level) = file.log.level {
            self.log.level = level;
        }
        if let Some(path) = file.log.file {
            self.log.output_path = Some(path);
        }
    }

    fn apply_env(&mut self) {
        if let Some(endpoint) = parse_string("ACTION_BATCHER_ENDPOINT") {
            self.coordinator.batch_endpoint = endpoint;
        }
        let debounce_ms = parse_u64(
            "ACTION_BATCHER_DEBOUNCE_MS",
            self.coordinator.debounce_delay.as_millis() as u64,
        );
        self.coordinator.debounce_delay = debounce_from_ms(debounce_ms);

        let per_action = parse_bool(
            "ACTION_BATCHER_PER_ACTION_RESULTS",
            self.coordinator.dispatch_policy == DispatchPolicy::PerActionWhenAligned,
        );
        self.coordinator.dispatch_policy = policy_for(per_action);

        let shutdown_secs = parse_u64("ACTION_BATCHER_SHUTDOWN_TIMEOUT", self.shutdown_timeout.as_secs());
        self.shutdown_timeout = Duration::from_secs(shutdown_secs.max(1));

        if let Some(token) = parse_string("ACTION_BATCHER_AUTH_TOKEN") {
            self.auth_token = Some(token);
        }
        if let Some(format) = parse_string("ACTION_BATCHER_LOG_FORMAT").and_then(|f| f.parse().ok()) {
            self.log.format = format;
        }
        if let Some(level) = parse_string("ACTION_BATCHER_LOG_LEVEL") {
            self.log.level = level;
        }
        if let Some(path) = parse_string("ACTION_BATCHER_LOG_FILE") {
            self.log.output_path = Some(PathBuf::from(path));
        }
    }

    /// Return a serializable summary of all effective values.
    pub fn effective_config(&self) -> EffectiveConfig {
        EffectiveConfig {
            endpoint: self.coordinator.batch_endpoint.clone(),
            debounce_ms: self.coordinator.debounce_delay.as_millis() as u64,
            rearm_ms: crate::coordinator::REARM_DELAY.as_millis() as u64,
            dispatch_policy: self.coordinator.dispatch_policy,
            shutdown_timeout_secs: self.shutdown_timeout.as_secs(),
            auth_token_set: self.auth_token.is_some(),
            log_format: self.log.format,
            log_level: self.log.level.clone(),
            log_file: self.log.output_path.clone(),
        }
    }
}

/// Load all configuration from environment variables.
///
/// Missing or invalid values fall back to safe defaults without panicking.
pub fn load() -> EnvConfig {
    let mut config = EnvConfig::default();
    config.apply_env();
    config
}

/// Parse TOML config text; environment variables are not consulted.
pub fn from_toml_str(text: &str) -> Result<EnvConfig, toml::de::Error> {
    let file: FileConfig = toml::from_str(text)?;
    let mut config = EnvConfig::default();
    config.apply_file(file);
    Ok(config)
}

/// Load a TOML config file, then let environment variables override it.
pub fn load_file(path: &Path) -> Result<EnvConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let mut config = from_toml_str(&text).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    config.apply_env();
    Ok(config)
}

/// Defaults before any file or environment override.
pub fn defaults() -> EnvConfig {
    EnvConfig::default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::DEFAULT_DEBOUNCE_DELAY;
    use std::io::Write;
    use std::sync::Mutex;

    // Serialize env-mutating tests to avoid cross-test pollution.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const ENV_KEYS: &[&str] = &[
        "ACTION_BATCHER_ENDPOINT",
        "ACTION_BATCHER_DEBOUNCE_MS",
        "ACTION_BATCHER_PER_ACTION_RESULTS",
        "ACTION_BATCHER_SHUTDOWN_TIMEOUT",
        "ACTION_BATCHER_AUTH_TOKEN",
        "ACTION_BATCHER_LOG_FORMAT",
        "ACTION_BATCHER_LOG_LEVEL",
        "ACTION_BATCHER_LOG_FILE",
    ];

    fn clear_env_vars() {
        for k in ENV_KEYS {
            std::env::remove_var(k);
        }
    }

    #[test]
    fn test_defaults_are_sensible() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        let cfg = load();
        assert_eq!(cfg.coordinator.batch_endpoint, DEFAULT_ENDPOINT);
        assert_eq!(cfg.coordinator.debounce_delay, DEFAULT_DEBOUNCE_DELAY);
        assert_eq!(cfg.coordinator.dispatch_policy, DispatchPolicy::WholeBatch);
        assert_eq!(cfg.shutdown_timeout.as_secs(), 30);
        assert!(cfg.auth_token.is_none());
        assert_eq!(cfg.log, LogConfig::default());
    }

    #[test]
    fn test_env_vars_override_defaults() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        std::env::set_var("ACTION_BATCHER_ENDPOINT", "https://cms.example.org/api/batch");
        std::env::set_var("ACTION_BATCHER_DEBOUNCE_MS", "120");
        std::env::set_var("ACTION_BATCHER_PER_ACTION_RESULTS", "yes");
        std::env::set_var("ACTION_BATCHER_LOG_FORMAT", "pretty");
        std::env::set_var("ACTION_BATCHER_AUTH_TOKEN", "s3cret");
        let cfg = load();
        assert_eq!(cfg.coordinator.batch_endpoint, "https://cms.example.org/api/batch");
        assert_eq!(cfg.coordinator.debounce_delay, Duration::from_millis(120));
        assert_eq!(cfg.coordinator.dispatch_policy, DispatchPolicy::PerActionWhenAligned);
        assert_eq!(cfg.log.format, LogFormat::Pretty);
        assert_eq!(cfg.auth_token.as_deref(), Some("s3cret"));
        clear_env_vars();
    }

    #[test]
    fn test_invalid_env_falls_back_to_default() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        std::env::set_var("ACTION_BATCHER_DEBOUNCE_MS", "soon");
        std::env::set_var("ACTION_BATCHER_PER_ACTION_RESULTS", "maybe");
        std::env::set_var("ACTION_BATCHER_LOG_FORMAT", "xml");
        std::env::set_var("ACTION_BATCHER_ENDPOINT", "   ");
        let cfg = load();
        assert_eq!(cfg.coordinator.debounce_delay, DEFAULT_DEBOUNCE_DELAY);
        assert_eq!(cfg.coordinator.dispatch_policy, DispatchPolicy::WholeBatch);
        assert_eq!(cfg.log.format, LogFormat::Json);
        assert_eq!(cfg.coordinator.batch_endpoint, DEFAULT_ENDPOINT);
        clear_env_vars();
    }

    #[test]
    fn test_debounce_and_shutdown_are_bounded() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        std::env::set_var("ACTION_BATCHER_DEBOUNCE_MS", "999999999");
        std::env::set_var("ACTION_BATCHER_SHUTDOWN_TIMEOUT", "0");
        let cfg = load();
        assert_eq!(cfg.coordinator.debounce_delay, Duration::from_millis(MAX_DEBOUNCE_MS));
        assert_eq!(cfg.shutdown_timeout.as_secs(), 1, "shutdown timeout must have a floor");

        std::env::set_var("ACTION_BATCHER_DEBOUNCE_MS", "0");
        assert_eq!(load().coordinator.debounce_delay, Duration::ZERO);
        clear_env_vars();
    }

    #[test]
    fn test_toml_file_then_env_override() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_env_vars();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
endpoint = "https://file.example.org/batch"
debounce_ms = 500
per_action_results = true

[log]
format = "pretty"
level = "action_batcher=debug"
"#
        )
        .unwrap();

        let cfg = load_file(file.path()).unwrap();
        assert_eq!(cfg.coordinator.batch_endpoint, "https://file.example.org/batch");
        assert_eq!(cfg.coordinator.debounce_delay, Duration::from_millis(500));
        assert_eq!(cfg.coordinator.dispatch_policy, DispatchPolicy::PerActionWhenAligned);
        assert_eq!(cfg.log.level, "action_batcher=debug");

        std::env::set_var("ACTION_BATCHER_DEBOUNCE_MS", "50");
        let cfg = load_file(file.path()).unwrap();
        assert_eq!(cfg.coordinator.debounce_delay, Duration::from_millis(50));
        assert_eq!(cfg.log.format, LogFormat::Pretty);
        clear_env_vars();
    }

    #[test]
    fn test_unknown_toml_key_is_rejected() {
        let err = from_toml_str("endpont = \"typo\"").unwrap_err();
        assert!(err.to_string().contains("endpont"));
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = load_file(Path::new("/nonexistent/action-batcher.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
        assert!(err.to_string().contains("/nonexistent/action-batcher.toml"));
    }

    #[test]
    fn test_effective_config_contains_all_fields() {
        let cfg = defaults();
        let eff = cfg.effective_config();
        assert_eq!(eff.debounce_ms, 300);
        assert_eq!(eff.rearm_ms, 50);
        assert!(!eff.auth_token_set);
        let json = serde_json::to_value(&eff).unwrap();
        assert_eq!(json["dispatch_policy"], "whole_batch");
        assert_eq!(json["log_format"], "json");
    }
}
