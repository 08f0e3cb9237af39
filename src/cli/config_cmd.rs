//! Config CLI subcommands: show, defaults.
//!
//! These read configuration locally; no batch endpoint is contacted.

use crate::config::{self, EffectiveConfig};

use super::load_config;

/// Print effective config to stdout, as env-style pairs or JSON.
pub fn run_show(args: &[String]) -> i32 {
    let json = args.iter().any(|a| a == "--json");
    match load_config(args) {
        Ok(env) => {
            print_config(&env.effective_config(), json);
            0
        }
        Err(e) => {
            eprintln!("Error: {e}");
            2
        }
    }
}

/// Print default config values (no file or env overrides) to stdout.
pub fn run_defaults() {
    print_config(&config::defaults().effective_config(), false);
}

fn print_config(cfg: &EffectiveConfig, json: bool) {
    if json {
        match serde_json::to_string_pretty(cfg) {
            Ok(text) => println!("{text}"),
            Err(e) => eprintln!("Error: failed to render config: {e}"),
        }
        return;
    }
    for (key, value) in config_lines(cfg) {
        println!("{key}={value}");
    }
}

fn config_lines(cfg: &EffectiveConfig) -> Vec<(&'static str, String)> {
    vec![
        ("ACTION_BATCHER_ENDPOINT", cfg.endpoint.clone()),
        ("ACTION_BATCHER_DEBOUNCE_MS", cfg.debounce_ms.to_string()),
        (
            "ACTION_BATCHER_PER_ACTION_RESULTS",
            (cfg.dispatch_policy == crate::DispatchPolicy::PerActionWhenAligned).to_string(),
        ),
        ("ACTION_BATCHER_SHUTDOWN_TIMEOUT", cfg.shutdown_timeout_secs.to_string()),
        ("ACTION_BATCHER_AUTH_TOKEN", if cfg.auth_token_set { "<set>" } else { "<unset>" }.to_string()),
        (
            "ACTION_BATCHER_LOG_FORMAT",
            match cfg.log_format {
                crate::telemetry::LogFormat::Json => "json",
                crate::telemetry::LogFormat::Pretty => "pretty",
            }
            .to_string(),
        ),
        ("ACTION_BATCHER_LOG_LEVEL", cfg.log_level.clone()),
        (
            "ACTION_BATCHER_LOG_FILE",
            cfg.log_file.as_ref().map(|p| p.display().to_string()).unwrap_or_default(),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_lines_cover_every_variable() {
        let lines = config_lines(&config::defaults().effective_config());
        let keys: Vec<_> = lines.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys.len(), 8);
        assert!(keys.iter().all(|k| k.starts_with("ACTION_BATCHER_")));
        assert!(lines.contains(&("ACTION_BATCHER_DEBOUNCE_MS", "300".to_string())));
        assert!(lines.contains(&("ACTION_BATCHER_AUTH_TOKEN", "<unset>".to_string())));
    }

    #[test]
    fn test_show_with_missing_file_fails() {
        let args = vec!["--config".to_string(), "/nonexistent/batcher.toml".to_string()];
        assert_eq!(run_show(&args), 2);
    }
}
