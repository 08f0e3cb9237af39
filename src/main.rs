//! `action-batcher` entry point.
//!
//! ## CLI Subcommands
//!
//! - `action-batcher send <json-action>...` - Send actions as one batch (exit 1 if any rejected)
//! - `action-batcher config show` - Print effective configuration
//! - `action-batcher config defaults` - Print default configuration

use std::process::ExitCode;

use action_batcher::cli::{self, config_cmd, send_cmd};
use action_batcher::telemetry;

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("help");

    match command {
        "send" => {
            let rest = &args[2..];
            let config = match cli::load_config(rest) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Error: {e}");
                    return ExitCode::from(2u8);
                }
            };
            let actions = match cli::parse_actions(rest) {
                Ok(actions) => actions,
                Err(e) => {
                    eprintln!("Error: {e}");
                    print_command_help("send");
                    return ExitCode::from(2u8);
                }
            };
            if let Err(e) = telemetry::init_logging(&config.log) {
                eprintln!("Warning: logging disabled: {e}");
            }
            let code = send_cmd::run_send(&config, actions).await;
            ExitCode::from(code as u8)
        }
        "config" => {
            let subcommand = args.get(2).map(|s| s.as_str()).unwrap_or("show");
            match subcommand {
                "show" => {
                    let code = config_cmd::run_show(&args[3.min(args.len())..]);
                    ExitCode::from(code as u8)
                }
                "defaults" => {
                    config_cmd::run_defaults();
                    ExitCode::SUCCESS
                }
                _ => {
                    eprintln!("Unknown config subcommand: {}", subcommand);
                    print_command_help("config");
                    ExitCode::FAILURE
                }
            }
        }
        "help" | "--help" | "-h" => {
            if let Some(subcommand) = args.get(2) {
                print_command_help(subcommand);
            } else {
                print_usage();
            }
            ExitCode::SUCCESS
        }
        "version" | "--version" | "-V" => {
            println!("action-batcher {}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            ExitCode::FAILURE
        }
    }
}

fn print_usage() {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!(
        "action-batcher v{}

USAGE:
    action-batcher [COMMAND] [OPTIONS]

COMMANDS:
    send         Send JSON actions to the batch endpoint as one batch
    config       Inspect configuration (show, defaults)
    version      Show version information
    help         Show this help message

OPTIONS:
    --config FILE  Load configuration from a TOML file
    -h, --help     Show help for command
    -V, --version  Show version information

EXAMPLES:
    action-batcher send '{{\"type\":\"activate\",\"id\":\"1\"}}'
    action-batcher config show --json
    action-batcher config defaults

ENVIRONMENT:
    ACTION_BATCHER_ENDPOINT            Batch endpoint URL
    ACTION_BATCHER_DEBOUNCE_MS         Debounce window in milliseconds (default: 300)
    ACTION_BATCHER_PER_ACTION_RESULTS  Attribute results per action (default: false)
    ACTION_BATCHER_SHUTDOWN_TIMEOUT    Seconds to wait for an in-flight batch (default: 30)
    ACTION_BATCHER_AUTH_TOKEN          Bearer token sent with each batch
    ACTION_BATCHER_LOG_FORMAT          json or pretty (default: json)
    ACTION_BATCHER_LOG_LEVEL           Log filter (default: info)
    ACTION_BATCHER_LOG_FILE            Log to a file instead of stderr

EXIT CODES:
    0  Success
    1  One or more actions rejected
    2  Usage or configuration error
    3  HTTP client error
",
        version
    );
}

/// Print detailed help for a specific command.
fn print_command_help(command: &str) {
    match command {
        "send" => {
            eprintln!(
                "action-batcher send - Send actions as one batch

USAGE:
    action-batcher send [--config FILE] <JSON-ACTION>...

DESCRIPTION:
    Queues every action, flushes immediately and prints one line per
    action. All actions share the outcome of the batch unless
    ACTION_BATCHER_PER_ACTION_RESULTS is enabled.

EXIT CODES:
    0  All actions succeeded
    1  At least one action was rejected
    2  Invalid arguments or configuration
"
            );
        }
        "config" => {
            eprintln!(
                "action-batcher config - Inspect configuration

USAGE:
    action-batcher config show [--json] [--config FILE]
    action-batcher config defaults
"
            );
        }
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
        }
    }
}
