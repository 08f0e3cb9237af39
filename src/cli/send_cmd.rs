//! `send`: queue JSON actions against the configured endpoint and flush.

use std::sync::Arc;

use serde_json::Value;

use crate::config::EnvConfig;
use crate::coordinator::{ActionResult, BatchCoordinator, ShutdownResult};
use crate::transport::ReqwestSender;

/// Send `actions` as one batch and print each outcome.
///
/// Returns 0 if every action resolved, 1 if any was rejected and 3 if the
/// HTTP client could not be built.
pub async fn run_send(config: &EnvConfig, actions: Vec<Value>) -> i32 {
    let sender = match ReqwestSender::new() {
        Ok(sender) => sender,
        Err(e) => {
            eprintln!("Error: {e}");
            return 3;
        }
    };
    let sender = match &config.auth_token {
        Some(token) => sender.with_bearer_token(token.clone()),
        None => sender,
    };

    let coordinator: BatchCoordinator<Value> =
        BatchCoordinator::new(config.coordinator.clone(), Arc::new(sender));
    let pending: Vec<_> = actions.iter().map(|a| coordinator.queue_action(a.clone())).collect();
    coordinator.flush_batch().await;
    let results = futures::future::join_all(pending).await;

    let rejected = print_outcomes(&actions, &results);
    if coordinator.shutdown(config.shutdown_timeout).await == ShutdownResult::Timeout {
        eprintln!("Warning: batch still in flight at exit");
    }
    if rejected == 0 {
        0
    } else {
        1
    }
}

/// Print one line per action; returns how many were rejected.
fn print_outcomes(actions: &[Value], results: &[ActionResult]) -> usize {
    let mut rejected = 0;
    for (i, (action, result)) in actions.iter().zip(results).enumerate() {
        match result {
            Ok(_) => println!("[{}] ok     {}", i + 1, action),
            Err(e) => {
                rejected += 1;
                println!("[{}] FAILED {} ({})", i + 1, action, e);
            }
        }
    }
    rejected
}
