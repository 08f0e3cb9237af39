//! Result dispatch: map one batch outcome onto every caller in the batch.

use serde::{Deserialize, Serialize};

use super::batch::BatchResult;
use super::queue::{ActionOutcome, ActionResult};
use crate::error::{BatchError, ACTION_FAILED_FALLBACK};

/// How per-action results from the endpoint reach the callers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchPolicy {
    /// Any failure rejects every caller with the first failure's message.
    #[default]
    WholeBatch,
    /// Attribute results by index when the endpoint returned exactly one
    /// result per caller. Falls back to `WholeBatch` otherwise, since an
    /// optimized batch has no index mapping back to its callers.
    PerActionWhenAligned,
}

/// Compute one result per caller from the batch outcome.
pub fn settle(
    policy: DispatchPolicy,
    callers: usize,
    outcome: &Result<BatchResult, BatchError>,
) -> Vec<ActionResult> {
    let result = match outcome {
        Ok(result) => result,
        Err(err) => return vec![Err(err.clone()); callers],
    };

    if policy == DispatchPolicy::PerActionWhenAligned && result.results.len() == callers {
        return result.results.iter().map(per_action).collect();
    }

    match result.first_failure() {
        None => vec![Ok(ActionOutcome::ok()); callers],
        Some(failed) => vec![Err(failure_error(failed)); callers],
    }
}

/// Results for a batch whose actions all cancelled out.
pub fn settle_short_circuit(callers: usize) -> Vec<ActionResult> {
    vec![Ok(ActionOutcome::ok()); callers]
}

fn per_action(result: &ActionOutcome) -> ActionResult {
    if result.success {
        Ok(ActionOutcome::ok())
    } else {
        Err(failure_error(result))
    }
}

fn failure_error(result: &ActionOutcome) -> BatchError {
    let message = result
        .error
        .as_deref()
        .filter(|m| !m.is_empty())
        .unwrap_or(ACTION_FAILED_FALLBACK);
    BatchError::ActionFailed(message.to_string())
}
