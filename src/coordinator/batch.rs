//! Batch snapshots and the endpoint's result envelope.

use std::panic::{self, AssertUnwindSafe};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::optimizer::ActionOptimizer;
use super::queue::{ActionOutcome, ActionResult, QueuedAction, ReplyTx};
use crate::error::{panic_message, BatchError};

/// Per-action result as reported by the batch endpoint.
pub type PerActionResult = ActionOutcome;

/// Aggregate counts reported alongside the results. Informational only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: u64,
    pub success: u64,
    pub errors: u64,
}

/// Decoded `data` object of a successful batch response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    pub results: Vec<PerActionResult>,
    #[serde(default)]
    pub summary: BatchSummary,
}

impl BatchResult {
    /// First failing result, if any.
    pub fn first_failure(&self) -> Option<&PerActionResult> {
        self.results.iter().find(|r| !r.success)
    }

    pub fn all_succeeded(&self) -> bool {
        self.first_failure().is_none()
    }
}

/// Lifecycle of a single batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchPhase {
    Pending,
    Optimizing,
    ShortCircuitEmpty,
    Sending,
    SettledOk,
    SettledError,
}

impl BatchPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Optimizing => "optimizing",
            Self::ShortCircuitEmpty => "short_circuit_empty",
            Self::Sending => "sending",
            Self::SettledOk => "settled_ok",
            Self::SettledError => "settled_error",
        }
    }
}

/// Snapshot of the live queue taken at flush time.
pub struct Batch<A, B> {
    id: Uuid,
    actions: Vec<A>,
    replies: Vec<ReplyTx>,
    batch_actions: Vec<B>,
}

impl<A, B> Batch<A, B> {
    /// Split the queued entries into actions and reply channels.
    /// The batch has no wire actions until [`Batch::apply`] runs.
    pub fn snapshot(id: Uuid, queued: Vec<QueuedAction<A>>) -> Self {
        let (actions, replies): (Vec<A>, Vec<ReplyTx>) =
            queued.into_iter().map(QueuedAction::into_parts).unzip();
        Self { id, actions, replies, batch_actions: Vec::new() }
    }

    /// Run the optimizer over the original actions.
    ///
    /// A panicking optimizer is caught and reported as
    /// [`BatchError::Internal`]; the reply channels stay with the batch.
    pub fn apply(&mut self, optimizer: &dyn ActionOptimizer<A, B>) -> Result<(), BatchError> {
        let actions = &self.actions;
        match panic::catch_unwind(AssertUnwindSafe(|| optimizer.optimize(actions))) {
            Ok(batch_actions) => {
                self.batch_actions = batch_actions;
                Ok(())
            }
            Err(payload) => Err(BatchError::Internal(format!(
                "batch optimizer panicked: {}",
                panic_message(payload.as_ref())
            ))),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Optimized actions as they go on the wire.
    pub fn batch_actions(&self) -> &[B] {
        &self.batch_actions
    }

    /// Number of callers waiting on this batch.
    pub fn caller_count(&self) -> usize {
        self.replies.len()
    }

    /// True when optimization cancelled everything.
    pub fn is_empty_after_optimization(&self) -> bool {
        self.batch_actions.is_empty()
    }

    /// Deliver one result per caller, in enqueue order.
    pub fn settle(self, results: Vec<ActionResult>) {
        debug_assert_eq!(results.len(), self.replies.len());
        for (reply, result) in self.replies.into_iter().zip(results) {
            let _ = reply.send(result);
        }
    }
}
