//! Per-batch span and result recording.

use tracing::{info_span, Span};
use uuid::Uuid;

use crate::coordinator::BatchPhase;

/// Extension trait for adding context to spans.
pub trait SpanExt {
    /// Record the result of an operation into the span.
    fn record_result<T, E>(&self, result: &Result<T, E>)
    where
        E: std::fmt::Display;

    /// Record a batch lifecycle transition.
    fn record_phase(&self, phase: BatchPhase);
}

impl SpanExt for Span {
    fn record_result<T, E>(&self, result: &Result<T, E>)
    where
        E: std::fmt::Display,
    {
        match result {
            Ok(_) => {
                self.record("status", "ok");
            }
            Err(e) => {
                self.record("status", "error");
                self.record("error.message", e.to_string().as_str());
            }
        }
    }

    fn record_phase(&self, phase: BatchPhase) {
        self.record("phase", phase.as_str());
    }
}

/// Factory for batch spans.
pub struct BatchSpan;

impl BatchSpan {
    /// Fields:
    /// - `batch_id`, `endpoint`, `callers`: known at snapshot time
    /// - `wire_actions`: filled in after optimization
    /// - `phase`, `status`, `error.message`, `latency_ms`: filled in as the batch progresses
    pub fn new(batch_id: Uuid, endpoint: &str, callers: usize) -> Span {
        info_span!(
            "action_batch",
            batch_id = %batch_id,
            endpoint = %endpoint,
            callers = callers,
            wire_actions = tracing::field::Empty,
            phase = BatchPhase::Pending.as_str(),
            status = tracing::field::Empty,
            error.message = tracing::field::Empty,
            latency_ms = tracing::field::Empty,
        )
    }
}
