//! Metric recording through the `metrics` facade.
//!
//! No exporter is installed here; the embedding application picks one.

use std::time::Duration;

use metrics::{counter, gauge, histogram};

/// An action entered the live queue.
pub fn record_action_queued() {
    counter!("action_batcher_actions_queued_total").increment(1);
}

/// Current live queue depth.
pub fn record_queue_depth(depth: usize) {
    gauge!("action_batcher_queue_depth").set(depth as f64);
}

/// How long the oldest action in a batch waited before the snapshot.
pub fn record_batch_queue_age(age: Duration) {
    histogram!("action_batcher_batch_queue_age_ms").record(age.as_secs_f64() * 1000.0);
}

/// A batch request completed with a decodable response.
pub fn record_batch_sent(callers: usize, wire_actions: usize, latency_ms: u64) {
    counter!("action_batcher_batches_sent_total").increment(1);
    histogram!("action_batcher_batch_callers").record(callers as f64);
    histogram!("action_batcher_batch_wire_actions").record(wire_actions as f64);
    histogram!("action_batcher_batch_latency_ms").record(latency_ms as f64);
}

/// A batch settled with an error for its callers.
pub fn record_batch_failed(kind: &'static str) {
    counter!("action_batcher_batches_failed_total", "kind" => kind).increment(1);
}

/// A batch optimized down to nothing and settled without a request.
pub fn record_short_circuit(callers: usize) {
    counter!("action_batcher_batches_short_circuited_total").increment(1);
    histogram!("action_batcher_batch_callers").record(callers as f64);
}
