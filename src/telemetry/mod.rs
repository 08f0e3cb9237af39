//! Telemetry for the batch coordinator.
//!
//! Structured logging, per-batch spans, and counters through the `metrics`
//! facade. Per-instance counters live on the coordinator itself.

mod logging;
mod metrics;
mod spans;

pub use logging::{init_logging, LogConfig, LogError, LogFormat};
pub use self::metrics::{
    record_action_queued, record_batch_failed, record_batch_queue_age, record_batch_sent,
    record_queue_depth, record_short_circuit,
};
pub use spans::{BatchSpan, SpanExt};
