//! Action Batcher
//!
//! Coalesces discrete user mutation intents ("activate item X",
//! "deactivate item Y") into single batch requests against one endpoint,
//! and fans the batch outcome back out to every original caller.
//!
//! # Guarantees
//!
//! - **Ordering**: actions are batched in enqueue order.
//! - **Single-flight**: at most one batch request per coordinator is in flight.
//! - **Exactly-once settlement**: every queued action lands in exactly one
//!   batch and its handle settles exactly once.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use action_batcher::{BatchCoordinator, CoordinatorConfig, HttpSend};
//!
//! # async fn demo(sender: Arc<dyn HttpSend>) {
//! let coordinator = BatchCoordinator::new(CoordinatorConfig::new("/api/admin/batch"), sender);
//! let first = coordinator.queue_action(serde_json::json!({"type": "activate", "id": "1"}));
//! let second = coordinator.queue_action(serde_json::json!({"type": "activate", "id": "2"}));
//! let (a, b) = futures::join!(first, second);
//! # let _ = (a, b);
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod telemetry;
pub mod transport;

pub use coordinator::{
    ActionOptimizer, ActionOutcome, ActionResult, BatchCoordinator, CoalesceByKey,
    CoordinatorConfig, DispatchPolicy, Identity, PendingAction, ShutdownResult, StatsSnapshot,
    DEFAULT_DEBOUNCE_DELAY, REARM_DELAY,
};
pub use error::{BatchError, TransportError};
pub use transport::{BatchTransport, HttpRequest, HttpResponse, HttpSend};
