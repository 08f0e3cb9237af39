//! Batched-action coordinator.
//!
//! Collects caller intents, debounces them, optionally optimizes them, and
//! ships them to one endpoint as a single batch. Each caller gets a
//! [`PendingAction`] that settles once its batch does.

mod batch;
mod dispatch;
mod driver;
mod optimizer;
mod queue;
mod stats;

pub use batch::{Batch, BatchPhase, BatchResult, BatchSummary, PerActionResult};
pub use dispatch::{settle, settle_short_circuit, DispatchPolicy};
pub use driver::REARM_DELAY;
pub use optimizer::{ActionOptimizer, CoalesceByKey, Identity};
pub use queue::{ActionOutcome, ActionQueue, ActionResult, PendingAction, QueuedAction};
pub use stats::StatsSnapshot;

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;

use crate::transport::{BatchTransport, HttpSend};
use driver::Shared;

/// Default quiet period before a batch is sent.
pub const DEFAULT_DEBOUNCE_DELAY: Duration = Duration::from_millis(300);

/// Configuration for one coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    pub batch_endpoint: String,
    pub debounce_delay: Duration,
    pub dispatch_policy: DispatchPolicy,
}

impl CoordinatorConfig {
    pub fn new(batch_endpoint: impl Into<String>) -> Self {
        Self {
            batch_endpoint: batch_endpoint.into(),
            debounce_delay: DEFAULT_DEBOUNCE_DELAY,
            dispatch_policy: DispatchPolicy::default(),
        }
    }

    pub fn with_debounce_delay(mut self, delay: Duration) -> Self {
        self.debounce_delay = delay;
        self
    }

    pub fn with_dispatch_policy(mut self, policy: DispatchPolicy) -> Self {
        self.dispatch_policy = policy;
        self
    }
}

/// Result of [`BatchCoordinator::shutdown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownResult {
    Complete,
    /// The in-flight batch had not settled when the timeout elapsed.
    Timeout,
}

/// Debounced, single-flight batch coordinator for actions of type `A`,
/// sent on the wire as `B`.
///
/// Dropping the coordinator disposes it: the driver stops, queued actions
/// are rejected with [`BatchError::Disposed`](crate::BatchError::Disposed),
/// and an in-flight batch still settles its callers.
pub struct BatchCoordinator<A, B = A> {
    shared: Arc<Shared<A>>,
    driver: Option<JoinHandle<()>>,
    config: CoordinatorConfig,
    _wire: PhantomData<fn() -> B>,
}

impl<A> BatchCoordinator<A, A>
where
    A: Clone + Serialize + Send + Sync + 'static,
{
    /// Coordinator that sends actions unchanged.
    ///
    /// Must be called inside a tokio runtime; the driver task is spawned here.
    pub fn new(config: CoordinatorConfig, sender: Arc<dyn HttpSend>) -> Self {
        Self::with_optimizer(config, sender, Identity)
    }
}

impl<A, B> BatchCoordinator<A, B>
where
    A: Send + 'static,
    B: Serialize + Send + Sync + 'static,
{
    /// Coordinator that runs `optimizer` over every snapshot before sending.
    ///
    /// Must be called inside a tokio runtime; the driver task is spawned here.
    pub fn with_optimizer<O>(config: CoordinatorConfig, sender: Arc<dyn HttpSend>, optimizer: O) -> Self
    where
        O: ActionOptimizer<A, B> + 'static,
    {
        let shared = Arc::new(Shared::new(config.debounce_delay));
        let transport = BatchTransport::new(config.batch_endpoint.clone(), sender);
        let driver = driver::spawn(
            Arc::clone(&shared),
            transport,
            Arc::new(optimizer),
            config.dispatch_policy,
        );
        tracing::debug!(
            endpoint = %config.batch_endpoint,
            debounce_ms = config.debounce_delay.as_millis() as u64,
            "batch coordinator started"
        );
        Self { shared, driver: Some(driver), config, _wire: PhantomData }
    }
}

impl<A, B> BatchCoordinator<A, B> {
    /// Queue an action for the next batch.
    ///
    /// Never fails up front; every outcome arrives through the returned
    /// handle, including rejection after disposal.
    pub fn queue_action(&self, action: A) -> PendingAction {
        self.shared.enqueue(action)
    }

    /// Send whatever is queued now, skipping the debounce window.
    ///
    /// Completes once that batch has settled. Returns immediately if the
    /// queue is empty or a batch is already in flight; in the latter case
    /// queued actions go out right after the current batch.
    pub async fn flush_batch(&self) {
        if let Some(done) = self.shared.request_flush() {
            // Dropped only on dispose, which has already settled everyone.
            let _ = done.await;
        }
    }

    /// Stop the debounce driver and reject queued actions. Idempotent.
    pub fn dispose(&self) {
        self.shared.dispose();
    }

    /// Dispose, then wait up to `timeout` for an in-flight batch to settle.
    pub async fn shutdown(mut self, timeout: Duration) -> ShutdownResult {
        self.shared.dispose();
        let Some(driver) = self.driver.take() else {
            return ShutdownResult::Complete;
        };
        match tokio::time::timeout(timeout, driver).await {
            Ok(_) => ShutdownResult::Complete,
            Err(_) => {
                tracing::warn!(timeout_ms = timeout.as_millis() as u64, "batch still in flight at shutdown");
                ShutdownResult::Timeout
            }
        }
    }

    /// Actions waiting for the next batch.
    pub fn pending_len(&self) -> usize {
        self.shared.pending_len()
    }

    pub fn is_in_flight(&self) -> bool {
        self.shared.is_in_flight()
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.is_disposed()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }
}

impl<A, B> Drop for BatchCoordinator<A, B> {
    fn drop(&mut self) {
        self.shared.dispose();
    }
}

impl<A, B> std::fmt::Debug for BatchCoordinator<A, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchCoordinator")
            .field("endpoint", &self.config.batch_endpoint)
            .field("pending", &self.pending_len())
            .field("in_flight", &self.is_in_flight())
            .finish()
    }
}
