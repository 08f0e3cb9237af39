//! Driver loop: debounce, single-flight and re-arm.
//!
//! One driver task per coordinator. All shared state sits behind one
//! `parking_lot::Mutex` that is never held across an `.await`; the only
//! suspension points are the deadline sleep, the wake notification and the
//! transport call.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use super::batch::{Batch, BatchPhase};
use super::dispatch::{self, DispatchPolicy};
use super::optimizer::ActionOptimizer;
use super::queue::{ActionQueue, ActionResult, PendingAction, QueuedAction};
use super::stats::CoordinatorStats;
use crate::error::{panic_message, BatchError};
use crate::telemetry::{self, BatchSpan, SpanExt};
use crate::transport::BatchTransport;

/// Delay before re-checking the queue after a batch settles with work left.
pub const REARM_DELAY: Duration = Duration::from_millis(50);

/// Mutable coordinator state. Only touched under `Shared::state`.
pub(crate) struct DriverState<A> {
    queue: ActionQueue<A>,
    /// Debounce deadline, reset by every enqueue made outside a flight.
    deadline: Option<Instant>,
    /// Re-arm deadline set when a batch settles; enqueues never move it.
    rearm: Option<Instant>,
    flush_requested: bool,
    flush_waiters: Vec<oneshot::Sender<()>>,
    in_flight: bool,
    disposed: bool,
}

impl<A> DriverState<A> {
    fn new() -> Self {
        Self {
            queue: ActionQueue::new(),
            deadline: None,
            rearm: None,
            flush_requested: false,
            flush_waiters: Vec::new(),
            in_flight: false,
            disposed: false,
        }
    }

    fn next_wake(&self) -> Option<Instant> {
        match (self.deadline, self.rearm) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }
}

/// What the driver should do next.
pub(crate) enum Due<A> {
    Batch {
        queued: Vec<QueuedAction<A>>,
        waiters: Vec<oneshot::Sender<()>>,
    },
    Idle(Option<Instant>),
}

/// State shared between the coordinator handle and its driver task.
pub(crate) struct Shared<A> {
    state: Mutex<DriverState<A>>,
    wake: Notify,
    shutdown: CancellationToken,
    debounce_delay: Duration,
    pub(crate) stats: CoordinatorStats,
}

impl<A> Shared<A> {
    pub(crate) fn new(debounce_delay: Duration) -> Self {
        Self {
            state: Mutex::new(DriverState::new()),
            wake: Notify::new(),
            shutdown: CancellationToken::new(),
            debounce_delay,
            stats: CoordinatorStats::default(),
        }
    }

    /// Append an action. Outside a flight this also resets the debounce
    /// deadline; during a flight the action just waits for the re-arm.
    pub(crate) fn enqueue(&self, action: A) -> PendingAction {
        let mut state = self.state.lock();
        if state.disposed {
            let id = state.queue.next_id();
            return PendingAction::settled(id, Err(BatchError::Disposed));
        }
        let pending = state.queue.push(action);
        let depth = state.queue.len();
        let in_flight = state.in_flight;
        if !in_flight {
            state.deadline = Some(Instant::now() + self.debounce_delay);
        }
        drop(state);

        self.stats.action_queued();
        telemetry::record_action_queued();
        telemetry::record_queue_depth(depth);
        if !in_flight {
            self.wake.notify_one();
        }
        pending
    }

    /// Cancel the debounce deadline and ask for an immediate flush.
    ///
    /// Returns `None` when there is nothing to do: the queue is empty, a
    /// batch is already in flight, or the coordinator is disposed.
    pub(crate) fn request_flush(&self) -> Option<oneshot::Receiver<()>> {
        let mut state = self.state.lock();
        if state.disposed || state.in_flight || state.queue.is_empty() {
            return None;
        }
        state.deadline = None;
        state.flush_requested = true;
        let (tx, rx) = oneshot::channel();
        state.flush_waiters.push(tx);
        drop(state);

        self.wake.notify_one();
        Some(rx)
    }

    /// Snapshot the queue if a flush is due, otherwise report when to wake.
    pub(crate) fn take_due(&self) -> Due<A> {
        let mut state = self.state.lock();
        if state.disposed {
            return Due::Idle(None);
        }
        let now = Instant::now();
        let timer_fired = state.next_wake().is_some_and(|at| at <= now);
        if !state.flush_requested && !timer_fired {
            return Due::Idle(state.next_wake());
        }

        state.deadline = None;
        state.rearm = None;
        state.flush_requested = false;
        let waiters = std::mem::take(&mut state.flush_waiters);
        if state.queue.is_empty() {
            drop(state);
            release(waiters);
            return Due::Idle(None);
        }
        state.in_flight = true;
        if let Some(age) = state.queue.oldest_wait() {
            telemetry::record_batch_queue_age(age);
        }
        Due::Batch { queued: state.queue.drain_all(), waiters }
    }

    /// Release the single-flight guard after a batch settles.
    pub(crate) fn finish_batch(&self, waiters: Vec<oneshot::Sender<()>>, short_circuited: bool) {
        let mut state = self.state.lock();
        state.in_flight = false;
        if !state.disposed && !state.queue.is_empty() {
            // An empty batch never hit the network, so look again right away.
            let delay = if short_circuited { Duration::ZERO } else { REARM_DELAY };
            state.rearm = Some(Instant::now() + delay);
        }
        let depth = state.queue.len();
        drop(state);

        telemetry::record_queue_depth(depth);
        release(waiters);
    }

    /// Stop the driver and reject everything still queued.
    ///
    /// A batch already in flight is left to finish and settle its callers.
    pub(crate) fn dispose(&self) {
        let (orphans, waiters) = {
            let mut state = self.state.lock();
            if state.disposed {
                return;
            }
            state.disposed = true;
            state.deadline = None;
            state.rearm = None;
            state.flush_requested = false;
            (state.queue.drain_all(), std::mem::take(&mut state.flush_waiters))
        };
        self.shutdown.cancel();
        release(waiters);

        if !orphans.is_empty() {
            tracing::debug!(count = orphans.len(), "rejecting queued actions on dispose");
            self.stats.actions_settled(0, orphans.len() as u64);
        }
        for queued in orphans {
            queued.settle(Err(BatchError::Disposed));
        }
    }

    pub(crate) fn pending_len(&self) -> usize {
        self.state.lock().queue.len()
    }

    pub(crate) fn is_in_flight(&self) -> bool {
        self.state.lock().in_flight
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.state.lock().disposed
    }
}

fn release(waiters: Vec<oneshot::Sender<()>>) {
    for waiter in waiters {
        let _ = waiter.send(());
    }
}

/// Spawn the driver task for one coordinator.
pub(crate) fn spawn<A, B>(
    shared: Arc<Shared<A>>,
    transport: BatchTransport,
    optimizer: Arc<dyn ActionOptimizer<A, B>>,
    policy: DispatchPolicy,
) -> JoinHandle<()>
where
    A: Send + 'static,
    B: Serialize + Send + Sync + 'static,
{
    tokio::spawn(async move {
        driver_loop(&shared, &transport, optimizer.as_ref(), policy).await;
    })
}

async fn driver_loop<A, B>(
    shared: &Shared<A>,
    transport: &BatchTransport,
    optimizer: &dyn ActionOptimizer<A, B>,
    policy: DispatchPolicy,
) where
    A: Send,
    B: Serialize + Send + Sync,
{
    loop {
        let wake_at = match shared.take_due() {
            Due::Batch { queued, waiters } => {
                let short_circuited = process_batch(shared, transport, optimizer, policy, queued).await;
                shared.finish_batch(waiters, short_circuited);
                continue;
            }
            Due::Idle(wake_at) => wake_at,
        };

        let sleep = async move {
            match wake_at {
                Some(at) => time::sleep_until(at).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            biased;
            () = shared.shutdown.cancelled() => {
                tracing::debug!("batch driver: shutdown signal received");
                break;
            }
            () = shared.wake.notified() => {}
            () = sleep => {}
        }
    }
}

/// Run one batch through optimize, send and dispatch.
/// Returns true if it short-circuited without a request.
async fn process_batch<A, B>(
    shared: &Shared<A>,
    transport: &BatchTransport,
    optimizer: &dyn ActionOptimizer<A, B>,
    policy: DispatchPolicy,
    queued: Vec<QueuedAction<A>>,
) -> bool
where
    B: Serialize + Sync,
{
    let mut batch = Batch::snapshot(Uuid::new_v4(), queued);
    let callers = batch.caller_count();
    let span = BatchSpan::new(batch.id(), transport.endpoint(), callers);

    span.record_phase(BatchPhase::Optimizing);
    if let Err(err) = batch.apply(optimizer) {
        tracing::error!(parent: &span, error = %err, "optimizer failed, rejecting batch");
        let results = dispatch::settle(policy, callers, &Err(err));
        record_settlement(shared, &span, &results);
        batch.settle(results);
        return false;
    }

    if batch.is_empty_after_optimization() {
        span.record_phase(BatchPhase::ShortCircuitEmpty);
        span.record("wire_actions", 0);
        tracing::debug!(parent: &span, callers, "all actions cancelled out, settling without a request");
        telemetry::record_short_circuit(callers);
        shared.stats.batch_short_circuited();
        shared.stats.actions_settled(callers as u64, 0);
        batch.settle(dispatch::settle_short_circuit(callers));
        return true;
    }

    let wire_actions = batch.batch_actions().len();
    span.record("wire_actions", wire_actions);
    span.record_phase(BatchPhase::Sending);
    tracing::debug!(parent: &span, callers, wire_actions, "sending batch");

    let started = Instant::now();
    let outcome = AssertUnwindSafe(transport.send(batch.batch_actions()).instrument(span.clone()))
        .catch_unwind()
        .await
        .unwrap_or_else(|payload| {
            Err(BatchError::Internal(format!(
                "batch sender panicked: {}",
                panic_message(payload.as_ref())
            )))
        });
    let latency_ms = started.elapsed().as_millis() as u64;
    span.record("latency_ms", latency_ms);

    if let Ok(result) = &outcome {
        shared.stats.batch_sent();
        telemetry::record_batch_sent(callers, wire_actions, latency_ms);
        tracing::debug!(
            parent: &span,
            total = result.summary.total,
            success = result.summary.success,
            errors = result.summary.errors,
            "batch response received"
        );
    }

    let results = dispatch::settle(policy, callers, &outcome);
    record_settlement(shared, &span, &results);
    batch.settle(results);
    false
}

fn record_settlement<A>(shared: &Shared<A>, span: &tracing::Span, results: &[ActionResult]) {
    let rejected = results.iter().filter(|r| r.is_err()).count();
    shared.stats.actions_settled((results.len() - rejected) as u64, rejected as u64);

    match results.iter().find_map(|r| r.as_ref().err()) {
        None => {
            span.record_phase(BatchPhase::SettledOk);
            span.record_result::<(), BatchError>(&Ok(()));
        }
        Some(err) => {
            span.record_phase(BatchPhase::SettledError);
            span.record_result::<(), _>(&Err(err));
            shared.stats.batch_failed();
            telemetry::record_batch_failed(err.kind());
            tracing::warn!(parent: span, error = %err, kind = err.kind(), rejected, "batch settled with errors");
        }
    }
}

#[cfg(test)]
#[path = "driver_tests.rs"]
mod tests;
