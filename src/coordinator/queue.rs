//! Live action queue and the caller-side reply handle.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::error::BatchError;

/// Outcome delivered to a caller, and the per-action wire shape
/// `{"success": bool, "error"?: string}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionOutcome {
    pub fn ok() -> Self {
        Self { success: true, error: None }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self { success: false, error: Some(error.into()) }
    }
}

/// What a caller's [`PendingAction`] resolves to.
pub type ActionResult = Result<ActionOutcome, BatchError>;

/// Sender half stored on each queued action.
pub type ReplyTx = oneshot::Sender<ActionResult>;

/// A queued action waiting for its batch.
pub struct QueuedAction<A> {
    pub id: u64,
    pub action: A,
    pub enqueued_at: Instant,
    /// Channel for settling the caller's [`PendingAction`].
    reply: ReplyTx,
}

impl<A> std::fmt::Debug for QueuedAction<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueuedAction")
            .field("id", &self.id)
            .field("enqueued_at", &self.enqueued_at)
            .field("settled", &self.reply.is_closed())
            .finish()
    }
}

impl<A> QueuedAction<A> {
    /// Create a queued action together with the caller's handle.
    pub fn new(id: u64, action: A) -> (Self, PendingAction) {
        let (reply, rx) = oneshot::channel();
        let queued = Self { id, action, enqueued_at: Instant::now(), reply };
        (queued, PendingAction { id, rx })
    }

    /// Settle the caller. Consumes the entry, so it can only happen once.
    pub fn settle(self, result: ActionResult) {
        // The caller may have dropped its handle; nothing to deliver then.
        let _ = self.reply.send(result);
    }

    pub(crate) fn into_parts(self) -> (A, ReplyTx) {
        (self.action, self.reply)
    }
}

/// Caller-side handle returned by `queue_action`.
///
/// Resolves once the batch containing the action settles. If the coordinator
/// goes away first, it resolves to [`BatchError::Disposed`].
#[derive(Debug)]
#[must_use = "dropping a PendingAction discards the action's outcome"]
pub struct PendingAction {
    id: u64,
    rx: oneshot::Receiver<ActionResult>,
}

impl PendingAction {
    /// Handle that is already settled, used when the coordinator is gone.
    pub(crate) fn settled(id: u64, result: ActionResult) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(result);
        Self { id, rx }
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Future for PendingAction {
    type Output = ActionResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(BatchError::Disposed)))
    }
}

/// FIFO of actions not yet snapshotted into a batch.
#[derive(Debug)]
pub struct ActionQueue<A> {
    entries: Vec<QueuedAction<A>>,
    next_id: u64,
}

impl<A> Default for ActionQueue<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> ActionQueue<A> {
    pub fn new() -> Self {
        Self { entries: Vec::new(), next_id: 1 }
    }

    /// Append an action. Returns the caller's handle.
    pub fn push(&mut self, action: A) -> PendingAction {
        let id = self.next_id;
        self.next_id += 1;
        let (queued, pending) = QueuedAction::new(id, action);
        self.entries.push(queued);
        pending
    }

    /// Take every queued action in insertion order, leaving the queue empty.
    pub fn drain_all(&mut self) -> Vec<QueuedAction<A>> {
        std::mem::take(&mut self.entries)
    }

    /// Reserve an id for an action that never enters the queue.
    pub(crate) fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Time the oldest action has been waiting.
    pub fn oldest_wait(&self) -> Option<std::time::Duration> {
        self.entries.first().map(|q| q.enqueued_at.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_preserves_fifo_and_empties_queue() {
        let mut queue = ActionQueue::new();
        let _a = queue.push("first");
        let _b = queue.push("second");
        let _c = queue.push("third");
        assert_eq!(queue.len(), 3);

        let drained = queue.drain_all();
        let actions: Vec<_> = drained.iter().map(|q| q.action).collect();
        assert_eq!(actions, vec!["first", "second", "third"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn default_queue_starts_empty() {
        let mut queue: ActionQueue<u8> = ActionQueue::default();
        assert!(queue.is_empty());
        assert_eq!(queue.push(1).id(), 1);
    }

    #[test]
    fn ids_are_unique_and_increasing() {
        let mut queue = ActionQueue::new();
        let a = queue.push(());
        let b = queue.push(());
        queue.drain_all();
        let c = queue.push(());
        assert!(a.id() < b.id() && b.id() < c.id());
    }

    #[tokio::test]
    async fn settle_resolves_pending_action() {
        let mut queue = ActionQueue::new();
        let pending = queue.push(7u32);
        let mut drained = queue.drain_all();
        drained.remove(0).settle(Ok(ActionOutcome::ok()));
        assert_eq!(pending.await, Ok(ActionOutcome::ok()));
    }

    #[tokio::test]
    async fn dropped_entry_resolves_disposed() {
        let mut queue = ActionQueue::new();
        let pending = queue.push(7u32);
        drop(queue);
        assert_eq!(pending.await, Err(BatchError::Disposed));
    }

    #[tokio::test(start_paused = true)]
    async fn oldest_wait_tracks_the_head_of_the_queue() {
        let mut queue = ActionQueue::new();
        assert_eq!(queue.oldest_wait(), None);
        let _a = queue.push("a");
        tokio::time::advance(std::time::Duration::from_millis(40)).await;
        let _b = queue.push("b");
        tokio::time::advance(std::time::Duration::from_millis(10)).await;
        assert_eq!(queue.oldest_wait(), Some(std::time::Duration::from_millis(50)));
        queue.drain_all();
        assert_eq!(queue.oldest_wait(), None);
    }

    #[test]
    fn outcome_wire_shape_omits_missing_error() {
        let json = serde_json::to_string(&ActionOutcome::ok()).unwrap();
        assert_eq!(json, r#"{"success":true}"#);
        let parsed: ActionOutcome =
            serde_json::from_str(r#"{"success":false,"error":"nope"}"#).unwrap();
        assert_eq!(parsed, ActionOutcome::failed("nope"));
    }
}
