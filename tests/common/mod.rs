//! Shared fixtures: a scripted in-memory `HttpSend` and sample actions.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use action_batcher::{HttpRequest, HttpResponse, HttpSend, TransportError};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Action {
    Activate { id: String },
    Deactivate { id: String },
}

impl Action {
    pub fn id(&self) -> &str {
        match self {
            Action::Activate { id } | Action::Deactivate { id } => id,
        }
    }
}

pub fn activate(id: &str) -> Action {
    Action::Activate { id: id.to_string() }
}

pub fn deactivate(id: &str) -> Action {
    Action::Deactivate { id: id.to_string() }
}

/// What the mock answers with for one call.
#[derive(Debug, Clone)]
pub enum Reply {
    Http(u16, String),
    NetworkError(String),
    /// The sender itself panics.
    Panic(String),
}

impl Reply {
    pub fn success(count: usize) -> Self {
        let results: Vec<(bool, Option<&str>)> = (0..count).map(|_| (true, None)).collect();
        Self::results(&results)
    }

    /// 200 response carrying the given per-action results.
    pub fn results(results: &[(bool, Option<&str>)]) -> Self {
        let items: Vec<serde_json::Value> = results
            .iter()
            .map(|(success, error)| match error {
                Some(e) => serde_json::json!({ "success": success, "error": e }),
                None => serde_json::json!({ "success": success }),
            })
            .collect();
        let ok = results.iter().filter(|(s, _)| *s).count();
        let body = serde_json::json!({
            "data": {
                "results": items,
                "summary": { "total": results.len(), "success": ok, "errors": results.len() - ok }
            }
        });
        Self::Http(200, body.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub at: Instant,
    pub endpoint: String,
    pub request: HttpRequest,
}

impl RecordedCall {
    pub fn body_json(&self) -> serde_json::Value {
        serde_json::from_str(&self.request.body).expect("request body is JSON")
    }

    pub fn action_ids(&self) -> Vec<String> {
        self.body_json()["actions"]
            .as_array()
            .expect("actions array")
            .iter()
            .map(|a| a["id"].as_str().unwrap_or_default().to_string())
            .collect()
    }
}

/// Answers from a script, then with an empty success.
pub struct ScriptedSender {
    script: Mutex<VecDeque<Reply>>,
    delay: Duration,
    calls: Mutex<Vec<RecordedCall>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl ScriptedSender {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            delay: Duration::ZERO,
            calls: Mutex::new(Vec::new()),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
        }
    }

    /// Simulated network latency per call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn then(self, reply: Reply) -> Self {
        self.script.lock().push_back(reply);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl HttpSend for ScriptedSender {
    async fn send(&self, endpoint: &str, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.calls.lock().push(RecordedCall {
            at: Instant::now(),
            endpoint: endpoint.to_string(),
            request,
        });
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let reply = self.script.lock().pop_front().unwrap_or_else(|| Reply::success(0));
        self.active.fetch_sub(1, Ordering::SeqCst);

        match reply {
            Reply::Http(status, body) => Ok(HttpResponse::new(status, body)),
            Reply::NetworkError(message) => Err(TransportError::new(message)),
            Reply::Panic(message) => panic!("{message}"),
        }
    }
}

/// Assert `actual` is within a couple of timer ticks of `expected`.
pub fn assert_near(actual: Duration, expected: Duration) {
    let tolerance = Duration::from_millis(2);
    assert!(
        actual >= expected && actual <= expected + tolerance,
        "expected ~{expected:?}, got {actual:?}"
    );
}
