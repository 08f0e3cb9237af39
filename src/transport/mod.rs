//! Batch transport: wire encoding over an injected HTTP sender.
//!
//! The coordinator never talks to the network directly. It hands an
//! [`HttpRequest`] to an [`HttpSend`] implementation and decodes whatever
//! comes back. Auth, TLS and timeouts are the sender's business.

#[cfg(feature = "http")]
mod reqwest_sender;

#[cfg(feature = "http")]
pub use reqwest_sender::ReqwestSender;

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::coordinator::BatchResult;
use crate::error::{BatchError, TransportError};

/// Outgoing request handed to an [`HttpSend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: &'static str,
    pub headers: Vec<(&'static str, String)>,
    pub body: String,
}

impl HttpRequest {
    /// JSON POST with the given body.
    pub fn post_json(body: String) -> Self {
        Self {
            method: "POST",
            headers: vec![("Content-Type", "application/json".to_string())],
            body,
        }
    }
}

/// Response returned by an [`HttpSend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self { status, body: body.into() }
    }

    /// 2xx status.
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

/// Injected HTTP client.
#[async_trait::async_trait]
pub trait HttpSend: Send + Sync {
    async fn send(&self, endpoint: &str, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

#[derive(Serialize)]
struct BatchRequestBody<'a, B> {
    actions: &'a [B],
}

#[derive(Deserialize)]
struct SuccessEnvelope {
    data: BatchResult,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: Option<String>,
}

/// Encode the request body `{"actions": [...]}`.
pub fn encode_body<B: Serialize>(actions: &[B]) -> Result<String, BatchError> {
    serde_json::to_string(&BatchRequestBody { actions }).map_err(|e| BatchError::Encode(e.to_string()))
}

/// Decode a response into a batch result or the error to hand every caller.
pub fn decode_response(response: &HttpResponse) -> Result<BatchResult, BatchError> {
    if !response.is_ok() {
        let message = response
            .json::<ErrorEnvelope>()
            .ok()
            .and_then(|e| e.error)
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| format!("Batch request failed with status {}", response.status));
        return Err(BatchError::Http { status: response.status, message });
    }
    response
        .json::<SuccessEnvelope>()
        .map(|envelope| envelope.data)
        .map_err(|e| BatchError::InvalidResponse(e.to_string()))
}

/// Sends a batch to one endpoint. Single attempt, no retries.
#[derive(Clone)]
pub struct BatchTransport {
    endpoint: String,
    sender: Arc<dyn HttpSend>,
}

impl BatchTransport {
    pub fn new(endpoint: impl Into<String>, sender: Arc<dyn HttpSend>) -> Self {
        Self { endpoint: endpoint.into(), sender }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn send<B: Serialize>(&self, actions: &[B]) -> Result<BatchResult, BatchError> {
        let body = encode_body(actions)?;
        let response = self.sender.send(&self.endpoint, HttpRequest::post_json(body)).await?;
        decode_response(&response)
    }
}

impl std::fmt::Debug for BatchTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchTransport").field("endpoint", &self.endpoint).finish()
    }
}
