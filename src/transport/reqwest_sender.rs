//! `HttpSend` over a shared `reqwest::Client`.

use std::time::Duration;

use super::{HttpRequest, HttpResponse, HttpSend};
use crate::error::TransportError;

/// Default request timeout for the bundled sender.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct ReqwestSender {
    client: reqwest::Client,
    bearer_token: Option<String>,
}

impl ReqwestSender {
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| TransportError::new(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, bearer_token: None })
    }

    /// Wrap an existing client, e.g. one carrying cookies or custom TLS.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client, bearer_token: None }
    }

    /// Attach `Authorization: Bearer <token>` to every request.
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }
}

#[async_trait::async_trait]
impl HttpSend for ReqwestSender {
    async fn send(&self, endpoint: &str, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|e| TransportError::new(e.to_string()))?;
        let mut builder = self.client.request(method, endpoint).body(request.body);
        for (name, value) in request.headers {
            builder = builder.header(name, value);
        }
        if let Some(token) = &self.bearer_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await.map_err(|e| TransportError::new(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| TransportError::new(e.to_string()))?;
        Ok(HttpResponse { status, body })
    }
}
