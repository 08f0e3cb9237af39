//! Error types for the batch coordinator.
//!
//! A single batch outcome is delivered to every caller in that batch, so
//! `BatchError` is `Clone` and carries owned messages only.

use thiserror::Error;

/// Fallback message when the sender fails without saying why.
pub const NETWORK_ERROR_FALLBACK: &str = "Network error: unable to reach the batch endpoint";

/// Fallback message when a per-action failure carries no `error` field.
pub const ACTION_FAILED_FALLBACK: &str = "Batch action failed";

/// Errors delivered to callers awaiting a queued action.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BatchError {
    /// The sender failed before any response was received.
    #[error("{0}")]
    Transport(String),

    /// The endpoint answered with a non-success status.
    #[error("{message}")]
    Http { status: u16, message: String },

    /// The endpoint reported at least one failed action in the batch.
    #[error("{0}")]
    ActionFailed(String),

    #[error("invalid batch response: {0}")]
    InvalidResponse(String),

    #[error("failed to encode batch: {0}")]
    Encode(String),

    /// The coordinator was torn down before the action was sent.
    #[error("batch coordinator disposed before the action was sent")]
    Disposed,

    /// The optimizer or the sender panicked while handling the batch.
    #[error("{0}")]
    Internal(String),
}

impl BatchError {
    /// Returns true if no response was ever received for the batch.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Disposed)
    }

    /// Short label for metrics and span fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::Http { .. } => "http",
            Self::ActionFailed(_) => "action_failed",
            Self::InvalidResponse(_) => "invalid_response",
            Self::Encode(_) => "encode",
            Self::Disposed => "disposed",
            Self::Internal(_) => "internal",
        }
    }
}

/// Error raised by an [`HttpSend`](crate::transport::HttpSend) implementation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct TransportError {
    message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<TransportError> for BatchError {
    fn from(err: TransportError) -> Self {
        if err.message.trim().is_empty() {
            Self::Transport(NETWORK_ERROR_FALLBACK.to_string())
        } else {
            Self::Transport(err.message)
        }
    }
}

/// Text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_the_carried_message() {
        assert_eq!(BatchError::ActionFailed("Item 2 not found".into()).to_string(), "Item 2 not found");
        let http = BatchError::Http { status: 403, message: "Forbidden".into() };
        assert_eq!(http.to_string(), "Forbidden");
    }

    #[test]
    fn empty_transport_message_falls_back() {
        let err: BatchError = TransportError::new("  ").into();
        assert_eq!(err, BatchError::Transport(NETWORK_ERROR_FALLBACK.into()));

        let err: BatchError = TransportError::new("connection refused").into();
        assert_eq!(err.to_string(), "connection refused");
        assert!(err.is_transport());
    }

    #[test]
    fn panic_payload_text_is_recovered() {
        let payload = std::panic::catch_unwind(|| panic!("boom {}", 7)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "boom 7");
        let payload = std::panic::catch_unwind(|| panic!("static")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "static");
        assert_eq!(BatchError::Internal("x".into()).kind(), "internal");
    }
}
