//! Error types for the webhook pipeline and their HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::eka::ClientError;

/// Everything that can stop a webhook delivery from producing records.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("webhook signing key or Eka client credentials are not configured")]
    MissingCredentials,

    #[error("missing Eka-Webhook-Signature header")]
    MissingSignature,

    #[error("invalid signature header: {0}")]
    InvalidFormat(String),

    #[error("signature mismatch")]
    SignatureMismatch,

    #[error("signature timestamp is {age_seconds}s old")]
    StaleTimestamp { age_seconds: u64 },

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("unsupported event type: {0:?}")]
    UnsupportedEvent(String),

    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("upstream request failed: {0}")]
    Upstream(#[from] ClientError),
}

impl WebhookError {
    /// HTTP status code the handler answers with.
    pub fn status(&self) -> StatusCode {
        match self {
            WebhookError::MissingCredentials => StatusCode::BAD_REQUEST,
            WebhookError::MissingSignature
            | WebhookError::InvalidFormat(_)
            | WebhookError::SignatureMismatch
            | WebhookError::StaleTimestamp { .. }
            | WebhookError::InvalidPayload(_)
            | WebhookError::UnsupportedEvent(_)
            | WebhookError::MissingField(_) => StatusCode::FORBIDDEN,
            WebhookError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short machine-readable tag used in response bodies and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            WebhookError::MissingCredentials => "missing_credentials",
            WebhookError::MissingSignature => "missing_signature",
            WebhookError::InvalidFormat(_) => "invalid_format",
            WebhookError::SignatureMismatch => "signature_mismatch",
            WebhookError::StaleTimestamp { .. } => "stale_timestamp",
            WebhookError::InvalidPayload(_) => "invalid_payload",
            WebhookError::UnsupportedEvent(_) => "unsupported_event",
            WebhookError::MissingField(_) => "missing_field",
            WebhookError::Upstream(_) => "upstream_error",
        }
    }

    /// JSON body sent back to the caller.
    pub fn body(&self) -> ErrorResponse {
        // Upstream details can carry patient data; keep them in the logs only.
        let error = match self {
            WebhookError::Upstream(_) => "Internal Error".to_string(),
            other => other.to_string(),
        };
        ErrorResponse {
            status: self.kind(),
            error,
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub status: &'static str,
    pub error: String,
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}
