//! Webhook endpoint handlers.
//!
//! A delivery goes through three steps, each of which can reject it:
//! 1. Verify the `Eka-Webhook-Signature` HMAC
//! 2. Validate the event tag and identifiers
//! 3. Fetch the referenced records from the Eka API

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::eka::{ClientError, EkaClient, RecordClient};
use crate::error::WebhookError;
use crate::process::{process_webhook, AggregatedRecords, WebhookEvent};
use crate::web::signature::{verify_signature, SIGNATURE_HEADER};
use crate::Config;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// `None` when Eka client credentials are not configured
    pub client: Option<Arc<dyn RecordClient>>,
}

impl AppState {
    /// Build state with an [`EkaClient`] when credentials are configured.
    pub fn from_config(config: Config) -> Result<Self, ClientError> {
        let client = EkaClient::from_config(&config)?
            .map(|client| Arc::new(client) as Arc<dyn RecordClient>);

        Ok(Self {
            config: Arc::new(config),
            client,
        })
    }

    /// Build state around an existing record client.
    pub fn with_client(config: Config, client: Arc<dyn RecordClient>) -> Self {
        Self {
            config: Arc::new(config),
            client: Some(client),
        }
    }
}

/// Run one delivery through verification, validation and lookups.
///
/// Shared by the HTTP handler and the gateway adapter.
pub async fn handle_delivery(
    state: &AppState,
    signature: Option<&str>,
    body: &[u8],
) -> Result<AggregatedRecords, WebhookError> {
    let config = &state.config;

    let (Some(signing_key), Some(client)) = (&config.webhook_signing_key, &state.client) else {
        warn!(
            signing_key_configured = config.webhook_signing_key.is_some(),
            client_configured = state.client.is_some(),
            "webhook_credentials_missing"
        );
        return Err(WebhookError::MissingCredentials);
    };

    verify_signature(signing_key, signature, body, config.signature_max_age)?;

    let event = WebhookEvent::from_slice(body, |tag| config.is_event_allowed(tag)).map_err(|e| {
        warn!(error = %e, "webhook_payload_rejected");
        e
    })?;

    info!(
        event = %event.event,
        appointment_id = %event.data.appointment_id,
        "webhook_accepted"
    );

    process_webhook(&**client, &event).await
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// =============================================================================
// Eka Webhook
// =============================================================================

/// Eka webhook endpoint.
///
/// Answers 200 with the aggregated records, or the status of the
/// [`WebhookError`] that stopped the delivery.
pub async fn eka_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<AggregatedRecords>, WebhookError> {
    let signature = headers.get(SIGNATURE_HEADER);

    info!(
        body_length = body.len(),
        has_signature = signature.is_some(),
        "webhook_received"
    );

    // Non-ASCII bytes are kept lossily so the value still fails parsing in order
    let signature = signature.map(|value| String::from_utf8_lossy(value.as_bytes()));

    match handle_delivery(&state, signature.as_deref(), &body).await {
        Ok(records) => {
            info!(event = %records.event, "webhook_complete");
            Ok(Json(records))
        }
        Err(e) => {
            warn!(status_code = e.status().as_u16(), kind = e.kind(), "webhook_failed");
            Err(e)
        }
    }
}

/// Fallback for unmatched routes and methods.
pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Not Found")
}
