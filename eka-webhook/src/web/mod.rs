//! Web server module for handling inbound Eka webhooks.
//!
//! `POST /webhook` and `POST /` run a delivery through signature
//! verification, payload validation and record lookups. Every other
//! route or method answers 404.

pub mod handlers;
pub mod signature;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub use handlers::{eka_webhook, handle_delivery, health, not_found, AppState, HealthResponse};
pub use signature::{compute_signature, verify_signature, SignatureHeader, SIGNATURE_HEADER};

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let webhook = post(eka_webhook).fallback(not_found);

    Router::new()
        .route("/health", get(health).fallback(not_found))
        .route("/webhook", webhook.clone())
        .route("/", webhook)
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
