//! Eka webhook receiver.
//!
//! Verifies signed Eka Care appointment webhooks, fetches the appointment,
//! patient, clinic and doctor records they refer to, and answers with the
//! combined result. Two binaries share the pipeline:
//! - `eka-webhook`: HTTP server
//! - `eka-webhook-invoke`: handles one API gateway event from stdin
//!
//! ## Pipeline
//!
//! ```text
//! request → verify_signature → WebhookEvent → process_webhook → AggregatedRecords
//! ```

pub mod config;
pub mod eka;
pub mod error;
pub mod gateway;
pub mod process;
pub mod web;

// Re-export commonly used types
pub use config::Config;
pub use eka::{ClientError, EkaClient, RecordClient, RecordKind};
pub use error::WebhookError;
pub use gateway::{handle_gateway_event, GatewayEvent, GatewayResponse};
pub use process::{process_webhook, AggregatedRecords, WebhookEvent};
pub use web::{router, AppState};
