//! Eka Care API access.
//!
//! The webhook pipeline only needs four record lookups. They sit behind the
//! [`RecordClient`] trait so the HTTP-backed [`EkaClient`] can be swapped for
//! an in-memory source in tests.

pub mod client;

use async_trait::async_trait;
use serde_json::Value;

pub use client::EkaClient;

/// Record types the webhook aggregates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Appointment,
    Patient,
    Clinic,
    Doctor,
}

impl RecordKind {
    /// Path segments of the lookup endpoint, before the id.
    pub fn path_segments(self) -> &'static [&'static str] {
        match self {
            RecordKind::Appointment => &["dr", "v1", "appointment"],
            RecordKind::Patient => &["dr", "v1", "patient"],
            RecordKind::Clinic => &["dr", "v1", "business", "clinic"],
            RecordKind::Doctor => &["dr", "v1", "business", "doctor"],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RecordKind::Appointment => "appointment",
            RecordKind::Patient => "patient",
            RecordKind::Clinic => "clinic",
            RecordKind::Doctor => "doctor",
        }
    }
}

/// Errors raised while talking to the Eka API.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid API base URL: {0}")]
    InvalidBaseUrl(String),

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("{resource} request returned {status}: {body}")]
    Status {
        resource: &'static str,
        status: u16,
        body: String,
    },

    #[error("response was not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("login response did not contain an access token")]
    MissingToken,
}

/// Source of appointment, patient, clinic and doctor records.
#[async_trait]
pub trait RecordClient: Send + Sync {
    /// Fetch one record by id.
    async fn fetch_record(&self, kind: RecordKind, id: &str) -> Result<Value, ClientError>;

    async fn appointment(&self, appointment_id: &str) -> Result<Value, ClientError> {
        self.fetch_record(RecordKind::Appointment, appointment_id).await
    }

    async fn patient(&self, patient_id: &str) -> Result<Value, ClientError> {
        self.fetch_record(RecordKind::Patient, patient_id).await
    }

    async fn clinic(&self, clinic_id: &str) -> Result<Value, ClientError> {
        self.fetch_record(RecordKind::Clinic, clinic_id).await
    }

    async fn doctor(&self, doctor_id: &str) -> Result<Value, ClientError> {
        self.fetch_record(RecordKind::Doctor, doctor_id).await
    }
}
