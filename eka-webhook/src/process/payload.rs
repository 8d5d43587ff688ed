//! Webhook payload types and validation.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::WebhookError;

/// Identifier fields every supported event must carry, in check order.
pub const REQUIRED_FIELDS: [&str; 4] = ["appointment_id", "patient_id", "clinic_id", "doctor_id"];

/// A validated webhook delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookEvent {
    /// Event tag, e.g. `appointment.created`
    pub event: String,
    /// Identifiers of the records the event refers to
    pub data: EventData,
}

/// Identifiers carried in the `data` object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventData {
    pub appointment_id: String,
    pub patient_id: String,
    pub clinic_id: String,
    pub doctor_id: String,
}

impl WebhookEvent {
    /// Validate a raw JSON body.
    ///
    /// The event tag must pass `is_allowed`; the identifiers are then checked
    /// in [`REQUIRED_FIELDS`] order and the first absent, empty or non-string
    /// one is reported.
    pub fn from_slice(body: &[u8], is_allowed: impl Fn(&str) -> bool) -> Result<Self, WebhookError> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| WebhookError::InvalidPayload(e.to_string()))?;

        let object = value
            .as_object()
            .ok_or_else(|| WebhookError::InvalidPayload("body is not a JSON object".to_string()))?;

        let event = object
            .get("event")
            .and_then(Value::as_str)
            .unwrap_or_default();

        if !is_allowed(event) {
            return Err(WebhookError::UnsupportedEvent(event.to_string()));
        }

        let empty = Map::new();
        let data = match object.get("data") {
            Some(Value::Object(data)) => data,
            Some(Value::Null) | None => &empty,
            Some(_) => {
                return Err(WebhookError::InvalidPayload(
                    "'data' is not a JSON object".to_string(),
                ))
            }
        };

        Ok(WebhookEvent {
            event: event.to_string(),
            data: EventData {
                appointment_id: required_string(data, "appointment_id")?,
                patient_id: required_string(data, "patient_id")?,
                clinic_id: required_string(data, "clinic_id")?,
                doctor_id: required_string(data, "doctor_id")?,
            },
        })
    }
}

fn required_string(data: &Map<String, Value>, name: &'static str) -> Result<String, WebhookError> {
    data.get(name)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or(WebhookError::MissingField(name))
}
