//! Webhook payload processing.
//!
//! Turns a validated [`WebhookEvent`] into [`AggregatedRecords`] by looking
//! up each referenced record in turn.
//!
//! ```text
//! raw body → WebhookEvent::from_slice() → process_webhook() → AggregatedRecords
//! ```

pub mod payload;

use serde::Serialize;
use serde_json::Value;
use tracing::{error, info};

use crate::eka::{ClientError, RecordClient, RecordKind};
use crate::error::WebhookError;

pub use payload::{EventData, WebhookEvent, REQUIRED_FIELDS};

/// Records referenced by a webhook event, as returned by the Eka API.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedRecords {
    pub event: String,
    pub appointment: Value,
    pub patient: Value,
    pub clinic: Value,
    pub doctor: Value,
}

/// Fetch every record the event refers to.
///
/// Lookups run one after another; the first failure aborts the rest.
pub async fn process_webhook(
    client: &dyn RecordClient,
    event: &WebhookEvent,
) -> Result<AggregatedRecords, WebhookError> {
    let data = &event.data;

    info!(
        event = %event.event,
        appointment_id = %data.appointment_id,
        "webhook_process_start"
    );

    let appointment = client.appointment(&data.appointment_id).await;
    let appointment = traced(RecordKind::Appointment, appointment)?;

    let patient = traced(RecordKind::Patient, client.patient(&data.patient_id).await)?;
    let clinic = traced(RecordKind::Clinic, client.clinic(&data.clinic_id).await)?;
    let doctor = traced(RecordKind::Doctor, client.doctor(&data.doctor_id).await)?;

    info!(
        event = %event.event,
        appointment_id = %data.appointment_id,
        "webhook_process_complete"
    );

    Ok(AggregatedRecords {
        event: event.event.clone(),
        appointment,
        patient,
        clinic,
        doctor,
    })
}

fn traced(kind: RecordKind, result: Result<Value, ClientError>) -> Result<Value, WebhookError> {
    result.map_err(|e| {
        error!(resource = kind.as_str(), error = %e, "webhook_lookup_failed");
        WebhookError::Upstream(e)
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;

    /// Serves `{"kind": ..., "id": ...}` and records every lookup.
    #[derive(Default)]
    struct EchoClient {
        calls: Mutex<Vec<(RecordKind, String)>>,
        fail_on: Option<RecordKind>,
    }

    #[async_trait]
    impl RecordClient for EchoClient {
        async fn fetch_record(&self, kind: RecordKind, id: &str) -> Result<Value, ClientError> {
            self.calls.lock().unwrap().push((kind, id.to_string()));
            if self.fail_on == Some(kind) {
                return Err(ClientError::Status {
                    resource: kind.as_str(),
                    status: 500,
                    body: "boom".to_string(),
                });
            }
            Ok(json!({"kind": kind.as_str(), "id": id}))
        }
    }

    fn event() -> WebhookEvent {
        WebhookEvent {
            event: "appointment.created".to_string(),
            data: EventData {
                appointment_id: "a1".to_string(),
                patient_id: "p1".to_string(),
                clinic_id: "c1".to_string(),
                doctor_id: "d1".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_process_webhook_aggregates_records() {
        let client = EchoClient::default();

        let records = process_webhook(&client, &event()).await.unwrap();

        assert_eq!(records.event, "appointment.created");
        assert_eq!(records.appointment, json!({"kind": "appointment", "id": "a1"}));
        assert_eq!(records.patient, json!({"kind": "patient", "id": "p1"}));
        assert_eq!(records.clinic, json!({"kind": "clinic", "id": "c1"}));
        assert_eq!(records.doctor, json!({"kind": "doctor", "id": "d1"}));
    }

    #[tokio::test]
    async fn test_process_webhook_lookup_order() {
        let client = EchoClient::default();

        process_webhook(&client, &event()).await.unwrap();

        let kinds: Vec<RecordKind> =
            client.calls.lock().unwrap().iter().map(|(kind, _)| *kind).collect();
        assert_eq!(
            kinds,
            vec![
                RecordKind::Appointment,
                RecordKind::Patient,
                RecordKind::Clinic,
                RecordKind::Doctor
            ]
        );
    }

    #[tokio::test]
    async fn test_process_webhook_stops_on_failure() {
        let client = EchoClient {
            fail_on: Some(RecordKind::Patient),
            ..Default::default()
        };

        let err = process_webhook(&client, &event()).await.unwrap_err();

        assert!(matches!(err, WebhookError::Upstream(_)));
        assert_eq!(client.calls.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_aggregated_records_serialization() {
        let records = AggregatedRecords {
            event: "appointment.updated".to_string(),
            appointment: json!({"id": "a1"}),
            patient: json!({}),
            clinic: json!({}),
            doctor: json!({}),
        };

        let json = serde_json::to_value(&records).unwrap();
        assert_eq!(json["event"], "appointment.updated");
        assert_eq!(json["appointment"]["id"], "a1");
    }
}
