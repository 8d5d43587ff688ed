//! API gateway event adapter.
//!
//! Lets the receiver run as a serverless function: one gateway event in,
//! one `{statusCode, headers, body}` response out. Both the v1
//! (`path`/`httpMethod`) and v2 (`rawPath`/`requestContext.http.method`)
//! envelope shapes are accepted, and routing matches the HTTP server.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ErrorResponse, WebhookError};
use crate::web::{handle_delivery, AppState, HealthResponse, SIGNATURE_HEADER};

/// Incoming gateway event.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayEvent {
    #[serde(default)]
    pub raw_path: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub http_method: Option<String>,
    #[serde(default)]
    pub request_context: Option<RequestContext>,
    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub is_base64_encoded: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestContext {
    #[serde(default)]
    pub http: Option<HttpContext>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HttpContext {
    #[serde(default)]
    pub method: Option<String>,
}

impl GatewayEvent {
    /// Request path, preferring `rawPath`.
    pub fn path(&self) -> &str {
        self.raw_path
            .as_deref()
            .or(self.path.as_deref())
            .unwrap_or_default()
    }

    /// Request method, preferring `requestContext.http.method`.
    pub fn method(&self) -> &str {
        self.request_context
            .as_ref()
            .and_then(|ctx| ctx.http.as_ref())
            .and_then(|http| http.method.as_deref())
            .or(self.http_method.as_deref())
            .unwrap_or_default()
    }

    /// Header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .as_ref()?
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Response handed back to the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl GatewayResponse {
    fn json<T: Serialize>(status_code: u16, value: &T) -> Self {
        match serde_json::to_string(value) {
            Ok(body) => Self::with_content_type(status_code, "application/json", body),
            Err(e) => {
                warn!(error = %e, "gateway_response_serialize_failed");
                Self::text(500, "Internal Error")
            }
        }
    }

    fn text(status_code: u16, body: &str) -> Self {
        Self::with_content_type(status_code, "text/plain; charset=utf-8", body.to_string())
    }

    fn with_content_type(status_code: u16, content_type: &str, body: String) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("content-type".to_string(), content_type.to_string());
        Self {
            status_code,
            headers,
            body,
        }
    }

    fn from_error(error: &WebhookError) -> Self {
        Self::json(error.status().as_u16(), &error.body())
    }
}

/// Route and handle one gateway event.
pub async fn handle_gateway_event(state: &AppState, event: &GatewayEvent) -> GatewayResponse {
    let method = event.method();
    let path = event.path();

    info!(method = %method, path = %path, "gateway_event_received");

    let is_post = method.eq_ignore_ascii_case("POST");
    let is_get = method.eq_ignore_ascii_case("GET");

    match path {
        "/webhook" | "/" if is_post => deliver(state, event).await,
        "/health" if is_get => GatewayResponse::json(200, &HealthResponse { status: "ok" }),
        _ => {
            info!(method = %method, path = %path, "gateway_route_not_found");
            GatewayResponse::text(404, "Not Found")
        }
    }
}

async fn deliver(state: &AppState, event: &GatewayEvent) -> GatewayResponse {
    if event.is_base64_encoded {
        warn!("gateway_base64_body_rejected");
        return GatewayResponse::json(
            400,
            &ErrorResponse {
                status: "unsupported_encoding",
                error: "base64-encoded bodies are not supported".to_string(),
            },
        );
    }

    let body = event.body.as_deref().unwrap_or_default();
    let signature = event.header(SIGNATURE_HEADER);

    match handle_delivery(state, signature, body.as_bytes()).await {
        Ok(records) => {
            info!(event = %records.event, "gateway_webhook_complete");
            GatewayResponse::json(200, &records)
        }
        Err(e) => {
            warn!(status_code = e.status().as_u16(), kind = e.kind(), "gateway_webhook_failed");
            GatewayResponse::from_error(&e)
        }
    }
}
