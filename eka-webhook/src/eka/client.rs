//! HTTP client for the Eka Care API.
//!
//! Authenticates with client credentials on first use and caches the access
//! token for later lookups. A 401 drops the cached token so the next
//! delivery logs in again.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{info, warn};
use url::Url;

use super::{ClientError, RecordClient, RecordKind};
use crate::Config;

/// Longest slice of an error body kept for logs.
const BODY_PREVIEW_CHARS: usize = 200;

#[derive(Serialize)]
struct LoginRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    #[serde(default)]
    access_token: Option<String>,
}

/// Eka API client authenticated with a client id and secret.
pub struct EkaClient {
    http: Client,
    base_url: Url,
    client_id: String,
    client_secret: String,
    token: RwLock<Option<String>>,
}

impl EkaClient {
    /// Create a client for the API at `base_url`.
    pub fn new(
        base_url: &str,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let base_url =
            Url::parse(base_url).map_err(|e| ClientError::InvalidBaseUrl(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidBaseUrl(base_url.to_string()));
        }

        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            base_url,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            token: RwLock::new(None),
        })
    }

    /// Build a client from configuration.
    ///
    /// Returns `Ok(None)` when the client id or secret is not configured.
    pub fn from_config(config: &Config) -> Result<Option<Self>, ClientError> {
        let Some((client_id, client_secret)) = config.client_credentials() else {
            return Ok(None);
        };

        Self::new(
            &config.api_base_url,
            client_id,
            client_secret,
            Duration::from_millis(config.request_timeout_ms),
        )
        .map(Some)
    }

    /// URL of `segments` appended to the base URL, each segment percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Return the cached access token, logging in if there is none.
    async fn access_token(&self) -> Result<String, ClientError> {
        {
            let token = self.token.read().await;
            if let Some(token) = token.as_ref() {
                return Ok(token.clone());
            }
        }

        let mut token = self.token.write().await;

        // Double-check after acquiring write lock
        if let Some(existing) = token.as_ref() {
            return Ok(existing.clone());
        }

        let fresh = self.login().await?;
        *token = Some(fresh.clone());
        Ok(fresh)
    }

    /// Drop the cached token if it is still the one that was rejected.
    async fn invalidate_token(&self, rejected: &str) {
        let mut token = self.token.write().await;
        if token.as_deref() == Some(rejected) {
            token.take();
        }
    }

    async fn login(&self) -> Result<String, ClientError> {
        let url = self.endpoint(&["connect-auth", "v1", "account", "login"])?;

        info!("eka_login_starting");

        let response = self
            .http
            .post(url)
            .json(&LoginRequest {
                client_id: &self.client_id,
                client_secret: &self.client_secret,
            })
            .send()
            .await?;

        let body = read_success_body("login", response).await?;
        let parsed: LoginResponse = serde_json::from_str(&body)?;

        let token = parsed
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or(ClientError::MissingToken)?;

        info!("eka_login_complete");

        Ok(token)
    }
}

#[async_trait]
impl RecordClient for EkaClient {
    async fn fetch_record(&self, kind: RecordKind, id: &str) -> Result<Value, ClientError> {
        let token = self.access_token().await?;

        let mut segments = kind.path_segments().to_vec();
        segments.push(id);
        let url = self.endpoint(&segments)?;

        info!(resource = kind.as_str(), id = %id, "eka_fetch_starting");

        let response = self.http.get(url).bearer_auth(&token).send().await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            warn!(resource = kind.as_str(), "eka_token_rejected");
            self.invalidate_token(&token).await;
        }

        let body = read_success_body(kind.as_str(), response).await?;
        let record: Value = serde_json::from_str(&body)?;

        info!(resource = kind.as_str(), id = %id, "eka_fetch_complete");

        Ok(record)
    }
}

/// Read the body of a 2xx response, turning other statuses into errors.
async fn read_success_body(
    resource: &'static str,
    response: reqwest::Response,
) -> Result<String, ClientError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        let preview: String = body.chars().take(BODY_PREVIEW_CHARS).collect();
        warn!(
            resource = resource,
            status_code = status.as_u16(),
            body_preview = %preview,
            "eka_request_failed"
        );
        return Err(ClientError::Status {
            resource,
            status: status.as_u16(),
            body: preview,
        });
    }

    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount_login(server: &MockServer, token: &str) {
        Mock::given(method("POST"))
            .and(path("/connect-auth/v1/account/login"))
            .and(body_json(json!({"client_id": "cid", "client_secret": "secret"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": token,
                "refresh_token": "unused"
            })))
            .mount(server)
            .await;
    }

    fn client_for(server: &MockServer) -> EkaClient {
        EkaClient::new(&server.uri(), "cid", "secret", Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_record_uses_bearer_token() {
        let server = MockServer::start().await;
        mount_login(&server, "tok-1").await;

        Mock::given(method("GET"))
            .and(path("/dr/v1/business/clinic/c-9"))
            .and(header("authorization", "Bearer tok-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "Clinic"})))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let clinic = client.clinic("c-9").await.unwrap();

        assert_eq!(clinic, json!({"name": "Clinic"}));
    }

    #[tokio::test]
    async fn test_login_happens_once() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/connect-auth/v1/account/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "t"})))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let client = client_for(&server);
        client.patient("p1").await.unwrap();
        client.doctor("d1").await.unwrap();
    }

    #[tokio::test]
    async fn test_ids_are_percent_encoded() {
        let server = MockServer::start().await;
        mount_login(&server, "tok").await;

        Mock::given(method("GET"))
            .and(path("/dr/v1/patient/a%2Fb"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "a/b"})))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let patient = client.patient("a/b").await.unwrap();

        assert_eq!(patient["id"], "a/b");
    }

    #[tokio::test]
    async fn test_non_success_status_is_error() {
        let server = MockServer::start().await;
        mount_login(&server, "tok").await;

        Mock::given(method("GET"))
            .and(path("/dr/v1/appointment/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.appointment("missing").await.unwrap_err();

        match err {
            ClientError::Status { resource, status, body } => {
                assert_eq!(resource, "appointment");
                assert_eq!(status, 404);
                assert_eq!(body, "not found");
            }
            other => panic!("Expected Status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_login_without_token() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/connect-auth/v1/account/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"error": "nope"})))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert!(matches!(
            client.doctor("d1").await,
            Err(ClientError::MissingToken)
        ));
    }

    #[tokio::test]
    async fn test_unauthorized_clears_token() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/connect-auth/v1/account/login"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "t"})))
            .expect(2)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert!(client.doctor("d1").await.is_err());
        assert!(client.doctor("d1").await.is_err());
    }

    #[tokio::test]
    async fn test_invalidate_keeps_newer_token() {
        let client =
            EkaClient::new("https://api.example.com", "id", "secret", Duration::from_secs(1))
                .unwrap();
        *client.token.write().await = Some("newer".to_string());

        client.invalidate_token("older").await;
        assert_eq!(client.token.read().await.as_deref(), Some("newer"));

        client.invalidate_token("newer").await;
        assert!(client.token.read().await.is_none());
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            EkaClient::new("not a url", "id", "secret", Duration::from_secs(1)),
            Err(ClientError::InvalidBaseUrl(_))
        ));
        assert!(matches!(
            EkaClient::new("mailto:ops@example.com", "id", "secret", Duration::from_secs(1)),
            Err(ClientError::InvalidBaseUrl(_))
        ));
    }

    #[test]
    fn test_from_config_without_credentials() {
        let config = Config::default();
        assert!(EkaClient::from_config(&config).unwrap().is_none());
    }

    #[test]
    fn test_endpoint_with_base_path() {
        let client = EkaClient::new(
            "https://api.example.com/eka/",
            "id",
            "secret",
            Duration::from_secs(1),
        )
        .unwrap();
        let url = client.endpoint(&["dr", "v1", "doctor", "d 1"]).unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/eka/dr/v1/doctor/d%201");
    }
}
