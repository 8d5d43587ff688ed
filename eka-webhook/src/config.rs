//! Configuration module for environment variable parsing.
//!
//! All settings come from environment variables. Blank values count as unset.

use std::env;
use tracing::warn;

/// Events accepted when `EKA_ALLOWED_EVENTS` is not set.
pub const DEFAULT_ALLOWED_EVENTS: &[&str] = &[
    "appointment.created",
    "appointment.updated",
    "appointment.rescheduled",
    "appointment.cancelled",
];

/// Default Eka API host.
pub const DEFAULT_API_BASE_URL: &str = "https://api.eka.care";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the web server to listen on
    pub port: u16,

    /// Shared secret for the `Eka-Webhook-Signature` HMAC
    pub webhook_signing_key: Option<String>,

    /// Eka API client id
    pub client_id: Option<String>,

    /// Eka API client secret
    pub client_secret: Option<String>,

    /// Base URL of the Eka API
    pub api_base_url: String,

    /// Event tags the dispatcher accepts
    pub allowed_events: Vec<String>,

    /// Maximum age in seconds for signature timestamps (disabled when unset)
    pub signature_max_age: Option<u64>,

    /// HTTP request timeout in milliseconds
    pub request_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: 8080,
            webhook_signing_key: None,
            client_id: None,
            client_secret: None,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            allowed_events: DEFAULT_ALLOWED_EVENTS.iter().map(|s| s.to_string()).collect(),
            signature_max_age: None,
            request_timeout_ms: 8000,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Config::default();

        Config {
            port: parse_number("PORT").unwrap_or(defaults.port),

            webhook_signing_key: non_empty_var("EKA_WEBHOOK_SIGNING_KEY"),

            client_id: non_empty_var("EKA_CLIENT_ID"),

            client_secret: non_empty_var("EKA_CLIENT_SECRET"),

            api_base_url: non_empty_var("EKA_API_BASE_URL").unwrap_or(defaults.api_base_url),

            allowed_events: parse_csv("EKA_ALLOWED_EVENTS")
                .filter(|events| !events.is_empty())
                .unwrap_or(defaults.allowed_events),

            signature_max_age: parse_number("EKA_SIGNATURE_MAX_AGE"),

            request_timeout_ms: parse_number("REQUEST_TIMEOUT_MS")
                .unwrap_or(defaults.request_timeout_ms),
        }
    }

    /// Client id and secret, when both are configured.
    pub fn client_credentials(&self) -> Option<(&str, &str)> {
        match (&self.client_id, &self.client_secret) {
            (Some(id), Some(secret)) => Some((id.as_str(), secret.as_str())),
            _ => None,
        }
    }

    /// Whether `event` is in the allow-list.
    pub fn is_event_allowed(&self, event: &str) -> bool {
        self.allowed_events.iter().any(|e| e == event)
    }
}

/// Read a variable, treating blank values as unset.
fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse a numeric variable, warning when the value is not a number.
fn parse_number<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = non_empty_var(name)?;
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(env_var = name, value = %raw, "Invalid number, using default");
            None
        }
    }
}

/// Parse a comma-separated list of strings.
fn parse_csv(name: &str) -> Option<Vec<String>> {
    env::var(name).ok().map(|raw| {
        raw.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_number_valid() {
        env::set_var("TEST_CFG_NUMBER", "300");
        assert_eq!(parse_number::<u64>("TEST_CFG_NUMBER"), Some(300));
        env::remove_var("TEST_CFG_NUMBER");
    }

    #[test]
    fn test_parse_number_invalid() {
        env::set_var("TEST_CFG_BAD_NUMBER", "five");
        assert_eq!(parse_number::<u64>("TEST_CFG_BAD_NUMBER"), None);
        env::remove_var("TEST_CFG_BAD_NUMBER");
    }

    #[test]
    fn test_parse_csv() {
        env::set_var("TEST_CFG_CSV", "appointment.created, ,appointment.updated");
        let result = parse_csv("TEST_CFG_CSV");
        assert_eq!(
            result,
            Some(vec![
                "appointment.created".to_string(),
                "appointment.updated".to_string()
            ])
        );
        env::remove_var("TEST_CFG_CSV");
    }

    #[test]
    fn test_non_empty_var_blank() {
        env::set_var("TEST_CFG_BLANK", "   ");
        assert_eq!(non_empty_var("TEST_CFG_BLANK"), None);
        env::remove_var("TEST_CFG_BLANK");
    }

    #[test]
    fn test_client_credentials_requires_both() {
        let mut config = Config {
            client_id: Some("id".to_string()),
            ..Config::default()
        };
        assert!(config.client_credentials().is_none());

        config.client_secret = Some("secret".to_string());
        assert_eq!(config.client_credentials(), Some(("id", "secret")));
    }

    #[test]
    fn test_default_allow_list() {
        let config = Config::default();
        assert!(config.is_event_allowed("appointment.created"));
        assert!(!config.is_event_allowed("invoice.paid"));
    }
}
