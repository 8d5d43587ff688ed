//! Eka webhook signature verification.
//!
//! Eka signs each delivery with HMAC-SHA256 and sends the result in the
//! `Eka-Webhook-Signature` header as `t=<timestamp>,v1=<hex digest>`.
//! The signed message is `"{t}.{canonical_body}"`.

use std::borrow::Cow;
use std::time::{SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

use crate::error::WebhookError;

type HmacSha256 = Hmac<Sha256>;

/// Name of the header carrying the signature (header names are case-insensitive).
pub const SIGNATURE_HEADER: &str = "eka-webhook-signature";

/// Timestamps above this are taken to be in milliseconds.
const MILLIS_THRESHOLD: u64 = 10_000_000_000;

/// Parsed `Eka-Webhook-Signature` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    /// The `t` component, kept verbatim since it is part of the signed message
    pub timestamp: String,
    /// The `v1` component, hex encoded
    pub v1: String,
}

impl SignatureHeader {
    /// Parse a header such as `t=1700000000,v1=5f2b...`.
    ///
    /// Segments are separated by commas and surrounding whitespace is
    /// ignored. Unknown keys are skipped; a segment without `=` is rejected.
    pub fn parse(raw: &str) -> Result<Self, WebhookError> {
        let mut timestamp = None;
        let mut v1 = None;

        for segment in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let (key, value) = segment.split_once('=').ok_or_else(|| {
                WebhookError::InvalidFormat(format!("segment without '=': {segment:?}"))
            })?;

            match key.trim() {
                "t" => timestamp = Some(value.trim().to_string()),
                "v1" => v1 = Some(value.trim().to_string()),
                _ => {}
            }
        }

        let timestamp = timestamp
            .filter(|t| !t.is_empty())
            .ok_or_else(|| WebhookError::InvalidFormat("missing 't'".to_string()))?;
        let v1 = v1
            .filter(|v| !v.is_empty())
            .ok_or_else(|| WebhookError::InvalidFormat("missing 'v1'".to_string()))?;

        Ok(SignatureHeader { timestamp, v1 })
    }
}

/// Body text that goes into the signed message.
///
/// JSON bodies are re-serialized compactly with their key order kept, so
/// formatting whitespace added in transit does not break verification.
/// Anything else is used as received.
pub fn canonical_body(body: &[u8]) -> Cow<'_, str> {
    match serde_json::from_slice::<serde_json::Value>(body) {
        Ok(value) => Cow::Owned(value.to_string()),
        Err(_) => String::from_utf8_lossy(body),
    }
}

/// Hex HMAC-SHA256 of `"{timestamp}.{canonical_body}"`.
pub fn compute_signature(
    signing_key: &str,
    timestamp: &str,
    body: &[u8],
) -> Result<String, WebhookError> {
    let mut mac = new_mac(signing_key)?;
    mac.update(signed_message(timestamp, body).as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verify an Eka webhook signature.
///
/// # Arguments
///
/// * `signing_key` - The shared webhook secret
/// * `header` - Value of the `Eka-Webhook-Signature` header, if present
/// * `body` - The raw request body
/// * `max_age_seconds` - Optional replay window for the `t` timestamp
pub fn verify_signature(
    signing_key: &str,
    header: Option<&str>,
    body: &[u8],
    max_age_seconds: Option<u64>,
) -> Result<(), WebhookError> {
    let raw = header.ok_or_else(|| {
        warn!("signature_header_missing");
        WebhookError::MissingSignature
    })?;

    let parsed = SignatureHeader::parse(raw).map_err(|e| {
        warn!(error = %e, "signature_header_invalid");
        e
    })?;

    let expected = hex::decode(&parsed.v1).map_err(|_| {
        warn!(v1_length = parsed.v1.len(), "signature_not_hex");
        WebhookError::InvalidFormat("'v1' is not hex".to_string())
    })?;

    if let Some(max_age) = max_age_seconds {
        check_timestamp_age(&parsed.timestamp, max_age)?;
    }

    let mut mac = new_mac(signing_key)?;
    mac.update(signed_message(&parsed.timestamp, body).as_bytes());

    // verify_slice compares in constant time
    mac.verify_slice(&expected).map_err(|_| {
        warn!(
            timestamp = %parsed.timestamp,
            actual_length = expected.len(),
            "signature_mismatch"
        );
        WebhookError::SignatureMismatch
    })
}

fn new_mac(signing_key: &str) -> Result<HmacSha256, WebhookError> {
    HmacSha256::new_from_slice(signing_key.as_bytes()).map_err(|_| {
        warn!("signature_invalid_key");
        WebhookError::MissingCredentials
    })
}

fn signed_message(timestamp: &str, body: &[u8]) -> String {
    format!("{}.{}", timestamp, canonical_body(body))
}

/// Reject timestamps further than `max_age_seconds` from now.
fn check_timestamp_age(timestamp: &str, max_age_seconds: u64) -> Result<(), WebhookError> {
    let mut webhook_time: u64 = timestamp.parse().map_err(|_| {
        warn!(timestamp = %timestamp, "signature_invalid_timestamp");
        WebhookError::InvalidFormat(format!("'t' is not a unix timestamp: {timestamp:?}"))
    })?;

    if webhook_time > MILLIS_THRESHOLD {
        webhook_time /= 1000;
    }

    let current_time = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();

    let age = current_time.abs_diff(webhook_time);

    if age > max_age_seconds {
        warn!(
            webhook_time = webhook_time,
            current_time = current_time,
            age_seconds = age,
            max_age_seconds = max_age_seconds,
            "signature_stale"
        );
        return Err(WebhookError::StaleTimestamp { age_seconds: age });
    }

    Ok(())
}
