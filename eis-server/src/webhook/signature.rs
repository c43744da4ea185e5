//! SIMPUS webhook signature verification.
//!
//! The clinic system signs each delivery with HMAC-SHA256 over
//! `"<timestamp>.<raw body>"` and sends
//! `X-Simpus-Signature: t=<unix seconds>,v1=<hex digest>`.
//!
//! The digest covers the exact bytes received (after gzip decoding), so
//! verification must run before the body is parsed.

use axum::http::HeaderMap;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

use crate::config::ConfigError;
use crate::error::{EisError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the signature.
pub const SIGNATURE_HEADER: &str = "x-simpus-signature";

/// Replay window in seconds either side of the server clock.
pub const DEFAULT_TOLERANCE_SECONDS: u64 = 300;

/// Parsed `t=...,v1=...` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub timestamp: String,
    pub digest: String,
}

/// Parse a signature header. Both `t` and `v1` are required; unknown keys
/// are ignored.
pub fn parse_signature_header(header: &str) -> Option<SignatureHeader> {
    let mut timestamp = None;
    let mut digest = None;

    for part in header.split(',') {
        let Some((key, value)) = part.split_once('=') else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        match key.trim() {
            "t" => timestamp = Some(value.to_string()),
            "v1" => digest = Some(value.to_string()),
            _ => {}
        }
    }

    Some(SignatureHeader {
        timestamp: timestamp?,
        digest: digest?,
    })
}

/// Compute the hex HMAC-SHA256 of `"<timestamp>.<body>"`.
pub fn compute_signature(secret: &[u8], timestamp: &str, body: &[u8]) -> Result<String> {
    let mac = mac_for(secret, timestamp, body)?;
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Build a complete header value, as a sender would.
pub fn signature_header(secret: &[u8], timestamp: i64, body: &[u8]) -> Result<String> {
    let t = timestamp.to_string();
    Ok(format!("t={},v1={}", t, compute_signature(secret, &t, body)?))
}

fn mac_for(secret: &[u8], timestamp: &str, body: &[u8]) -> Result<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|_| EisError::Internal("invalid webhook signing key".into()))?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(body);
    Ok(mac)
}

/// Verifies inbound webhook deliveries against the shared secret.
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: Vec<u8>,
    tolerance_seconds: u64,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("tolerance_seconds", &self.tolerance_seconds)
            .finish_non_exhaustive()
    }
}

impl WebhookVerifier {
    /// An empty secret is a fatal misconfiguration.
    pub fn new(secret: &str, tolerance_seconds: u64) -> std::result::Result<Self, ConfigError> {
        if secret.trim().is_empty() {
            return Err(ConfigError::Missing("SIMPUS_WEBHOOK_SECRET"));
        }
        Ok(Self {
            secret: secret.as_bytes().to_vec(),
            tolerance_seconds,
        })
    }

    /// Verify a delivery's signature header against its raw body.
    ///
    /// Every failure is `Unauthenticated`; the reason is only logged.
    pub fn verify(&self, headers: &HeaderMap, raw_body: &[u8], now: i64) -> Result<()> {
        let header = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                warn!("webhook_signature_missing");
                EisError::Unauthenticated
            })?;

        let parsed = parse_signature_header(header).ok_or_else(|| {
            warn!("webhook_signature_malformed");
            EisError::Unauthenticated
        })?;

        let webhook_time: i64 = parsed.timestamp.parse().map_err(|_| {
            warn!(timestamp = %parsed.timestamp, "webhook_signature_invalid_timestamp");
            EisError::Unauthenticated
        })?;

        let age = now.abs_diff(webhook_time);
        if age > self.tolerance_seconds {
            warn!(
                webhook_time = webhook_time,
                current_time = now,
                age_seconds = age,
                max_age_seconds = self.tolerance_seconds,
                "webhook_signature_stale"
            );
            return Err(EisError::Unauthenticated);
        }

        let expected = mac_for(&self.secret, &parsed.timestamp, raw_body)?
            .finalize()
            .into_bytes();

        let supplied = hex::decode(&parsed.digest).unwrap_or_default();

        if !constant_time_compare(&expected, &supplied) {
            warn!(
                expected_length = expected.len(),
                actual_length = supplied.len(),
                "webhook_signature_mismatch"
            );
            return Err(EisError::Unauthenticated);
        }

        Ok(())
    }
}

/// Constant-time comparison to prevent timing attacks.
///
/// Unequal lengths short-circuit; length is not secret.
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}
