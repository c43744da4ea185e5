//! Raw webhook body handling.
//!
//! Senders may gzip the body. The signature covers the decompressed bytes,
//! so decoding happens here, before verification and before any parsing.

use std::io::Read;

use axum::http::{header::CONTENT_ENCODING, HeaderMap};
use flate2::read::GzDecoder;
use tracing::warn;

use crate::error::{EisError, Result};

/// Upper bound on a decompressed body.
pub const MAX_DECODED_BODY_BYTES: u64 = 10 * 1024 * 1024;

fn is_gzip(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .map(|v| {
            v.split(',')
                .any(|enc| matches!(enc.trim().to_ascii_lowercase().as_str(), "gzip" | "x-gzip"))
        })
        .unwrap_or(false)
}

/// Return the body bytes exactly as signed, gunzipping when
/// `Content-Encoding` says so.
pub fn read_body(headers: &HeaderMap, body: &[u8]) -> Result<Vec<u8>> {
    if !is_gzip(headers) {
        return Ok(body.to_vec());
    }

    let mut decoded = Vec::new();
    GzDecoder::new(body)
        .take(MAX_DECODED_BODY_BYTES + 1)
        .read_to_end(&mut decoded)
        .map_err(|e| {
            warn!(error = %e, compressed_length = body.len(), "webhook_body_gzip_invalid");
            EisError::invalid("body", "body is not valid gzip")
        })?;

    if decoded.len() as u64 > MAX_DECODED_BODY_BYTES {
        warn!(compressed_length = body.len(), "webhook_body_too_large");
        return Err(EisError::invalid("body", "decompressed body too large"));
    }

    Ok(decoded)
}
