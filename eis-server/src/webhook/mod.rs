//! Inbound webhook authentication and decoding.
//!
//! A delivery goes through, in order:
//! 1. `body::read_body`: gunzip if needed, keep the exact signed bytes
//! 2. `WebhookVerifier::verify`: HMAC-SHA256 and replay window
//! 3. `ScreeningPayload::parse` / `validate`: shape and value checks
//!
//! Only then may the ingestion store apply it.

pub mod body;
pub mod payload;
pub mod signature;

pub use body::read_body;
pub use payload::{
    FacilityRef, ScreeningBatch, ScreeningItem, ScreeningPayload, MAX_COUNT, SCREENING_EVENT,
};
pub use signature::{
    compute_signature, parse_signature_header, signature_header, SignatureHeader,
    WebhookVerifier, DEFAULT_TOLERANCE_SECONDS, SIGNATURE_HEADER,
};
