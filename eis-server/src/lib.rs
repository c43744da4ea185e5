//! EIS Dinkes - access control and signed ingestion for the district health
//! executive dashboard.
//!
//! This library provides shared modules for the two binaries:
//! - `eis-server`: dashboard API and the SIMPUS webhook receiver
//! - `eis-admin`: seeding and operator tooling
//!
//! ## Architecture
//!
//! ```text
//! Browser → auth gate → UserContext::authorize → Store (AccessFilter)
//! SIMPUS  → read_body → WebhookVerifier → ScreeningPayload → Store::ingest_screening
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod store;
pub mod web;
pub mod webhook;

// Re-export commonly used types
pub use auth::{TokenService, UserContext};
pub use config::Config;
pub use error::{EisError, ErrorKind, Result};
pub use store::Store;
pub use web::{router, AppState};
pub use webhook::WebhookVerifier;
