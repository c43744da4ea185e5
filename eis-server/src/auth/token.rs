//! Session credential issuance and verification.
//!
//! Credentials are HS256 JWTs with a fixed issuer and audience. Session
//! tokens live 8 hours and carry the full authorization claims; refresh
//! tokens live 7 days and carry only the subject and a type discriminator.
//!
//! Verification never reports why a token was rejected. Malformed, expired,
//! foreign and forged tokens all come back as `None`.

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::auth::roles::{PermissionCode, RoleCode};
use crate::error::{EisError, Result};

pub const ISSUER: &str = "eis-dinkes";
pub const AUDIENCE: &str = "eis-dashboard";

/// Session lifetime: 8 hours.
pub const SESSION_TTL_SECONDS: i64 = 8 * 60 * 60;

/// Refresh lifetime: 7 days.
pub const REFRESH_TTL_SECONDS: i64 = 7 * 24 * 60 * 60;

const REFRESH_TYPE: &str = "refresh";
const MIN_SECRET_LEN: usize = 32;

/// Signed claims of a session credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionClaims {
    /// User id
    #[serde(rename = "sub")]
    pub user_id: String,
    pub email: String,
    pub role_code: RoleCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub puskesmas_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wilayah_id: Option<String>,
    pub permissions: Vec<PermissionCode>,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
}

/// Signed claims of a refresh credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: String,
    pub typ: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
}

/// User attributes a session credential is issued for.
#[derive(Debug, Clone)]
pub struct SessionInput {
    pub user_id: String,
    pub email: String,
    pub role_code: RoleCode,
    pub puskesmas_id: Option<String>,
    pub wilayah_id: Option<String>,
}

/// Issues and verifies credentials with a server-held symmetric secret.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenService {
    /// Returns an error if the secret is shorter than 32 bytes.
    pub fn new(secret: &str) -> Result<Self> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(EisError::Internal(format!(
                "JWT secret must be at least {} characters",
                MIN_SECRET_LEN
            )));
        }

        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        })
    }

    /// Issue an 8-hour session credential. Permissions come from the role table.
    pub fn issue_session(&self, input: SessionInput) -> Result<(String, SessionClaims)> {
        self.issue_session_at(input, Utc::now().timestamp())
    }

    pub(crate) fn issue_session_at(
        &self,
        input: SessionInput,
        issued_at: i64,
    ) -> Result<(String, SessionClaims)> {
        let claims = SessionClaims {
            user_id: input.user_id,
            email: input.email,
            role_code: input.role_code,
            puskesmas_id: input.puskesmas_id,
            wilayah_id: input.wilayah_id,
            permissions: input.role_code.permissions().to_vec(),
            iat: issued_at,
            exp: issued_at + SESSION_TTL_SECONDS,
            iss: ISSUER.to_string(),
            aud: AUDIENCE.to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| EisError::Internal(format!("Failed to sign session token: {}", e)))?;

        Ok((token, claims))
    }

    /// Issue a 7-day refresh credential carrying only the user id.
    pub fn issue_refresh(&self, user_id: &str) -> Result<String> {
        self.issue_refresh_at(user_id, Utc::now().timestamp())
    }

    pub(crate) fn issue_refresh_at(&self, user_id: &str, issued_at: i64) -> Result<String> {
        let claims = RefreshClaims {
            sub: user_id.to_string(),
            typ: REFRESH_TYPE.to_string(),
            iat: issued_at,
            exp: issued_at + REFRESH_TTL_SECONDS,
            iss: ISSUER.to_string(),
            aud: AUDIENCE.to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| EisError::Internal(format!("Failed to sign refresh token: {}", e)))
    }

    /// Verify a session credential.
    pub fn verify(&self, token: &str) -> Option<SessionClaims> {
        match decode::<SessionClaims>(token, &self.decoding, &validation()) {
            Ok(data) if is_expired(data.claims.exp) => {
                debug!("session_token_expired");
                None
            }
            Ok(data) => Some(data.claims),
            Err(e) => {
                debug!(reason = ?e.kind(), "session_token_rejected");
                None
            }
        }
    }

    /// Verify a refresh credential.
    pub fn verify_refresh(&self, token: &str) -> Option<RefreshClaims> {
        match decode::<RefreshClaims>(token, &self.decoding, &validation()) {
            Ok(data) if is_expired(data.claims.exp) => {
                debug!("refresh_token_expired");
                None
            }
            Ok(data) if data.claims.typ == REFRESH_TYPE => Some(data.claims),
            Ok(_) => {
                debug!("refresh_token_wrong_type");
                None
            }
            Err(e) => {
                debug!(reason = ?e.kind(), "refresh_token_rejected");
                None
            }
        }
    }
}

/// A credential is valid only while `now < exp`; jsonwebtoken still accepts `now == exp`.
fn is_expired(exp: i64) -> bool {
    exp <= Utc::now().timestamp()
}

fn validation() -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    validation.set_audience(&[AUDIENCE]);
    validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
    validation.leeway = 0;
    validation
}
