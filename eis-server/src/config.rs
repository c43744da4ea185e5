//! Configuration module for environment variable parsing.
//!
//! Reads all configuration from environment variables. Secrets are held as
//! `Option`s here and promoted to required values by the accessors, so a
//! missing secret surfaces as a startup error rather than a per-request one.

use std::env;

use thiserror::Error;
use tracing::warn;

use crate::webhook::DEFAULT_TOLERANCE_SECONDS;

/// Secret used when `JWT_SECRET` is unset outside production.
const DEV_JWT_SECRET: &str = "dev-mode-jwt-secret-not-for-production-use";

/// Errors raised while validating configuration at startup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} must be at least {min} characters")]
    TooShort { name: &'static str, min: usize },
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the web server to listen on
    pub port: u16,

    /// Path of the SQLite database holding master, ACL and ingestion data
    pub database_path: String,

    /// Deployment environment (controls cookie `Secure` and secret fallbacks)
    pub environment: Environment,

    /// Symmetric secret for session credentials
    pub jwt_secret: Option<String>,

    /// Symmetric secret shared with the clinic system for webhook signatures
    pub webhook_secret: Option<String>,

    /// Name of the cookie carrying the session credential
    pub auth_cookie_name: String,

    /// Name of the cookie carrying the refresh credential
    pub refresh_cookie_name: String,

    /// Maximum clock skew in seconds accepted on webhook timestamps
    pub webhook_signature_max_age: u64,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Config {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),

            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| "eis.db".to_string()),

            environment: env::var("APP_ENV")
                .map(|v| Environment::parse(&v))
                .unwrap_or(Environment::Development),

            jwt_secret: non_empty("JWT_SECRET"),

            webhook_secret: non_empty("SIMPUS_WEBHOOK_SECRET"),

            auth_cookie_name: env::var("AUTH_COOKIE_NAME")
                .unwrap_or_else(|_| "auth-token".to_string()),

            refresh_cookie_name: env::var("REFRESH_COOKIE_NAME")
                .unwrap_or_else(|_| "refresh-token".to_string()),

            webhook_signature_max_age: env::var("WEBHOOK_SIGNATURE_MAX_AGE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_TOLERANCE_SECONDS),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Session signing secret.
    ///
    /// Required in production. Development falls back to a fixed secret so a
    /// local dashboard can run without setup.
    pub fn jwt_secret(&self) -> Result<String, ConfigError> {
        match (&self.jwt_secret, self.environment) {
            (Some(secret), _) => Ok(secret.clone()),
            (None, Environment::Production) => Err(ConfigError::Missing("JWT_SECRET")),
            (None, Environment::Development) => {
                warn!("jwt_secret_dev_fallback");
                Ok(DEV_JWT_SECRET.to_string())
            }
        }
    }

    /// Webhook signing secret. Absence is fatal in every environment.
    pub fn webhook_secret(&self) -> Result<String, ConfigError> {
        self.webhook_secret
            .clone()
            .ok_or(ConfigError::Missing("SIMPUS_WEBHOOK_SECRET"))
    }
}

/// Read an environment variable, treating blank values as unset.
fn non_empty(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
