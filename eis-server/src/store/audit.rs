//! Audit trail for sensitive user actions.
//!
//! Audit writes are best-effort: [`record_detached`] runs the insert on the
//! blocking pool and only logs a failure, so the response never waits on or
//! fails because of the audit log.

use chrono::Utc;
use rusqlite::params;
use tracing::warn;
use uuid::Uuid;

use super::{Store, StoreError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    Login,
    Logout,
    RefreshToken,
    ViewDashboard,
    ViewDetail,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Login => "LOGIN",
            AuditAction::Logout => "LOGOUT",
            AuditAction::RefreshToken => "REFRESH_TOKEN",
            AuditAction::ViewDashboard => "VIEW_DASHBOARD",
            AuditAction::ViewDetail => "VIEW_DETAIL",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub user_id: String,
    pub action: AuditAction,
    pub resource: Option<String>,
    pub resource_id: Option<String>,
    pub details: Option<serde_json::Value>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl AuditEntry {
    pub fn new(user_id: impl Into<String>, action: AuditAction) -> Self {
        Self {
            user_id: user_id.into(),
            action,
            resource: None,
            resource_id: None,
            details: None,
            ip_address: None,
            user_agent: None,
        }
    }

    pub fn resource(mut self, resource: &str, resource_id: Option<String>) -> Self {
        self.resource = Some(resource.to_string());
        self.resource_id = resource_id;
        self
    }

    pub fn details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn client(mut self, ip_address: Option<String>, user_agent: Option<String>) -> Self {
        self.ip_address = ip_address;
        self.user_agent = user_agent;
        self
    }
}

impl Store {
    pub fn insert_audit(&self, entry: &AuditEntry) -> Result<String, StoreError> {
        let id = Uuid::new_v4().to_string();
        let details = entry.details.as_ref().map(|d| d.to_string());

        self.lock()?.execute(
            "INSERT INTO audit_logs
                (id, user_id, action, resource, resource_id, details, ip_address, user_agent, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                id,
                entry.user_id,
                entry.action.as_str(),
                entry.resource,
                entry.resource_id,
                details,
                entry.ip_address,
                entry.user_agent,
                Utc::now().to_rfc3339(),
            ],
        )?;

        Ok(id)
    }

    #[cfg(test)]
    pub(crate) fn count_audit(&self, user_id: &str, action: AuditAction) -> Result<i64, StoreError> {
        let count = self.lock()?.query_row(
            "SELECT COUNT(*) FROM audit_logs WHERE user_id = ?1 AND action = ?2",
            params![user_id, action.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

/// Write an audit entry without waiting for it.
pub fn record_detached(store: &Store, entry: AuditEntry) {
    let store = store.clone();
    tokio::task::spawn_blocking(move || {
        if let Err(e) = store.insert_audit(&entry) {
            warn!(
                error = %e,
                user_id = %entry.user_id,
                action = entry.action.as_str(),
                "audit_write_failed"
            );
        }
    });
}
