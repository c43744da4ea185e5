//! Relational store for master, ACL, audit and ingestion data.
//!
//! SQLite-backed. One connection behind a mutex, constructed by the process
//! entry point and handed to whoever needs it. Methods are blocking; async
//! callers go through [`Store::run`], which moves the work onto the blocking
//! pool.

pub mod audit;
pub mod ingestion;
pub mod screening;
pub mod users;

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;
use thiserror::Error;
use tracing::info;

use crate::auth::AccessFilter;

pub use audit::{record_detached, AuditAction, AuditEntry};
pub use ingestion::{IngestOutcome, IngestSummary, IngestionLog, IngestionStatus, Totals};
pub use screening::{CategorySummary, ScreeningRow};
pub use users::{NewUser, Puskesmas, UserRecord, UserSummary};

/// Storage failures. Always surfaced to callers as internal errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("store lock poisoned")]
    LockPoisoned,

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("{0} total overflows")]
    Overflow(&'static str),
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS puskesmas (
    id TEXT PRIMARY KEY,
    code TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    wilayah_id TEXT
);

CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    email TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    password_hash TEXT NOT NULL,
    role_code TEXT NOT NULL,
    puskesmas_id TEXT REFERENCES puskesmas(id),
    wilayah_id TEXT,
    is_active INTEGER NOT NULL DEFAULT 1,
    last_login_at TEXT
);

CREATE TABLE IF NOT EXISTS audit_logs (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    action TEXT NOT NULL,
    resource TEXT,
    resource_id TEXT,
    details TEXT,
    ip_address TEXT,
    user_agent TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS ingestion_logs (
    id TEXT PRIMARY KEY,
    event_type TEXT NOT NULL,
    puskesmas_id TEXT NOT NULL REFERENCES puskesmas(id),
    batch_id TEXT NOT NULL,
    payload TEXT NOT NULL,
    status TEXT NOT NULL,
    error TEXT,
    received_at TEXT NOT NULL,
    processed_at TEXT
);

CREATE UNIQUE INDEX IF NOT EXISTS ingestion_logs_idempotency
    ON ingestion_logs (event_type, puskesmas_id, batch_id)
    WHERE status <> 'failed';

CREATE TABLE IF NOT EXISTS screening_results (
    puskesmas_id TEXT NOT NULL REFERENCES puskesmas(id),
    kategori TEXT NOT NULL,
    month INTEGER NOT NULL,
    year INTEGER NOT NULL,
    sasaran INTEGER NOT NULL CHECK (sasaran BETWEEN 0 AND 2147483647),
    diperiksa INTEGER NOT NULL CHECK (diperiksa BETWEEN 0 AND 2147483647),
    perlu_perawatan INTEGER NOT NULL CHECK (perlu_perawatan BETWEEN 0 AND 2147483647),
    ingestion_id TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (puskesmas_id, kategori, month, year)
);
";

/// Handle to the relational store. Cheap to clone.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Open or create the database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;

        // WAL lets readers proceed while an ingestion transaction is open
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        let store = Self::init(conn)?;
        info!(path = %path.display(), "store_opened");
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    /// Run blocking store work from async code.
    pub async fn run<F, T>(&self, f: F) -> crate::error::Result<T>
    where
        F: FnOnce(&Store) -> crate::error::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || f(&store)).await?
    }
}

/// Render an [`AccessFilter`] as a WHERE fragment over the given columns.
///
/// An unrestricted filter yields `1 = 1`.
pub(crate) fn scope_clause(
    filter: &AccessFilter,
    puskesmas_col: &str,
    wilayah_col: &str,
) -> (String, Vec<String>) {
    if filter.is_unrestricted() {
        return ("1 = 1".to_string(), Vec::new());
    }

    let mut conditions = Vec::new();
    let mut params = Vec::new();

    if let Some(id) = &filter.puskesmas_id {
        conditions.push(format!("{} = ?", puskesmas_col));
        params.push(id.clone());
    }
    if let Some(id) = &filter.wilayah_id {
        conditions.push(format!("{} = ?", wilayah_col));
        params.push(id.clone());
    }

    (conditions.join(" AND "), params)
}
