//! Idempotent application of webhook batches.
//!
//! The ingestion log doubles as the idempotency ledger. A batch is keyed by
//! `(event_type, puskesmas_id, batch_id)`; the log row and the data upserts
//! commit together or not at all. Failed attempts are logged separately and
//! do not block a retry of the same key.

use chrono::Utc;
use rusqlite::{params, params_from_iter, Connection, ErrorCode, OptionalExtension, TransactionBehavior};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::{scope_clause, Store, StoreError};
use crate::auth::AccessFilter;
use crate::webhook::{ScreeningBatch, ScreeningItem};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestionStatus {
    Pending,
    Processing,
    Processed,
    Failed,
}

impl IngestionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestionStatus::Pending => "pending",
            IngestionStatus::Processing => "processing",
            IngestionStatus::Processed => "processed",
            IngestionStatus::Failed => "failed",
        }
    }

    fn parse(raw: &str) -> Result<Self, StoreError> {
        match raw {
            "pending" => Ok(IngestionStatus::Pending),
            "processing" => Ok(IngestionStatus::Processing),
            "processed" => Ok(IngestionStatus::Processed),
            "failed" => Ok(IngestionStatus::Failed),
            other => Err(StoreError::Corrupt(format!("ingestion status {}", other))),
        }
    }
}

/// One webhook delivery as recorded in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionLog {
    pub id: String,
    pub event_type: String,
    pub puskesmas_id: String,
    pub batch_id: String,
    pub status: IngestionStatus,
    pub error: Option<String>,
    pub received_at: String,
    pub processed_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub sasaran: i64,
    pub diperiksa: i64,
    pub perlu_perawatan: i64,
}

impl Totals {
    fn add(&mut self, item: &ScreeningItem) -> Result<(), StoreError> {
        self.sasaran = self
            .sasaran
            .checked_add(item.sasaran)
            .ok_or(StoreError::Overflow("sasaran"))?;
        self.diperiksa = self
            .diperiksa
            .checked_add(item.diperiksa)
            .ok_or(StoreError::Overflow("diperiksa"))?;
        self.perlu_perawatan = self
            .perlu_perawatan
            .checked_add(item.perlu_perawatan)
            .ok_or(StoreError::Overflow("perlu_perawatan"))?;
        Ok(())
    }
}

/// What a first-time delivery wrote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestSummary {
    pub puskesmas_id: String,
    pub month: u32,
    pub year: i32,
    pub rows_written: usize,
    pub totals: Totals,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    Applied {
        ingestion_id: String,
        summary: IngestSummary,
    },
    /// The key was already applied; nothing was written.
    Duplicate { ingestion_id: String },
}

const LOG_COLUMNS: &str = "l.id, l.event_type, l.puskesmas_id, l.batch_id, l.status, l.error, \
     l.received_at, l.processed_at";

fn find_active(
    conn: &Connection,
    event_type: &str,
    puskesmas_id: &str,
    batch_id: &str,
) -> Result<Option<String>, StoreError> {
    let id = conn
        .query_row(
            "SELECT id FROM ingestion_logs
             WHERE event_type = ?1 AND puskesmas_id = ?2 AND batch_id = ?3 AND status <> 'failed'",
            params![event_type, puskesmas_id, batch_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(err, rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation)
}

fn apply(
    conn: &mut Connection,
    event_type: &str,
    puskesmas_id: &str,
    batch: &ScreeningBatch,
    raw_payload: &str,
) -> Result<IngestOutcome, StoreError> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    if let Some(ingestion_id) = find_active(&tx, event_type, puskesmas_id, &batch.batch_id)? {
        return Ok(IngestOutcome::Duplicate { ingestion_id });
    }

    let ingestion_id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();

    let inserted = tx.execute(
        "INSERT INTO ingestion_logs (id, event_type, puskesmas_id, batch_id, payload, status, received_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            ingestion_id,
            event_type,
            puskesmas_id,
            batch.batch_id,
            raw_payload,
            IngestionStatus::Processing.as_str(),
            now,
        ],
    );

    if let Err(e) = inserted {
        // The unique index has the final say on duplicates
        if is_constraint_violation(&e) {
            if let Some(winner) = find_active(&tx, event_type, puskesmas_id, &batch.batch_id)? {
                return Ok(IngestOutcome::Duplicate {
                    ingestion_id: winner,
                });
            }
        }
        return Err(e.into());
    }

    let mut totals = Totals::default();
    {
        let mut upsert = tx.prepare_cached(
            "INSERT INTO screening_results
                (puskesmas_id, kategori, month, year, sasaran, diperiksa, perlu_perawatan, ingestion_id, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT (puskesmas_id, kategori, month, year) DO UPDATE SET
                sasaran = excluded.sasaran,
                diperiksa = excluded.diperiksa,
                perlu_perawatan = excluded.perlu_perawatan,
                ingestion_id = excluded.ingestion_id,
                updated_at = excluded.updated_at",
        )?;

        for item in &batch.items {
            upsert.execute(params![
                puskesmas_id,
                item.kategori,
                batch.month,
                batch.year,
                item.sasaran,
                item.diperiksa,
                item.perlu_perawatan,
                ingestion_id,
                now,
            ])?;
            totals.add(item)?;
        }
    }

    tx.execute(
        "UPDATE ingestion_logs SET status = ?1, processed_at = ?2 WHERE id = ?3",
        params![IngestionStatus::Processed.as_str(), Utc::now().to_rfc3339(), ingestion_id],
    )?;

    tx.commit()?;

    Ok(IngestOutcome::Applied {
        ingestion_id,
        summary: IngestSummary {
            puskesmas_id: puskesmas_id.to_string(),
            month: batch.month,
            year: batch.year,
            rows_written: batch.items.len(),
            totals,
        },
    })
}

impl Store {
    /// Apply a validated screening batch at most once.
    ///
    /// `puskesmas_id` must already be resolved to an existing puskesmas.
    pub fn ingest_screening(
        &self,
        event_type: &str,
        puskesmas_id: &str,
        batch: &ScreeningBatch,
        raw_payload: &str,
    ) -> Result<IngestOutcome, StoreError> {
        let mut conn = self.lock()?;

        match apply(&mut conn, event_type, puskesmas_id, batch, raw_payload) {
            Ok(outcome) => {
                match &outcome {
                    IngestOutcome::Applied { ingestion_id, summary } => info!(
                        ingestion_id = %ingestion_id,
                        batch_id = %batch.batch_id,
                        puskesmas_id = %puskesmas_id,
                        rows_written = summary.rows_written,
                        "ingestion_applied"
                    ),
                    IngestOutcome::Duplicate { ingestion_id } => info!(
                        ingestion_id = %ingestion_id,
                        batch_id = %batch.batch_id,
                        puskesmas_id = %puskesmas_id,
                        "ingestion_duplicate"
                    ),
                }
                Ok(outcome)
            }
            Err(e) => {
                warn!(
                    error = %e,
                    batch_id = %batch.batch_id,
                    puskesmas_id = %puskesmas_id,
                    "ingestion_failed"
                );
                if let Err(log_err) =
                    record_failure(&conn, event_type, puskesmas_id, batch, raw_payload, &e)
                {
                    warn!(error = %log_err, batch_id = %batch.batch_id, "ingestion_failure_log_failed");
                }
                Err(e)
            }
        }
    }

    pub fn list_ingestion_logs(
        &self,
        filter: &AccessFilter,
        limit: u32,
    ) -> Result<Vec<IngestionLog>, StoreError> {
        let (scope, scope_params) = scope_clause(filter, "l.puskesmas_id", "p.wilayah_id");
        let sql = format!(
            "SELECT {} FROM ingestion_logs l JOIN puskesmas p ON p.id = l.puskesmas_id
             WHERE {} ORDER BY l.received_at DESC LIMIT {}",
            LOG_COLUMNS, scope, limit
        );

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(scope_params.iter()), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, Option<String>>(5)?,
                    row.get::<_, String>(6)?,
                    row.get::<_, Option<String>>(7)?,
                ))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter()
            .map(
                |(id, event_type, puskesmas_id, batch_id, status, error, received_at, processed_at)| {
                    Ok(IngestionLog {
                        id,
                        event_type,
                        puskesmas_id,
                        batch_id,
                        status: IngestionStatus::parse(&status)?,
                        error,
                        received_at,
                        processed_at,
                    })
                },
            )
            .collect()
    }
}

fn record_failure(
    conn: &Connection,
    event_type: &str,
    puskesmas_id: &str,
    batch: &ScreeningBatch,
    raw_payload: &str,
    cause: &StoreError,
) -> Result<(), StoreError> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO ingestion_logs
            (id, event_type, puskesmas_id, batch_id, payload, status, error, received_at, processed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
        params![
            Uuid::new_v4().to_string(),
            event_type,
            puskesmas_id,
            batch.batch_id,
            raw_payload,
            IngestionStatus::Failed.as_str(),
            cause.to_string(),
            now,
        ],
    )?;
    Ok(())
}
