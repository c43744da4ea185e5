//! Read side of the screening results written by ingestion.

use rusqlite::{params_from_iter, types::Value};
use serde::Serialize;

use super::{scope_clause, Store, StoreError};
use crate::auth::AccessFilter;

/// Aggregate over every puskesmas visible to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySummary {
    pub kategori: String,
    pub puskesmas_count: i64,
    pub sasaran: i64,
    pub diperiksa: i64,
    pub perlu_perawatan: i64,
}

/// One facility's numbers for one category and period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreeningRow {
    pub puskesmas_id: String,
    pub puskesmas_name: String,
    pub kategori: String,
    pub month: u32,
    pub year: i32,
    pub sasaran: i64,
    pub diperiksa: i64,
    pub perlu_perawatan: i64,
    pub updated_at: String,
}

/// Scope plus optional period as a WHERE fragment and its parameters.
fn period_clause(filter: &AccessFilter, month: Option<u32>, year: Option<i32>) -> (String, Vec<Value>) {
    let (scope, scope_params) = scope_clause(filter, "r.puskesmas_id", "p.wilayah_id");
    let mut clause = scope;
    let mut params: Vec<Value> = scope_params.into_iter().map(Value::Text).collect();

    if let Some(month) = month {
        clause.push_str(" AND r.month = ?");
        params.push(Value::Integer(month.into()));
    }
    if let Some(year) = year {
        clause.push_str(" AND r.year = ?");
        params.push(Value::Integer(year.into()));
    }
    (clause, params)
}

impl Store {
    /// Per-category totals for a period.
    pub fn screening_summary(
        &self,
        filter: &AccessFilter,
        month: u32,
        year: i32,
    ) -> Result<Vec<CategorySummary>, StoreError> {
        let (clause, params) = period_clause(filter, Some(month), Some(year));
        let sql = format!(
            "SELECT r.kategori, COUNT(DISTINCT r.puskesmas_id),
                    SUM(r.sasaran), SUM(r.diperiksa), SUM(r.perlu_perawatan)
             FROM screening_results r JOIN puskesmas p ON p.id = r.puskesmas_id
             WHERE {}
             GROUP BY r.kategori
             ORDER BY r.kategori",
            clause
        );

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(params.iter()), |row| {
                Ok(CategorySummary {
                    kategori: row.get(0)?,
                    puskesmas_count: row.get(1)?,
                    sasaran: row.get(2)?,
                    diperiksa: row.get(3)?,
                    perlu_perawatan: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Facility-level rows, newest period first.
    pub fn screening_rows(
        &self,
        filter: &AccessFilter,
        month: Option<u32>,
        year: Option<i32>,
    ) -> Result<Vec<ScreeningRow>, StoreError> {
        let (clause, params) = period_clause(filter, month, year);
        let sql = format!(
            "SELECT r.puskesmas_id, p.name, r.kategori, r.month, r.year,
                    r.sasaran, r.diperiksa, r.perlu_perawatan, r.updated_at
             FROM screening_results r JOIN puskesmas p ON p.id = r.puskesmas_id
             WHERE {}
             ORDER BY r.year DESC, r.month DESC, p.name, r.kategori",
            clause
        );

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(params.iter()), |row| {
                Ok(ScreeningRow {
                    puskesmas_id: row.get(0)?,
                    puskesmas_name: row.get(1)?,
                    kategori: row.get(2)?,
                    month: row.get(3)?,
                    year: row.get(4)?,
                    sasaran: row.get(5)?,
                    diperiksa: row.get(6)?,
                    perlu_perawatan: row.get(7)?,
                    updated_at: row.get(8)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }
}
