//! Monthly screening payload sent by the SIMPUS clinic system.
//!
//! Parsing is lenient about missing fields so validation can
//! report every problem at once with a field path.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{EisError, FieldError, Result};

/// Event type recorded in the ingestion log for this payload.
pub const SCREENING_EVENT: &str = "screening.monthly";

const MIN_YEAR: i64 = 2000;
const MAX_YEAR: i64 = 2100;

/// Largest count accepted for a single category line.
pub const MAX_COUNT: i64 = i32::MAX as i64;

/// Wire form of a delivery.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreeningPayload {
    #[serde(default)]
    pub batch_id: String,
    #[serde(default)]
    pub puskesmas_id: Option<String>,
    #[serde(default)]
    pub puskesmas_code: Option<String>,
    #[serde(default)]
    pub month: Option<i64>,
    #[serde(default)]
    pub year: Option<i64>,
    #[serde(default)]
    pub items: Vec<ScreeningItem>,
}

/// One screening category line.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreeningItem {
    #[serde(default)]
    pub kategori: String,
    pub sasaran: i64,
    pub diperiksa: i64,
    pub perlu_perawatan: i64,
}

/// How the sender identified the puskesmas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FacilityRef {
    Id(String),
    Code(String),
}

impl FacilityRef {
    /// Payload field the reference came from.
    pub fn field(&self) -> &'static str {
        match self {
            FacilityRef::Id(_) => "puskesmasId",
            FacilityRef::Code(_) => "puskesmasCode",
        }
    }
}

/// A payload that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreeningBatch {
    pub batch_id: String,
    pub facility: FacilityRef,
    pub month: u32,
    pub year: i32,
    pub items: Vec<ScreeningItem>,
}

impl ScreeningPayload {
    pub fn parse(raw: &[u8]) -> Result<Self> {
        serde_json::from_slice(raw).map_err(|e| EisError::invalid("body", format!("invalid JSON: {}", e)))
    }

    /// Check every field and collect all violations.
    pub fn validate(self) -> Result<ScreeningBatch> {
        let mut errors = Vec::new();

        let batch_id = self.batch_id.trim().to_string();
        if batch_id.is_empty() {
            errors.push(FieldError::new("batchId", "is required"));
        }

        let id = self.puskesmas_id.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        let code = self.puskesmas_code.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        let facility = match (id, code) {
            (Some(id), None) => Some(FacilityRef::Id(id)),
            (None, Some(code)) => Some(FacilityRef::Code(code)),
            (Some(_), Some(_)) => {
                errors.push(FieldError::new(
                    "puskesmasId",
                    "provide either puskesmasId or puskesmasCode, not both",
                ));
                None
            }
            (None, None) => {
                errors.push(FieldError::new(
                    "puskesmasId",
                    "one of puskesmasId or puskesmasCode is required",
                ));
                None
            }
        };

        let month = match self.month {
            Some(m) if (1..=12).contains(&m) => Some(m as u32),
            Some(_) => {
                errors.push(FieldError::new("month", "must be between 1 and 12"));
                None
            }
            None => {
                errors.push(FieldError::new("month", "is required"));
                None
            }
        };

        let year = match self.year {
            Some(y) if (MIN_YEAR..=MAX_YEAR).contains(&y) => Some(y as i32),
            Some(_) => {
                errors.push(FieldError::new(
                    "year",
                    format!("must be between {} and {}", MIN_YEAR, MAX_YEAR),
                ));
                None
            }
            None => {
                errors.push(FieldError::new("year", "is required"));
                None
            }
        };

        if self.items.is_empty() {
            errors.push(FieldError::new("items", "must contain at least one item"));
        }

        let mut items = Vec::with_capacity(self.items.len());
        let mut seen = HashSet::new();
        for (i, item) in self.items.into_iter().enumerate() {
            let kategori = item.kategori.trim().to_string();
            if kategori.is_empty() {
                errors.push(FieldError::new(format!("items[{}].kategori", i), "is required"));
            } else if !seen.insert(kategori.clone()) {
                errors.push(FieldError::new(format!("items[{}].kategori", i), "duplicate category"));
            }
            for (name, value) in [
                ("sasaran", item.sasaran),
                ("diperiksa", item.diperiksa),
                ("perluPerawatan", item.perlu_perawatan),
            ] {
                if value < 0 {
                    errors.push(FieldError::new(
                        format!("items[{}].{}", i, name),
                        "must be a non-negative integer",
                    ));
                } else if value > MAX_COUNT {
                    errors.push(FieldError::new(
                        format!("items[{}].{}", i, name),
                        format!("must not exceed {}", MAX_COUNT),
                    ));
                }
            }
            items.push(ScreeningItem { kategori, ..item });
        }

        match (facility, month, year) {
            (Some(facility), Some(month), Some(year)) if errors.is_empty() => Ok(ScreeningBatch {
                batch_id,
                facility,
                month,
                year,
                items,
            }),
            _ => Err(EisError::Validation(errors)),
        }
    }
}
