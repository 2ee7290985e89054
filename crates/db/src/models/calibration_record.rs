//! Calibration record entity and DTOs.
//!
//! Records are append-only: a new factor set is a new row, and "current"
//! means the highest id for a kind.

use inkcal_core::error::CoreError;
use inkcal_core::factors::CalibrationFactors;
use inkcal_core::kind::{CalibrationKind, RecordSource};
use inkcal_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::types::Json;
use sqlx::FromRow;

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A persisted calibration factor set.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CalibrationRecord {
    pub id: DbId,
    pub kind: String,
    pub factors: Json<CalibrationFactors>,
    pub source: String,
    pub note: Option<String>,
    pub before_mae: Option<f64>,
    pub after_mae: Option<f64>,
    pub created_at: Timestamp,
}

impl CalibrationRecord {
    pub fn kind(&self) -> Result<CalibrationKind, CoreError> {
        self.kind.parse()
    }
}

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// Insert payload for a new calibration record.
#[derive(Debug, Clone)]
pub struct NewCalibrationRecord {
    pub kind: CalibrationKind,
    pub factors: CalibrationFactors,
    pub source: RecordSource,
    pub note: Option<String>,
    pub before_mae: Option<f64>,
    pub after_mae: Option<f64>,
}

/// Result of a version-checked append.
#[derive(Debug, Clone)]
pub enum AppendOutcome {
    Inserted(CalibrationRecord),
    /// Another writer appended first; `latest_id` is what the table holds now.
    Conflict { latest_id: Option<DbId> },
}
