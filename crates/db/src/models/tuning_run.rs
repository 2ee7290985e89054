//! Tuning run audit entity and DTOs.

use inkcal_core::kind::CalibrationKind;
use inkcal_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// Status of a run that produced and persisted new factors.
pub const RUN_SUCCEEDED: &str = "succeeded";
/// Status of a run that left the stored factors unchanged.
pub const RUN_FAILED: &str = "failed";

/// One auto-tune attempt.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TuningRun {
    pub id: DbId,
    pub kind: String,
    pub status: String,
    pub reason: Option<String>,
    pub before_mae: Option<f64>,
    pub after_mae: Option<f64>,
    pub iterations: Option<i32>,
    pub entry_count: i32,
    pub calibration_record_id: Option<DbId>,
    pub created_at: Timestamp,
}

/// Insert payload for a tuning run.
#[derive(Debug, Clone)]
pub struct NewTuningRun {
    pub kind: CalibrationKind,
    pub status: &'static str,
    pub reason: Option<String>,
    pub before_mae: Option<f64>,
    pub after_mae: Option<f64>,
    pub iterations: Option<i32>,
    pub entry_count: i32,
    pub calibration_record_id: Option<DbId>,
}
