//! Calibration store and its source tiers.
//!
//! The current factors for a calibration kind are resolved through an
//! ordered list of [`provider::CalibrationProvider`] strategies (database,
//! local cache file, compiled defaults) and held in the in-memory cache of
//! [`store::CalibrationStore`], which is built once at startup and shared
//! through `AppState`.

pub mod database;
pub mod local_cache;
pub mod memory;
pub mod provider;
pub mod store;

use std::time::Duration;

use inkcal_core::error::CoreError;
use inkcal_core::kind::CalibrationKind;
use inkcal_core::types::DbId;

pub use provider::{CalibrationSnapshot, SourceTier};
pub use store::CalibrationStore;

/// Failures while reading or writing calibration factors.
#[derive(Debug, thiserror::Error)]
pub enum CalibrationError {
    #[error("Timed out after {0:?} waiting for the calibration database")]
    Timeout(Duration),

    #[error("Calibration database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Local calibration cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed calibration data: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(
        "Calibration for {kind} changed while this update was prepared \
         (expected version {expected:?}, found {actual:?}); reload and retry"
    )]
    VersionConflict {
        kind: CalibrationKind,
        expected: Option<DbId>,
        actual: Option<DbId>,
    },

    #[error("No calibration source produced factors for {0}")]
    Exhausted(CalibrationKind),

    #[error(transparent)]
    Core(#[from] CoreError),
}
