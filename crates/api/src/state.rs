use std::sync::Arc;

use crate::calibration::CalibrationStore;
use crate::config::ServerConfig;
use crate::tuning::TuningCoordinator;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: inkcal_db::DbPool,
    pub config: Arc<ServerConfig>,
    /// Process-wide calibration cache and fallback chain.
    pub calibration: Arc<CalibrationStore>,
    /// Per-kind auto-tune exclusion and orchestration.
    pub tuning: Arc<TuningCoordinator>,
}
