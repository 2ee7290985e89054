//! Handlers for batch validation and the validation export document.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use inkcal_core::error::CoreError;
use inkcal_core::factors::CalibrationFactors;
use inkcal_core::test_data::{usable_entries, TestDataEntry};
use inkcal_core::threshold_validation::validate_count_range;
use inkcal_core::types::{DbId, Timestamp};
use inkcal_core::validator::{
    calculate_mae_stats, validate_test_batch, MaeStats, ValidationResult,
};
use inkcal_db::repositories::TestPrintRepo;
use serde::{Deserialize, Serialize};

use crate::calibration::store::EffectiveCalibration;
use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// Upper bound on entries in a single validation or tuning batch.
pub const MAX_BATCH_ENTRIES: usize = 10_000;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Which test prints a batch operates on.
///
/// Inline `entries` win over `test_print_ids`; with neither, every stored
/// test print is used.
#[derive(Debug, Default, Deserialize)]
pub struct BatchSelection {
    #[serde(default)]
    pub test_print_ids: Option<Vec<DbId>>,
    #[serde(default)]
    pub entries: Option<Vec<TestDataEntry>>,
}

#[derive(Debug, Deserialize)]
pub struct ValidationRunRequest {
    #[serde(flatten)]
    pub selection: BatchSelection,
    /// Score against these factors instead of the effective calibration.
    #[serde(default)]
    pub factors: Option<CalibrationFactors>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRunResponse {
    pub results: Vec<ValidationResult>,
    /// `None` when nothing could be scored.
    pub stats: Option<MaeStats>,
    pub entry_count: usize,
    /// Entries dropped for lacking coverage data.
    pub skipped_count: usize,
    pub factors: CalibrationFactors,
}

/// Full validation snapshot for offline analysis.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationExport {
    pub test_data: Vec<TestDataEntry>,
    pub validation_results: Vec<ValidationResult>,
    pub stats: Option<MaeStats>,
    pub timestamp: Timestamp,
    pub calibration_date: Option<Timestamp>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Resolve a batch selection into entries, stored prints converted.
pub(crate) async fn load_entries(
    state: &AppState,
    selection: BatchSelection,
) -> AppResult<Vec<TestDataEntry>> {
    let entries = match (selection.entries, selection.test_print_ids) {
        (Some(entries), _) => {
            for entry in &entries {
                entry.validate()?;
            }
            entries
        }
        (None, Some(ids)) => {
            validate_count_range(ids.len(), MAX_BATCH_ENTRIES, "test_print_ids")?;
            TestPrintRepo::list_by_ids(&state.pool, &ids)
                .await?
                .into_iter()
                .map(|p| p.into_entry())
                .collect::<Result<Vec<_>, _>>()?
        }
        (None, None) => TestPrintRepo::list_all(&state.pool)
            .await?
            .into_iter()
            .map(|p| p.into_entry())
            .collect::<Result<Vec<_>, _>>()?,
    };
    // An empty batch is valid; it scores to no stats.
    if entries.len() > MAX_BATCH_ENTRIES {
        return Err(CoreError::Validation(format!(
            "entries accepts at most {MAX_BATCH_ENTRIES} items, got {}",
            entries.len()
        ))
        .into());
    }
    Ok(entries)
}

// ---------------------------------------------------------------------------
// POST /validation/run
// ---------------------------------------------------------------------------

/// Score a batch of test prints and aggregate MAE statistics.
pub async fn run(
    State(state): State<AppState>,
    Json(body): Json<ValidationRunRequest>,
) -> AppResult<impl IntoResponse> {
    let entries = load_entries(&state, body.selection).await?;
    let (usable, skipped_count) = usable_entries(entries);

    let factors = match body.factors {
        Some(factors) => {
            factors.validate()?;
            factors
        }
        None => state.calibration.effective_calibration().await?.factors,
    };

    let results = validate_test_batch(&usable, &factors);
    let stats = calculate_mae_stats(&results);

    tracing::info!(
        entry_count = usable.len(),
        skipped_count,
        overall_mae = ?stats.as_ref().map(|s| s.overall_mae),
        "Validation run complete",
    );

    Ok(Json(DataResponse {
        data: ValidationRunResponse {
            entry_count: usable.len(),
            results,
            stats,
            skipped_count,
            factors,
        },
    }))
}

// ---------------------------------------------------------------------------
// GET /validation/export
// ---------------------------------------------------------------------------

/// Every stored test print scored against the effective calibration.
pub async fn export(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let entries = load_entries(&state, BatchSelection::default()).await?;
    let effective = state.calibration.effective_calibration().await?;

    Ok(Json(DataResponse {
        data: build_export(entries, &effective, chrono::Utc::now()),
    }))
}

/// Assemble the export document. `test_data` keeps every entry, including
/// the ones without coverage that scoring skips.
pub fn build_export(
    entries: Vec<TestDataEntry>,
    effective: &EffectiveCalibration,
    timestamp: Timestamp,
) -> ValidationExport {
    let (usable, _) = usable_entries(entries.clone());
    let validation_results = validate_test_batch(&usable, &effective.factors);
    let stats = calculate_mae_stats(&validation_results);

    ValidationExport {
        test_data: entries,
        validation_results,
        stats,
        timestamp,
        calibration_date: effective.calibration_date,
    }
}
