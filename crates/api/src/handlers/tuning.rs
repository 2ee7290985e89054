//! Handlers for auto-tune runs and their audit trail.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use inkcal_core::kind::CalibrationKind;
use inkcal_core::pagination::{clamp_limit, clamp_offset, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use inkcal_core::tuner::TuningState;
use inkcal_db::models::tuning_run::{NewTuningRun, RUN_FAILED, RUN_SUCCEEDED};
use inkcal_db::repositories::TuningRunRepo;
use serde::Serialize;

use crate::error::AppResult;
use crate::handlers::calibration::parse_kind;
use crate::handlers::validation::{load_entries, BatchSelection};
use crate::query::TuningRunParams;
use crate::response::DataResponse;
use crate::state::AppState;
use crate::tuning::TuningError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TuningStatus {
    pub kind: CalibrationKind,
    pub state: TuningState,
}

/// Write the audit row for a run. Failure here never fails the request.
async fn record_run(state: &AppState, run: NewTuningRun) {
    if let Err(e) = TuningRunRepo::record(&state.pool, &run).await {
        tracing::warn!(
            kind = %run.kind,
            status = run.status,
            error = %e,
            "Failed to record tuning run",
        );
    }
}

// ---------------------------------------------------------------------------
// POST /tuning/{kind}
// ---------------------------------------------------------------------------

/// Auto-tune `kind` against the selected test prints and persist the result.
pub async fn run(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Json(selection): Json<BatchSelection>,
) -> AppResult<impl IntoResponse> {
    let kind = parse_kind(&kind)?;
    let entries = load_entries(&state, selection).await?;
    let entry_count = i32::try_from(entries.len()).unwrap_or(i32::MAX);

    match state.tuning.run(&state.calibration, kind, entries).await {
        Ok(outcome) => {
            record_run(
                &state,
                NewTuningRun {
                    kind,
                    status: RUN_SUCCEEDED,
                    reason: None,
                    before_mae: Some(outcome.before_mae),
                    after_mae: Some(outcome.after_mae),
                    iterations: i32::try_from(outcome.iterations).ok(),
                    entry_count: i32::try_from(outcome.entry_count).unwrap_or(i32::MAX),
                    calibration_record_id: outcome.calibration.version,
                },
            )
            .await;
            Ok(Json(DataResponse { data: outcome }))
        }
        // Another run owns the kind; it records its own audit row.
        Err(err @ TuningError::Busy(_)) => Err(err.into()),
        Err(err) => {
            record_run(
                &state,
                NewTuningRun {
                    kind,
                    status: RUN_FAILED,
                    reason: Some(err.to_string()),
                    before_mae: None,
                    after_mae: None,
                    iterations: None,
                    entry_count,
                    calibration_record_id: None,
                },
            )
            .await;
            Err(err.into())
        }
    }
}

// ---------------------------------------------------------------------------
// GET /tuning/{kind}/status
// ---------------------------------------------------------------------------

pub async fn status(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> AppResult<impl IntoResponse> {
    let kind = parse_kind(&kind)?;
    Ok(Json(DataResponse {
        data: TuningStatus {
            kind,
            state: state.tuning.state(kind),
        },
    }))
}

// ---------------------------------------------------------------------------
// GET /tuning/runs
// ---------------------------------------------------------------------------

/// Tuning audit history, newest first, optionally for one kind.
pub async fn list_runs(
    State(state): State<AppState>,
    Query(params): Query<TuningRunParams>,
) -> AppResult<impl IntoResponse> {
    let kind = params.kind.as_deref().map(parse_kind).transpose()?;
    let limit = clamp_limit(params.limit, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE);
    let offset = clamp_offset(params.offset);

    let runs = TuningRunRepo::list(&state.pool, kind, limit, offset).await?;
    Ok(Json(DataResponse { data: runs }))
}
