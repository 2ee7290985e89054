//! Handlers for the `/calibration` resource: live prediction, the current
//! and effective factor sets, manual replacement, refresh and history.

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::Json;
use inkcal_core::channel::ChannelMap;
use inkcal_core::consumption::{predict, total_ml, Dimensions};
use inkcal_core::factors::CalibrationFactors;
use inkcal_core::kind::{CalibrationKind, RecordSource};
use inkcal_core::pagination::{clamp_limit, clamp_offset, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use inkcal_core::threshold_validation::validate_percent;
use inkcal_core::types::DbId;
use inkcal_db::models::calibration_record::NewCalibrationRecord;
use inkcal_db::repositories::CalibrationRecordRepo;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::query::PaginationParams;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub dimensions: Dimensions,
    /// Per-channel coverage, percent.
    pub channel_coverage: ChannelMap,
    pub quality: String,
    #[serde(default)]
    pub ink_mode: Option<String>,
    /// Score against these factors instead of the effective calibration.
    #[serde(default)]
    pub factors: Option<CalibrationFactors>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictResponse {
    pub channel_ml: ChannelMap,
    pub total_ml: f64,
    pub area_sq_in: f64,
    pub quality: String,
    pub ink_mode: Option<String>,
}

/// Body for a manual factor replacement.
#[derive(Debug, Deserialize)]
pub struct ReplaceCalibrationRequest {
    pub factors: CalibrationFactors,
    #[serde(default)]
    pub note: Option<String>,
    /// When set, the write only succeeds if this is still the latest
    /// record id for the kind.
    #[serde(default)]
    pub expected_version: Option<DbId>,
}

pub(crate) fn parse_kind(raw: &str) -> AppResult<CalibrationKind> {
    Ok(raw.parse::<CalibrationKind>()?)
}

// ---------------------------------------------------------------------------
// POST /calibration/predict
// ---------------------------------------------------------------------------

/// Run the consumption model on caller-supplied dimensions and coverage.
pub async fn predict_consumption(
    State(state): State<AppState>,
    Json(body): Json<PredictRequest>,
) -> AppResult<impl IntoResponse> {
    body.dimensions.validate()?;
    for (channel, coverage) in &body.channel_coverage {
        validate_percent(*coverage, &format!("channel_coverage.{channel}"))?;
    }

    let factors = match body.factors {
        Some(factors) => {
            factors.validate()?;
            factors
        }
        None => state.calibration.effective_calibration().await?.factors,
    };

    let channel_ml = predict(&body.dimensions, &body.channel_coverage, &body.quality, &factors);
    let total = total_ml(&channel_ml);

    Ok(Json(DataResponse {
        data: PredictResponse {
            total_ml: total,
            area_sq_in: body.dimensions.area_sq_in(),
            channel_ml,
            quality: body.quality,
            ink_mode: body.ink_mode,
        },
    }))
}

// ---------------------------------------------------------------------------
// GET /calibration/effective
// ---------------------------------------------------------------------------

pub async fn get_effective(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let effective = state.calibration.effective_calibration().await?;
    Ok(Json(DataResponse { data: effective }))
}

// ---------------------------------------------------------------------------
// GET /calibration/{kind}
// ---------------------------------------------------------------------------

pub async fn get_current(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> AppResult<impl IntoResponse> {
    let kind = parse_kind(&kind)?;
    let snapshot = state.calibration.get_current_calibration(kind).await?;
    Ok(Json(DataResponse { data: snapshot }))
}

// ---------------------------------------------------------------------------
// PUT /calibration/{kind}
// ---------------------------------------------------------------------------

/// Append a manually entered factor set for `kind`.
///
/// Scaling factors for the kind's channels must fall inside the configured
/// plausible band; this catches coverage-unit mistakes before they reach
/// production predictions.
pub async fn replace(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Json(body): Json<ReplaceCalibrationRequest>,
) -> AppResult<impl IntoResponse> {
    let kind = parse_kind(&kind)?;
    body.factors.validate()?;
    body.factors
        .check_plausible(kind.owned_channels(), &state.config.calibration.tuner.band)?;

    let record = NewCalibrationRecord {
        kind,
        factors: body.factors,
        source: RecordSource::Manual,
        note: body.note,
        before_mae: None,
        after_mae: None,
    };
    state
        .calibration
        .persist(record, body.expected_version.map(Some))
        .await?;
    let snapshot = state.calibration.refresh_calibration_from_database(kind).await?;

    tracing::info!(kind = %kind, version = ?snapshot.version, "Calibration replaced manually");

    Ok(Json(DataResponse { data: snapshot }))
}

// ---------------------------------------------------------------------------
// POST /calibration/{kind}/refresh
// ---------------------------------------------------------------------------

pub async fn refresh(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> AppResult<impl IntoResponse> {
    let kind = parse_kind(&kind)?;
    let snapshot = state.calibration.refresh_calibration_from_database(kind).await?;
    Ok(Json(DataResponse { data: snapshot }))
}

// ---------------------------------------------------------------------------
// GET /calibration/{kind}/history
// ---------------------------------------------------------------------------

/// Persisted records for `kind`, newest first.
pub async fn history(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(params): Query<PaginationParams>,
) -> AppResult<impl IntoResponse> {
    let kind = parse_kind(&kind)?;
    let limit = clamp_limit(params.limit, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE);
    let offset = clamp_offset(params.offset);

    let records = CalibrationRecordRepo::list_by_kind(&state.pool, kind, limit, offset).await?;
    Ok(Json(DataResponse { data: records }))
}

// ---------------------------------------------------------------------------
// GET /calibration/{kind}/diagnostics
// ---------------------------------------------------------------------------

pub async fn diagnostics(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> AppResult<impl IntoResponse> {
    let kind = parse_kind(&kind)?;
    let report = state.calibration.diagnostics(kind).await;
    if !report.consistent {
        tracing::warn!(kind = %kind, "Calibration tiers disagree");
    }
    Ok(Json(DataResponse { data: report }))
}
