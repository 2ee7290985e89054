use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use inkcal_core::error::CoreError;
use serde_json::json;

use crate::calibration::CalibrationError;
use crate::tuning::TuningError;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce `{ "error", "code" }` JSON bodies.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Failure in the calibration store or one of its tiers.
    #[error(transparent)]
    Calibration(#[from] CalibrationError),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The auto-tuner refused to produce factors; the message is returned
    /// to the caller verbatim.
    #[error("{0}")]
    TuningFailed(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl From<TuningError> for AppError {
    fn from(err: TuningError) -> Self {
        match err {
            TuningError::Busy(kind) => AppError::Core(CoreError::Conflict(format!(
                "An auto-tune for {kind} is already running"
            ))),
            TuningError::Failed(failure) => AppError::TuningFailed(failure.to_string()),
            TuningError::Calibration(e) => AppError::Calibration(e),
            TuningError::Aborted(msg) => AppError::InternalError(msg),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(core) => classify_core_error(core),

            AppError::Database(err) => classify_sqlx_error(err),

            AppError::Calibration(err) => match err {
                CalibrationError::VersionConflict { .. } => {
                    (StatusCode::CONFLICT, "CONFLICT", err.to_string())
                }
                CalibrationError::Timeout(_) => {
                    tracing::warn!(error = %err, "Calibration database timed out");
                    (
                        StatusCode::SERVICE_UNAVAILABLE,
                        "UNAVAILABLE",
                        "The calibration database did not respond in time".to_string(),
                    )
                }
                CalibrationError::Database(db) => classify_sqlx_error(db),
                CalibrationError::Core(core) => classify_core_error(core),
                other => {
                    tracing::error!(error = %other, "Calibration error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "INTERNAL_ERROR",
                        "An internal error occurred".to_string(),
                    )
                }
            },

            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::TuningFailed(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "TUNING_FAILED",
                msg.clone(),
            ),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

fn classify_core_error(core: &CoreError) -> (StatusCode, &'static str, String) {
    match core {
        CoreError::NotFound { entity, id } => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{entity} with id {id} not found"),
        ),
        CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
        CoreError::Internal(msg) => {
            tracing::error!(error = %msg, "Internal core error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            )
        }
    }
}

/// Classify a sqlx error into an HTTP status, error code, and message.
///
/// - `RowNotFound` maps to 404.
/// - Pool exhaustion and I/O failures map to 503.
/// - Everything else maps to 500 with a sanitized message.
fn classify_sqlx_error(err: &sqlx::Error) -> (StatusCode, &'static str, String) {
    match err {
        sqlx::Error::RowNotFound => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Resource not found".to_string(),
        ),
        sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => {
            tracing::warn!(error = %err, "Database unreachable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "UNAVAILABLE",
                "The database is currently unavailable".to_string(),
            )
        }
        other => {
            tracing::error!(error = %other, "Database error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            )
        }
    }
}
