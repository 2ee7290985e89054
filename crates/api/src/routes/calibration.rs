//! Route definitions for the `/calibration` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::calibration;
use crate::state::AppState;

/// Routes mounted at `/calibration`.
///
/// ```text
/// POST   /predict              -> predict_consumption
/// GET    /effective            -> get_effective
/// GET    /{kind}               -> get_current
/// PUT    /{kind}               -> replace
/// POST   /{kind}/refresh       -> refresh
/// GET    /{kind}/history       -> history      (?limit, ?offset)
/// GET    /{kind}/diagnostics   -> diagnostics
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/predict", post(calibration::predict_consumption))
        .route("/effective", get(calibration::get_effective))
        .route(
            "/{kind}",
            get(calibration::get_current).put(calibration::replace),
        )
        .route("/{kind}/refresh", post(calibration::refresh))
        .route("/{kind}/history", get(calibration::history))
        .route("/{kind}/diagnostics", get(calibration::diagnostics))
}
