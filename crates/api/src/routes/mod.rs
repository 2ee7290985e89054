pub mod calibration;
pub mod health;
pub mod test_prints;
pub mod tuning;
pub mod validation;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /calibration/predict                  consumption model on live input (POST)
/// /calibration/effective                merged factors (GET)
/// /calibration/{kind}                   current snapshot (GET), replace (PUT)
/// /calibration/{kind}/refresh           reload from database (POST)
/// /calibration/{kind}/history           persisted records (GET)
/// /calibration/{kind}/diagnostics       database vs local cache vs memory (GET)
///
/// /test-prints                          list, create
/// /test-prints/{id}                     get, delete
///
/// /validation/run                       score a batch (POST)
/// /validation/export                    export document (GET)
///
/// /tuning/runs                          audit history (GET)
/// /tuning/{kind}                        run auto-tune (POST)
/// /tuning/{kind}/status                 idle | optimizing (GET)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/calibration", calibration::router())
        .nest("/test-prints", test_prints::router())
        .nest("/validation", validation::router())
        .nest("/tuning", tuning::router())
}
