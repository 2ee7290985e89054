//! Route definitions for the `/tuning` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::tuning;
use crate::state::AppState;

/// Routes mounted at `/tuning`.
///
/// ```text
/// GET    /runs            -> list_runs   (?kind, ?limit, ?offset)
/// POST   /{kind}          -> run
/// GET    /{kind}/status   -> status
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/runs", get(tuning::list_runs))
        .route("/{kind}", post(tuning::run))
        .route("/{kind}/status", get(tuning::status))
}
