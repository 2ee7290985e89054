//! Route definitions for the `/validation` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::validation;
use crate::state::AppState;

/// Routes mounted at `/validation`.
///
/// ```text
/// POST   /run      -> run
/// GET    /export   -> export
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/run", post(validation::run))
        .route("/export", get(validation::export))
}
