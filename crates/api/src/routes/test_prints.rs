//! Route definitions for the `/test-prints` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::test_prints;
use crate::state::AppState;

/// Routes mounted at `/test-prints`.
///
/// ```text
/// GET    /        -> list      (?limit, ?offset)
/// POST   /        -> create
/// GET    /{id}    -> get_by_id
/// DELETE /{id}    -> delete
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(test_prints::list).post(test_prints::create))
        .route(
            "/{id}",
            get(test_prints::get_by_id).delete(test_prints::delete),
        )
}
