//! Shared query parameter types for API handlers.

use serde::Deserialize;

/// Generic pagination parameters (`?limit=&offset=`).
///
/// Values are clamped in the handlers via `clamp_limit` / `clamp_offset`.
#[derive(Debug, Deserialize)]
pub struct PaginationParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// `?kind=` filter plus pagination, for tuning run history.
#[derive(Debug, Deserialize)]
pub struct TuningRunParams {
    pub kind: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
