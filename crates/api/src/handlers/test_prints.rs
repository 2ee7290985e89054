//! Handlers for the `/test-prints` resource.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use inkcal_core::error::CoreError;
use inkcal_core::pagination::{clamp_limit, clamp_offset, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use inkcal_core::types::DbId;
use inkcal_db::models::test_print::CreateTestPrint;
use inkcal_db::repositories::TestPrintRepo;

use crate::error::AppResult;
use crate::query::PaginationParams;
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /test-prints
pub async fn create(
    State(state): State<AppState>,
    Json(input): Json<CreateTestPrint>,
) -> AppResult<impl IntoResponse> {
    input.validate_input()?;

    let print = TestPrintRepo::create(&state.pool, &input).await?;

    tracing::info!(
        test_print_id = print.id,
        ink_mode = %print.ink_mode,
        quality = %print.quality,
        "Test print recorded",
    );

    Ok((StatusCode::CREATED, Json(DataResponse { data: print })))
}

/// GET /test-prints
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<PaginationParams>,
) -> AppResult<impl IntoResponse> {
    let limit = clamp_limit(params.limit, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE);
    let offset = clamp_offset(params.offset);

    let prints = TestPrintRepo::list(&state.pool, limit, offset).await?;
    Ok(Json(DataResponse { data: prints }))
}

/// GET /test-prints/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let print = TestPrintRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "TestPrint",
            id,
        })?;
    Ok(Json(DataResponse { data: print }))
}

/// DELETE /test-prints/{id}
pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    if !TestPrintRepo::delete(&state.pool, id).await? {
        return Err(CoreError::NotFound {
            entity: "TestPrint",
            id,
        }
        .into());
    }
    tracing::info!(test_print_id = id, "Test print deleted");
    Ok(StatusCode::NO_CONTENT)
}
