//! Repository for the `test_prints` table.

use inkcal_core::types::DbId;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::models::test_print::{CreateTestPrint, TestPrint};

/// Column list for `test_prints` SELECT queries.
const COLUMNS: &str = "\
    id, ink_mode, quality, width, height, unit, \
    image_analysis, channel_ml, image_url, notes, created_at";

/// Provides CRUD operations for test prints.
pub struct TestPrintRepo;

impl TestPrintRepo {
    /// Insert a new test print, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateTestPrint) -> Result<TestPrint, sqlx::Error> {
        let query = format!(
            "INSERT INTO test_prints \
                (ink_mode, quality, width, height, unit, \
                 image_analysis, channel_ml, image_url, notes) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, TestPrint>(&query)
            .bind(&input.ink_mode)
            .bind(&input.quality)
            .bind(input.dimensions.width)
            .bind(input.dimensions.height)
            .bind(input.dimensions.unit.as_str())
            .bind(Json(&input.image_analysis))
            .bind(Json(&input.channel_ml))
            .bind(&input.image_url)
            .bind(&input.notes)
            .fetch_one(pool)
            .await
    }

    /// Find a test print by ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<TestPrint>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM test_prints WHERE id = $1");
        sqlx::query_as::<_, TestPrint>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List test prints, newest first.
    pub async fn list(
        pool: &PgPool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<TestPrint>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM test_prints \
             ORDER BY created_at DESC, id DESC \
             LIMIT $1 OFFSET $2"
        );
        sqlx::query_as::<_, TestPrint>(&query)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Every test print in insertion order; the validation and tuning batch.
    pub async fn list_all(pool: &PgPool) -> Result<Vec<TestPrint>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM test_prints ORDER BY id");
        sqlx::query_as::<_, TestPrint>(&query).fetch_all(pool).await
    }

    /// Test prints with the given IDs, in id order. Unknown IDs are ignored.
    pub async fn list_by_ids(pool: &PgPool, ids: &[DbId]) -> Result<Vec<TestPrint>, sqlx::Error> {
        if ids.is_empty() {
            return Ok(vec![]);
        }
        let query = format!(
            "SELECT {COLUMNS} FROM test_prints WHERE id = ANY($1) ORDER BY id"
        );
        sqlx::query_as::<_, TestPrint>(&query)
            .bind(ids)
            .fetch_all(pool)
            .await
    }

    /// Delete a test print. Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM test_prints WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
