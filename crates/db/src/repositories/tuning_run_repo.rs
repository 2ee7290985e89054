//! Repository for the `tuning_runs` table.

use inkcal_core::kind::CalibrationKind;
use sqlx::PgPool;

use crate::models::tuning_run::{NewTuningRun, TuningRun};

/// Column list for `tuning_runs` SELECT queries.
const COLUMNS: &str = "\
    id, kind, status, reason, before_mae, after_mae, iterations, \
    entry_count, calibration_record_id, created_at";

/// Provides query operations for the tuning audit trail.
pub struct TuningRunRepo;

impl TuningRunRepo {
    /// Record a finished run.
    pub async fn record(pool: &PgPool, input: &NewTuningRun) -> Result<TuningRun, sqlx::Error> {
        let query = format!(
            "INSERT INTO tuning_runs \
                (kind, status, reason, before_mae, after_mae, iterations, \
                 entry_count, calibration_record_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, TuningRun>(&query)
            .bind(input.kind.as_str())
            .bind(input.status)
            .bind(&input.reason)
            .bind(input.before_mae)
            .bind(input.after_mae)
            .bind(input.iterations)
            .bind(input.entry_count)
            .bind(input.calibration_record_id)
            .fetch_one(pool)
            .await
    }

    /// List runs newest first, optionally for one kind only.
    pub async fn list(
        pool: &PgPool,
        kind: Option<CalibrationKind>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<TuningRun>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM tuning_runs \
             WHERE ($1::TEXT IS NULL OR kind = $1) \
             ORDER BY id DESC \
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, TuningRun>(&query)
            .bind(kind.map(|k| k.as_str()))
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }
}
