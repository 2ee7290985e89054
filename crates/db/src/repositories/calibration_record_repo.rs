//! Repository for the `calibration_records` table.

use inkcal_core::kind::CalibrationKind;
use inkcal_core::types::DbId;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::models::calibration_record::{AppendOutcome, CalibrationRecord, NewCalibrationRecord};

/// Column list for `calibration_records` SELECT queries.
const COLUMNS: &str = "\
    id, kind, factors, source, note, before_mae, after_mae, created_at";

/// Provides query operations for calibration records.
pub struct CalibrationRecordRepo;

impl CalibrationRecordRepo {
    /// Latest record for a kind, if any has been persisted.
    pub async fn find_latest(
        pool: &PgPool,
        kind: CalibrationKind,
    ) -> Result<Option<CalibrationRecord>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM calibration_records \
             WHERE kind = $1 ORDER BY id DESC LIMIT 1"
        );
        sqlx::query_as::<_, CalibrationRecord>(&query)
            .bind(kind.as_str())
            .fetch_optional(pool)
            .await
    }

    /// Record history for a kind, newest first.
    pub async fn list_by_kind(
        pool: &PgPool,
        kind: CalibrationKind,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<CalibrationRecord>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM calibration_records \
             WHERE kind = $1 ORDER BY id DESC \
             LIMIT $2 OFFSET $3"
        );
        sqlx::query_as::<_, CalibrationRecord>(&query)
            .bind(kind.as_str())
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Append a record.
    ///
    /// Takes a transaction-scoped advisory lock on the kind so concurrent
    /// writers serialize. When `expected_latest` is `Some`, the insert only
    /// happens if the current latest id for the kind still equals it
    /// (`Some(None)` means "no record yet"); otherwise the transaction is
    /// rolled back and [`AppendOutcome::Conflict`] is returned.
    pub async fn append(
        pool: &PgPool,
        input: &NewCalibrationRecord,
        expected_latest: Option<Option<DbId>>,
    ) -> Result<AppendOutcome, sqlx::Error> {
        let mut tx = pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(input.kind.as_str())
            .execute(&mut *tx)
            .await?;

        let latest: Option<(DbId,)> = sqlx::query_as(
            "SELECT id FROM calibration_records WHERE kind = $1 ORDER BY id DESC LIMIT 1",
        )
        .bind(input.kind.as_str())
        .fetch_optional(&mut *tx)
        .await?;
        let latest_id = latest.map(|(id,)| id);

        if let Some(expected) = expected_latest {
            if expected != latest_id {
                tx.rollback().await?;
                return Ok(AppendOutcome::Conflict { latest_id });
            }
        }

        let query = format!(
            "INSERT INTO calibration_records \
                (kind, factors, source, note, before_mae, after_mae) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {COLUMNS}"
        );
        let record = sqlx::query_as::<_, CalibrationRecord>(&query)
            .bind(input.kind.as_str())
            .bind(Json(&input.factors))
            .bind(input.source.as_str())
            .bind(&input.note)
            .bind(input.before_mae)
            .bind(input.after_mae)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(AppendOutcome::Inserted(record))
    }
}
