//! Postgres-backed calibration tier.

use std::time::Duration;

use async_trait::async_trait;
use inkcal_core::kind::CalibrationKind;
use inkcal_core::types::DbId;
use inkcal_db::models::calibration_record::{
    AppendOutcome, CalibrationRecord, NewCalibrationRecord,
};
use inkcal_db::repositories::CalibrationRecordRepo;
use inkcal_db::DbPool;

use super::provider::{CalibrationProvider, CalibrationSnapshot, CalibrationWriter, SourceTier};
use super::CalibrationError;

/// Reads and appends `calibration_records`, bounding every call by `timeout`
/// so an unreachable database degrades to the next tier instead of hanging.
pub struct PgCalibrationBackend {
    pool: DbPool,
    timeout: Duration,
}

impl PgCalibrationBackend {
    pub fn new(pool: DbPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }
}

fn snapshot_from_record(
    record: CalibrationRecord,
) -> Result<CalibrationSnapshot, CalibrationError> {
    let kind = record.kind()?;
    Ok(CalibrationSnapshot {
        kind,
        factors: record.factors.0,
        source: SourceTier::Database,
        version: Some(record.id),
        last_updated: Some(record.created_at),
    })
}

#[async_trait]
impl CalibrationProvider for PgCalibrationBackend {
    fn tier(&self) -> SourceTier {
        SourceTier::Database
    }

    async fn fetch(
        &self,
        kind: CalibrationKind,
    ) -> Result<Option<CalibrationSnapshot>, CalibrationError> {
        let record = tokio::time::timeout(
            self.timeout,
            CalibrationRecordRepo::find_latest(&self.pool, kind),
        )
        .await
        .map_err(|_| CalibrationError::Timeout(self.timeout))??;

        record.map(snapshot_from_record).transpose()
    }
}

#[async_trait]
impl CalibrationWriter for PgCalibrationBackend {
    async fn append(
        &self,
        record: &NewCalibrationRecord,
        expected_version: Option<Option<DbId>>,
    ) -> Result<CalibrationSnapshot, CalibrationError> {
        let outcome = tokio::time::timeout(
            self.timeout,
            CalibrationRecordRepo::append(&self.pool, record, expected_version),
        )
        .await
        .map_err(|_| CalibrationError::Timeout(self.timeout))??;

        match outcome {
            AppendOutcome::Inserted(row) => snapshot_from_record(row),
            AppendOutcome::Conflict { latest_id } => Err(CalibrationError::VersionConflict {
                kind: record.kind,
                expected: expected_version.flatten(),
                actual: latest_id,
            }),
        }
    }
}
