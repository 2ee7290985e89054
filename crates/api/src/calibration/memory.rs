//! In-process calibration tier.
//!
//! Stands in for the database or the local cache file when no Postgres
//! instance is available, such as in tests and local experiments.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use async_trait::async_trait;
use inkcal_core::factors::CalibrationFactors;
use inkcal_core::kind::CalibrationKind;
use inkcal_core::types::DbId;
use inkcal_db::models::calibration_record::NewCalibrationRecord;
use tokio::sync::RwLock;

use super::provider::{
    CalibrationProvider, CalibrationSnapshot, CalibrationWriter, LocalCalibrationCache,
    SourceTier,
};
use super::CalibrationError;

/// Append-only history per kind, reported under a configurable tier.
pub struct InMemoryCalibrationBackend {
    tier: SourceTier,
    history: RwLock<HashMap<CalibrationKind, Vec<CalibrationSnapshot>>>,
    next_id: AtomicI64,
    unavailable: AtomicBool,
}

impl InMemoryCalibrationBackend {
    pub fn new(tier: SourceTier) -> Self {
        Self {
            tier,
            history: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Make every read and write fail until reset, simulating an outage.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Seed a snapshot directly, bypassing version checks.
    pub async fn insert_snapshot(
        &self,
        kind: CalibrationKind,
        factors: CalibrationFactors,
        version: Option<DbId>,
    ) {
        let snapshot = CalibrationSnapshot {
            kind,
            factors,
            source: self.tier,
            version,
            last_updated: Some(chrono::Utc::now()),
        };
        self.history.write().await.entry(kind).or_default().push(snapshot);
    }

    /// Number of snapshots held for `kind`.
    pub async fn len(&self, kind: CalibrationKind) -> usize {
        self.history.read().await.get(&kind).map_or(0, Vec::len)
    }

    fn check_available(&self) -> Result<(), CalibrationError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CalibrationError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                format!("{} tier is unavailable", self.tier.as_str()),
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl CalibrationProvider for InMemoryCalibrationBackend {
    fn tier(&self) -> SourceTier {
        self.tier
    }

    async fn fetch(
        &self,
        kind: CalibrationKind,
    ) -> Result<Option<CalibrationSnapshot>, CalibrationError> {
        self.check_available()?;
        Ok(self
            .history
            .read()
            .await
            .get(&kind)
            .and_then(|h| h.last())
            .cloned())
    }
}

#[async_trait]
impl CalibrationWriter for InMemoryCalibrationBackend {
    async fn append(
        &self,
        record: &NewCalibrationRecord,
        expected_version: Option<Option<DbId>>,
    ) -> Result<CalibrationSnapshot, CalibrationError> {
        self.check_available()?;
        let mut history = self.history.write().await;
        let entries = history.entry(record.kind).or_default();
        let latest = entries.last().and_then(|s| s.version);

        if let Some(expected) = expected_version {
            if expected != latest {
                return Err(CalibrationError::VersionConflict {
                    kind: record.kind,
                    expected,
                    actual: latest,
                });
            }
        }

        let snapshot = CalibrationSnapshot {
            kind: record.kind,
            factors: record.factors.clone(),
            source: self.tier,
            version: Some(self.next_id.fetch_add(1, Ordering::SeqCst)),
            last_updated: Some(chrono::Utc::now()),
        };
        entries.push(snapshot.clone());
        Ok(snapshot)
    }
}

#[async_trait]
impl LocalCalibrationCache for InMemoryCalibrationBackend {
    async fn save(&self, snapshot: &CalibrationSnapshot) -> Result<(), CalibrationError> {
        self.check_available()?;
        let stored = CalibrationSnapshot {
            source: self.tier,
            ..snapshot.clone()
        };
        self.history
            .write()
            .await
            .entry(snapshot.kind)
            .or_default()
            .push(stored);
        Ok(())
    }
}
