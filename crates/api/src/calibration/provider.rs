//! Source tiers for calibration factors and the resolver that walks them.

use std::sync::Arc;

use async_trait::async_trait;
use inkcal_core::factors::{default_factors, CalibrationFactors};
use inkcal_core::kind::CalibrationKind;
use inkcal_core::types::{DbId, Timestamp};
use inkcal_db::models::calibration_record::NewCalibrationRecord;
use serde::{Deserialize, Serialize};

use super::CalibrationError;

/// Where a snapshot was loaded from, in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTier {
    Database,
    LocalCache,
    Defaults,
}

impl SourceTier {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceTier::Database => "database",
            SourceTier::LocalCache => "local_cache",
            SourceTier::Defaults => "defaults",
        }
    }
}

/// Calibration factors for one kind, tagged with their provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationSnapshot {
    pub kind: CalibrationKind,
    pub factors: CalibrationFactors,
    pub source: SourceTier,
    /// Id of the database record these factors came from, if any.
    pub version: Option<DbId>,
    pub last_updated: Option<Timestamp>,
}

/// One tier of the fallback chain.
#[async_trait]
pub trait CalibrationProvider: Send + Sync {
    fn tier(&self) -> SourceTier;

    /// Latest factors this tier holds for `kind`. `Ok(None)` means the tier
    /// is reachable but empty.
    async fn fetch(&self, kind: CalibrationKind)
        -> Result<Option<CalibrationSnapshot>, CalibrationError>;
}

/// Append-only persistence of new factor sets.
#[async_trait]
pub trait CalibrationWriter: Send + Sync {
    /// Append `record`. With `expected_version` set, fail with
    /// [`CalibrationError::VersionConflict`] unless the latest stored version
    /// for the kind still matches it.
    async fn append(
        &self,
        record: &NewCalibrationRecord,
        expected_version: Option<Option<DbId>>,
    ) -> Result<CalibrationSnapshot, CalibrationError>;
}

/// Write side of the local cache tier.
#[async_trait]
pub trait LocalCalibrationCache: Send + Sync {
    async fn save(&self, snapshot: &CalibrationSnapshot) -> Result<(), CalibrationError>;
}

/// The compiled-in last resort. Never empty, never fails.
pub struct DefaultProvider;

#[async_trait]
impl CalibrationProvider for DefaultProvider {
    fn tier(&self) -> SourceTier {
        SourceTier::Defaults
    }

    async fn fetch(
        &self,
        kind: CalibrationKind,
    ) -> Result<Option<CalibrationSnapshot>, CalibrationError> {
        Ok(Some(CalibrationSnapshot {
            kind,
            factors: default_factors(),
            source: SourceTier::Defaults,
            version: None,
            last_updated: None,
        }))
    }
}

/// Try each provider in order and return the first snapshot found.
///
/// Failures are logged and treated as "fall through to the next tier".
pub async fn resolve(
    providers: &[Arc<dyn CalibrationProvider>],
    kind: CalibrationKind,
) -> Option<CalibrationSnapshot> {
    for provider in providers {
        let tier = provider.tier().as_str();
        match provider.fetch(kind).await {
            Ok(Some(snapshot)) => {
                tracing::debug!(
                    kind = %kind,
                    tier,
                    version = ?snapshot.version,
                    "Calibration resolved",
                );
                return Some(snapshot);
            }
            Ok(None) => {
                tracing::debug!(kind = %kind, tier, "No calibration at tier");
            }
            Err(e) => {
                tracing::warn!(
                    kind = %kind,
                    tier,
                    error = %e,
                    "Calibration source failed, falling through",
                );
            }
        }
    }
    None
}
