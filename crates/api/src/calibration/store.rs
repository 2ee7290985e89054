//! Cached access to the current calibration for each kind.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use inkcal_core::channel::Channel;
use inkcal_core::factors::{default_factors, CalibrationFactors};
use inkcal_core::kind::CalibrationKind;
use inkcal_core::types::{DbId, Timestamp};
use inkcal_db::models::calibration_record::NewCalibrationRecord;
use serde::Serialize;
use tokio::sync::RwLock;

use super::provider::{
    resolve, CalibrationProvider, CalibrationSnapshot, CalibrationWriter, DefaultProvider,
    LocalCalibrationCache, SourceTier,
};
use super::CalibrationError;

struct CachedSnapshot {
    snapshot: CalibrationSnapshot,
    loaded_at: Instant,
}

/// Factors merged across kinds, as used for prediction.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveCalibration {
    pub factors: CalibrationFactors,
    /// Tier each kind was loaded from.
    pub sources: BTreeMap<CalibrationKind, SourceTier>,
    /// Version of each kind's snapshot, `None` when not from a record.
    pub versions: BTreeMap<CalibrationKind, Option<DbId>>,
    /// Most recent `last_updated` among the contributing snapshots.
    pub calibration_date: Option<Timestamp>,
}

impl EffectiveCalibration {
    /// Channels where a new record of `kind` would change these factors.
    ///
    /// A `combined` record is overlaid first, so it is masked on every
    /// channel owned by a cmyk or special layer record that exists.
    pub fn writable_channels(&self, kind: CalibrationKind) -> Vec<Channel> {
        if kind != CalibrationKind::Combined {
            return kind.owned_channels().to_vec();
        }
        let masked: Vec<Channel> = [CalibrationKind::Cmyk, CalibrationKind::SpecialLayer]
            .into_iter()
            .filter(|k| {
                self.sources
                    .get(k)
                    .is_some_and(|source| *source != SourceTier::Defaults)
            })
            .flat_map(|k| k.owned_channels().iter().copied())
            .collect();
        Channel::ALL
            .into_iter()
            .filter(|c| !masked.contains(c))
            .collect()
    }
}

/// What one tier reports for a kind.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TierReport {
    pub tier: SourceTier,
    pub snapshot: Option<CalibrationSnapshot>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationDiagnostics {
    pub kind: CalibrationKind,
    pub tiers: Vec<TierReport>,
    pub in_memory: Option<CalibrationSnapshot>,
    /// True when every non-default tier and the in-memory copy that hold a
    /// snapshot agree on the factors.
    pub consistent: bool,
}

/// Process-wide calibration cache over an ordered fallback chain.
///
/// Reads are served from memory while younger than `ttl`; everything else
/// goes through the providers in order (database, local cache, defaults).
/// Snapshots that come from the database are written through to the local
/// cache so a later outage still sees the last known factors.
pub struct CalibrationStore {
    providers: Vec<Arc<dyn CalibrationProvider>>,
    writer: Arc<dyn CalibrationWriter>,
    local_cache: Arc<dyn LocalCalibrationCache>,
    ttl: Duration,
    cache: RwLock<HashMap<CalibrationKind, CachedSnapshot>>,
}

impl CalibrationStore {
    /// The standard chain: `database`, then `local_cache`, then defaults.
    pub fn new<D, L>(database: Arc<D>, local_cache: Arc<L>, ttl: Duration) -> Self
    where
        D: CalibrationProvider + CalibrationWriter + 'static,
        L: CalibrationProvider + LocalCalibrationCache + 'static,
    {
        let providers = vec![
            database.clone() as Arc<dyn CalibrationProvider>,
            local_cache.clone() as Arc<dyn CalibrationProvider>,
            Arc::new(DefaultProvider) as Arc<dyn CalibrationProvider>,
        ];
        Self {
            providers,
            writer: database,
            local_cache,
            ttl,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Current calibration for `kind`, from memory when fresh.
    pub async fn get_current_calibration(
        &self,
        kind: CalibrationKind,
    ) -> Result<CalibrationSnapshot, CalibrationError> {
        {
            let cache = self.cache.read().await;
            if let Some(entry) = cache.get(&kind) {
                if entry.loaded_at.elapsed() < self.ttl {
                    return Ok(entry.snapshot.clone());
                }
            }
        }
        self.load(kind).await
    }

    /// Drop the in-memory copy for `kind` and reload through the chain.
    pub async fn refresh_calibration_from_database(
        &self,
        kind: CalibrationKind,
    ) -> Result<CalibrationSnapshot, CalibrationError> {
        self.invalidate(kind).await;
        self.load(kind).await
    }

    /// Append a new factor set and invalidate the in-memory copy.
    ///
    /// `expected_version` is passed to the writer unchanged; see
    /// [`CalibrationWriter::append`].
    pub async fn persist(
        &self,
        record: NewCalibrationRecord,
        expected_version: Option<Option<DbId>>,
    ) -> Result<CalibrationSnapshot, CalibrationError> {
        record.factors.validate()?;
        let kind = record.kind;
        let result = self.writer.append(&record, expected_version).await;
        // Even a failed append may mean our copy is stale (version conflict).
        self.invalidate(kind).await;
        let snapshot = result?;
        tracing::info!(
            kind = %kind,
            version = ?snapshot.version,
            source = record.source.as_str(),
            "Calibration persisted",
        );
        Ok(snapshot)
    }

    /// Factors used for prediction: the combined record first, then the
    /// channels owned by the cmyk and special layer records on top.
    pub async fn effective_calibration(&self) -> Result<EffectiveCalibration, CalibrationError> {
        let mut factors = default_factors();
        let mut sources = BTreeMap::new();
        let mut versions = BTreeMap::new();
        let mut calibration_date: Option<Timestamp> = None;

        for kind in [
            CalibrationKind::Combined,
            CalibrationKind::Cmyk,
            CalibrationKind::SpecialLayer,
        ] {
            let snapshot = self.get_current_calibration(kind).await?;
            // A kind with nothing stored must not mask combined values.
            if kind == CalibrationKind::Combined || snapshot.source != SourceTier::Defaults {
                factors.overlay(&snapshot.factors, kind.owned_channels());
            }
            sources.insert(kind, snapshot.source);
            versions.insert(kind, snapshot.version);
            calibration_date = match (calibration_date, snapshot.last_updated) {
                (Some(a), Some(b)) => Some(a.max(b)),
                (a, b) => a.or(b),
            };
        }

        Ok(EffectiveCalibration {
            factors,
            sources,
            versions,
            calibration_date,
        })
    }

    /// In-memory copy for `kind`, regardless of age.
    pub async fn cached(&self, kind: CalibrationKind) -> Option<CalibrationSnapshot> {
        self.cache
            .read()
            .await
            .get(&kind)
            .map(|entry| entry.snapshot.clone())
    }

    pub async fn invalidate(&self, kind: CalibrationKind) {
        self.cache.write().await.remove(&kind);
    }

    /// Ask every tier directly and compare with the in-memory copy.
    pub async fn diagnostics(&self, kind: CalibrationKind) -> CalibrationDiagnostics {
        let mut tiers = Vec::with_capacity(self.providers.len());
        for provider in &self.providers {
            let (snapshot, error) = match provider.fetch(kind).await {
                Ok(snapshot) => (snapshot, None),
                Err(e) => (None, Some(e.to_string())),
            };
            tiers.push(TierReport {
                tier: provider.tier(),
                snapshot,
                error,
            });
        }
        let in_memory = self.cached(kind).await;

        let mut held = tiers
            .iter()
            .filter(|t| t.tier != SourceTier::Defaults)
            .filter_map(|t| t.snapshot.as_ref())
            .chain(in_memory.as_ref())
            .map(|s| &s.factors);
        let consistent = match held.next() {
            Some(first) => held.all(|f| f == first),
            None => true,
        };

        CalibrationDiagnostics {
            kind,
            tiers,
            in_memory,
            consistent,
        }
    }

    async fn load(&self, kind: CalibrationKind) -> Result<CalibrationSnapshot, CalibrationError> {
        let snapshot = resolve(&self.providers, kind)
            .await
            .ok_or(CalibrationError::Exhausted(kind))?;

        if snapshot.source == SourceTier::Database {
            if let Err(e) = self.local_cache.save(&snapshot).await {
                tracing::warn!(
                    kind = %kind,
                    error = %e,
                    "Failed to update local calibration cache",
                );
            }
        } else {
            tracing::warn!(
                kind = %kind,
                source = snapshot.source.as_str(),
                "Calibration database unavailable or empty, using fallback",
            );
        }

        self.cache.write().await.insert(
            kind,
            CachedSnapshot {
                snapshot: snapshot.clone(),
                loaded_at: Instant::now(),
            },
        );
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use inkcal_core::channel::Channel;
    use inkcal_core::kind::RecordSource;

    use crate::calibration::memory::InMemoryCalibrationBackend;

    const TTL: Duration = Duration::from_secs(300);

    fn setup(
        ttl: Duration,
    ) -> (
        CalibrationStore,
        Arc<InMemoryCalibrationBackend>,
        Arc<InMemoryCalibrationBackend>,
    ) {
        let database = Arc::new(InMemoryCalibrationBackend::new(SourceTier::Database));
        let local = Arc::new(InMemoryCalibrationBackend::new(SourceTier::LocalCache));
        let store = CalibrationStore::new(database.clone(), local.clone(), ttl);
        (store, database, local)
    }

    fn factors_with(channel: Channel, scaling: f64) -> CalibrationFactors {
        let mut factors = default_factors();
        factors.channel_scaling_factors.insert(channel, scaling);
        factors
    }

    fn record(kind: CalibrationKind, factors: CalibrationFactors) -> NewCalibrationRecord {
        NewCalibrationRecord {
            kind,
            factors,
            source: RecordSource::Manual,
            note: None,
            before_mae: None,
            after_mae: None,
        }
    }

    #[tokio::test]
    async fn empty_tiers_fall_back_to_defaults() {
        let (store, _, _) = setup(TTL);
        let snapshot = store.get_current_calibration(CalibrationKind::Cmyk).await.unwrap();
        assert_eq!(snapshot.source, SourceTier::Defaults);
        assert_eq!(snapshot.version, None);
    }

    #[tokio::test]
    async fn database_snapshot_is_written_through_to_local_cache() {
        let (store, database, local) = setup(TTL);
        database
            .insert_snapshot(CalibrationKind::Cmyk, factors_with(Channel::Cyan, 0.05), Some(4))
            .await;

        let snapshot = store.get_current_calibration(CalibrationKind::Cmyk).await.unwrap();
        assert_eq!(snapshot.source, SourceTier::Database);

        let cached = local.fetch(CalibrationKind::Cmyk).await.unwrap().unwrap();
        assert_eq!(cached.version, Some(4));
        assert_eq!(cached.factors, snapshot.factors);
    }

    #[tokio::test]
    async fn outage_serves_last_known_factors_from_local_cache() {
        let (store, database, _) = setup(TTL);
        database
            .insert_snapshot(CalibrationKind::Cmyk, factors_with(Channel::Cyan, 0.05), Some(4))
            .await;
        store.get_current_calibration(CalibrationKind::Cmyk).await.unwrap();

        database.set_unavailable(true);
        let snapshot = store
            .refresh_calibration_from_database(CalibrationKind::Cmyk)
            .await
            .unwrap();
        assert_eq!(snapshot.source, SourceTier::LocalCache);
        assert_eq!(snapshot.factors.scaling(Channel::Cyan), 0.05);
    }

    #[tokio::test]
    async fn fresh_cache_hides_external_writes_until_refresh() {
        let (store, database, _) = setup(TTL);
        let first = store.get_current_calibration(CalibrationKind::Cmyk).await.unwrap();
        assert_eq!(first.source, SourceTier::Defaults);

        database
            .insert_snapshot(CalibrationKind::Cmyk, factors_with(Channel::Cyan, 0.07), Some(9))
            .await;
        let still_cached = store.get_current_calibration(CalibrationKind::Cmyk).await.unwrap();
        assert_eq!(still_cached, first);

        let refreshed = store
            .refresh_calibration_from_database(CalibrationKind::Cmyk)
            .await
            .unwrap();
        assert_eq!(refreshed.version, Some(9));
    }

    #[tokio::test]
    async fn zero_ttl_always_reloads() {
        let (store, database, _) = setup(Duration::ZERO);
        store.get_current_calibration(CalibrationKind::Cmyk).await.unwrap();
        database
            .insert_snapshot(CalibrationKind::Cmyk, factors_with(Channel::Cyan, 0.07), Some(9))
            .await;
        let snapshot = store.get_current_calibration(CalibrationKind::Cmyk).await.unwrap();
        assert_eq!(snapshot.version, Some(9));
    }

    #[tokio::test]
    async fn refresh_is_idempotent() {
        let (store, database, _) = setup(TTL);
        database
            .insert_snapshot(
                CalibrationKind::SpecialLayer,
                factors_with(Channel::White, 0.1),
                Some(2),
            )
            .await;

        let a = store
            .refresh_calibration_from_database(CalibrationKind::SpecialLayer)
            .await
            .unwrap();
        let b = store
            .refresh_calibration_from_database(CalibrationKind::SpecialLayer)
            .await
            .unwrap();
        assert_eq!(a.factors, b.factors);
        assert_eq!(a.version, b.version);
        assert_eq!(a.source, b.source);
    }

    #[tokio::test]
    async fn persist_invalidates_and_next_read_sees_new_version() {
        let (store, _, _) = setup(TTL);
        store.get_current_calibration(CalibrationKind::Cmyk).await.unwrap();

        let saved = store
            .persist(
                record(CalibrationKind::Cmyk, factors_with(Channel::Cyan, 0.06)),
                Some(None),
            )
            .await
            .unwrap();
        assert!(store.cached(CalibrationKind::Cmyk).await.is_none());

        let current = store.get_current_calibration(CalibrationKind::Cmyk).await.unwrap();
        assert_eq!(current.version, saved.version);
        assert_eq!(current.factors.scaling(Channel::Cyan), 0.06);
    }

    #[tokio::test]
    async fn persist_with_stale_version_conflicts() {
        let (store, _, _) = setup(TTL);
        store
            .persist(record(CalibrationKind::Cmyk, default_factors()), None)
            .await
            .unwrap();
        let result = store
            .persist(record(CalibrationKind::Cmyk, default_factors()), Some(None))
            .await;
        assert_matches!(result, Err(CalibrationError::VersionConflict { .. }));
    }

    #[tokio::test]
    async fn persist_rejects_invalid_factors() {
        let (store, database, _) = setup(TTL);
        let result = store
            .persist(
                record(CalibrationKind::Cmyk, factors_with(Channel::Cyan, -1.0)),
                None,
            )
            .await;
        assert_matches!(result, Err(CalibrationError::Core(_)));
        assert_eq!(database.len(CalibrationKind::Cmyk).await, 0);
    }

    #[tokio::test]
    async fn effective_calibration_overlays_owned_channels() {
        let (store, database, _) = setup(TTL);
        let mut combined = default_factors();
        combined.channel_scaling_factors.insert(Channel::Cyan, 0.01);
        combined.channel_scaling_factors.insert(Channel::White, 0.01);
        database.insert_snapshot(CalibrationKind::Combined, combined, Some(1)).await;
        database
            .insert_snapshot(CalibrationKind::Cmyk, factors_with(Channel::Cyan, 0.05), Some(2))
            .await;

        let effective = store.effective_calibration().await.unwrap();
        // Cyan comes from the cmyk record; special layer has no record so
        // white keeps the combined value.
        assert_eq!(effective.factors.scaling(Channel::Cyan), 0.05);
        assert_eq!(effective.factors.scaling(Channel::White), 0.01);
        assert_eq!(effective.sources[&CalibrationKind::Cmyk], SourceTier::Database);
        assert_eq!(
            effective.sources[&CalibrationKind::SpecialLayer],
            SourceTier::Defaults
        );
        assert_eq!(effective.versions[&CalibrationKind::Combined], Some(1));
        assert!(effective.calibration_date.is_some());

        // The cmyk record masks combined on the standard channels only.
        assert_eq!(
            effective.writable_channels(CalibrationKind::Combined),
            vec![Channel::White, Channel::Gloss, Channel::Clear, Channel::Primer]
        );
        assert_eq!(
            effective.writable_channels(CalibrationKind::Cmyk),
            CalibrationKind::Cmyk.owned_channels().to_vec()
        );
    }

    #[tokio::test]
    async fn diagnostics_flag_divergent_tiers() {
        let (store, database, local) = setup(TTL);
        database
            .insert_snapshot(CalibrationKind::Cmyk, factors_with(Channel::Cyan, 0.05), Some(1))
            .await;
        store.get_current_calibration(CalibrationKind::Cmyk).await.unwrap();

        let report = store.diagnostics(CalibrationKind::Cmyk).await;
        assert!(report.consistent);
        assert_eq!(report.tiers.len(), 3);

        local
            .insert_snapshot(CalibrationKind::Cmyk, factors_with(Channel::Cyan, 0.09), Some(1))
            .await;
        let report = store.diagnostics(CalibrationKind::Cmyk).await;
        assert!(!report.consistent);
    }

    #[tokio::test]
    async fn diagnostics_record_tier_errors() {
        let (store, database, _) = setup(TTL);
        database.set_unavailable(true);
        let report = store.diagnostics(CalibrationKind::Combined).await;
        assert!(report.tiers[0].error.is_some());
        assert_eq!(report.tiers[2].tier, SourceTier::Defaults);
        assert!(report.tiers[2].snapshot.is_some());
    }
}
