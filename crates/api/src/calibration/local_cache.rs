//! JSON-file calibration tier, one file per kind.
//!
//! Holds the last factors successfully read from the database so the
//! service keeps its calibration across restarts while the database is
//! unreachable.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use inkcal_core::factors::CalibrationFactors;
use inkcal_core::kind::CalibrationKind;
use inkcal_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use super::provider::{
    CalibrationProvider, CalibrationSnapshot, LocalCalibrationCache, SourceTier,
};
use super::CalibrationError;

/// On-disk shape of a cached calibration.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CachedCalibration {
    kind: CalibrationKind,
    factors: CalibrationFactors,
    version: Option<DbId>,
    last_updated: Option<Timestamp>,
}

pub struct LocalFileCache {
    dir: PathBuf,
}

impl LocalFileCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, kind: CalibrationKind) -> PathBuf {
        self.dir.join(format!("{}.json", kind.as_str()))
    }
}

#[async_trait]
impl CalibrationProvider for LocalFileCache {
    fn tier(&self) -> SourceTier {
        SourceTier::LocalCache
    }

    async fn fetch(
        &self,
        kind: CalibrationKind,
    ) -> Result<Option<CalibrationSnapshot>, CalibrationError> {
        let bytes = match tokio::fs::read(self.path_for(kind)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let cached: CachedCalibration = serde_json::from_slice(&bytes)?;
        if cached.kind != kind {
            tracing::warn!(
                expected = %kind,
                found = %cached.kind,
                "Local calibration cache file holds another kind, ignoring",
            );
            return Ok(None);
        }
        cached.factors.validate()?;

        Ok(Some(CalibrationSnapshot {
            kind,
            factors: cached.factors,
            source: SourceTier::LocalCache,
            version: cached.version,
            last_updated: cached.last_updated,
        }))
    }
}

#[async_trait]
impl LocalCalibrationCache for LocalFileCache {
    async fn save(&self, snapshot: &CalibrationSnapshot) -> Result<(), CalibrationError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let body = serde_json::to_vec_pretty(&CachedCalibration {
            kind: snapshot.kind,
            factors: snapshot.factors.clone(),
            version: snapshot.version,
            last_updated: snapshot.last_updated,
        })?;

        // Each save writes its own temp file and renames it over the target,
        // so concurrent saves for one kind never share a partial file.
        let dir = self.dir.clone();
        let path = self.path_for(snapshot.kind);
        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            let mut file = NamedTempFile::new_in(&dir)?;
            file.write_all(&body)?;
            file.persist(&path)?;
            Ok(())
        })
        .await
        .map_err(|e| std::io::Error::other(e.to_string()))??;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use inkcal_core::channel::Channel;
    use inkcal_core::factors::default_factors;
    use std::sync::Arc;

    fn snapshot(kind: CalibrationKind, cyan: f64) -> CalibrationSnapshot {
        let mut factors = default_factors();
        factors.channel_scaling_factors.insert(Channel::Cyan, cyan);
        CalibrationSnapshot {
            kind,
            factors,
            source: SourceTier::Database,
            version: Some(12),
            last_updated: Some(chrono::Utc::now()),
        }
    }

    #[tokio::test]
    async fn missing_file_is_empty_tier() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LocalFileCache::new(dir.path());
        assert!(cache.fetch(CalibrationKind::Cmyk).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_then_fetch_reports_local_cache_source() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LocalFileCache::new(dir.path().join("nested"));
        cache.save(&snapshot(CalibrationKind::Cmyk, 0.05)).await.unwrap();

        let loaded = cache.fetch(CalibrationKind::Cmyk).await.unwrap().unwrap();
        assert_eq!(loaded.source, SourceTier::LocalCache);
        assert_eq!(loaded.version, Some(12));
        assert_eq!(loaded.factors.scaling(Channel::Cyan), 0.05);
        assert!(cache.fetch(CalibrationKind::SpecialLayer).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LocalFileCache::new(dir.path());
        tokio::fs::write(dir.path().join("cmyk.json"), b"{not json")
            .await
            .unwrap();
        assert_matches!(
            cache.fetch(CalibrationKind::Cmyk).await,
            Err(CalibrationError::Decode(_))
        );
    }

    #[tokio::test]
    async fn file_for_other_kind_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LocalFileCache::new(dir.path());
        cache.save(&snapshot(CalibrationKind::Combined, 0.05)).await.unwrap();
        tokio::fs::rename(dir.path().join("combined.json"), dir.path().join("cmyk.json"))
            .await
            .unwrap();
        assert!(cache.fetch(CalibrationKind::Cmyk).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_saves_leave_one_complete_file() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(LocalFileCache::new(dir.path()));

        let tasks: Vec<_> = (0..16)
            .map(|i| {
                let cache = cache.clone();
                tokio::spawn(async move {
                    let cyan = 0.03 + f64::from(i) * 0.001;
                    cache.save(&snapshot(CalibrationKind::Cmyk, cyan)).await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let loaded = cache.fetch(CalibrationKind::Cmyk).await.unwrap().unwrap();
        assert_eq!(loaded.kind, CalibrationKind::Cmyk);
        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["cmyk.json".to_string()]);
    }
}
