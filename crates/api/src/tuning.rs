//! Per-kind auto-tune orchestration.
//!
//! Wraps the pure search in [`inkcal_core::tuner`] with the parts that need
//! the runtime: one run per kind at a time, the search on a blocking
//! thread, and version-checked persistence through the calibration store.

use std::sync::Arc;

use inkcal_core::channel::Channel;
use inkcal_core::kind::{CalibrationKind, RecordSource};
use inkcal_core::test_data::TestDataEntry;
use inkcal_core::tuner::{auto_tune_channels, TunerOptions, TuningFailure, TuningState};
use inkcal_db::models::calibration_record::NewCalibrationRecord;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::calibration::{CalibrationError, CalibrationSnapshot, CalibrationStore};

#[derive(Debug, thiserror::Error)]
pub enum TuningError {
    #[error("An auto-tune for {0} is already running")]
    Busy(CalibrationKind),

    #[error(transparent)]
    Failed(#[from] TuningFailure),

    #[error(transparent)]
    Calibration(#[from] CalibrationError),

    #[error("Auto-tune task aborted: {0}")]
    Aborted(String),
}

/// A successful, persisted auto-tune.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TuningOutcome {
    pub kind: CalibrationKind,
    pub before_mae: f64,
    pub after_mae: f64,
    pub iterations: u32,
    pub evaluations: u32,
    pub entry_count: usize,
    pub tuned_channels: Vec<Channel>,
    pub converged: bool,
    /// The calibration as reloaded after persisting.
    pub calibration: CalibrationSnapshot,
}

pub struct TuningCoordinator {
    options: TunerOptions,
    cmyk: Arc<Mutex<()>>,
    special_layer: Arc<Mutex<()>>,
    combined: Arc<Mutex<()>>,
}

impl TuningCoordinator {
    pub fn new(options: TunerOptions) -> Self {
        Self {
            options,
            cmyk: Arc::new(Mutex::new(())),
            special_layer: Arc::new(Mutex::new(())),
            combined: Arc::new(Mutex::new(())),
        }
    }

    fn lock(&self, kind: CalibrationKind) -> &Arc<Mutex<()>> {
        match kind {
            CalibrationKind::Cmyk => &self.cmyk,
            CalibrationKind::SpecialLayer => &self.special_layer,
            CalibrationKind::Combined => &self.combined,
        }
    }

    pub fn state(&self, kind: CalibrationKind) -> TuningState {
        match self.lock(kind).try_lock() {
            Ok(_) => TuningState::Idle,
            Err(_) => TuningState::Optimizing,
        }
    }

    /// Tune `kind` against `entries` and persist the result.
    ///
    /// The search starts from the effective factors (what predictions use
    /// today) and only moves channels where the kind's record takes effect,
    /// so a later validation reproduces `after_mae`. Those channels are
    /// written back on top of the kind's latest record, and only if that
    /// record is still the latest.
    pub async fn run(
        &self,
        store: &CalibrationStore,
        kind: CalibrationKind,
        entries: Vec<TestDataEntry>,
    ) -> Result<TuningOutcome, TuningError> {
        let _guard = self
            .lock(kind)
            .clone()
            .try_lock_owned()
            .map_err(|_| TuningError::Busy(kind))?;

        tracing::info!(kind = %kind, entries = entries.len(), "Auto-tune started");

        let own = store.refresh_calibration_from_database(kind).await?;
        let effective = store.effective_calibration().await?;
        let channels = effective.writable_channels(kind);
        let start = effective.factors;

        let options = self.options;
        let search_channels = channels.clone();
        let report = tokio::task::spawn_blocking(move || {
            auto_tune_channels(&entries, &start, kind, &search_channels, &options)
        })
        .await
        .map_err(|e| TuningError::Aborted(e.to_string()))?;

        let report = match report {
            Ok(report) => report,
            Err(failure) => {
                tracing::warn!(kind = %kind, error = %failure, "Auto-tune failed");
                return Err(failure.into());
            }
        };

        let mut factors = own.factors.clone();
        factors.overlay(&report.factors, &channels);

        let record = NewCalibrationRecord {
            kind,
            factors,
            source: RecordSource::AutoTune,
            note: Some(format!(
                "auto-tune over {} test prints, MAE {:.4} -> {:.4}",
                report.entry_count, report.before_mae, report.after_mae
            )),
            before_mae: Some(report.before_mae),
            after_mae: Some(report.after_mae),
        };
        store.persist(record, Some(own.version)).await?;
        let calibration = store.refresh_calibration_from_database(kind).await?;

        tracing::info!(
            kind = %kind,
            before_mae = report.before_mae,
            after_mae = report.after_mae,
            iterations = report.iterations,
            version = ?calibration.version,
            "Auto-tune persisted",
        );

        Ok(TuningOutcome {
            kind,
            before_mae: report.before_mae,
            after_mae: report.after_mae,
            iterations: report.iterations,
            evaluations: report.evaluations,
            entry_count: report.entry_count,
            tuned_channels: report.tuned_channels,
            converged: report.converged,
            calibration,
        })
    }
}
