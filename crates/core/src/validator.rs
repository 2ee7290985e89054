//! Batch validation of calibration factors against measured test prints.
//!
//! Every aggregate here is a pooled mean: each (entry, channel) absolute
//! difference counts once, so a channel measured on many prints weighs more
//! than one measured on a few. The auto-tuner minimizes the same pooled
//! `overall_mae`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::channel::{Channel, ChannelGroup, ChannelMap};
use crate::consumption::{predict, predict_channel};
use crate::factors::CalibrationFactors;
use crate::test_data::TestDataEntry;
use crate::types::DbId;

// ---------------------------------------------------------------------------
// Size buckets
// ---------------------------------------------------------------------------

/// Upper bound (exclusive) of the small bucket, square inches.
pub const SMALL_PRINT_MAX_SQ_IN: f64 = 4.0;
/// Upper bound (inclusive) of the medium bucket, square inches.
pub const MEDIUM_PRINT_MAX_SQ_IN: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeBucket {
    Small,
    Medium,
    Large,
}

impl SizeBucket {
    pub fn from_area(area_sq_in: f64) -> Self {
        if area_sq_in < SMALL_PRINT_MAX_SQ_IN {
            SizeBucket::Small
        } else if area_sq_in <= MEDIUM_PRINT_MAX_SQ_IN {
            SizeBucket::Medium
        } else {
            SizeBucket::Large
        }
    }
}

// ---------------------------------------------------------------------------
// Per-entry results
// ---------------------------------------------------------------------------

/// Prediction vs. measurement for one test print. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    pub test_id: DbId,
    pub ink_mode: String,
    pub quality: String,
    pub area_sq_in: f64,
    pub predicted_values: ChannelMap,
    pub actual_values: ChannelMap,
    /// `|predicted - actual|` for every measured channel.
    pub channel_differences: ChannelMap,
    /// `predicted - actual`, for showing the direction of the error.
    pub signed_differences: ChannelMap,
}

/// Score a single entry.
pub fn validate_entry(entry: &TestDataEntry, factors: &CalibrationFactors) -> ValidationResult {
    let area = entry.dimensions.area_sq_in();
    let mut predicted_values = predict(
        &entry.dimensions,
        &entry.image_analysis.channel_coverage,
        &entry.quality,
        factors,
    );

    let mut channel_differences = ChannelMap::new();
    let mut signed_differences = ChannelMap::new();
    for (&channel, &actual) in &entry.channel_ml {
        let predicted = *predicted_values.entry(channel).or_insert_with(|| {
            predict_channel(channel, 0.0, area, &entry.quality, factors)
        });
        let delta = predicted - actual;
        signed_differences.insert(channel, delta);
        channel_differences.insert(channel, delta.abs());
    }

    ValidationResult {
        test_id: entry.id,
        ink_mode: entry.ink_mode.clone(),
        quality: entry.quality.clone(),
        area_sq_in: area,
        predicted_values,
        actual_values: entry.channel_ml.clone(),
        channel_differences,
        signed_differences,
    }
}

/// Score every entry in the batch, in order.
///
/// Callers filter out entries without coverage first (see
/// [`crate::test_data::usable_entries`]).
pub fn validate_test_batch(
    entries: &[TestDataEntry],
    factors: &CalibrationFactors,
) -> Vec<ValidationResult> {
    entries.iter().map(|e| validate_entry(e, factors)).collect()
}

// ---------------------------------------------------------------------------
// Aggregates
// ---------------------------------------------------------------------------

/// A mean absolute error and the number of differences behind it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaeAggregate {
    pub mae: f64,
    pub samples: usize,
}

#[derive(Debug, Default, Clone, Copy)]
struct MaeAccumulator {
    sum: f64,
    count: usize,
}

impl MaeAccumulator {
    fn push(&mut self, difference: f64) {
        self.sum += difference;
        self.count += 1;
    }

    fn finish(self) -> Option<MaeAggregate> {
        (self.count > 0).then(|| MaeAggregate {
            mae: self.sum / self.count as f64,
            samples: self.count,
        })
    }
}

/// MAE statistics for a validation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaeStats {
    /// Pooled mean over every (entry, channel) difference.
    pub overall_mae: f64,
    /// Number of pooled differences.
    pub sample_count: usize,
    /// Number of entries scored.
    pub entry_count: usize,
    pub channel_mae: BTreeMap<Channel, MaeAggregate>,
    /// Cyan, magenta, yellow and black pooled.
    pub standard_mae: Option<MaeAggregate>,
    /// White, gloss, clear and primer pooled.
    pub special_layer_mae: Option<MaeAggregate>,
    pub size_bucket_mae: BTreeMap<SizeBucket, MaeAggregate>,
    pub ink_mode_mae: BTreeMap<String, MaeAggregate>,
}

/// Aggregate a run into MAE statistics.
///
/// Returns `None` when there is nothing to average: an empty batch, or
/// entries with no measured channels.
pub fn calculate_mae_stats(results: &[ValidationResult]) -> Option<MaeStats> {
    let mut overall = MaeAccumulator::default();
    let mut per_channel: BTreeMap<Channel, MaeAccumulator> = BTreeMap::new();
    let mut standard = MaeAccumulator::default();
    let mut special = MaeAccumulator::default();
    let mut per_bucket: BTreeMap<SizeBucket, MaeAccumulator> = BTreeMap::new();
    let mut per_ink_mode: BTreeMap<String, MaeAccumulator> = BTreeMap::new();

    for result in results {
        let bucket = SizeBucket::from_area(result.area_sq_in);
        for (&channel, &difference) in &result.channel_differences {
            overall.push(difference);
            per_channel.entry(channel).or_default().push(difference);
            match channel.group() {
                ChannelGroup::Standard => standard.push(difference),
                ChannelGroup::SpecialLayer => special.push(difference),
            }
            per_bucket.entry(bucket).or_default().push(difference);
            per_ink_mode
                .entry(result.ink_mode.clone())
                .or_default()
                .push(difference);
        }
    }

    let overall = overall.finish()?;
    Some(MaeStats {
        overall_mae: overall.mae,
        sample_count: overall.samples,
        entry_count: results.len(),
        channel_mae: finish_all(per_channel),
        standard_mae: standard.finish(),
        special_layer_mae: special.finish(),
        size_bucket_mae: finish_all(per_bucket),
        ink_mode_mae: finish_all(per_ink_mode),
    })
}

fn finish_all<K: Ord>(accumulators: BTreeMap<K, MaeAccumulator>) -> BTreeMap<K, MaeAggregate> {
    accumulators
        .into_iter()
        .filter_map(|(key, acc)| acc.finish().map(|agg| (key, agg)))
        .collect()
}

/// Pooled MAE of `factors` over `entries`; the auto-tuner's objective.
pub fn overall_mae(entries: &[TestDataEntry], factors: &CalibrationFactors) -> Option<f64> {
    let mut acc = MaeAccumulator::default();
    for entry in entries {
        for difference in validate_entry(entry, factors).channel_differences.values() {
            acc.push(*difference);
        }
    }
    acc.finish().map(|agg| agg.mae)
}
