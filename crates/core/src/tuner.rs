//! Deterministic auto-tuning of calibration factors.
//!
//! Fits the scaling factor (and optionally the base consumption) of every
//! channel owned by a [`CalibrationKind`] so that the pooled MAE of
//! [`crate::validator::overall_mae`] over a batch of test prints is
//! minimized:
//!
//! 1. A closed-form least-squares estimate of each scaling factor is tried
//!    first and kept only if it lowers the objective.
//! 2. Coordinate descent then tries `value * (1 ± step)` for each parameter,
//!    walking down [`STEP_SCHEDULE`] whenever a full sweep finds nothing
//!    better than the current objective by more than the tolerance.
//!
//! A candidate is only ever accepted when it lowers the objective, so the
//! result never scores worse than the starting factors.

use serde::{Deserialize, Serialize};

use crate::channel::{Channel, ChannelMap};
use crate::consumption::coverage_volume;
use crate::factors::{CalibrationFactors, PlausibleBand};
use crate::kind::CalibrationKind;
use crate::test_data::TestDataEntry;
use crate::validator::overall_mae;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Fewest usable test prints a tuning run accepts.
pub const MIN_TUNING_ENTRIES: usize = 5;
/// Default cap on coordinate-descent sweeps.
pub const DEFAULT_MAX_ITERATIONS: u32 = 200;
/// Default minimum MAE improvement for a candidate to be accepted.
pub const DEFAULT_TOLERANCE: f64 = 1e-6;

/// Relative step sizes, coarse to fine.
pub const STEP_SCHEDULE: &[f64] = &[0.5, 0.25, 0.1, 0.05, 0.01];
/// Candidates tried for a scaling factor that is currently zero.
pub const ZERO_SCALING_SEEDS: &[f64] = &[0.001, 0.01, 0.03, 0.05, 0.1, 0.5];
/// Candidates tried for a base consumption that is currently zero.
pub const ZERO_BASE_SEEDS: &[f64] = &[0.001, 0.005, 0.01, 0.05];

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TunerOptions {
    pub min_entries: usize,
    pub max_iterations: u32,
    pub tolerance: f64,
    /// Also fit base consumption, not just scaling factors.
    pub include_base: bool,
    pub band: PlausibleBand,
}

impl Default for TunerOptions {
    fn default() -> Self {
        Self {
            min_entries: MIN_TUNING_ENTRIES,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            tolerance: DEFAULT_TOLERANCE,
            include_base: false,
            band: PlausibleBand::default(),
        }
    }
}

/// Whether a tuning run is in flight for a calibration kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TuningState {
    Idle,
    Optimizing,
}

/// Result of a successful search.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TuningReport {
    pub kind: CalibrationKind,
    /// Full factor set with the tuned channels updated.
    pub factors: CalibrationFactors,
    pub before_mae: f64,
    pub after_mae: f64,
    pub iterations: u32,
    pub evaluations: u32,
    pub entry_count: usize,
    pub tuned_channels: Vec<Channel>,
    /// False when the search stopped at `max_iterations`.
    pub converged: bool,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TuningFailure {
    #[error(
        "Auto-tune for {kind} needs at least {required} usable test prints with \
         measurements for its channels, found {found}"
    )]
    InsufficientData {
        kind: CalibrationKind,
        found: usize,
        required: usize,
    },

    #[error(
        "Every channel of {kind} is overridden by a more specific calibration record; \
         tune cmyk or special_layer instead"
    )]
    NoTunableChannels { kind: CalibrationKind },

    #[error(
        "Fitted scaling factor for {channel} is {value}, outside the plausible range \
         {min}..={max}; check coverage units (percent vs. fraction)"
    )]
    Implausible {
        channel: Channel,
        value: f64,
        min: f64,
        max: f64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Parameter {
    Scaling(Channel),
    Base(Channel),
}

impl Parameter {
    fn map<'a>(&self, factors: &'a mut CalibrationFactors) -> (&'a mut ChannelMap, Channel) {
        match *self {
            Parameter::Scaling(c) => (&mut factors.channel_scaling_factors, c),
            Parameter::Base(c) => (&mut factors.base_consumption, c),
        }
    }

    fn get(&self, factors: &CalibrationFactors) -> f64 {
        match *self {
            Parameter::Scaling(c) => factors.scaling(c),
            Parameter::Base(c) => factors.base(c),
        }
    }

    fn raw(&self, factors: &mut CalibrationFactors) -> Option<f64> {
        let (map, channel) = self.map(factors);
        map.get(&channel).copied()
    }

    fn set(&self, factors: &mut CalibrationFactors, value: f64) {
        let (map, channel) = self.map(factors);
        map.insert(channel, value);
    }

    fn restore(&self, factors: &mut CalibrationFactors, original: Option<f64>) {
        let (map, channel) = self.map(factors);
        match original {
            Some(value) => map.insert(channel, value),
            None => map.remove(&channel),
        };
    }

    fn candidates(&self, value: f64, step: f64) -> Vec<f64> {
        if value > 0.0 {
            return vec![value * (1.0 - step), value * (1.0 + step)];
        }
        match self {
            Parameter::Scaling(_) => ZERO_SCALING_SEEDS.to_vec(),
            Parameter::Base(_) => ZERO_BASE_SEEDS.to_vec(),
        }
    }
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

struct Objective<'a> {
    entries: &'a [TestDataEntry],
    evaluations: u32,
}

impl Objective<'_> {
    fn score(&mut self, factors: &CalibrationFactors) -> f64 {
        self.evaluations += 1;
        overall_mae(self.entries, factors).unwrap_or(0.0)
    }
}

/// Tune the channels owned by `kind`, starting from `start`.
///
/// Only entries with coverage data and at least one measurement for an
/// owned channel take part; channels never measured in the batch are left
/// untouched.
pub fn auto_tune(
    entries: &[TestDataEntry],
    start: &CalibrationFactors,
    kind: CalibrationKind,
    options: &TunerOptions,
) -> Result<TuningReport, TuningFailure> {
    auto_tune_channels(entries, start, kind, kind.owned_channels(), options)
}

/// Like [`auto_tune`], but only `channels` may change.
pub fn auto_tune_channels(
    entries: &[TestDataEntry],
    start: &CalibrationFactors,
    kind: CalibrationKind,
    channels: &[Channel],
    options: &TunerOptions,
) -> Result<TuningReport, TuningFailure> {
    if channels.is_empty() {
        return Err(TuningFailure::NoTunableChannels { kind });
    }
    let usable: Vec<TestDataEntry> = entries
        .iter()
        .filter(|e| e.is_usable() && e.channel_ml.keys().any(|c| channels.contains(c)))
        .cloned()
        .collect();

    if usable.len() < options.min_entries {
        return Err(TuningFailure::InsufficientData {
            kind,
            found: usable.len(),
            required: options.min_entries,
        });
    }

    let tuned_channels: Vec<Channel> = channels
        .iter()
        .copied()
        .filter(|c| usable.iter().any(|e| e.channel_ml.contains_key(c)))
        .collect();

    let mut parameters: Vec<Parameter> =
        tuned_channels.iter().map(|c| Parameter::Scaling(*c)).collect();
    if options.include_base {
        parameters.extend(tuned_channels.iter().map(|c| Parameter::Base(*c)));
    }

    let mut objective = Objective {
        entries: &usable,
        evaluations: 0,
    };
    let mut factors = start.clone();
    let before_mae = objective.score(&factors);
    let mut current = before_mae;

    // Least-squares seeds.
    for &channel in &tuned_channels {
        let Some(seed) = least_squares_scaling(&usable, &factors, channel) else {
            continue;
        };
        let parameter = Parameter::Scaling(channel);
        let original = parameter.raw(&mut factors);
        parameter.set(&mut factors, seed);
        let mae = objective.score(&factors);
        if mae < current - options.tolerance {
            current = mae;
        } else {
            parameter.restore(&mut factors, original);
        }
    }

    // Coordinate descent.
    let mut step_index = 0;
    let mut iterations = 0;
    let mut converged = false;
    while iterations < options.max_iterations {
        iterations += 1;
        let step = STEP_SCHEDULE[step_index];
        let mut improved = false;

        for parameter in &parameters {
            let original = parameter.raw(&mut factors);
            let value = parameter.get(&factors);
            let mut best: Option<(f64, f64)> = None;

            for candidate in parameter.candidates(value, step) {
                parameter.set(&mut factors, candidate);
                let mae = objective.score(&factors);
                let threshold = best.map_or(current, |(_, m)| m) - options.tolerance;
                if mae < threshold {
                    best = Some((candidate, mae));
                }
            }

            match best {
                Some((candidate, mae)) => {
                    parameter.set(&mut factors, candidate);
                    current = mae;
                    improved = true;
                }
                None => parameter.restore(&mut factors, original),
            }
        }

        if !improved {
            if step_index + 1 < STEP_SCHEDULE.len() {
                step_index += 1;
            } else {
                converged = true;
                break;
            }
        }
    }

    for &channel in &tuned_channels {
        let value = factors.scaling(channel);
        if value != 0.0 && !options.band.contains(value) {
            return Err(TuningFailure::Implausible {
                channel,
                value,
                min: options.band.min,
                max: options.band.max,
            });
        }
    }

    Ok(TuningReport {
        kind,
        factors,
        before_mae,
        after_mae: current,
        iterations,
        evaluations: objective.evaluations,
        entry_count: usable.len(),
        tuned_channels,
        converged,
    })
}

/// Closed-form least-squares scaling factor for `channel`, holding base
/// consumption and quality multipliers fixed.
///
/// Minimizes `sum((raw_i * q_i * s + base * q_i - actual_i)^2)` over the
/// entries that measured `channel`. Returns `None` when the batch carries no
/// coverage signal for the channel or the estimate is not positive.
fn least_squares_scaling(
    entries: &[TestDataEntry],
    factors: &CalibrationFactors,
    channel: Channel,
) -> Option<f64> {
    let base = factors.base(channel);
    let mut numerator = 0.0;
    let mut denominator = 0.0;

    for entry in entries {
        let Some(&actual) = entry.channel_ml.get(&channel) else {
            continue;
        };
        let coverage = entry
            .image_analysis
            .channel_coverage
            .get(&channel)
            .copied()
            .unwrap_or(0.0);
        let raw = coverage_volume(coverage, entry.dimensions.area_sq_in());
        let q = factors.quality_multiplier(&entry.quality, channel);
        let weight = raw * q;
        numerator += weight * (actual - base * q);
        denominator += weight * weight;
    }

    if denominator <= 0.0 {
        return None;
    }
    let estimate = numerator / denominator;
    (estimate.is_finite() && estimate > 0.0).then_some(estimate)
}
