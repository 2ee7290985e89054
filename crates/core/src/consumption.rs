//! Ink consumption model.
//!
//! Predicts the volume of ink (mL) each channel draws for a print from its
//! dimensions, per-channel coverage and quality tier:
//!
//! ```text
//! raw       = coverage% * area_sq_in * 0.01
//! predicted = (raw * scaling[c] + base[c]) * quality[tier][c]
//! ```
//!
//! Coverage is always a percentage (0-100). [`coverage_volume`] is the only
//! place that converts it to a fraction, and the auto-tuner fits factors
//! through the same function, so the two can never disagree on units.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::channel::{Channel, ChannelMap};
use crate::error::CoreError;
use crate::factors::{sanitize, CalibrationFactors};
use crate::threshold_validation::validate_positive;

/// Millimetres per inch.
pub const MM_PER_INCH: f64 = 25.4;
/// Converts a 0-100 percentage to a 0-1 fraction.
pub const PERCENT_TO_FRACTION: f64 = 0.01;

// ---------------------------------------------------------------------------
// Dimensions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LengthUnit {
    Mm,
    In,
}

impl LengthUnit {
    pub fn as_str(self) -> &'static str {
        match self {
            LengthUnit::Mm => "mm",
            LengthUnit::In => "in",
        }
    }

    /// Convert a length in this unit to inches.
    pub fn to_inches(self, value: f64) -> f64 {
        match self {
            LengthUnit::Mm => value / MM_PER_INCH,
            LengthUnit::In => value,
        }
    }
}

impl fmt::Display for LengthUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LengthUnit {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mm" => Ok(LengthUnit::Mm),
            "in" => Ok(LengthUnit::In),
            other => Err(CoreError::Validation(format!(
                "Unknown length unit '{other}' (expected mm or in)"
            ))),
        }
    }
}

/// Printed width and height.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: f64,
    pub height: f64,
    pub unit: LengthUnit,
}

impl Dimensions {
    /// Printed area in square inches. Invalid lengths count as zero.
    pub fn area_sq_in(&self) -> f64 {
        let width = self.unit.to_inches(sanitize(self.width));
        let height = self.unit.to_inches(sanitize(self.height));
        width * height
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        validate_positive(self.width, "dimensions.width")?;
        validate_positive(self.height, "dimensions.height")
    }
}

// ---------------------------------------------------------------------------
// Model
// ---------------------------------------------------------------------------

/// Coverage-proportional ink volume before scaling: `coverage% * area * 0.01`.
pub fn coverage_volume(coverage_percent: f64, area_sq_in: f64) -> f64 {
    sanitize(coverage_percent) * sanitize(area_sq_in) * PERCENT_TO_FRACTION
}

/// Predicted mL for a single channel.
pub fn predict_channel(
    channel: Channel,
    coverage_percent: f64,
    area_sq_in: f64,
    quality: &str,
    factors: &CalibrationFactors,
) -> f64 {
    let raw = coverage_volume(coverage_percent, area_sq_in);
    let scaled = raw * factors.scaling(channel);
    let with_base = scaled + factors.base(channel);
    with_base * factors.quality_multiplier(quality, channel)
}

/// Predicted mL for every channel present in either the scaling factors or
/// the coverage map. Channels with no coverage entry are treated as 0 %
/// coverage and therefore report their base consumption.
pub fn predict(
    dimensions: &Dimensions,
    channel_coverage: &ChannelMap,
    quality: &str,
    factors: &CalibrationFactors,
) -> ChannelMap {
    let area = dimensions.area_sq_in();
    let channels: BTreeSet<Channel> = factors
        .channel_scaling_factors
        .keys()
        .chain(channel_coverage.keys())
        .copied()
        .collect();

    channels
        .into_iter()
        .map(|channel| {
            let coverage = channel_coverage.get(&channel).copied().unwrap_or(0.0);
            (
                channel,
                predict_channel(channel, coverage, area, quality, factors),
            )
        })
        .collect()
}

/// Sum of a per-channel volume map.
pub fn total_ml(values: &ChannelMap) -> f64 {
    values.values().sum()
}
