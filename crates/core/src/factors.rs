//! Calibration factors: the tunable parameters of the consumption model.
//!
//! Missing entries mean "no effect": a channel without a scaling factor or
//! base consumption contributes 0, a missing quality tier or a missing
//! channel within a tier multiplies by 1.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::channel::{Channel, ChannelMap};
use crate::error::CoreError;
use crate::threshold_validation::validate_non_negative;

// ---------------------------------------------------------------------------
// Factor set
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationFactors {
    /// Millilitres per (coverage fraction x square inch), per channel.
    #[serde(default)]
    pub channel_scaling_factors: ChannelMap,
    /// Fixed purge / minimum-fill volume in mL, per channel.
    #[serde(default)]
    pub base_consumption: ChannelMap,
    /// Quality tier -> per-channel multiplier.
    #[serde(default)]
    pub quality_channel_multipliers: BTreeMap<String, ChannelMap>,
}

impl CalibrationFactors {
    /// Scaling factor for `channel`, 0 when absent or invalid.
    pub fn scaling(&self, channel: Channel) -> f64 {
        sanitize(self.channel_scaling_factors.get(&channel).copied().unwrap_or(0.0))
    }

    /// Base consumption for `channel` in mL, 0 when absent or invalid.
    pub fn base(&self, channel: Channel) -> f64 {
        sanitize(self.base_consumption.get(&channel).copied().unwrap_or(0.0))
    }

    /// Quality multiplier for `channel` at `quality`, 1 when the tier or the
    /// channel is absent.
    pub fn quality_multiplier(&self, quality: &str, channel: Channel) -> f64 {
        self.quality_channel_multipliers
            .get(quality)
            .and_then(|tier| tier.get(&channel))
            .map(|m| sanitize(*m))
            .unwrap_or(1.0)
    }

    /// Copy the scaling, base and quality entries for `channels` from
    /// `other` into `self`. Entries absent in `other` are removed from
    /// `self` so the result matches `other` exactly on those channels.
    pub fn overlay(&mut self, other: &CalibrationFactors, channels: &[Channel]) {
        for &channel in channels {
            copy_entry(
                &mut self.channel_scaling_factors,
                &other.channel_scaling_factors,
                channel,
            );
            copy_entry(&mut self.base_consumption, &other.base_consumption, channel);
        }

        let tiers: Vec<String> = self
            .quality_channel_multipliers
            .keys()
            .chain(other.quality_channel_multipliers.keys())
            .cloned()
            .collect();
        let empty = ChannelMap::new();
        for tier in tiers {
            let source = other.quality_channel_multipliers.get(&tier).unwrap_or(&empty);
            let target = self.quality_channel_multipliers.entry(tier).or_default();
            for &channel in channels {
                copy_entry(target, source, channel);
            }
        }
        self.quality_channel_multipliers.retain(|_, tier| !tier.is_empty());
    }

    /// Reject negative or non-finite values anywhere in the set.
    pub fn validate(&self) -> Result<(), CoreError> {
        for (channel, value) in &self.channel_scaling_factors {
            validate_non_negative(*value, &format!("channelScalingFactors.{channel}"))?;
        }
        for (channel, value) in &self.base_consumption {
            validate_non_negative(*value, &format!("baseConsumption.{channel}"))?;
        }
        for (tier, multipliers) in &self.quality_channel_multipliers {
            for (channel, value) in multipliers {
                validate_non_negative(
                    *value,
                    &format!("qualityChannelMultipliers.{tier}.{channel}"),
                )?;
            }
        }
        Ok(())
    }

    /// Check that every non-zero scaling factor among `channels` lies in
    /// `band`. Zero disables a channel and is accepted.
    pub fn check_plausible(
        &self,
        channels: &[Channel],
        band: &PlausibleBand,
    ) -> Result<(), CoreError> {
        for &channel in channels {
            let Some(&value) = self.channel_scaling_factors.get(&channel) else {
                continue;
            };
            if value != 0.0 && !band.contains(value) {
                return Err(CoreError::Validation(format!(
                    "Scaling factor for {channel} is {value}, outside the plausible range \
                     {}..={} (check percent vs. fraction coverage units)",
                    band.min, band.max
                )));
            }
        }
        Ok(())
    }
}

fn copy_entry(target: &mut ChannelMap, source: &ChannelMap, channel: Channel) {
    match source.get(&channel) {
        Some(value) => {
            target.insert(channel, *value);
        }
        None => {
            target.remove(&channel);
        }
    }
}

/// Clamp negative and non-finite values to zero.
pub fn sanitize(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

// ---------------------------------------------------------------------------
// Plausibility band
// ---------------------------------------------------------------------------

/// Default lower bound for a non-zero scaling factor.
pub const DEFAULT_PLAUSIBLE_MIN: f64 = 0.005;
/// Default upper bound for a scaling factor.
pub const DEFAULT_PLAUSIBLE_MAX: f64 = 0.5;

/// Inclusive range a fitted or hand-entered scaling factor must fall in.
///
/// Real factors sit around 0.03 to 0.08. Mixing up percent and fraction
/// coverage moves a factor by a factor of 100 in one direction or the
/// other, so the band is kept within one order of magnitude either side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlausibleBand {
    pub min: f64,
    pub max: f64,
}

impl PlausibleBand {
    pub fn contains(&self, value: f64) -> bool {
        value.is_finite() && value >= self.min && value <= self.max
    }
}

impl Default for PlausibleBand {
    fn default() -> Self {
        Self {
            min: DEFAULT_PLAUSIBLE_MIN,
            max: DEFAULT_PLAUSIBLE_MAX,
        }
    }
}

// ---------------------------------------------------------------------------
// Compiled-in defaults
// ---------------------------------------------------------------------------

/// A default per-channel factor pair.
pub struct DefaultChannelFactor {
    pub channel: Channel,
    pub scaling: f64,
    pub base_ml: f64,
}

/// Seed factors used until a calibration has been persisted.
pub const DEFAULT_CHANNEL_FACTORS: &[DefaultChannelFactor] = &[
    DefaultChannelFactor { channel: Channel::Cyan, scaling: 0.035, base_ml: 0.01 },
    DefaultChannelFactor { channel: Channel::Magenta, scaling: 0.035, base_ml: 0.01 },
    DefaultChannelFactor { channel: Channel::Yellow, scaling: 0.03, base_ml: 0.01 },
    DefaultChannelFactor { channel: Channel::Black, scaling: 0.04, base_ml: 0.01 },
    DefaultChannelFactor { channel: Channel::White, scaling: 0.08, base_ml: 0.02 },
    DefaultChannelFactor { channel: Channel::Gloss, scaling: 0.06, base_ml: 0.02 },
    DefaultChannelFactor { channel: Channel::Clear, scaling: 0.05, base_ml: 0.02 },
    DefaultChannelFactor { channel: Channel::Primer, scaling: 0.045, base_ml: 0.02 },
];

/// Seed quality multipliers, applied uniformly to every channel.
pub const DEFAULT_QUALITY_MULTIPLIERS: &[(&str, f64)] =
    &[("draft", 0.8), ("standard", 1.0), ("high", 1.25)];

/// Build the compiled-in default factor set.
pub fn default_factors() -> CalibrationFactors {
    let channel_scaling_factors = DEFAULT_CHANNEL_FACTORS
        .iter()
        .map(|d| (d.channel, d.scaling))
        .collect();
    let base_consumption = DEFAULT_CHANNEL_FACTORS
        .iter()
        .map(|d| (d.channel, d.base_ml))
        .collect();
    let quality_channel_multipliers = DEFAULT_QUALITY_MULTIPLIERS
        .iter()
        .map(|(tier, m)| {
            let per_channel = Channel::ALL.iter().map(|c| (*c, *m)).collect();
            (tier.to_string(), per_channel)
        })
        .collect();

    CalibrationFactors {
        channel_scaling_factors,
        base_consumption,
        quality_channel_multipliers,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelGroup;

    #[test]
    fn missing_entries_mean_no_effect() {
        let factors = CalibrationFactors::default();
        assert_eq!(factors.scaling(Channel::Cyan), 0.0);
        assert_eq!(factors.base(Channel::Cyan), 0.0);
        assert_eq!(factors.quality_multiplier("standard", Channel::Cyan), 1.0);
    }

    #[test]
    fn missing_channel_within_tier_defaults_to_one() {
        let mut factors = CalibrationFactors::default();
        factors
            .quality_channel_multipliers
            .insert("high".into(), [(Channel::Cyan, 1.3)].into_iter().collect());
        assert_eq!(factors.quality_multiplier("high", Channel::Cyan), 1.3);
        assert_eq!(factors.quality_multiplier("high", Channel::Black), 1.0);
        assert_eq!(factors.quality_multiplier("ultra", Channel::Cyan), 1.0);
    }

    #[test]
    fn negative_values_read_as_zero() {
        let mut factors = CalibrationFactors::default();
        factors.channel_scaling_factors.insert(Channel::Cyan, -0.5);
        factors.base_consumption.insert(Channel::Cyan, f64::NAN);
        assert_eq!(factors.scaling(Channel::Cyan), 0.0);
        assert_eq!(factors.base(Channel::Cyan), 0.0);
        assert!(factors.validate().is_err());
    }

    #[test]
    fn defaults_cover_every_channel_and_validate() {
        let factors = default_factors();
        for channel in Channel::ALL {
            assert!(factors.scaling(channel) > 0.0, "{channel} has no default");
        }
        assert!(factors.validate().is_ok());
        assert!(factors
            .check_plausible(&Channel::ALL, &PlausibleBand::default())
            .is_ok());
        assert_eq!(factors.quality_multiplier("draft", Channel::White), 0.8);
    }

    #[test]
    fn overlay_replaces_only_listed_channels() {
        let mut base = default_factors();
        let mut tuned = CalibrationFactors::default();
        tuned.channel_scaling_factors.insert(Channel::Cyan, 0.05);
        tuned.channel_scaling_factors.insert(Channel::White, 0.5);
        tuned.base_consumption.insert(Channel::Cyan, 0.02);

        base.overlay(&tuned, ChannelGroup::Standard.channels());

        assert_eq!(base.scaling(Channel::Cyan), 0.05);
        assert_eq!(base.base(Channel::Cyan), 0.02);
        // Standard channels missing from `tuned` are cleared.
        assert_eq!(base.scaling(Channel::Black), 0.0);
        assert_eq!(base.quality_multiplier("high", Channel::Cyan), 1.0);
        // Special-layer channels keep their previous values.
        assert_eq!(base.scaling(Channel::White), 0.08);
        assert_eq!(base.quality_multiplier("high", Channel::White), 1.25);
    }

    #[test]
    fn plausibility_flags_hundredfold_regression() {
        let mut factors = default_factors();
        factors.channel_scaling_factors.insert(Channel::Magenta, 0.0003);
        let err = factors
            .check_plausible(ChannelGroup::Standard.channels(), &PlausibleBand::default())
            .unwrap_err();
        assert!(err.to_string().contains("magenta"));
    }

    #[test]
    fn plausibility_flags_fraction_coverage_fit() {
        let mut factors = default_factors();
        factors.channel_scaling_factors.insert(Channel::Cyan, 3.5);
        assert!(factors
            .check_plausible(ChannelGroup::Standard.channels(), &PlausibleBand::default())
            .is_err());
    }

    #[test]
    fn plausibility_accepts_disabled_channel() {
        let mut factors = default_factors();
        factors.channel_scaling_factors.insert(Channel::Primer, 0.0);
        assert!(factors
            .check_plausible(&Channel::ALL, &PlausibleBand::default())
            .is_ok());
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let json = serde_json::to_value(default_factors()).unwrap();
        assert_eq!(json["channelScalingFactors"]["cyan"], 0.035);
        assert_eq!(json["baseConsumption"]["white"], 0.02);
        assert_eq!(json["qualityChannelMultipliers"]["high"]["black"], 1.25);
    }
}
