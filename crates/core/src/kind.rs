//! Calibration types and record provenance.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::channel::{Channel, ChannelGroup};
use crate::error::CoreError;

/// Which family of channels a calibration record covers.
///
/// `Cmyk` and `SpecialLayer` are tuned independently; `Combined` is the
/// legacy single-record form that carries every channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationKind {
    Cmyk,
    SpecialLayer,
    Combined,
}

impl CalibrationKind {
    pub const ALL: [CalibrationKind; 3] = [
        CalibrationKind::Cmyk,
        CalibrationKind::SpecialLayer,
        CalibrationKind::Combined,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            CalibrationKind::Cmyk => "cmyk",
            CalibrationKind::SpecialLayer => "special_layer",
            CalibrationKind::Combined => "combined",
        }
    }

    /// Channels whose factors a record of this kind is authoritative for.
    pub fn owned_channels(self) -> &'static [Channel] {
        match self {
            CalibrationKind::Cmyk => ChannelGroup::Standard.channels(),
            CalibrationKind::SpecialLayer => ChannelGroup::SpecialLayer.channels(),
            CalibrationKind::Combined => &Channel::ALL,
        }
    }
}

impl fmt::Display for CalibrationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CalibrationKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CalibrationKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| {
                CoreError::Validation(format!(
                    "Unknown calibration type '{s}' (expected cmyk, special_layer or combined)"
                ))
            })
    }
}

/// How a persisted calibration record came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordSource {
    /// Written by an operator replacing factors by hand.
    Manual,
    /// Written by a successful auto-tune run.
    AutoTune,
}

impl RecordSource {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordSource::Manual => "manual",
            RecordSource::AutoTune => "auto_tune",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wire_names() {
        assert_eq!("cmyk".parse::<CalibrationKind>().unwrap(), CalibrationKind::Cmyk);
        assert_eq!(
            "special_layer".parse::<CalibrationKind>().unwrap(),
            CalibrationKind::SpecialLayer
        );
        assert_eq!(
            "combined".parse::<CalibrationKind>().unwrap(),
            CalibrationKind::Combined
        );
        assert!("special-layer".parse::<CalibrationKind>().is_err());
    }

    #[test]
    fn owned_channels_split_by_group() {
        assert!(CalibrationKind::Cmyk
            .owned_channels()
            .contains(&Channel::Black));
        assert!(!CalibrationKind::Cmyk
            .owned_channels()
            .contains(&Channel::White));
        assert_eq!(
            CalibrationKind::SpecialLayer.owned_channels(),
            &[Channel::White, Channel::Gloss, Channel::Clear, Channel::Primer]
        );
        assert_eq!(CalibrationKind::Combined.owned_channels().len(), 8);
    }
}
