//! Ink channels and channel groups.
//!
//! Channels are a closed set: every per-channel map in the service is keyed
//! by [`Channel`], so an unknown channel name is rejected at the JSON
//! boundary instead of silently producing a zero prediction.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Per-channel scalar values (factors, coverage percentages, millilitres).
pub type ChannelMap = BTreeMap<Channel, f64>;

/// One ink reservoir / printhead line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Cyan,
    Magenta,
    Yellow,
    Black,
    White,
    Gloss,
    Clear,
    Primer,
}

impl Channel {
    /// Every channel, standard channels first.
    pub const ALL: [Channel; 8] = [
        Channel::Cyan,
        Channel::Magenta,
        Channel::Yellow,
        Channel::Black,
        Channel::White,
        Channel::Gloss,
        Channel::Clear,
        Channel::Primer,
    ];

    /// Wire name of the channel.
    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Cyan => "cyan",
            Channel::Magenta => "magenta",
            Channel::Yellow => "yellow",
            Channel::Black => "black",
            Channel::White => "white",
            Channel::Gloss => "gloss",
            Channel::Clear => "clear",
            Channel::Primer => "primer",
        }
    }

    /// The group this channel is calibrated with.
    pub fn group(self) -> ChannelGroup {
        match self {
            Channel::Cyan | Channel::Magenta | Channel::Yellow | Channel::Black => {
                ChannelGroup::Standard
            }
            Channel::White | Channel::Gloss | Channel::Clear | Channel::Primer => {
                ChannelGroup::SpecialLayer
            }
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Channel::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| CoreError::Validation(format!("Unknown ink channel '{s}'")))
    }
}

const STANDARD_CHANNELS: [Channel; 4] =
    [Channel::Cyan, Channel::Magenta, Channel::Yellow, Channel::Black];
const SPECIAL_LAYER_CHANNELS: [Channel; 4] =
    [Channel::White, Channel::Gloss, Channel::Clear, Channel::Primer];

/// Standard process colours vs. special layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelGroup {
    /// Cyan, magenta, yellow, black.
    Standard,
    /// White, gloss, clear, primer.
    SpecialLayer,
}

impl ChannelGroup {
    pub fn channels(self) -> &'static [Channel] {
        match self {
            ChannelGroup::Standard => &STANDARD_CHANNELS,
            ChannelGroup::SpecialLayer => &SPECIAL_LAYER_CHANNELS,
        }
    }
}
