//! Threshold classification.

use serde::{Deserialize, Serialize};

use super::sample::Channel;

/// Multiplier applied to a channel's threshold to get its y-axis upper bound.
pub const AXIS_SCALE: u32 = 7;

/// Per-channel alert limits in µg/m³.
///
/// A reading strictly above its channel's limit is
/// [`Exceeded`](Severity::Exceeded); a reading equal to the limit is still
/// normal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub voc: u32,
    pub hcho: u32,
    pub pm25: u32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            voc: 600,
            hcho: 100,
            pm25: 75,
        }
    }
}

/// Alert level of a single reading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    #[default]
    Normal,
    Exceeded,
}

impl Severity {
    /// Returns a short symbol for display.
    pub fn symbol(&self) -> &'static str {
        match self {
            Severity::Normal => "OK",
            Severity::Exceeded => "HIGH",
        }
    }
}

impl Thresholds {
    /// Limit for a single channel.
    pub fn limit(&self, channel: Channel) -> u32 {
        match channel {
            Channel::Voc => self.voc,
            Channel::Hcho => self.hcho,
            Channel::Pm25 => self.pm25,
        }
    }

    pub fn classify(&self, channel: Channel, value: u32) -> Severity {
        if value > self.limit(channel) {
            Severity::Exceeded
        } else {
            Severity::Normal
        }
    }

    /// Upper bound of the display axis for a channel.
    pub fn axis_bound(&self, channel: Channel) -> u32 {
        self.limit(channel).saturating_mul(AXIS_SCALE)
    }
}
