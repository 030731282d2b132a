//! Sensor observations and the channels they carry.

use std::fmt;
use std::time::Instant;

use chrono::{DateTime, Local};

/// One of the three concentrations reported by the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    /// Volatile organic compounds.
    Voc,
    /// Formaldehyde.
    Hcho,
    /// Fine particulate matter.
    Pm25,
}

impl Channel {
    /// All channels in record order.
    pub const ALL: [Channel; 3] = [Channel::Voc, Channel::Hcho, Channel::Pm25];

    /// Returns the display label for this channel.
    pub fn label(&self) -> &'static str {
        match self {
            Channel::Voc => "VOC",
            Channel::Hcho => "HCHO",
            Channel::Pm25 => "PM2.5",
        }
    }

    /// Returns the key used for this channel in configuration files.
    pub fn key(&self) -> &'static str {
        match self {
            Channel::Voc => "voc",
            Channel::Hcho => "hcho",
            Channel::Pm25 => "pm25",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The three concentrations extracted from one sensor line, in µg/m³.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readings {
    pub voc: u32,
    pub hcho: u32,
    pub pm25: u32,
}

impl Readings {
    pub fn new(voc: u32, hcho: u32, pm25: u32) -> Self {
        Self { voc, hcho, pm25 }
    }

    /// Value for a single channel.
    pub fn get(&self, channel: Channel) -> u32 {
        match channel {
            Channel::Voc => self.voc,
            Channel::Hcho => self.hcho,
            Channel::Pm25 => self.pm25,
        }
    }
}

/// A timestamped observation.
///
/// `captured_at` orders samples and drives elapsed-time computation;
/// `recorded_at` is the wall-clock instant written to CSV records.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub captured_at: Instant,
    pub recorded_at: DateTime<Local>,
    pub readings: Readings,
}

impl Sample {
    /// Stamp `readings` with the current instant.
    pub fn now(readings: Readings) -> Self {
        Self {
            captured_at: Instant::now(),
            recorded_at: Local::now(),
            readings,
        }
    }

    pub fn value(&self, channel: Channel) -> u32 {
        self.readings.get(channel)
    }
}
