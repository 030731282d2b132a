//! Startup configuration.
//!
//! Settings are layered: built-in defaults, then an optional TOML file, then
//! `AIRWATCH_*` environment variables (e.g. `AIRWATCH_PERSIST__PERIOD=60s`),
//! then command-line overrides.
//!
//! ```toml
//! [serial]
//! device = "/dev/ttyUSB0"
//! baud_rate = 115200
//! read_timeout = "1s"
//!
//! [thresholds]
//! voc = 600
//! hcho = 100
//! pm25 = 75
//!
//! [persist]
//! directory = "records"
//! period = "300s"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::data::{duration, Channel, Thresholds};

/// Link to the sensor.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SerialSettings {
    /// Device node (or capture file) to read from.
    pub device: PathBuf,
    /// TCP serial bridge (`host:port`); takes precedence over `device`.
    pub connect: Option<String>,
    /// Line speed the device is expected to run at. Informational: the host
    /// configures the line discipline of the device node.
    pub baud_rate: u32,
    /// How long the link may stay silent before a stall is reported.
    #[serde(deserialize_with = "duration::deserialize")]
    pub read_timeout: Duration,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            device: PathBuf::from("/dev/ttyUSB0"),
            connect: None,
            baud_rate: 115_200,
            read_timeout: Duration::from_secs(1),
        }
    }
}

/// Where and how often records are written.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PersistSettings {
    pub directory: PathBuf,
    #[serde(deserialize_with = "duration::deserialize")]
    pub period: Duration,
    /// Write one last record when the monitor exits.
    pub flush_on_exit: bool,
}

impl Default for PersistSettings {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            period: Duration::from_secs(300),
            flush_on_exit: true,
        }
    }
}

/// Display cadence and logging.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    /// Interval between ingest/redraw ticks.
    #[serde(deserialize_with = "duration::deserialize")]
    pub tick: Duration,
    /// Log file used while the terminal UI owns the screen.
    pub log_file: Option<PathBuf>,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            tick: Duration::from_secs(1),
            log_file: None,
        }
    }
}

/// Complete runtime configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub serial: SerialSettings,
    pub thresholds: Thresholds,
    pub persist: PersistSettings,
    pub display: DisplaySettings,
}

/// Values given on the command line; `None` leaves the lower layers alone.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub device: Option<PathBuf>,
    pub connect: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub period: Option<String>,
    pub tick: Option<String>,
    pub voc: Option<u32>,
    pub hcho: Option<u32>,
    pub pm25: Option<u32>,
    pub log_file: Option<PathBuf>,
}

impl Settings {
    /// Load settings from the optional file, the environment and `overrides`.
    pub fn load(config_path: Option<&Path>, overrides: &Overrides) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path));
        }

        builder = builder.add_source(
            Environment::with_prefix("AIRWATCH")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let path_str = |p: &Option<PathBuf>| p.as_ref().map(|p| p.display().to_string());
        let threshold = |v: Option<u32>| v.map(i64::from);

        builder = builder
            .set_override_option("serial.device", path_str(&overrides.device))?
            .set_override_option("serial.connect", overrides.connect.clone())?
            .set_override_option("persist.directory", path_str(&overrides.output_dir))?
            .set_override_option("persist.period", overrides.period.clone())?
            .set_override_option("display.tick", overrides.tick.clone())?
            .set_override_option("display.log_file", path_str(&overrides.log_file))?
            .set_override_option("thresholds.voc", threshold(overrides.voc))?
            .set_override_option("thresholds.hcho", threshold(overrides.hcho))?
            .set_override_option("thresholds.pm25", threshold(overrides.pm25))?;

        let settings: Settings = builder
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;

        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings the monitor cannot run with.
    pub fn validate(&self) -> Result<()> {
        for channel in Channel::ALL {
            if self.thresholds.limit(channel) == 0 {
                bail!("Threshold for {} must be greater than zero", channel);
            }
        }
        if self.persist.period.is_zero() {
            bail!("Persistence period must be greater than zero");
        }
        if self.display.tick.is_zero() {
            bail!("Display tick must be greater than zero");
        }
        if self.serial.read_timeout.is_zero() {
            bail!("Read timeout must be greater than zero");
        }
        Ok(())
    }

    /// Log file path, defaulting to `airwatch.log` in the record directory.
    pub fn log_file(&self) -> PathBuf {
        self.display
            .log_file
            .clone()
            .unwrap_or_else(|| self.persist.directory.join("airwatch.log"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn toml_file(content: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.thresholds, Thresholds::default());
        assert_eq!(settings.persist.period, Duration::from_secs(300));
        assert_eq!(settings.display.tick, Duration::from_secs(1));
        assert_eq!(settings.serial.baud_rate, 115_200);
        assert!(settings.persist.flush_on_exit);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let file = toml_file(
            r#"
            [serial]
            device = "/dev/ttyACM0"
            read_timeout = "2s"

            [thresholds]
            voc = 500

            [persist]
            directory = "records"
            period = "60s"
            flush_on_exit = false
            "#,
        );

        let settings = Settings::load(Some(file.path()), &Overrides::default()).unwrap();
        assert_eq!(settings.serial.device, PathBuf::from("/dev/ttyACM0"));
        assert_eq!(settings.serial.read_timeout, Duration::from_secs(2));
        assert_eq!(settings.thresholds.voc, 500);
        // Unset keys keep their defaults
        assert_eq!(settings.thresholds.hcho, 100);
        assert_eq!(settings.persist.directory, PathBuf::from("records"));
        assert_eq!(settings.persist.period, Duration::from_secs(60));
        assert!(!settings.persist.flush_on_exit);
        assert_eq!(settings.log_file(), PathBuf::from("records/airwatch.log"));
    }

    #[test]
    fn test_overrides_win_over_file() {
        let file = toml_file(
            r#"
            [thresholds]
            pm25 = 50

            [persist]
            period = "60s"
            "#,
        );
        let overrides = Overrides {
            pm25: Some(35),
            period: Some("10m".to_string()),
            connect: Some("localhost:2000".to_string()),
            ..Default::default()
        };

        let settings = Settings::load(Some(file.path()), &overrides).unwrap();
        assert_eq!(settings.thresholds.pm25, 35);
        assert_eq!(settings.persist.period, Duration::from_secs(600));
        assert_eq!(settings.serial.connect.as_deref(), Some("localhost:2000"));
    }

    #[test]
    fn test_invalid_duration_is_rejected() {
        let overrides = Overrides {
            tick: Some("often".to_string()),
            ..Default::default()
        };
        assert!(Settings::load(None, &overrides).is_err());
    }

    #[test]
    fn test_zero_threshold_is_rejected() {
        let overrides = Overrides {
            hcho: Some(0),
            ..Default::default()
        };
        let err = Settings::load(None, &overrides).unwrap_err();
        assert!(err.to_string().contains("HCHO"));
    }
}
