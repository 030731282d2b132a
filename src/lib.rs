//! # airwatch
//!
//! A live terminal monitor and CSV logger for serial air-quality sensors.
//!
//! The sensor prints one line per measurement carrying three readings: VOC,
//! formaldehyde (甲醛, HCHO) and PM2.5. airwatch decodes each line, keeps the
//! readings in an in-memory time series, draws per-channel trend charts with
//! alert colouring, and periodically writes the whole series to a
//! timestamped CSV file.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         Application                          │
//! │  ┌──────────┐   ┌──────────┐   ┌────────────┐   ┌─────────┐  │
//! │  │  ingest  │──▶│   data   │──▶│    ui      │──▶│Terminal │  │
//! │  │ (drain)  │   │ (store)  │   │ (charts)   │   │         │  │
//! │  └────▲─────┘   └────┬─────┘   └────────────┘   └─────────┘  │
//! │       │              │ snapshot()                            │
//! │  ┌────┴─────┐   ┌────▼─────┐                                 │
//! │  │  source  │   │ persist  │──▶ sensor_data_YYYYMMDD_HHMMSS.csv
//! │  │ (lines)  │   │(schedule)│                                 │
//! │  └──────────┘   └──────────┘                                 │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`source`]**: Line transports ([`LineTransport`] trait) for serial device
//!   nodes, TCP serial bridges and in-memory channels
//! - **[`ingest`]**: Drains a transport into the store, skipping noise
//! - **[`data`]**: Line decoding, the shared [`TimeSeriesStore`], threshold
//!   classification and per-channel plot series
//! - **[`persist`]**: The periodic CSV snapshot schedule
//! - **[`config`]**: Layered settings (file, environment, command line)
//! - **[`ui`]**: Terminal rendering using ratatui
//!
//! ## Usage
//!
//! ### As a CLI tool
//!
//! ```bash
//! # Read a USB serial adapter
//! airwatch --device /dev/ttyUSB0
//!
//! # Read through a TCP serial bridge, saving every minute
//! airwatch --connect 192.168.1.20:4001 --period 60s
//! ```
//!
//! ### As a library
//!
//! ```
//! use airwatch::{drain, ChannelTransport, TimeSeriesStore};
//!
//! let store = TimeSeriesStore::new();
//! let (tx, mut transport) = ChannelTransport::create("bench");
//! tx.send("VOC: 450, 甲醛: 80, PM2.5: 60\n".as_bytes().to_vec()).unwrap();
//! tx.send(b"noise\n".to_vec()).unwrap();
//!
//! let stats = drain(&mut transport, &store).unwrap();
//! assert_eq!(stats.recorded, 1);
//! assert_eq!(stats.rejected, 1);
//! assert_eq!(store.snapshot()[0].readings.voc, 450);
//! ```
//!
//! ### Decoding a single line
//!
//! ```
//! use airwatch::{decode_line, Readings};
//!
//! assert_eq!(
//!     decode_line("VOC: 700 ... 甲醛: 120 ... PM2.5: 90"),
//!     Some(Readings::new(700, 120, 90))
//! );
//! assert_eq!(decode_line("garbage, no numbers here"), None);
//! ```

pub mod app;
pub mod config;
pub mod data;
pub mod events;
pub mod ingest;
pub mod persist;
pub mod source;
pub mod ui;

// Re-export main types for convenience
pub use app::App;
pub use config::Settings;
pub use data::{
    decode_line, Channel, Readings, Sample, SeriesFrame, Severity, Thresholds, TimeSeriesStore,
};
pub use ingest::{drain, drain_into, IngestStats};
pub use persist::{FlushOutcome, FlushReport, Persister};
pub use source::{ChannelTransport, LineTransport, StreamTransport, TransportError};
