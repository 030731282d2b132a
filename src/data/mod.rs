//! Sensor data model and processing.
//!
//! ## Submodules
//!
//! - [`decode`]: Extraction of readings from raw sensor lines
//! - [`sample`]: Core types ([`Sample`], [`Readings`], [`Channel`])
//! - [`store`]: The shared, append-only [`TimeSeriesStore`]
//! - [`alert`]: Threshold classification ([`Thresholds`], [`Severity`])
//! - [`series`]: Per-channel plot series built from store snapshots
//! - [`duration`]: Parsing and formatting of duration strings (e.g., "300s", "500ms")
//!
//! ## Data Flow
//!
//! ```text
//! raw line ──▶ decode_line() ──▶ TimeSeriesStore::record()
//!                                        │
//!                         snapshot() ────┼──── snapshot()
//!                              │                   │
//!                              ▼                   ▼
//!                  SeriesFrame::build()      persist (CSV)
//!                  (Thresholds::classify)
//! ```

pub mod alert;
pub mod decode;
pub mod duration;
pub mod sample;
pub mod series;
pub mod store;

pub use alert::{Severity, Thresholds};
pub use decode::decode_line;
pub use sample::{Channel, Readings, Sample};
pub use series::{ChannelSeries, ChannelSummary, SeriesFrame, SeriesPoint};
pub use store::{StoreError, TimeSeriesStore};
