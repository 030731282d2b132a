//! Draining the transport into the time series.

use std::ops::AddAssign;

use tracing::{debug, trace};

use crate::data::{decode_line, TimeSeriesStore};
use crate::source::{LineTransport, TransportError};

/// Line counts for one or more drains.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    /// Lines taken from the transport.
    pub lines: u64,
    /// Lines decoded and appended to the store.
    pub recorded: u64,
    /// Valid text that did not carry the three readings.
    pub rejected: u64,
    /// Lines that were not valid UTF-8 (torn multi-byte characters, line noise).
    pub undecodable: u64,
}

impl AddAssign for IngestStats {
    fn add_assign(&mut self, other: Self) {
        self.lines += other.lines;
        self.recorded += other.recorded;
        self.rejected += other.rejected;
        self.undecodable += other.undecodable;
    }
}

/// Read every line the transport currently has buffered and record the ones
/// that decode.
///
/// Bad lines are counted and skipped. The only error is the transport
/// closing; lines drained before the closure are still recorded.
pub fn drain(
    transport: &mut dyn LineTransport,
    store: &TimeSeriesStore,
) -> Result<IngestStats, TransportError> {
    let mut stats = IngestStats::default();
    drain_into(transport, store, &mut stats)?;
    Ok(stats)
}

/// Like [`drain`], but adds the counts to `totals`.
///
/// The counts are added even when the transport closes part-way through,
/// so lines taken before the closure are never lost from the totals.
pub fn drain_into(
    transport: &mut dyn LineTransport,
    store: &TimeSeriesStore,
    totals: &mut IngestStats,
) -> Result<(), TransportError> {
    let mut batch = IngestStats::default();
    let result = drain_batch(transport, store, &mut batch);

    if batch.lines > 0 {
        debug!(
            lines = batch.lines,
            recorded = batch.recorded,
            rejected = batch.rejected,
            undecodable = batch.undecodable,
            "Drained sensor lines"
        );
    }

    *totals += batch;
    result
}

fn drain_batch(
    transport: &mut dyn LineTransport,
    store: &TimeSeriesStore,
    stats: &mut IngestStats,
) -> Result<(), TransportError> {
    while transport.has_pending() {
        let Some(raw) = transport.read_line()? else {
            break;
        };
        stats.lines += 1;

        let line = match std::str::from_utf8(&raw) {
            Ok(line) => line,
            Err(e) => {
                trace!(error = %e, "Discarding undecodable line");
                stats.undecodable += 1;
                continue;
            }
        };

        match decode_line(line) {
            Some(readings) => {
                store.record(readings);
                stats.recorded += 1;
            }
            None => {
                trace!(line, "Discarding unrecognised line");
                stats.rejected += 1;
            }
        }
    }
    Ok(())
}
