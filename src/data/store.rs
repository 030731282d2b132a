//! Shared, append-only time series of samples.

use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

use super::sample::{Readings, Sample};

/// Errors returned when appending to a [`TimeSeriesStore`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The sample was captured before the current tail of the series.
    #[error("sample is older than the last recorded sample")]
    OutOfOrder,
}

/// The session's time series.
///
/// Cloning the store yields another handle to the same series. The ingestion
/// loop is the only writer; the persistence task and the display read through
/// [`snapshot`](Self::snapshot), which holds the lock only while copying.
/// Samples are never removed or modified once appended, so every snapshot is
/// a prefix of every later one.
#[derive(Debug, Clone, Default)]
pub struct TimeSeriesStore {
    samples: Arc<RwLock<Vec<Sample>>>,
}

impl TimeSeriesStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp `readings` with the current instant and append them.
    ///
    /// The stamp is taken while the write lock is held, so insertion order
    /// and timestamp order cannot disagree.
    pub fn record(&self, readings: Readings) -> Sample {
        let mut samples = self.samples.write();
        let sample = Sample::now(readings);
        samples.push(sample);
        sample
    }

    /// Append a sample that was stamped elsewhere.
    pub fn append(&self, sample: Sample) -> Result<(), StoreError> {
        let mut samples = self.samples.write();
        if let Some(last) = samples.last() {
            if sample.captured_at < last.captured_at {
                return Err(StoreError::OutOfOrder);
            }
        }
        samples.push(sample);
        Ok(())
    }

    /// Copy of the series as of now, oldest first.
    pub fn snapshot(&self) -> Vec<Sample> {
        self.samples.read().clone()
    }

    pub fn len(&self) -> usize {
        self.samples.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.read().is_empty()
    }

    /// The most recently appended sample.
    pub fn latest(&self) -> Option<Sample> {
        self.samples.read().last().copied()
    }
}
