//! Conversion of store snapshots into per-channel plot series.
//!
//! A [`SeriesFrame`] is rebuilt from scratch on every display tick. Elapsed
//! time is always measured from the first sample in the snapshot being
//! rendered, so no state is carried between frames.

use super::alert::{Severity, Thresholds};
use super::sample::{Channel, Sample};

/// A single plotted reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesPoint {
    /// Seconds since the first sample of the frame.
    pub elapsed: f64,
    pub value: u32,
    pub severity: Severity,
}

/// Plot data for one channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSeries {
    pub channel: Channel,
    pub threshold: u32,
    /// Upper bound of the y axis (7x the threshold).
    pub axis_bound: u32,
    pub points: Vec<SeriesPoint>,
}

impl ChannelSeries {
    /// Number of points above the threshold.
    pub fn exceeded_count(&self) -> usize {
        self.points.iter().filter(|p| p.severity == Severity::Exceeded).count()
    }

    /// The most recent point.
    pub fn latest(&self) -> Option<&SeriesPoint> {
        self.points.last()
    }

    /// Points as `(x, y)` pairs for chart widgets.
    pub fn coordinates(&self) -> Vec<(f64, f64)> {
        self.points.iter().map(|p| (p.elapsed, p.value as f64)).collect()
    }

    /// Min, max and mean over the whole series.
    pub fn summary(&self) -> Option<ChannelSummary> {
        let min = self.points.iter().map(|p| p.value).min()?;
        let max = self.points.iter().map(|p| p.value).max()?;
        let total: u64 = self.points.iter().map(|p| p.value as u64).sum();
        Some(ChannelSummary {
            min,
            max,
            mean: total as f64 / self.points.len() as f64,
            exceeded: self.exceeded_count(),
            count: self.points.len(),
        })
    }

    /// Coordinates of the points with the given severity.
    pub fn coordinates_with(&self, severity: Severity) -> Vec<(f64, f64)> {
        self.points
            .iter()
            .filter(|p| p.severity == severity)
            .map(|p| (p.elapsed, p.value as f64))
            .collect()
    }
}

/// Aggregate figures for one channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelSummary {
    pub min: u32,
    pub max: u32,
    pub mean: f64,
    pub exceeded: usize,
    pub count: usize,
}

/// Everything the display needs for one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesFrame {
    /// One entry per channel, in [`Channel::ALL`] order.
    pub channels: Vec<ChannelSeries>,
    /// Total samples in the snapshot.
    pub sample_count: usize,
    /// Seconds between the first and last sample.
    pub span: f64,
    /// The newest sample.
    pub latest: Sample,
}

impl SeriesFrame {
    /// Build a frame from a snapshot.
    ///
    /// Returns `None` when the snapshot is empty, meaning there is nothing
    /// to draw yet.
    pub fn build(samples: &[Sample], thresholds: &Thresholds) -> Option<Self> {
        let first = samples.first()?;
        let latest = *samples.last()?;
        let base = first.captured_at;

        let elapsed: Vec<f64> = samples
            .iter()
            .map(|s| s.captured_at.saturating_duration_since(base).as_secs_f64())
            .collect();

        let channels = Channel::ALL
            .iter()
            .map(|&channel| ChannelSeries {
                channel,
                threshold: thresholds.limit(channel),
                axis_bound: thresholds.axis_bound(channel),
                points: samples
                    .iter()
                    .zip(&elapsed)
                    .map(|(sample, &elapsed)| {
                        let value = sample.value(channel);
                        SeriesPoint {
                            elapsed,
                            value,
                            severity: thresholds.classify(channel, value),
                        }
                    })
                    .collect(),
            })
            .collect();

        Some(Self {
            channels,
            sample_count: samples.len(),
            span: elapsed.last().copied().unwrap_or(0.0),
            latest,
        })
    }

    /// Series for a single channel.
    pub fn channel(&self, channel: Channel) -> Option<&ChannelSeries> {
        self.channels.iter().find(|c| c.channel == channel)
    }

    /// Worst severity of the newest sample across channels.
    pub fn latest_severity(&self) -> Severity {
        self.channels
            .iter()
            .filter_map(|c| c.latest().map(|p| p.severity))
            .max()
            .unwrap_or(Severity::Normal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sample::Readings;
    use chrono::Local;
    use std::time::{Duration, Instant};

    fn sample_at(base: Instant, secs: u64, readings: Readings) -> Sample {
        Sample {
            captured_at: base + Duration::from_secs(secs),
            recorded_at: Local::now(),
            readings,
        }
    }

    #[test]
    fn test_empty_snapshot_yields_no_frame() {
        assert!(SeriesFrame::build(&[], &Thresholds::default()).is_none());
    }

    #[test]
    fn test_elapsed_time_is_relative_to_first_sample() {
        let base = Instant::now();
        let samples = vec![
            sample_at(base, 10, Readings::new(1, 1, 1)),
            sample_at(base, 12, Readings::new(2, 2, 2)),
            sample_at(base, 15, Readings::new(3, 3, 3)),
        ];

        let frame = SeriesFrame::build(&samples, &Thresholds::default()).unwrap();
        let voc = frame.channel(Channel::Voc).unwrap();
        let elapsed: Vec<f64> = voc.points.iter().map(|p| p.elapsed).collect();
        assert_eq!(elapsed, [0.0, 2.0, 5.0]);
        assert_eq!(frame.span, 5.0);
        assert_eq!(frame.sample_count, 3);
        assert_eq!(frame.latest.readings, Readings::new(3, 3, 3));
    }

    #[test]
    fn test_rebuild_recomputes_from_new_first_sample() {
        let base = Instant::now();
        let samples = vec![
            sample_at(base, 4, Readings::new(1, 1, 1)),
            sample_at(base, 9, Readings::new(2, 2, 2)),
        ];
        let thresholds = Thresholds::default();

        let full = SeriesFrame::build(&samples, &thresholds).unwrap();
        let tail = SeriesFrame::build(&samples[1..], &thresholds).unwrap();
        assert_eq!(full.channels[0].points[1].elapsed, 5.0);
        assert_eq!(tail.channels[0].points[0].elapsed, 0.0);
    }

    #[test]
    fn test_points_carry_severity_per_channel() {
        let base = Instant::now();
        let samples = vec![
            sample_at(base, 0, Readings::new(450, 80, 60)),
            sample_at(base, 1, Readings::new(700, 120, 90)),
        ];

        let frame = SeriesFrame::build(&samples, &Thresholds::default()).unwrap();
        for series in &frame.channels {
            assert_eq!(series.points[0].severity, Severity::Normal);
            assert_eq!(series.points[1].severity, Severity::Exceeded);
            assert_eq!(series.exceeded_count(), 1);
            assert_eq!(series.coordinates_with(Severity::Exceeded).len(), 1);
        }
        assert_eq!(frame.latest_severity(), Severity::Exceeded);
    }

    #[test]
    fn test_channel_summary() {
        let base = Instant::now();
        let samples = vec![
            sample_at(base, 0, Readings::new(500, 80, 60)),
            sample_at(base, 1, Readings::new(700, 90, 70)),
            sample_at(base, 2, Readings::new(600, 100, 80)),
        ];
        let frame = SeriesFrame::build(&samples, &Thresholds::default()).unwrap();

        let voc = frame.channel(Channel::Voc).unwrap().summary().unwrap();
        assert_eq!(voc.min, 500);
        assert_eq!(voc.max, 700);
        assert_eq!(voc.mean, 600.0);
        assert_eq!(voc.exceeded, 1);
        assert_eq!(voc.count, 3);

        let pm25 = frame.channel(Channel::Pm25).unwrap().summary().unwrap();
        assert_eq!(pm25.exceeded, 1);
    }

    #[test]
    fn test_channels_carry_threshold_and_axis() {
        let base = Instant::now();
        let samples = vec![sample_at(base, 0, Readings::new(1, 2, 3))];
        let frame = SeriesFrame::build(&samples, &Thresholds::default()).unwrap();

        let order: Vec<Channel> = frame.channels.iter().map(|c| c.channel).collect();
        assert_eq!(order, Channel::ALL);

        let hcho = frame.channel(Channel::Hcho).unwrap();
        assert_eq!(hcho.threshold, 100);
        assert_eq!(hcho.axis_bound, 700);
        assert_eq!(hcho.coordinates(), vec![(0.0, 2.0)]);
    }
}
