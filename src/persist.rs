//! Periodic CSV records of the time series.
//!
//! Every firing writes the *whole* series collected so far to a new file
//! named after the firing time (`sensor_data_YYYYMMDD_HHMMSS.csv`). Earlier
//! records are never touched, so each one is a complete, self-contained copy
//! of the session up to that point.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Local};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::data::{Sample, TimeSeriesStore};

/// Header row of every record.
pub const CSV_HEADER: &str = "Timestamp,VOC(µg/m³),HCHO(µg/m³),PM2.5(µg/m³)";

const LINE_ENDING: &str = "\r\n";

/// Errors that can occur while writing a record.
#[derive(Debug, Error)]
pub enum PersistError {
    /// The output directory could not be created.
    #[error("failed to create directory {}: {source}", path.display())]
    CreateDir { path: PathBuf, source: io::Error },

    /// The temporary record could not be written.
    #[error("failed to write {}: {source}", path.display())]
    Write { path: PathBuf, source: io::Error },

    /// The finished record could not be moved into place.
    #[error("failed to finalize {}: {source}", path.display())]
    Rename { path: PathBuf, source: io::Error },

    /// The blocking write task panicked or was cancelled.
    #[error("persistence task failed: {0}")]
    Task(String),
}

/// Result of a single firing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    /// The store was empty; nothing was written.
    Skipped,
    /// A record was written.
    Written { path: PathBuf, rows: usize },
}

/// What happened at one scheduled firing.
#[derive(Debug)]
pub struct FlushReport {
    pub fired_at: DateTime<Local>,
    pub result: Result<FlushOutcome, PersistError>,
}

impl FlushReport {
    /// One-line summary for the operator.
    pub fn message(&self) -> Option<String> {
        match &self.result {
            Ok(FlushOutcome::Written { path, rows }) => {
                Some(format!("Saved {} samples to {}", rows, path.display()))
            }
            Ok(FlushOutcome::Skipped) => None,
            Err(e) => Some(format!("Save failed: {}", e)),
        }
    }
}

/// Writes records of a [`TimeSeriesStore`] into a directory.
#[derive(Debug, Clone)]
pub struct Persister {
    store: TimeSeriesStore,
    directory: PathBuf,
}

impl Persister {
    pub fn new(store: TimeSeriesStore, directory: impl Into<PathBuf>) -> Self {
        Self {
            store,
            directory: directory.into(),
        }
    }

    /// The series being recorded.
    pub fn store(&self) -> &TimeSeriesStore {
        &self.store
    }

    /// Perform one firing at wall-clock time `now`.
    ///
    /// The store lock is only held while copying the snapshot, never during
    /// file I/O.
    pub fn fire(&self, now: DateTime<Local>) -> Result<FlushOutcome, PersistError> {
        let samples = self.store.snapshot();
        if samples.is_empty() {
            return Ok(FlushOutcome::Skipped);
        }

        fs::create_dir_all(&self.directory).map_err(|source| PersistError::CreateDir {
            path: self.directory.clone(),
            source,
        })?;

        let path = write_record(&self.directory, &record_name(now), &samples)?;

        Ok(FlushOutcome::Written {
            path,
            rows: samples.len(),
        })
    }

    /// Start firing every `period` on a background task.
    ///
    /// The first firing happens one full period after the call. Every
    /// outcome, including skips and failures, is sent on `reports`; a failed
    /// firing never stops the schedule.
    pub fn spawn(self, period: Duration, reports: mpsc::UnboundedSender<FlushReport>) -> PersistHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut timer = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = timer.tick() => {
                        let report = self.fire_in_background().await;
                        let _ = reports.send(report);
                    }
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            debug!("Persistence schedule stopped");
        });

        PersistHandle { stop_tx, task }
    }

    async fn fire_in_background(&self) -> FlushReport {
        let fired_at = Local::now();
        let persister = self.clone();
        let result = tokio::task::spawn_blocking(move || persister.fire(fired_at))
            .await
            .unwrap_or_else(|e| Err(PersistError::Task(e.to_string())));

        match &result {
            Ok(FlushOutcome::Written { path, rows }) => {
                info!(path = %path.display(), rows, "Saved sensor record");
            }
            Ok(FlushOutcome::Skipped) => debug!("No samples yet, skipping record"),
            Err(e) => warn!(error = %e, "Failed to save sensor record"),
        }

        FlushReport { fired_at, result }
    }
}

/// Handle for controlling the background schedule.
///
/// Drop this handle to stop the schedule, or call `stop()` explicitly.
#[derive(Debug)]
pub struct PersistHandle {
    stop_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl PersistHandle {
    /// Stop the schedule and wait for an in-flight firing to finish.
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        let _ = self.task.await;
    }
}

/// File name of the record for a firing at `now`.
pub fn record_name(now: DateTime<Local>) -> String {
    now.format("sensor_data_%Y%m%d_%H%M%S.csv").to_string()
}

/// Candidate name for the `attempt`-th try: `name`, then `stem_N.ext`.
fn candidate_name(name: &str, attempt: u32) -> String {
    if attempt == 0 {
        return name.to_string();
    }
    let (stem, ext) = name.rsplit_once('.').unwrap_or((name, ""));
    format!("{}_{}.{}", stem, attempt, ext)
}

/// Render samples as CSV, header first.
pub fn render_csv(samples: &[Sample]) -> String {
    let mut out = String::with_capacity(64 * (samples.len() + 1));
    out.push_str(CSV_HEADER);
    out.push_str(LINE_ENDING);
    for sample in samples {
        let r = &sample.readings;
        out.push_str(&format!(
            "{},{},{},{}{}",
            sample.recorded_at.format("%Y-%m-%dT%H:%M:%S%.6f"),
            r.voc,
            r.hcho,
            r.pm25,
            LINE_ENDING
        ));
    }
    out
}

/// Write to a private temporary file in `dir`, sync, then link it into place
/// under the first free name derived from `name`.
///
/// The final step never replaces an existing file, so concurrent firings in
/// the same second each end up with their own complete record.
fn write_record(dir: &Path, name: &str, samples: &[Sample]) -> Result<PathBuf, PersistError> {
    let mut tmp = tempfile::Builder::new()
        .prefix(".sensor_data_")
        .suffix(".csv.tmp")
        .tempfile_in(dir)
        .map_err(|source| PersistError::Write {
            path: dir.to_path_buf(),
            source,
        })?;

    let written = tmp
        .write_all(render_csv(samples).as_bytes())
        .and_then(|()| tmp.as_file().sync_all());
    if let Err(source) = written {
        return Err(PersistError::Write {
            path: tmp.path().to_path_buf(),
            source,
        });
    }

    let mut attempt = 0;
    loop {
        let path = dir.join(candidate_name(name, attempt));
        match tmp.persist_noclobber(&path) {
            Ok(_) => return Ok(path),
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                tmp = e.file;
                attempt += 1;
            }
            Err(e) => return Err(PersistError::Rename { path, source: e.error }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Readings;
    use chrono::TimeZone;
    use std::sync::{Arc, Barrier};
    use std::thread;
    use tempfile::TempDir;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 15, h, m, s).single().unwrap()
    }

    fn store_with(n: u32) -> TimeSeriesStore {
        let store = TimeSeriesStore::new();
        for i in 0..n {
            store.record(Readings::new(400 + i, 80 + i, 60 + i));
        }
        store
    }

    fn data_rows(path: &Path) -> Vec<String> {
        let content = fs::read_to_string(path).unwrap();
        let mut lines = content.lines();
        assert_eq!(lines.next(), Some(CSV_HEADER));
        lines.map(str::to_string).collect()
    }

    #[test]
    fn test_record_name_embeds_firing_time() {
        assert_eq!(record_name(at(9, 5, 7)), "sensor_data_20240315_090507.csv");
    }

    #[test]
    fn test_fire_with_empty_store_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let persister = Persister::new(TimeSeriesStore::new(), dir.path());

        assert_eq!(persister.fire(at(12, 0, 0)).unwrap(), FlushOutcome::Skipped);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_fire_writes_header_and_rows() {
        let dir = TempDir::new().unwrap();
        let store = store_with(3);
        let persister = Persister::new(store.clone(), dir.path());

        let outcome = persister.fire(at(12, 0, 0)).unwrap();
        let path = dir.path().join("sensor_data_20240315_120000.csv");
        assert_eq!(
            outcome,
            FlushOutcome::Written {
                path: path.clone(),
                rows: 3
            }
        );

        let rows = data_rows(&path);
        assert_eq!(rows.len(), 3);
        let first = &store.snapshot()[0];
        assert_eq!(
            rows[0],
            format!(
                "{},400,80,60",
                first.recorded_at.format("%Y-%m-%dT%H:%M:%S%.6f")
            )
        );
        assert!(rows[2].ends_with(",402,82,62"));
    }

    #[test]
    fn test_each_firing_writes_an_independent_full_record() {
        let dir = TempDir::new().unwrap();
        let store = store_with(3);
        let persister = Persister::new(store.clone(), dir.path());

        persister.fire(at(12, 0, 0)).unwrap();
        store.record(Readings::new(1, 1, 1));
        store.record(Readings::new(2, 2, 2));
        persister.fire(at(12, 5, 0)).unwrap();

        let first = dir.path().join("sensor_data_20240315_120000.csv");
        let second = dir.path().join("sensor_data_20240315_120500.csv");
        assert_eq!(data_rows(&first).len(), 3);
        assert_eq!(data_rows(&second).len(), 5);
        assert_eq!(data_rows(&second)[..3], data_rows(&first)[..]);
    }

    #[test]
    fn test_repeated_firings_are_byte_identical() {
        let dir = TempDir::new().unwrap();
        let persister = Persister::new(store_with(4), dir.path());

        let contents: Vec<Vec<u8>> = [at(1, 0, 0), at(1, 5, 0), at(1, 10, 0)]
            .into_iter()
            .map(|now| match persister.fire(now).unwrap() {
                FlushOutcome::Written { path, rows } => {
                    assert_eq!(rows, 4);
                    fs::read(path).unwrap()
                }
                FlushOutcome::Skipped => panic!("expected a record"),
            })
            .collect();

        assert_eq!(contents[0], contents[1]);
        assert_eq!(contents[1], contents[2]);
    }

    #[test]
    fn test_same_second_firings_do_not_overwrite() {
        let dir = TempDir::new().unwrap();
        let persister = Persister::new(store_with(1), dir.path());

        persister.fire(at(8, 0, 0)).unwrap();
        let outcome = persister.fire(at(8, 0, 0)).unwrap();
        assert_eq!(
            outcome,
            FlushOutcome::Written {
                path: dir.path().join("sensor_data_20240315_080000_1.csv"),
                rows: 1
            }
        );
    }

    #[test]
    fn test_concurrent_same_second_firings_keep_both_records() {
        let dir = TempDir::new().unwrap();
        let persister = Persister::new(store_with(20_000), dir.path());

        for round in 0..20 {
            let now = at(12, 0, round);
            let barrier = Arc::new(Barrier::new(2));
            let workers: Vec<_> = (0..2)
                .map(|_| {
                    let persister = persister.clone();
                    let barrier = barrier.clone();
                    thread::spawn(move || {
                        barrier.wait();
                        persister.fire(now)
                    })
                })
                .collect();

            let mut paths: Vec<PathBuf> = workers
                .into_iter()
                .map(|w| match w.join().unwrap().unwrap() {
                    FlushOutcome::Written { path, rows } => {
                        assert_eq!(rows, 20_000);
                        path
                    }
                    FlushOutcome::Skipped => panic!("expected a record"),
                })
                .collect();
            paths.sort();
            paths.dedup();
            assert_eq!(paths.len(), 2, "round {}", round);

            for path in &paths {
                assert_eq!(data_rows(path).len(), 20_000);
            }
        }

        let leftovers = fs::read_dir(dir.path())
            .unwrap()
            .filter(|e| {
                e.as_ref()
                    .unwrap()
                    .file_name()
                    .to_string_lossy()
                    .ends_with(".tmp")
            })
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_no_temporary_file_left_behind() {
        let dir = TempDir::new().unwrap();
        let persister = Persister::new(store_with(2), dir.path());
        persister.fire(at(8, 0, 0)).unwrap();

        let names: Vec<String> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["sensor_data_20240315_080000.csv"]);
    }

    #[test]
    fn test_fire_creates_missing_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("records").join("today");
        let persister = Persister::new(store_with(1), &nested);

        persister.fire(at(8, 0, 0)).unwrap();
        assert!(nested.join("sensor_data_20240315_080000.csv").exists());
    }

    #[test]
    fn test_fire_reports_unwritable_directory() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, b"").unwrap();
        let persister = Persister::new(store_with(1), &blocker);

        let err = persister.fire(at(8, 0, 0)).unwrap_err();
        assert!(matches!(err, PersistError::CreateDir { .. }));
    }

    #[test]
    fn test_report_messages() {
        let written = FlushReport {
            fired_at: at(8, 0, 0),
            result: Ok(FlushOutcome::Written {
                path: PathBuf::from("sensor_data_20240315_080000.csv"),
                rows: 3,
            }),
        };
        assert_eq!(
            written.message().unwrap(),
            "Saved 3 samples to sensor_data_20240315_080000.csv"
        );

        let skipped = FlushReport {
            fired_at: at(8, 0, 0),
            result: Ok(FlushOutcome::Skipped),
        };
        assert!(skipped.message().is_none());

        let failed = FlushReport {
            fired_at: at(8, 0, 0),
            result: Err(PersistError::Task("cancelled".to_string())),
        };
        assert!(failed.message().unwrap().starts_with("Save failed"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_keeps_firing_with_empty_store() {
        let dir = TempDir::new().unwrap();
        let persister = Persister::new(TimeSeriesStore::new(), dir.path());
        let (tx, mut rx) = mpsc::unbounded_channel();

        let start = tokio::time::Instant::now();
        let handle = persister.spawn(Duration::from_secs(300), tx);

        let first = rx.recv().await.unwrap();
        assert!(matches!(first.result, Ok(FlushOutcome::Skipped)));
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(300) && elapsed < Duration::from_secs(301));

        let second = rx.recv().await.unwrap();
        assert!(matches!(second.result, Ok(FlushOutcome::Skipped)));
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(600) && elapsed < Duration::from_secs(601));

        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
        handle.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_schedule_survives_write_failures() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, b"").unwrap();
        let persister = Persister::new(store_with(1), &blocker);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let handle = persister.spawn(Duration::from_secs(60), tx);

        for _ in 0..3 {
            let report = rx.recv().await.unwrap();
            assert!(report.result.is_err());
        }
        handle.stop().await;
    }

    #[tokio::test]
    async fn test_stopped_schedule_sends_nothing_more() {
        let dir = TempDir::new().unwrap();
        let persister = Persister::new(store_with(1), dir.path());
        let (tx, mut rx) = mpsc::unbounded_channel();

        let handle = persister.spawn(Duration::from_secs(3600), tx);
        handle.stop().await;

        // The task owned the only sender
        assert!(rx.recv().await.is_none());
    }
}
