//! Application state and the per-tick ingest/refresh logic.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use chrono::Local;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::data::{Channel, SeriesFrame, Thresholds, TimeSeriesStore};
use crate::ingest::{drain_into, IngestStats};
use crate::persist::{FlushOutcome, FlushReport, Persister};
use crate::source::{LineTransport, TransportError};
use crate::ui::Theme;

/// How long a status message stays visible.
const STATUS_MESSAGE_TTL: Duration = Duration::from_secs(5);

/// The current view/tab in the TUI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    /// All three channels stacked.
    Overview,
    /// A single channel using the full content area.
    Channel(Channel),
}

impl View {
    /// Views in tab order.
    pub const ALL: [View; 4] = [
        View::Overview,
        View::Channel(Channel::Voc),
        View::Channel(Channel::Hcho),
        View::Channel(Channel::Pm25),
    ];

    fn position(self) -> usize {
        Self::ALL.iter().position(|v| *v == self).unwrap_or(0)
    }

    /// Cycle to the next view.
    pub fn next(self) -> Self {
        Self::ALL[(self.position() + 1) % Self::ALL.len()]
    }

    /// Cycle to the previous view.
    pub fn prev(self) -> Self {
        Self::ALL[(self.position() + Self::ALL.len() - 1) % Self::ALL.len()]
    }

    /// Returns the display label for this view.
    pub fn label(&self) -> &'static str {
        match self {
            View::Overview => "Overview",
            View::Channel(channel) => channel.label(),
        }
    }

    /// Index of this view in the tab bar.
    pub fn index(&self) -> usize {
        self.position()
    }

    /// Channels drawn by this view, top to bottom.
    pub fn channels(&self) -> &'static [Channel] {
        match self {
            View::Overview => &Channel::ALL,
            View::Channel(Channel::Voc) => &[Channel::Voc],
            View::Channel(Channel::Hcho) => &[Channel::Hcho],
            View::Channel(Channel::Pm25) => &[Channel::Pm25],
        }
    }
}

/// Main application state.
pub struct App {
    pub running: bool,
    pub current_view: View,
    pub show_help: bool,

    // Data
    transport: Box<dyn LineTransport>,
    store: TimeSeriesStore,
    persister: Persister,
    reports_tx: mpsc::UnboundedSender<FlushReport>,
    reports_rx: mpsc::UnboundedReceiver<FlushReport>,
    pub thresholds: Thresholds,
    pub frame: Option<SeriesFrame>,
    pub stats: IngestStats,

    // Transport state
    pub transport_error: Option<String>,
    pub transport_closed: bool,

    // Persistence state
    pub last_record: Option<PathBuf>,
    pub records_written: usize,
    notices: Vec<String>,

    // UI
    pub theme: Theme,

    // Status message (temporary feedback)
    pub status_message: Option<(String, Instant)>,
}

impl App {
    /// Create a new App reading from `transport` and saving through `persister`.
    pub fn new(
        transport: Box<dyn LineTransport>,
        persister: Persister,
        thresholds: Thresholds,
    ) -> Self {
        let (reports_tx, reports_rx) = mpsc::unbounded_channel();
        Self {
            running: true,
            current_view: View::Overview,
            show_help: false,
            transport,
            store: persister.store().clone(),
            persister,
            reports_tx,
            reports_rx,
            thresholds,
            frame: None,
            stats: IngestStats::default(),
            transport_error: None,
            transport_closed: false,
            last_record: None,
            records_written: 0,
            notices: Vec::new(),
            theme: Theme::dark(),
            status_message: None,
        }
    }

    /// Replace the colour theme.
    pub fn with_theme(mut self, theme: Theme) -> Self {
        self.theme = theme;
        self
    }

    /// Sender through which the background schedule reports its firings.
    pub fn report_sender(&self) -> mpsc::UnboundedSender<FlushReport> {
        self.reports_tx.clone()
    }

    /// The series this app ingests into.
    pub fn store(&self) -> &TimeSeriesStore {
        &self.store
    }

    /// Returns a description of the current transport.
    pub fn source_description(&self) -> &str {
        self.transport.description()
    }

    /// Set a temporary status message that will be shown for a few seconds.
    pub fn set_status_message(&mut self, message: String) {
        self.status_message = Some((message, Instant::now()));
    }

    /// Get the current status message if it hasn't expired.
    pub fn get_status_message(&self) -> Option<&str> {
        if let Some((msg, time)) = &self.status_message {
            if time.elapsed() < STATUS_MESSAGE_TTL {
                return Some(msg);
            }
        }
        None
    }

    /// One foreground tick: drain the transport, collect persistence
    /// reports and rebuild the display frame.
    ///
    /// Returns `true` if new samples were recorded.
    pub fn tick(&mut self) -> bool {
        let recorded = self.ingest();
        self.collect_reports();
        self.refresh_frame();
        recorded > 0
    }

    /// Drain everything the transport has buffered into the store.
    fn ingest(&mut self) -> u64 {
        if self.transport_closed {
            return 0;
        }

        let before = self.stats.recorded;
        match drain_into(self.transport.as_mut(), &self.store, &mut self.stats) {
            Ok(()) => self.transport_error = self.transport.error(),
            Err(TransportError::Closed(reason)) => {
                warn!(source = self.transport.description(), %reason, "Sensor link closed");
                self.notices.push(format!("Sensor link closed: {}", reason));
                self.transport_error = Some(reason);
                self.transport_closed = true;
            }
        }
        self.stats.recorded - before
    }

    /// Rebuild the display frame from a fresh snapshot.
    pub fn refresh_frame(&mut self) {
        self.frame = SeriesFrame::build(&self.store.snapshot(), &self.thresholds);
    }

    /// Apply any reports sent by the background schedule.
    fn collect_reports(&mut self) {
        while let Ok(report) = self.reports_rx.try_recv() {
            self.apply_report(report);
        }
    }

    fn apply_report(&mut self, report: FlushReport) {
        if let Ok(FlushOutcome::Written { path, .. }) = &report.result {
            self.last_record = Some(path.clone());
            self.records_written += 1;
        }
        if let Some(message) = report.message() {
            self.set_status_message(message.clone());
            self.notices.push(message);
        }
    }

    /// Write a record right now, outside the regular schedule.
    pub fn save_now(&mut self) {
        let fired_at = Local::now();
        let result = self.persister.fire(fired_at);
        match &result {
            Ok(FlushOutcome::Written { path, rows }) => {
                info!(path = %path.display(), rows, "Saved sensor record on request");
            }
            Ok(FlushOutcome::Skipped) => {
                self.set_status_message("No samples to save yet".to_string());
            }
            Err(e) => warn!(error = %e, "Failed to save sensor record"),
        }
        self.apply_report(FlushReport { fired_at, result });
    }

    /// Take operator notices (records written, failures, link loss) produced
    /// since the last call.
    pub fn take_notices(&mut self) -> Vec<String> {
        std::mem::take(&mut self.notices)
    }

    /// Time since the newest sample was captured.
    pub fn since_last_sample(&self) -> Option<Duration> {
        self.frame.as_ref().map(|f| f.latest.captured_at.elapsed())
    }

    /// Switch to the next view (cycles Overview → VOC → HCHO → PM2.5).
    pub fn next_view(&mut self) {
        self.current_view = self.current_view.next();
    }

    /// Switch to the previous view.
    pub fn prev_view(&mut self) {
        self.current_view = self.current_view.prev();
    }

    /// Switch to a specific view.
    pub fn set_view(&mut self, view: View) {
        self.current_view = view;
    }

    /// Toggle the help overlay.
    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    /// Signal the application to quit.
    pub fn quit(&mut self) {
        self.running = false;
    }
}
