use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::Parser;
use crossterm::{
    event::Event,
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use airwatch::config::{Overrides, Settings};
use airwatch::ui::{self, Theme};
use airwatch::{
    events, App, Channel, LineTransport, Persister, Sample, Severity, StreamTransport,
    TimeSeriesStore,
};

/// How long to wait for a key press before checking the tick timer.
const INPUT_POLL: Duration = Duration::from_millis(100);

#[derive(Parser, Debug)]
#[command(name = "airwatch")]
#[command(about = "Live terminal monitor and CSV logger for serial air-quality sensors")]
struct Args {
    /// Path to a TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Serial device node to read from (e.g., /dev/ttyUSB0)
    #[arg(short, long, conflicts_with = "connect")]
    device: Option<PathBuf>,

    /// Read from a TCP serial bridge instead of a device (host:port)
    #[arg(short, long)]
    connect: Option<String>,

    /// Directory CSV records are written to
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Interval between CSV records (e.g., "300s", "5m")
    #[arg(short, long)]
    period: Option<String>,

    /// Interval between display refreshes (e.g., "1s", "500ms")
    #[arg(long)]
    tick: Option<String>,

    /// VOC alert threshold in µg/m³
    #[arg(long)]
    voc: Option<u32>,

    /// Formaldehyde alert threshold in µg/m³
    #[arg(long)]
    hcho: Option<u32>,

    /// PM2.5 alert threshold in µg/m³
    #[arg(long)]
    pm25: Option<u32>,

    /// Run without the terminal UI, printing readings and records to stdout
    #[arg(long)]
    headless: bool,

    /// Log file used while the terminal UI is active
    #[arg(long)]
    log_file: Option<PathBuf>,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            device: self.device.clone(),
            connect: self.connect.clone(),
            output_dir: self.output_dir.clone(),
            period: self.period.clone(),
            tick: self.tick.clone(),
            voc: self.voc,
            hcho: self.hcho,
            pm25: self.pm25,
            log_file: self.log_file.clone(),
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let mut settings = Settings::load(args.config.as_deref(), &args.overrides())?;

    // A device on the command line wins over a bridge from the config file
    if args.device.is_some() {
        settings.serial.connect = None;
    }

    let _log_guard = init_logging(&settings, args.headless)?;
    info!(
        device = %settings.serial.device.display(),
        connect = ?settings.serial.connect,
        baud_rate = settings.serial.baud_rate,
        directory = %settings.persist.directory.display(),
        period = ?settings.persist.period,
        "Starting airwatch"
    );

    // Build a tokio runtime for the reader task and the persistence schedule
    let rt = tokio::runtime::Runtime::new()?;
    let transport = rt.block_on(open_transport(&settings))?;

    let persister = Persister::new(TimeSeriesStore::new(), &settings.persist.directory);
    let mut app = App::new(transport, persister.clone(), settings.thresholds);

    let schedule = {
        let _runtime = rt.enter();
        persister.spawn(settings.persist.period, app.report_sender())
    };

    let result = if args.headless {
        rt.block_on(run_headless(&mut app, settings.display.tick))
    } else {
        // Detect the background before the terminal enters raw mode
        app = app.with_theme(Theme::auto_detect());
        let _runtime = rt.enter();
        run_tui(&mut app, settings.display.tick)
    };

    rt.block_on(schedule.stop());

    if settings.persist.flush_on_exit {
        app.save_now();
        let notices = app.take_notices();
        if args.headless {
            for notice in notices {
                println!("{}", notice);
            }
        }
    }

    result
}

/// Open the configured link to the sensor.
async fn open_transport(settings: &Settings) -> Result<Box<dyn LineTransport>> {
    let timeout = settings.serial.read_timeout;

    if let Some(ref addr) = settings.serial.connect {
        let transport = StreamTransport::connect(addr, timeout)
            .await
            .with_context(|| format!("Failed to connect to {}", addr))?;
        info!(addr = %addr, "Connected to serial bridge");
        return Ok(Box::new(transport));
    }

    let device = &settings.serial.device;
    let transport = StreamTransport::open(device, timeout)
        .await
        .with_context(|| format!("Failed to open {}", device.display()))?;
    info!(device = %device.display(), "Opened sensor device");
    Ok(Box::new(transport))
}

/// Install the global tracing subscriber.
///
/// Headless runs log to stderr. The terminal UI owns the screen, so it logs
/// to a file instead.
fn init_logging(settings: &Settings, headless: bool) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("airwatch=info"));

    if headless {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .with_target(false)
            .init();
        return Ok(None);
    }

    let path = settings.log_file();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory: {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("Failed to open log file: {}", path.display()))?;

    let (writer, guard) = tracing_appender::non_blocking(file);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();

    Ok(Some(guard))
}

/// Run without a terminal UI until interrupted or the link closes.
async fn run_headless(app: &mut App, tick: Duration) -> Result<()> {
    let mut ticker = tokio::time::interval(tick);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    println!("Reading from {}", app.source_description());

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if app.tick() {
                    if let Some(sample) = app.store().latest() {
                        print_sample(app, &sample);
                    }
                }
                for notice in app.take_notices() {
                    println!("{}", notice);
                }
                if app.transport_closed {
                    bail!(
                        "Sensor link closed: {}",
                        app.transport_error.as_deref().unwrap_or("unknown reason")
                    );
                }
            }
            _ = &mut ctrl_c => {
                info!("Interrupted, shutting down");
                return Ok(());
            }
        }
    }
}

fn print_sample(app: &App, sample: &Sample) {
    let flagged: Vec<&str> = Channel::ALL
        .iter()
        .filter(|&&c| app.thresholds.classify(c, sample.value(c)) == Severity::Exceeded)
        .map(|c| c.label())
        .collect();

    let mut line = format!(
        "{} VOC {} HCHO {} PM2.5 {}",
        sample.recorded_at.format("%H:%M:%S"),
        sample.readings.voc,
        sample.readings.hcho,
        sample.readings.pm25
    );
    if !flagged.is_empty() {
        line.push_str(&format!("  HIGH: {}", flagged.join(", ")));
    }
    println!("{}", line);
}

/// Run the TUI until the user quits.
fn run_tui(app: &mut App, tick: Duration) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Setup panic hook to restore terminal
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
        original_hook(panic);
    }));

    let result = run_app(&mut terminal, app, tick);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Some(ref err) = app.transport_error {
        if app.transport_closed {
            warn!(error = %err, "Exited after sensor link closed");
        }
    }

    result
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    tick: Duration,
) -> Result<()> {
    app.tick();
    let mut last_tick = Instant::now();

    while app.running {
        terminal.draw(|frame| ui::draw(frame, app))?;

        if let Some(event) = events::poll_event(INPUT_POLL)? {
            match event {
                Event::Key(key) => events::handle_key_event(app, key),
                Event::Resize(_, _) => {
                    // Terminal will redraw on next iteration
                }
                _ => {}
            }
        }

        if last_tick.elapsed() >= tick {
            app.tick();
            // Records and link changes already reach the status bar
            app.take_notices();
            last_tick = Instant::now();
        }
    }

    Ok(())
}
