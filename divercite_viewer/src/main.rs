use std::fs::File;
use std::io::stdout;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use clap::Parser;
use divercite::{visualize_board, Outbound, Session};
use ratatui::{
    backend::CrosstermBackend,
    crossterm::{
        event::{DisableMouseCapture, EnableMouseCapture},
        terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
        ExecutableCommand,
    },
    Terminal,
};
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::app::{load_record, App};
use crate::config::ViewerConfig;

mod app;
mod config;
mod transport;

#[derive(Parser)]
struct Args {
    /// A recorded game (JSON list of states) to replay instead of connecting.
    /// Press "o" in the viewer to reopen it
    #[arg(short, long)]
    record: Option<PathBuf>,

    /// Host of the game server
    #[arg(long)]
    host: Option<String>,

    /// Port of the game server
    #[arg(short, long)]
    port: Option<u16>,

    /// Display name of the local player. Without it, the viewer only watches
    #[arg(short, long)]
    name: Option<String>,

    /// Time between two steps of autoplay, in milliseconds
    #[arg(short, long)]
    interval_ms: Option<u64>,

    /// Path to a config JSON file providing defaults for the other options
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print every step of the recorded game as text instead of opening the UI
    #[arg(long, default_value_t = false)]
    plain: bool,

    /// A log level among "off", "error", "warn", "info", "debug", "trace"
    #[arg(short, long, default_value = "info")]
    log_level: LevelFilter,

    /// Write log messages to this file
    #[arg(long)]
    log_file: Option<PathBuf>,
}

impl Args {
    /// The config file, if any, with command line arguments taking precedence.
    fn resolve_config(&self) -> anyhow::Result<ViewerConfig> {
        let mut config = match &self.config {
            Some(path) => ViewerConfig::load(path)?,
            None => ViewerConfig::default(),
        };
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(name) = &self.name {
            config.name = Some(name.clone());
        }
        if let Some(record) = &self.record {
            config.record = Some(record.clone());
        }
        if let Some(interval_ms) = self.interval_ms {
            if interval_ms == 0 {
                anyhow::bail!("The autoplay interval must be at least 1 ms");
            }
            config.interval_ms = interval_ms;
        }
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    initialize_logging(args.log_level, args.log_file.as_deref(), args.plain)?;

    let config = args.resolve_config()?;
    let (board, tray) = config.layouts()?;
    let mut session = Session::new(config.name.as_deref().unwrap_or(""), board, tray);

    if let Some(path) = &config.record {
        load_record(&mut session, path)?;
    }

    if args.plain {
        if config.record.is_none() {
            anyhow::bail!("--plain needs a recorded game, pass one with --record");
        }
        replay_plain(&mut session, config.interval());
        return Ok(());
    }

    let connect = config.record.is_none();
    let mut app = App::new(session, config);
    if connect {
        app.connect();
    }
    run_tui(&mut app)
}

/// Prints the board of every step, one per autoplay interval.
fn replay_plain(session: &mut Session, interval: Duration) {
    print_step(session);
    if !session.start_autoplay(interval, Instant::now()) {
        return;
    }
    while let Some(due) = session.history().next_autoplay_step() {
        std::thread::sleep(due.saturating_duration_since(Instant::now()));
        if session.tick(Instant::now()).contains(&Outbound::Redraw) {
            print_step(session);
        }
    }
}

fn print_step(session: &Session) {
    let history = session.history();
    println!(
        "Step {}/{}\n{}\n",
        history.cursor().map_or(0, |idx| idx + 1),
        history.len(),
        visualize_board(session.displayed())
    );
}

fn run_tui(app: &mut App) -> anyhow::Result<()> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    stdout().execute(EnableMouseCapture)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = app.run(&mut terminal);

    stdout().execute(DisableMouseCapture)?;
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;
    result
}

/// The terminal belongs to the UI, so without a log file, logs are only
/// printed in plain mode.
fn initialize_logging(level: LevelFilter, log_file: Option<&Path>, plain: bool) -> anyhow::Result<()> {
    let format = tracing_subscriber::fmt::format()
        .with_target(false)
        .compact();

    let writer = match log_file {
        Some(path) => BoxMakeWriter::new(Mutex::new(File::create(path)?)),
        None if plain => BoxMakeWriter::new(std::io::stderr),
        None => BoxMakeWriter::new(std::io::sink),
    };

    let filter = Targets::new().with_default(level);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .event_format(format)
                .with_ansi(log_file.is_none())
                .with_writer(writer),
        )
        .with(filter)
        .init();
    Ok(())
}
