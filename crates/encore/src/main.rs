//! encore - record, compress and replay input macros
//!
//! Capture and synthesis of real OS input happen outside this binary: `record`
//! reads classified events as JSON lines on stdin, and `play` prints the
//! synthesized actions as JSON lines on stdout.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use encore_core::prelude::*;
use encore_core::timer::secs;
use encore_core::{ReplayStats, StopReport};

#[derive(Parser)]
#[command(name = "encore")]
#[command(about = "encore - record, compress and replay input macros")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record events read as JSON lines from stdin (Ctrl+C or EOF to stop)
    Record {
        #[arg(short, long, default_value = "macro")]
        name: String,
        /// Keep plain mouse moves
        #[arg(long)]
        moves: bool,
        /// Compress click pairs into holds before saving
        #[arg(long)]
        compress: bool,
    },
    /// Replay a recording, printing each synthesized action
    Play {
        file: String,
        #[arg(short, long, default_value = "1.0")]
        speed: f64,
        /// Number of runs, or "infinite"
        #[arg(short, long, default_value = "1")]
        repeat: String,
        /// Seconds between runs
        #[arg(short, long, default_value = "0")]
        gap: f64,
        /// Seconds to wait before starting
        #[arg(long, default_value = "0")]
        delay: f64,
        /// Log actions instead of printing them
        #[arg(short, long)]
        quiet: bool,
    },
    /// Merge adjacent click pairs into holds and save a copy
    Compress {
        file: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show recording info
    Show {
        file: String,
        #[arg(long)]
        all: bool,
    },
    /// List saved recordings
    List,
    /// Delete a recording
    Delete {
        file: String,
    },
}

#[derive(Serialize)]
struct Output<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<Error>,
}

impl<T: Serialize> Output<T> {
    fn ok(data: T) -> Self {
        Self { success: true, data: Some(data), error: None }
    }
    fn err(e: Error) -> Output<()> {
        Output { success: false, data: None, error: Some(e) }
    }
}

fn print_json<T: Serialize>(output: &T) {
    match serde_json::to_string(output) {
        Ok(s) => println!("{}", s),
        Err(e) => eprintln!("Error: {}", e),
    }
}

/// Prints every action as one JSON line
struct PrintSink;

impl PrintSink {
    fn emit(&self, action: Action) -> std::result::Result<(), SinkError> {
        let line = serde_json::to_string(&action).map_err(|e| SinkError::Rejected(e.to_string()))?;
        let mut out = io::stdout().lock();
        writeln!(out, "{}", line).map_err(|e| SinkError::Rejected(e.to_string()))
    }
}

impl ActionSink for PrintSink {
    fn move_cursor(&mut self, point: Point) -> std::result::Result<(), SinkError> {
        self.emit(Action::Move { point })
    }

    fn post_key(&mut self, modifiers: &Modifiers, key: &KeyId, is_down: bool) -> std::result::Result<(), SinkError> {
        self.emit(Action::Key { modifiers: modifiers.clone(), key: key.clone(), down: is_down })
    }

    fn post_mouse(&mut self, kind: MouseKind, point: Point) -> std::result::Result<(), SinkError> {
        self.emit(Action::Mouse { kind, point })
    }

    fn post_scroll(&mut self, point: Point, delta: Delta) -> std::result::Result<(), SinkError> {
        self.emit(Action::Scroll { point, delta })
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    let result: Result<()> = match cli.command {
        Commands::Record { name, moves, compress } => record(&name, moves, compress),
        Commands::Play { file, speed, repeat, gap, delay, quiet } => {
            play(&file, speed, &repeat, gap, delay, quiet)
        }
        Commands::Compress { file, output } => compress(&file, output),
        Commands::Show { file, all } => show(&file, all),
        Commands::List => list(),
        Commands::Delete { file } => delete(&file),
    };

    if let Err(e) = result {
        match e.downcast::<Error>() {
            Ok(core) => print_json(&Output::<()>::err(core)),
            Err(other) => eprintln!("Error: {:#}", other),
        }
        std::process::exit(1);
    }
}

fn interrupt_flag() -> Result<Arc<AtomicBool>> {
    let stop = Arc::new(AtomicBool::new(false));
    let s = stop.clone();
    ctrlc::set_handler(move || { s.store(true, Ordering::SeqCst); })?;
    Ok(stop)
}

// ── Recording ───────────────────────────────────────────────────────────────

fn record(name: &str, moves: bool, compress: bool) -> Result<()> {
    let config = CaptureConfig { mouse_moves_included: moves, ..Default::default() };
    let mut session = Session::with_capture_config(LogSink, config);
    let feed = session.start_capture(name)?;
    let stop = interrupt_flag()?;

    eprintln!("Recording: {} (Ctrl+C or EOF to stop)", name);
    let reader = std::thread::spawn(move || read_events(feed));

    let mut count = 0;
    while !stop.load(Ordering::SeqCst) && !reader.is_finished() {
        session.drain_capture();
        if session.event_count() != count {
            count = session.event_count();
            eprint!("\r{} events", count);
            io::stderr().flush()?;
        }
        std::thread::sleep(Duration::from_millis(50));
    }

    session.stop_capture()?;
    if compress {
        let merged = session.compress()?;
        eprintln!("\nCompressed {} click pairs", merged);
    }
    let recording = session.recording().context("capture produced no recording")?;
    eprintln!("\n{} events recorded", recording.len());
    let storage = RecordingStorage::new()?;
    let path = storage.save(recording)?;
    println!("Saved: {}", path.display());
    Ok(())
}

/// Forward stdin lines to the capture. Lines without an `offset` are stamped
/// with the time they arrived.
fn read_events(feed: EventFeed) {
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        if !feed.is_running() {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut value: serde_json::Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unparseable line");
                continue;
            }
        };
        if let Some(obj) = value.as_object_mut() {
            obj.entry("offset").or_insert_with(|| serde_json::json!(feed.elapsed()));
        }
        match serde_json::from_value::<Event>(value) {
            Ok(event) => {
                feed.push(event);
            }
            Err(e) => tracing::warn!(error = %e, "skipping unrecognized event"),
        }
    }
}

// ── Playback ────────────────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PlaySummary {
    name: String,
    runs: Option<u32>,
    stopped: Option<StopReport>,
    stats: ReplayStats,
}

fn start_delay(delay: f64) -> encore_core::Result<Duration> {
    if !delay.is_finite() || delay < 0.0 {
        return Err(Error::invalid_request(format!(
            "delay must be a non-negative number of seconds, got {}",
            delay
        )));
    }
    Ok(secs(delay))
}

fn play(file: &str, speed: f64, repeat: &str, gap: f64, delay: f64, quiet: bool) -> Result<()> {
    let storage = RecordingStorage::new()?;
    let recording = storage.load(file)?;
    let repeat: Repeat = repeat.parse()?;
    let wait = start_delay(delay)?;
    let stop = interrupt_flag()?;

    let sink: Box<dyn ActionSink> = if quiet { Box::new(LogSink) } else { Box::new(PrintSink) };
    let mut session = Session::new(sink);
    let name = recording.name().to_string();
    session.load(recording);
    session.set_speed(speed)?;

    eprintln!("Playing {} ({} events) at {}x, repeat {}, gap {}s", name, session.event_count(), speed, repeat, gap);
    if !wait.is_zero() {
        eprintln!("Starting in {} seconds...", delay);
        std::thread::sleep(wait);
    }

    session.play(repeat, gap)?;
    let mut runs = None;
    let mut stopped = None;
    Player::new().run_session(&mut session, &stop, |notice| match notice {
        Notice::RunFinished { completed } => tracing::info!(completed, "run finished"),
        Notice::Completed { runs: n } => runs = Some(n),
        Notice::Stopped { runs: n, revoked } => {
            stopped = Some(StopReport { runs_completed: n, revoked });
        }
    });

    print_json(&Output::ok(PlaySummary { name, runs, stopped, stats: session.stats() }));
    Ok(())
}

// ── Storage ─────────────────────────────────────────────────────────────────

fn compress(file: &str, output: Option<PathBuf>) -> Result<()> {
    let storage = RecordingStorage::new()?;
    let recording = storage.load(file)?;
    let compressed = recording.compressed();
    let path = match output {
        Some(path) => {
            storage.save_path(&compressed, &path)?;
            path
        }
        None => storage.save(&compressed)?,
    };
    println!("{} -> {} events", recording.len(), compressed.len());
    println!("Saved: {}", path.display());
    Ok(())
}

fn show(file: &str, all: bool) -> Result<()> {
    let storage = RecordingStorage::new()?;
    let recording = storage.load(file)?;
    let meta = &recording.metadata;
    println!("Name: {}", meta.name);
    println!("Events: {}", meta.event_count);
    println!("Duration: {:.3}s", meta.duration);
    println!("Recorded: {}", meta.recorded_at.to_rfc3339());
    println!("Mouse moves: {}", if meta.mouse_moves_included { "yes" } else { "no" });
    let s = recording.summary();
    println!("\nSummary: {} keys, {} clicks, {} holds, {} moves, {} scrolls", s.keys, s.clicks, s.holds, s.moves, s.scrolls);
    if all {
        for (i, e) in recording.events.iter().enumerate() {
            println!("{}: {}", i, serde_json::to_string(e)?);
        }
    }
    Ok(())
}

fn list() -> Result<()> {
    let storage = RecordingStorage::new()?;
    let files = storage.list()?;
    if files.is_empty() { println!("No recordings saved."); } else { for f in files { println!("{}", f); } }
    Ok(())
}

fn delete(file: &str) -> Result<()> {
    let storage = RecordingStorage::new()?;
    storage.delete(file)?;
    println!("Deleted: {}", file);
    Ok(())
}
