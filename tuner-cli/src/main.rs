//! # Guitar Tuner - Command Line Front End
//!
//! Wires a frame source, the tuner core and a text display together.
//!
//! ## Architecture
//! - **Frame source**: default input device via CPAL, or a synthetic sine
//!   (`--simulate <HZ>`) when no hardware is wanted
//! - **Processing**: one `process_cycle` per tick, every `cycle_interval_ms`
//! - **Output**: one status line per cycle on stdout, logs on stderr
//! - **Stop**: Ctrl-C clears the session's run flag

mod display;

use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use tuner_core::audio::{CpalFrameSource, SineFrameSource};
use tuner_core::{run_session, GuitarString, SessionControl, SessionStats, Tuner, TunerConfig};

#[derive(Debug, Parser)]
#[command(name = "tuner", about = "Real-time guitar tuner", version)]
struct Args {
    /// JSON file with tuner settings; missing fields use defaults.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the effective configuration as JSON and exit.
    #[arg(long)]
    print_config: bool,

    /// Start pinned to a string (E2, A2, D3, G3, B3, E4) instead of auto-detecting.
    #[arg(short, long)]
    pin: Option<GuitarString>,

    /// Analyse a synthetic sine at this frequency instead of the microphone.
    #[arg(long, value_name = "HZ")]
    simulate: Option<f32>,

    /// Peak amplitude of the simulated sine.
    #[arg(long, default_value_t = 8000.0)]
    amplitude: f32,

    /// Stop after this many cycles.
    #[arg(long)]
    cycles: Option<u64>,
}

/// Loads the tuner configuration from a JSON file.
fn load_config(path: &Path) -> Result<TunerConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading config file {}", path.display()))?;
    let config: TunerConfig = serde_json::from_str(&data)
        .with_context(|| format!("parsing config file {}", path.display()))?;
    Ok(config)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => TunerConfig::default(),
    };

    if args.print_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    let tuner = Tuner::new(config).context("invalid tuner configuration")?;
    log::debug!(
        "Reference pitches: {}",
        tuner
            .references()
            .iter()
            .map(|(string, freq)| format!("{string} {freq:.2} Hz"))
            .collect::<Vec<_>>()
            .join(", ")
    );

    let mut state = tuner.new_detection_state();
    if let Some(string) = args.pin {
        log::info!("Pinned to {string}");
        state.pin(string);
    }

    let control = SessionControl::new();
    let stopper = control.clone();
    ctrlc::set_handler(move || {
        log::info!("Stop requested");
        stopper.stop();
    })
    .context("installing Ctrl-C handler")?;

    let print = |report: &tuner_core::TuningReport| println!("{}", display::render(report));
    let sample_rate = tuner.config().sample_rate;
    let frame_size = tuner.config().frame_size;

    let stats: SessionStats = match args.simulate {
        Some(frequency) => {
            log::info!("Simulating a {frequency} Hz sine");
            let mut source = SineFrameSource::new(frequency, args.amplitude, sample_rate, frame_size);
            run_session(&tuner, &mut source, &mut state, &control, args.cycles, print)
        }
        None => {
            let mut source = CpalFrameSource::open(sample_rate, frame_size)
                .context("opening audio input")?;
            let stats = run_session(&tuner, &mut source, &mut state, &control, args.cycles, print);
            source.close()?;
            stats
        }
    };

    log::info!(
        "{} cycles, {} reports, {} skipped",
        stats.cycles,
        stats.reports,
        stats.skipped
    );
    Ok(())
}
