use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use kws_frontend::analysis::{CycleOutcome, DetectionLoop};
use kws_frontend::audio::{
    CpalMicrophone, GainPolicy, Microphone, SyntheticMicrophone, WavMicrophone,
};
use kws_frontend::config::AppConfig;
use kws_frontend::engine::start_frontend;
use kws_frontend::error::{AudioError, IndicatorError};
use kws_frontend::events::event_channel;
use kws_frontend::fixtures::{default_script_path, ScriptedClassifier};
use kws_frontend::indicator::{IndicatorTask, LogIndicatorDriver, Rgb};
use kws_frontend::telemetry;
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(
    name = "kws_cli",
    about = "Keyword-spotting front-end harness: gain policy, deterministic replay and live run"
)]
struct Cli {
    /// Configuration JSON (defaults to assets/kws_config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the gain trajectory for a loudness sequence
    Gain {
        #[arg(long, default_value_t = 30.0)]
        start: f32,
        /// Comma-separated RMS values
        #[arg(long, value_delimiter = ',', required = true)]
        loudness: Vec<f32>,
    },
    /// Run detection cycles and indicator ticks on one thread, one JSON line per cycle
    Replay {
        /// WAV input, replayed in a loop
        #[arg(long, conflicts_with = "amplitude")]
        wav: Option<PathBuf>,
        /// Sine amplitude (16-bit units) for the synthetic microphone
        #[arg(long, default_value_t = 100.0)]
        amplitude: f32,
        /// Classifier fixture script
        #[arg(long)]
        script: Option<PathBuf>,
        #[arg(long, default_value_t = 10)]
        cycles: u32,
    },
    /// Start the detection and indicator tasks
    Run {
        /// WAV input paced at its sample rate (default: system microphone)
        #[arg(long)]
        wav: Option<PathBuf>,
        /// Classifier fixture script
        #[arg(long)]
        script: Option<PathBuf>,
        /// Halt after this many seconds and print a telemetry snapshot
        #[arg(long)]
        duration_secs: Option<u64>,
    },
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    kws_frontend::init_logging();
    let cli = Cli::parse();
    let config = match cli.config {
        Some(path) => AppConfig::load_from_file(path),
        None => AppConfig::load(),
    };

    match cli.command {
        Commands::Gain { start, loudness } => run_gain(&config, start, &loudness),
        Commands::Replay {
            wav,
            amplitude,
            script,
            cycles,
        } => run_replay(config, wav, amplitude, script, cycles),
        Commands::Run {
            wav,
            script,
            duration_secs,
        } => run_live(config, wav, script, duration_secs),
    }
}

#[derive(Serialize)]
struct GainReport<'a> {
    start: f32,
    loudness: &'a [f32],
    trajectory: Vec<f32>,
}

fn run_gain(config: &AppConfig, start: f32, loudness: &[f32]) -> Result<ExitCode> {
    if loudness.iter().any(|l| !l.is_finite() || *l < 0.0) {
        return Err(anyhow!("loudness values must be finite and non-negative"));
    }
    let policy = GainPolicy::from(&config.agc);
    let trajectory = loudness
        .iter()
        .scan(start, |gain, &l| {
            *gain = policy.adjust(*gain, l);
            Some(*gain)
        })
        .collect();

    let report = GainReport {
        start,
        loudness,
        trajectory,
    };
    println!("{}", serde_json::to_string(&report)?);
    Ok(ExitCode::from(0))
}

#[derive(Serialize)]
struct ReplayLine {
    cycle: u32,
    gain: f32,
    rms: f32,
    #[serde(flatten)]
    outcome: CycleOutcome,
    frame: Option<Rgb>,
}

fn load_classifier(script: Option<PathBuf>) -> Result<ScriptedClassifier> {
    let path = script.unwrap_or_else(default_script_path);
    ScriptedClassifier::from_path(&path)
        .with_context(|| format!("loading classifier script {}", path.display()))
}

fn run_replay(
    config: AppConfig,
    wav: Option<PathBuf>,
    amplitude: f32,
    script: Option<PathBuf>,
    cycles: u32,
) -> Result<ExitCode> {
    let microphone: Box<dyn Microphone> = match wav {
        Some(path) => Box::new(open_wav(&path, false)?),
        None => Box::new(SyntheticMicrophone::sine(
            amplitude,
            config.detection.sample_rate,
        )),
    };
    let classifier = load_classifier(script)?;

    let (sender, receiver) = event_channel(config.detection.event_capacity);
    let mut detection = DetectionLoop::initialize(&config, microphone, classifier, sender)
        .context("initializing detection loop")?;
    let mut indicator = IndicatorTask::new(config.indicator, LogIndicatorDriver::default(), receiver);

    for cycle in 1..=cycles {
        let outcome = detection.run_cycle();
        let frame = indicator.tick();
        let line = ReplayLine {
            cycle,
            gain: detection.current_gain(),
            rms: detection.last_rms(),
            outcome,
            frame,
        };
        println!("{}", serde_json::to_string(&line)?);
    }

    Ok(ExitCode::from(0))
}

fn open_wav(path: &Path, paced: bool) -> Result<WavMicrophone> {
    WavMicrophone::open(path, paced).with_context(|| format!("opening {}", path.display()))
}

fn run_live(
    config: AppConfig,
    wav: Option<PathBuf>,
    script: Option<PathBuf>,
    duration_secs: Option<u64>,
) -> Result<ExitCode> {
    let classifier = load_classifier(script)?;
    let ring_capacity = config.detection.frame_size.saturating_mul(4);
    let sample_rate = config.detection.sample_rate;

    let microphone_factory = move || -> Result<Box<dyn Microphone>, AudioError> {
        match wav {
            Some(path) => Ok(Box::new(WavMicrophone::open(&path, true)?)),
            None => Ok(Box::new(CpalMicrophone::new(ring_capacity, sample_rate))),
        }
    };
    let driver_factory = || -> Result<LogIndicatorDriver, IndicatorError> {
        Ok(LogIndicatorDriver::default())
    };

    let handles = start_frontend(config, microphone_factory, classifier, driver_factory)
        .context("starting front-end")?;

    match duration_secs {
        Some(secs) => {
            thread::sleep(Duration::from_secs(secs));
            println!("{}", serde_json::to_string(&telemetry::hub().snapshot())?);
            if handles.detection.is_finished() {
                eprintln!("Detection task halted during start-up");
                return Ok(ExitCode::from(1));
            }
            Ok(ExitCode::from(0))
        }
        None => {
            let _ = handles.detection.join();
            eprintln!("Detection task halted during start-up");
            Ok(ExitCode::from(1))
        }
    }
}
