use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use crossbeam::channel::unbounded;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use binaural_backend::config::BackendConfig;
use binaural_backend::engine::BinauralAudioEngine;
use binaural_backend::models::INTENTS;
use binaural_backend::schedule_client::{FileScheduleSource, HttpScheduleClient, ScheduleSource};
use binaural_backend::session::{run_session, SessionEvent, SessionMachine};

/// CLI for driving a timed binaural-beat session
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Request a schedule from the service and play it
    Run(RunArgs),
    /// Play a schedule stored in a local JSON file
    Play(PlayArgs),
    /// Generate a default config file and exit
    GenerateConfig(ConfigArgs),
}

#[derive(ClapArgs)]
struct RunArgs {
    /// Session goal; one of the fixed intent set
    #[arg(long)]
    intent: String,
    /// Session length in minutes
    #[arg(long)]
    minutes: Option<u32>,
    /// Base URL of the schedule service
    #[arg(long)]
    api_url: Option<String>,
    /// Playback volume, 0.0 to 1.0
    #[arg(long)]
    volume: Option<f32>,
    /// Path to a config TOML file
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(ClapArgs)]
struct PlayArgs {
    /// Path to the schedule JSON file
    #[arg(long)]
    path: PathBuf,
    /// Playback volume, 0.0 to 1.0
    #[arg(long)]
    volume: Option<f32>,
    /// Path to a config TOML file
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(ClapArgs)]
struct ConfigArgs {
    /// Output path for the generated configuration
    #[arg(long, default_value = "config.toml")]
    out: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "binaural_backend=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run(args) => run_command(args),
        Commands::Play(args) => play_command(args),
        Commands::GenerateConfig(args) => {
            BackendConfig::generate_default(&args.out)?;
            println!("Generated default config at {}", args.out.display());
            Ok(())
        }
    }
}

fn load_config(path: &Option<PathBuf>) -> Result<BackendConfig> {
    match path {
        Some(p) => {
            BackendConfig::load(p).with_context(|| format!("loading config {}", p.display()))
        }
        None => Ok(BackendConfig::default()),
    }
}

fn run_command(args: RunArgs) -> Result<()> {
    let mut config = load_config(&args.config)?;
    if let Some(url) = args.api_url {
        config.api_base_url = url;
    }
    if let Some(minutes) = args.minutes {
        config.session_minutes = minutes;
    }
    if let Some(volume) = args.volume {
        config.initial_volume = volume;
    }
    if !INTENTS.contains(&args.intent.as_str()) {
        bail!(
            "unknown intent {:?}; expected one of: {}",
            args.intent,
            INTENTS.join(", ")
        );
    }

    let source = Arc::new(HttpScheduleClient::new(
        &config.api_base_url,
        Duration::from_secs(config.request_timeout_secs),
    )?);
    drive_session(config, args.intent, source)
}

fn play_command(args: PlayArgs) -> Result<()> {
    let mut config = load_config(&args.config)?;
    if let Some(volume) = args.volume {
        config.initial_volume = volume;
    }
    let intent = format!("file:{}", args.path.display());
    let source = Arc::new(FileScheduleSource::new(args.path));
    drive_session(config, intent, source)
}

fn drive_session(
    config: BackendConfig,
    intent: String,
    source: Arc<dyn ScheduleSource>,
) -> Result<()> {
    let engine = BinauralAudioEngine::new(config.initial_volume);
    let machine = SessionMachine::new(engine, config.carrier_hz, config.session_minutes, intent);

    let (tx, rx) = unbounded();
    let ctrlc_tx = tx.clone();
    ctrlc::set_handler(move || {
        let _ = ctrlc_tx.send(SessionEvent::Shutdown);
    })?;

    tx.send(SessionEvent::Start)
        .expect("event queue open at startup");
    info!("session starting; press Ctrl+C to stop");

    let final_state = run_session(machine, source, rx, tx);
    if let Some(error) = final_state.error {
        bail!("session failed: {error}");
    }
    Ok(())
}
