/// OpenRoad player: drives the road geometry engine headless over a track file
///
/// Commands:
///   run    drive along a track, logging or dumping the road tables
///   check  validate a track file and list its sections
mod drive;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use openroad_common::AppConfig;
use openroad_track::TrackSet;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = "openroad.toml";

#[derive(Parser)]
#[command(name = "openroad")]
#[command(version, about = "Pseudo-3D road geometry engine")]
struct Cli {
    /// Config file (defaults to ./openroad.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level regardless of the config
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Drive along a track
    Run(drive::RunArgs),

    /// Validate a track file
    Check {
        /// Track file (TOML)
        track: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load(path).with_context(|| format!("Failed to load config {}", path.display()))?,
        None => AppConfig::load_or_default(DEFAULT_CONFIG).context("Failed to load openroad.toml")?,
    };

    let level = if cli.verbose { "debug" } else { config.log_level.as_str() };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(format!("openroad={}", level).parse()?))
        .init();

    tracing::info!("OpenRoad v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Run(args) => {
            let track = load_track(args.track.as_deref(), &config)?;
            drive::run(track, &config, &args)
        }
        Commands::Check { track } => {
            let track = load_track(track.as_deref(), &config)?;
            check(&track);
            Ok(())
        }
    }
}

/// Track from the command line, else the config
fn load_track(arg: Option<&Path>, config: &AppConfig) -> Result<TrackSet> {
    let Some(path) = arg.or(config.track.as_deref()) else {
        anyhow::bail!("No track given. Pass a track file or set `track` in {}", DEFAULT_CONFIG);
    };
    TrackSet::load(path).with_context(|| format!("Failed to load track {}", path.display()))
}

fn check(track: &TrackSet) {
    for (select, section) in track.sections() {
        tracing::info!(
            "{:<10} '{}': {} path entries, {} segments, {} height entries",
            select.to_string(),
            section.name,
            section.path_len(),
            section.segment_count(),
            section.height_entries()
        );
    }
    tracing::info!("Track '{}' OK", track.name);
}
