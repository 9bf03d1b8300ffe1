//! autocal - ambient-aware display calibration
//!
//! Drives ArgyllCMS (dispcal, colprof, dispwin, spotread) with targets chosen
//! from the surrounding light.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::debug;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

use autocal_core::{Config, LogManager};

mod commands;

use commands::Session;

#[derive(Parser)]
#[command(name = "autocal")]
#[command(author, version, about = "Ambient-aware display calibration with ArgyllCMS")]
#[command(long_about = "
Calibrates and profiles a display with ArgyllCMS, picking white point and
brightness targets from the ambient light (time of day or a spotread reading).

Examples:
  autocal                                # Interactive menu
  autocal --red -5 --apply-only          # Calibrate flags work without a subcommand
  autocal calibrate                      # Calibrate for the current light
  autocal calibrate --red -5 --green 3   # Warm it up a little
  autocal calibrate --hour 22 -n         # Show the night-time commands only
  autocal variants                       # Low, medium and high profiles
  autocal apply --force-condition low    # Install the stored low-light profile
  autocal tune --blue 0.95 --export warm # Load and save a visual tweak
  autocal tune --reset                   # Back to a linear LUT
")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    calibrate: commands::calibrate::CalibrateArgs,

    /// Verbose output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Configuration file (default: ./.autocal.yaml, ~/.autocal.yaml or
    /// <config dir>/autocal/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print the tool commands instead of running them
    #[arg(short = 'n', long, global = true)]
    dry_run: bool,

    /// Continue without a detected colorimeter instead of asking
    #[arg(short = 'y', long, global = true)]
    yes: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Calibrate and profile for the current ambient light
    #[command(visible_alias = "c")]
    Calibrate(commands::calibrate::CalibrateArgs),

    /// Calibrate one profile per light condition
    #[command(visible_alias = "v")]
    Variants(commands::variants::VariantsArgs),

    /// Install the stored profile matching the current light
    #[command(visible_alias = "a")]
    Apply(commands::apply::ApplyArgs),

    /// Load per-channel gain curves for visual tuning
    #[command(visible_alias = "t")]
    Tune(commands::tune::TuneArgs),
}

/// Installs the stderr layer and the rotating file layer.
///
/// The returned guard flushes the file writer when dropped.
fn init_logging(verbose: u8, log: LogManager) -> WorkerGuard {
    let console = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        })
    });
    let (writer, guard) = tracing_appender::non_blocking(log);

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .without_time()
                .with_filter(console),
        )
        .with(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(LevelFilter::DEBUG),
        )
        .init();
    guard
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.command.is_some() && cli.calibrate.any_set() {
        bail!("Calibration flags given before a subcommand; put them after it");
    }

    let (config, config_path) =
        Config::discover(cli.config.as_deref()).context("Failed to load configuration")?;
    let log_path = config.log_path();
    let _guard = init_logging(
        cli.verbose,
        LogManager::new(&log_path, config.rotation_policy()),
    );
    if let Some(path) = &config_path {
        debug!(config = %path.display(), "loaded configuration");
    }
    debug!(log = %log_path.display(), dry_run = cli.dry_run, "autocal starting");

    let session = Session {
        config,
        log_path,
        dry_run: cli.dry_run,
        assume_yes: cli.yes,
        verbose: cli.verbose,
    };

    match cli.command {
        None if cli.calibrate.any_set() => commands::calibrate::run(cli.calibrate, &session),
        None => commands::menu::run(cli.calibrate, &session),
        Some(Commands::Calibrate(args)) => commands::calibrate::run(args, &session),
        Some(Commands::Variants(args)) => commands::variants::run(args, &session),
        Some(Commands::Apply(args)) => commands::apply::run(args, &session),
        Some(Commands::Tune(args)) => commands::tune::run(args, &session),
    }
}
