//! Install the stored profile for the current light.
//!
//! Safe to schedule: never prompts and never calibrates.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use tracing::trace;

use autocal_core::{LightBucket, LightSource, Orchestrator, ProfileLocator, TracingLog};

use super::{LightArgs, Session, parse_bucket};

/// Arguments for the `apply` command.
#[derive(Args, Default, Clone)]
pub struct ApplyArgs {
    /// Use this light condition instead of measuring: low, medium, high
    #[arg(long, value_parser = parse_bucket, conflicts_with_all = ["hour", "sensor", "manual"])]
    pub force_condition: Option<LightBucket>,

    /// Directory searched first for the stored .icc profiles
    #[arg(long)]
    pub profile_dir: Option<PathBuf>,

    #[command(flatten)]
    pub light: LightArgs,
}

/// Run the apply command.
pub fn run(args: ApplyArgs, session: &Session) -> Result<()> {
    trace!(force = ?args.force_condition, "apply::run");
    let source = match args.force_condition {
        Some(bucket) => LightSource::Fixed(bucket),
        None => args.light.source(&session.config),
    };
    apply_for(session, source, args.profile_dir)
}

/// Judges the light from `source` and installs the matching stored profile.
pub(super) fn apply_for(
    session: &Session,
    source: LightSource,
    profile_dir: Option<PathBuf>,
) -> Result<()> {
    let dir = profile_dir.unwrap_or_else(|| session.config.profile_dir());
    let locator = ProfileLocator::with_system_dirs(dir);

    let mut runner = session.runner();
    let mut operator = session.operator();
    let log = TracingLog;
    let mut orchestrator = Orchestrator::new(runner.as_mut(), &log, &mut operator)
        .with_builder(session.builder());

    let bucket = orchestrator
        .light_bucket(source)
        .context("Failed to judge ambient light")?;
    let path = orchestrator
        .apply_existing(bucket, &locator)
        .with_context(|| format!("Could not apply the {bucket} profile; {}", session.see_log()))?;

    println!("Applied {bucket}-light profile: {}", path.display());
    Ok(())
}
