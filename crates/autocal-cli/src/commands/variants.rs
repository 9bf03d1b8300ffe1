//! One calibration per light condition.

use anyhow::{Result, bail};
use clap::Args;
use std::path::PathBuf;
use tracing::trace;

use autocal_core::{LightBucket, Orchestrator, TracingLog, published_file_name};

use super::{LightArgs, Session, TargetArgs};

/// Arguments for the `variants` command.
#[derive(Args, Default, Clone)]
pub struct VariantsArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Directory for the .cal and .icc files
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Run the variants command.
pub fn run(args: VariantsArgs, session: &Session) -> Result<()> {
    trace!(dry_run = session.dry_run, "variants::run");
    if args.target.profile_name.is_some() {
        println!("Note: --profile-name is ignored; variants use their fixed names.");
    }

    let plan = session.plan(&args.target, &LightArgs::default(), args.output.clone());
    let mut runner = session.runner();
    let mut operator = session.operator();
    let log = TracingLog;
    let runs = Orchestrator::new(runner.as_mut(), &log, &mut operator)
        .with_builder(session.builder())
        .with_probe(session.probe())
        .run_variants(&plan);

    for run in &runs {
        super::calibrate::summarize(run, session);
    }

    let done = runs.iter().filter(|r| r.succeeded()).count();
    if done < LightBucket::ALL.len() {
        let failed = runs.last().map(|r| r.outcome.to_string()).unwrap_or_default();
        bail!(
            "{done} of {} variants calibrated ({failed}); {}",
            LightBucket::ALL.len(),
            session.see_log()
        );
    }

    println!("Stored profiles in {}:", plan.output_dir.display());
    for bucket in LightBucket::ALL {
        println!("  {:<6} {}", bucket.name(), published_file_name(bucket));
    }
    Ok(())
}
