//! Single calibration for the current ambient light.

use anyhow::{Result, bail};
use clap::Args;
use std::path::PathBuf;
use tracing::{info, trace};

use autocal_core::{
    CalibrationRun, Orchestrator, PartialSettings, TracingLog, calibration_report,
};

use super::{LightArgs, Session, TargetArgs};

/// Arguments for the `calibrate` command.
#[derive(Args, Default, Clone)]
pub struct CalibrateArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    #[command(flatten)]
    pub light: LightArgs,

    /// Only judge the light and install the matching stored profile
    #[arg(long)]
    pub apply_only: bool,

    /// Keep the new profile without installing it
    #[arg(long)]
    pub no_apply: bool,

    /// Directory for the new .cal and .icc files
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl CalibrateArgs {
    /// True when any flag was given.
    pub fn any_set(&self) -> bool {
        self.target.overrides() != PartialSettings::default()
            || self.light.hour.is_some()
            || self.light.sensor
            || self.light.manual
            || self.apply_only
            || self.no_apply
            || self.output.is_some()
    }
}

/// Run the calibrate command.
pub fn run(args: CalibrateArgs, session: &Session) -> Result<()> {
    trace!(apply_only = args.apply_only, dry_run = session.dry_run, "calibrate::run");

    if args.apply_only {
        let source = args.light.source(&session.config);
        return super::apply::apply_for(session, source, None);
    }

    let mut plan = session.plan(&args.target, &args.light, args.output.clone());
    plan.apply = !args.no_apply && !session.dry_run;

    let mut runner = session.runner();
    let mut operator = session.operator();
    let log = TracingLog;
    let run = Orchestrator::new(runner.as_mut(), &log, &mut operator)
        .with_builder(session.builder())
        .with_probe(session.probe())
        .run(&plan);

    summarize(&run, session);
    if !run.succeeded() {
        bail!("Calibration {}; {}", run.outcome, session.see_log());
    }
    Ok(())
}

/// Prints the outcome of one run to stdout.
pub(super) fn summarize(run: &CalibrationRun, session: &Session) {
    if session.verbose > 0 {
        println!("{}", calibration_report(run));
    }
    if let Some(s) = &run.settings {
        println!(
            "{}: {}K, gamma {}, {} cd/m^2",
            s.profile_base_name, s.white_point_kelvin, s.gamma, s.brightness_cd_m2
        );
    }
    match &run.profile_path {
        Some(path) if run.succeeded() => {
            info!(profile = %path.display(), "calibration complete");
            println!("Profile: {}", path.display());
        }
        _ => {}
    }
}
