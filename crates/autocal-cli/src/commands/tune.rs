//! Visual tuning through per-channel video LUT curves.
//!
//! The curves are written as a CAL file in the temp dir and loaded with
//! dispwin; nothing is measured.

use anyhow::{Context, Result, bail};
use chrono::Local;
use clap::Args;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, trace};

use autocal_core::{Orchestrator, TracingLog, TuneGains, generate_cal, tuning_report};

use super::Session;

const TEMP_CAL_NAME: &str = "autocal_tune.cal";

/// Arguments for the `tune` command.
#[derive(Args, Clone)]
pub struct TuneArgs {
    /// Red multiplier (1.0 = unchanged)
    #[arg(long, default_value_t = 1.0)]
    pub red: f64,

    /// Green multiplier
    #[arg(long, default_value_t = 1.0)]
    pub green: f64,

    /// Blue multiplier
    #[arg(long, default_value_t = 1.0)]
    pub blue: f64,

    /// Overall brightness multiplier
    #[arg(long, default_value_t = 1.0)]
    pub gain: f64,

    /// Also save the curves and a report under this name in the report dir
    #[arg(long, num_args = 0..=1, default_missing_value = "")]
    pub export: Option<String>,

    /// Restore a linear video LUT and exit
    #[arg(long, conflicts_with = "export")]
    pub reset: bool,
}

impl Default for TuneArgs {
    fn default() -> Self {
        Self {
            red: 1.0,
            green: 1.0,
            blue: 1.0,
            gain: 1.0,
            export: None,
            reset: false,
        }
    }
}

impl TuneArgs {
    pub fn gains(&self) -> Result<TuneGains> {
        let gains = TuneGains {
            red: self.red,
            green: self.green,
            blue: self.blue,
            gain: self.gain,
        };
        for (name, v) in [
            ("red", gains.red),
            ("green", gains.green),
            ("blue", gains.blue),
            ("gain", gains.gain),
        ] {
            if !v.is_finite() || v < 0.0 {
                bail!("{name} multiplier must be a non-negative number, got {v}");
            }
        }
        Ok(gains)
    }
}

/// Run the tune command.
pub fn run(args: TuneArgs, session: &Session) -> Result<()> {
    trace!(reset = args.reset, export = ?args.export, "tune::run");

    let mut runner = session.runner();
    let mut operator = session.operator();
    let log = TracingLog;
    let mut orchestrator = Orchestrator::new(runner.as_mut(), &log, &mut operator)
        .with_builder(session.builder());

    if args.reset {
        orchestrator
            .reset_calibration()
            .with_context(|| format!("Failed to reset the video LUT; {}", session.see_log()))?;
        println!("Video LUT reset to linear.");
        return Ok(());
    }

    let gains = args.gains()?;
    let cal = generate_cal(&gains, "AutoCal visual tuning");
    let temp = std::env::temp_dir().join(TEMP_CAL_NAME);
    fs::write(&temp, &cal).with_context(|| format!("Failed to write {}", temp.display()))?;
    orchestrator
        .load_calibration(&temp)
        .with_context(|| format!("Failed to load tuning curves; {}", session.see_log()))?;
    println!(
        "Loaded R {:.2}  G {:.2}  B {:.2}  gain {:.2}",
        gains.red, gains.green, gains.blue, gains.gain
    );

    if let Some(name) = &args.export {
        let dir = session
            .config
            .report_dir()
            .context("No report directory configured and no Documents folder found")?;
        let display = session.config.tool_options().display;
        let cal_file = export(&dir, name, &gains, &cal, display)?;
        println!("Exported {}", cal_file.display());
    }
    Ok(())
}

/// Saves `<name>.cal` and `Report_<name>.txt` in `dir`.
fn export(dir: &Path, name: &str, gains: &TuneGains, cal: &str, display: u32) -> Result<PathBuf> {
    let now = Local::now();
    let name = match name.trim() {
        "" => format!("LiveTune_{}", now.format("%Y%m%d_%H%M%S")),
        n => n.to_string(),
    };
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    let cal_file = dir.join(format!("{name}.cal"));
    fs::write(&cal_file, cal).with_context(|| format!("Failed to write {}", cal_file.display()))?;

    let report_file = dir.join(format!("Report_{name}.txt"));
    let date = now.format("%Y-%m-%d %H:%M:%S").to_string();
    fs::write(&report_file, tuning_report(gains, &date, &cal_file, display))
        .with_context(|| format!("Failed to write {}", report_file.display()))?;

    info!(cal = %cal_file.display(), report = %report_file.display(), "tuning exported");
    Ok(cal_file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gains_validated() {
        let args = TuneArgs {
            blue: -0.5,
            ..Default::default()
        };
        assert!(args.gains().is_err());
        assert!(TuneArgs::default().gains().unwrap().is_neutral());
    }

    #[test]
    fn test_export_writes_cal_and_report() {
        let dir = tempfile::tempdir().unwrap();
        let gains = TuneGains {
            blue: 0.95,
            ..Default::default()
        };
        let cal = generate_cal(&gains, "test");
        let path = export(dir.path(), "warm", &gains, &cal, 2).unwrap();

        assert_eq!(path, dir.path().join("warm.cal"));
        assert_eq!(fs::read_to_string(&path).unwrap(), cal);
        let report = fs::read_to_string(dir.path().join("Report_warm.txt")).unwrap();
        assert!(report.contains("Blue:  0.95"));
        assert!(report.contains("dispwin -d2"));
    }

    #[test]
    fn test_export_default_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = export(dir.path(), " ", &TuneGains::default(), "CAL\n", 1).unwrap();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("LiveTune_"));
        assert!(name.ends_with(".cal"));
    }
}
