//! CLI command implementations

pub mod apply;
pub mod calibrate;
pub mod menu;
pub mod tune;
pub mod variants;

use anyhow::{Context, Result};
use clap::Args;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing::{info, warn};

use autocal_core::{
    ArgyllTools, CommandBuilder, Config, DeviceChoice, DeviceProbe, DryRunRunner, LightBucket,
    LightSource, Operator, PartialSettings, ProcessRunner, RunPlan, SystemRunner,
};

/// Everything a command needs besides its own arguments.
pub struct Session {
    pub config: Config,
    pub log_path: PathBuf,
    pub dry_run: bool,
    pub assume_yes: bool,
    pub verbose: u8,
}

impl Session {
    /// Tool commands with located binaries and configured options.
    pub fn builder(&self) -> CommandBuilder {
        let tools = ArgyllTools::locate();
        let missing = tools.missing();
        if !missing.is_empty() && !self.dry_run {
            warn!(tools = ?missing, "ArgyllCMS tools not found on PATH");
        }
        CommandBuilder::new(tools, self.config.tool_options())
    }

    pub fn probe(&self) -> DeviceProbe {
        DeviceProbe::default().with_delay(self.config.probe_delay())
    }

    pub fn runner(&self) -> Box<dyn ProcessRunner> {
        if self.dry_run {
            Box::new(DryRunRunner::default())
        } else {
            Box::new(SystemRunner)
        }
    }

    pub fn operator(&self) -> PromptOperator {
        PromptOperator {
            assume_yes: self.assume_yes,
        }
    }

    /// Run plan from config with `target` layered on top.
    pub fn plan(&self, target: &TargetArgs, light: &LightArgs, output: Option<PathBuf>) -> RunPlan {
        let overrides = self.config.overrides().merged_with(&target.overrides());
        RunPlan {
            overrides,
            light: light.source(&self.config),
            output_dir: output.unwrap_or_else(|| self.config.output_dir()),
            probe_retries: self
                .config
                .probe_retries
                .unwrap_or(autocal_core::DEFAULT_PROBE_RETRIES),
            // Nothing is plugged in during a dry run.
            known_device: self.dry_run.then_some(true),
            report_dir: if self.dry_run { None } else { self.config.report_dir() },
            dry_run: self.dry_run,
            ..RunPlan::default()
        }
    }

    /// Error pointing the user at the log.
    pub fn see_log(&self) -> String {
        format!("see {} for details", self.log_path.display())
    }
}

/// Calibration target overrides shared by `calibrate` and `variants`.
#[derive(Args, Default, Clone)]
pub struct TargetArgs {
    /// Red trim in percent (-100..100)
    #[arg(long, allow_negative_numbers = true)]
    pub red: Option<f64>,

    /// Green trim in percent (-100..100)
    #[arg(long, allow_negative_numbers = true)]
    pub green: Option<f64>,

    /// Blue trim in percent (-100..100)
    #[arg(long, allow_negative_numbers = true)]
    pub blue: Option<f64>,

    /// Target brightness in cd/m^2
    #[arg(long)]
    pub brightness: Option<u32>,

    /// Target gamma
    #[arg(long)]
    pub gamma: Option<f64>,

    /// Target white point in Kelvin
    #[arg(long)]
    pub white_point: Option<u32>,

    /// Profile name prefix
    #[arg(long)]
    pub profile_name: Option<String>,
}

impl TargetArgs {
    pub fn overrides(&self) -> PartialSettings {
        PartialSettings {
            gamma: self.gamma,
            white_point_kelvin: self.white_point,
            brightness_cd_m2: self.brightness,
            profile_base_name: self.profile_name.clone(),
            red_trim_percent: self.red,
            green_trim_percent: self.green,
            blue_trim_percent: self.blue,
        }
    }
}

/// How the ambient light is judged.
#[derive(Args, Default, Clone)]
pub struct LightArgs {
    /// Classify this hour of day (0-23) instead of the clock
    #[arg(long, conflicts_with_all = ["sensor", "manual"])]
    pub hour: Option<u32>,

    /// Read the ambient level with spotread, falling back to the clock
    #[arg(long)]
    pub sensor: bool,

    /// Skip ambient sensing and use medium-light targets
    #[arg(long, conflicts_with = "sensor")]
    pub manual: bool,
}

impl LightArgs {
    pub fn source(&self, config: &Config) -> LightSource {
        if self.manual {
            LightSource::Fixed(LightBucket::Medium)
        } else if let Some(hour) = self.hour {
            LightSource::Hour(hour)
        } else if self.sensor || config.ambient_sensor.unwrap_or(false) {
            LightSource::Sensor
        } else {
            LightSource::Clock
        }
    }
}

/// Asks on the terminal what to do about a missing colorimeter.
pub struct PromptOperator {
    assume_yes: bool,
}

impl Operator for PromptOperator {
    fn device_missing(&mut self, round: u32) -> DeviceChoice {
        if self.assume_yes {
            info!("--yes given, continuing without a detected colorimeter");
            return DeviceChoice::Proceed;
        }
        eprintln!("Colorimeter not found (check {round}). Connect it and retry.");
        match prompt("[r]etry, [c]ontinue anyway, [a]bort: ") {
            Ok(answer) => parse_choice(&answer),
            Err(_) => DeviceChoice::Abort,
        }
    }
}

fn parse_choice(answer: &str) -> DeviceChoice {
    match answer.trim().to_ascii_lowercase().as_str() {
        "r" | "retry" | "" => DeviceChoice::Retry,
        "c" | "continue" | "y" | "yes" => DeviceChoice::Proceed,
        _ => DeviceChoice::Abort,
    }
}

/// Prints `question` and reads one line. EOF is an error.
pub fn prompt(question: &str) -> Result<String> {
    print!("{question}");
    io::stdout().flush().context("Failed to flush stdout")?;
    let mut line = String::new();
    let read = io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read from stdin")?;
    if read == 0 {
        anyhow::bail!("stdin closed");
    }
    Ok(line.trim().to_string())
}

/// Parses a light condition name for clap.
pub fn parse_bucket(s: &str) -> Result<LightBucket, String> {
    LightBucket::parse(s).ok_or_else(|| format!("expected low, medium or high, got '{s}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(config: Config, dry_run: bool) -> Session {
        Session {
            config,
            log_path: PathBuf::from("calibration.log"),
            dry_run,
            assume_yes: false,
            verbose: 0,
        }
    }

    #[test]
    fn test_cli_beats_config() {
        let config = Config::from_yaml_str("gamma: 2.4\nred: -2\nwhite_point: 6000").unwrap();
        let target = TargetArgs {
            red: Some(-5.0),
            ..Default::default()
        };
        let plan = session(config, false).plan(&target, &LightArgs::default(), None);
        assert_eq!(plan.overrides.red_trim_percent, Some(-5.0));
        assert_eq!(plan.overrides.gamma, Some(2.4));
        assert_eq!(plan.overrides.white_point_kelvin, Some(6000));
        assert_eq!(plan.known_device, None);
    }

    #[test]
    fn test_dry_run_plan() {
        let plan = session(Config::default(), true).plan(
            &TargetArgs::default(),
            &LightArgs::default(),
            Some(PathBuf::from("/tmp/out")),
        );
        assert_eq!(plan.known_device, Some(true));
        assert_eq!(plan.report_dir, None);
        assert!(plan.dry_run);
        assert_eq!(plan.output_dir, PathBuf::from("/tmp/out"));

        let live = session(Config::default(), false).plan(
            &TargetArgs::default(),
            &LightArgs::default(),
            None,
        );
        assert!(!live.dry_run);
        assert_eq!(live.known_device, None);
    }

    #[test]
    fn test_light_source() {
        let config = Config::default();
        let manual = LightArgs { manual: true, ..Default::default() };
        assert_eq!(manual.source(&config), LightSource::Fixed(LightBucket::Medium));
        let hour = LightArgs { hour: Some(7), ..Default::default() };
        assert_eq!(hour.source(&config), LightSource::Hour(7));
        assert_eq!(LightArgs::default().source(&config), LightSource::Clock);

        let sensing = Config::from_yaml_str("ambient_sensor: true").unwrap();
        assert_eq!(LightArgs::default().source(&sensing), LightSource::Sensor);
    }

    #[test]
    fn test_parse_choice() {
        assert_eq!(parse_choice("r\n"), DeviceChoice::Retry);
        assert_eq!(parse_choice(""), DeviceChoice::Retry);
        assert_eq!(parse_choice("Continue"), DeviceChoice::Proceed);
        assert_eq!(parse_choice("a"), DeviceChoice::Abort);
        assert_eq!(parse_choice("nope"), DeviceChoice::Abort);
    }

    #[test]
    fn test_assume_yes_proceeds() {
        let mut op = PromptOperator { assume_yes: true };
        assert_eq!(op.device_missing(1), DeviceChoice::Proceed);
    }
}
