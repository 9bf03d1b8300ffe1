//! Command construction for the ArgyllCMS steps.
//!
//! This is the only place calibration semantics turn into tool flags. Channel
//! trims are percentages; dispcal wants multiplicative gains, so a trim `p`
//! becomes the factor `1 + p/100`.

use crate::{ArgyllTools, CalibrationSettings, CommandLine, ProfileArtifact, ToolOptions};
use std::path::Path;
use std::time::Duration;

/// Longest wait for an ambient reading before falling back to the clock.
pub const AMBIENT_TIMEOUT: Duration = Duration::from_secs(3);

/// Gain factor for a trim percentage.
pub fn trim_factor(percent: f64) -> f64 {
    1.0 + percent / 100.0
}

/// Formats a factor with three decimals, dropping trailing zeros but keeping
/// one fractional digit (`0.950` → `0.95`, `1.000` → `1.0`).
pub fn format_factor(factor: f64) -> String {
    let mut s = format!("{factor:.3}");
    while s.ends_with('0') && !s.ends_with(".0") {
        s.pop();
    }
    s
}

/// Builds argv for each external step.
#[derive(Debug, Clone, Default)]
pub struct CommandBuilder {
    tools: ArgyllTools,
    options: ToolOptions,
}

impl CommandBuilder {
    /// Builder over the given tools and options.
    pub fn new(tools: ArgyllTools, options: ToolOptions) -> Self {
        Self { tools, options }
    }

    /// Tool paths in use.
    pub fn tools(&self) -> &ArgyllTools {
        &self.tools
    }

    /// Invocation options in use.
    pub fn options(&self) -> &ToolOptions {
        &self.options
    }

    fn display_flag(&self) -> String {
        format!("-d{}", self.options.display)
    }

    /// dispcal run measuring the display and writing `<base>.cal`.
    ///
    /// Gain flags are emitted only when at least one trim is non-zero, and
    /// then for all three channels.
    pub fn measurement_command(
        &self,
        settings: &CalibrationSettings,
        artifact: &ProfileArtifact,
    ) -> CommandLine {
        let mut cmd = CommandLine::new(&self.tools.dispcal)
            .arg("-v")
            .arg(self.display_flag())
            .arg(format!("-y{}", self.options.display_type))
            .args(["-t".to_string(), settings.white_point_kelvin.to_string()])
            .args(["-g".to_string(), settings.gamma.to_string()])
            .args(["-b".to_string(), settings.brightness_cd_m2.to_string()])
            .args(["-q", self.options.measure_quality.as_str()]);

        if settings.has_trims() {
            for (flag, trim) in ["-R", "-G", "-B"].into_iter().zip(settings.trims()) {
                cmd = cmd.arg(flag).arg(format_factor(trim_factor(trim)));
            }
        }

        cmd.arg(artifact.base_path().display().to_string()).interactive()
    }

    /// colprof run turning the measurement's `.cal` into `<base>.icc`.
    pub fn profiling_command(
        &self,
        cal_file: &Path,
        settings: &CalibrationSettings,
        artifact: &ProfileArtifact,
    ) -> CommandLine {
        let description = format!(
            "{} Created {}",
            settings.profile_base_name,
            artifact.timestamp().stamp()
        );
        CommandLine::new(&self.tools.colprof)
            .arg("-v")
            .args(["-D".to_string(), description])
            .args(["-A", self.options.author.as_str()])
            .args(["-q", self.options.profile_quality.as_str()])
            .args(["-O".to_string(), artifact.icc_path().display().to_string()])
            .arg(cal_file.display().to_string())
    }

    /// dispwin run installing `profile` as the display default.
    pub fn install_command(&self, profile: &Path) -> CommandLine {
        CommandLine::new(&self.tools.dispwin)
            .arg(self.display_flag())
            .arg("-I")
            .arg(profile.display().to_string())
    }

    /// dispwin run loading calibration curves into the video LUT.
    pub fn load_command(&self, cal_file: &Path) -> CommandLine {
        CommandLine::new(&self.tools.dispwin)
            .arg(self.display_flag())
            .arg(cal_file.display().to_string())
    }

    /// dispwin run restoring a linear video LUT.
    pub fn reset_command(&self) -> CommandLine {
        CommandLine::new(&self.tools.dispwin)
            .arg(self.display_flag())
            .arg("-c")
    }

    /// spotread run taking one ambient reading, limited to [`AMBIENT_TIMEOUT`].
    pub fn ambient_command(&self) -> CommandLine {
        CommandLine::new(&self.tools.spotread)
            .args(["-a", "-N"])
            .with_stdin("q\n")
            .with_timeout(AMBIENT_TIMEOUT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LightBucket, PartialSettings, Timestamp, resolve};
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn artifact(name: &str) -> ProfileArtifact {
        let t = NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        ProfileArtifact::new("out", name, Timestamp::from_naive(t))
    }

    fn flag_value<'a>(cmd: &'a CommandLine, flag: &str) -> Option<&'a str> {
        let pos = cmd.args.iter().position(|a| a == flag)?;
        cmd.args.get(pos + 1).map(String::as_str)
    }

    #[test]
    fn test_trim_factor() {
        assert_relative_eq!(trim_factor(-5.0), 0.95);
        assert_relative_eq!(trim_factor(3.0), 1.03);
        assert_relative_eq!(trim_factor(0.0), 1.0);
        assert_relative_eq!(trim_factor(-100.0), 0.0);
        assert_relative_eq!(trim_factor(100.0), 2.0);
    }

    #[test]
    fn test_format_factor() {
        assert_eq!(format_factor(0.95), "0.95");
        assert_eq!(format_factor(1.03), "1.03");
        assert_eq!(format_factor(1.0), "1.0");
        assert_eq!(format_factor(0.0), "0.0");
        assert_eq!(format_factor(1.125), "1.125");
        assert_eq!(format_factor(trim_factor(12.5)), "1.125");
    }

    #[test]
    fn test_measurement_base_flags() {
        let settings = resolve(LightBucket::Low, &PartialSettings::default()).unwrap();
        let a = artifact(&settings.profile_base_name);
        let cmd = CommandBuilder::default().measurement_command(&settings, &a);
        assert_eq!(cmd.program, "dispcal");
        assert!(cmd.interactive);
        assert!(cmd.contains("-d1"));
        assert!(cmd.contains("-yl"));
        assert_eq!(flag_value(&cmd, "-t"), Some("5500"));
        assert_eq!(flag_value(&cmd, "-g"), Some("2.2"));
        assert_eq!(flag_value(&cmd, "-b"), Some("80"));
        assert_eq!(flag_value(&cmd, "-q"), Some("m"));
        assert_eq!(
            cmd.args.last().map(String::as_str),
            Some("out/LowLight_Profile_20240601_100000")
        );
    }

    #[test]
    fn test_zero_trims_emit_no_factors() {
        let overrides = PartialSettings {
            red_trim_percent: Some(0.0),
            ..Default::default()
        };
        let settings = resolve(LightBucket::High, &overrides).unwrap();
        let cmd = CommandBuilder::default().measurement_command(&settings, &artifact("x"));
        for flag in ["-R", "-G", "-B"] {
            assert!(!cmd.contains(flag), "{flag} emitted");
        }
    }

    #[test]
    fn test_trims_emit_all_factors() {
        let overrides = PartialSettings {
            red_trim_percent: Some(-5.0),
            green_trim_percent: Some(3.0),
            ..Default::default()
        };
        let settings = resolve(LightBucket::High, &overrides).unwrap();
        let cmd = CommandBuilder::default().measurement_command(&settings, &artifact("x"));
        assert_eq!(flag_value(&cmd, "-R"), Some("0.95"));
        assert_eq!(flag_value(&cmd, "-G"), Some("1.03"));
        assert_eq!(flag_value(&cmd, "-B"), Some("1.0"));
        assert!(cmd.to_string().contains("-R 0.95 -G 1.03"));
    }

    #[test]
    fn test_profiling_references_cal() {
        let settings = resolve(LightBucket::Medium, &PartialSettings::default()).unwrap();
        let a = artifact(&settings.profile_base_name);
        let builder = CommandBuilder::default();
        let cmd = builder.profiling_command(&a.cal_path(), &settings, &a);
        assert_eq!(cmd.program, "colprof");
        assert!(!cmd.interactive);
        assert_eq!(
            flag_value(&cmd, "-D"),
            Some("MediumLight_Profile Created 20240601_100000")
        );
        assert_eq!(flag_value(&cmd, "-A"), Some("AutoCal"));
        assert_eq!(flag_value(&cmd, "-q"), Some("f"));
        assert_eq!(
            flag_value(&cmd, "-O"),
            Some("out/MediumLight_Profile_20240601_100000.icc")
        );
        assert_eq!(
            cmd.args.last().map(String::as_str),
            Some("out/MediumLight_Profile_20240601_100000.cal")
        );
    }

    #[test]
    fn test_dispwin_commands() {
        let builder = CommandBuilder::new(
            ArgyllTools::default(),
            ToolOptions { display: 2, ..Default::default() },
        );
        let install = builder.install_command(Path::new("p.icc"));
        assert_eq!(install.argv(), vec!["dispwin", "-d2", "-I", "p.icc"]);
        assert_eq!(builder.reset_command().argv(), vec!["dispwin", "-d2", "-c"]);
        assert_eq!(
            builder.load_command(Path::new("t.cal")).argv(),
            vec!["dispwin", "-d2", "t.cal"]
        );
        let ambient = builder.ambient_command();
        assert_eq!(ambient.stdin.as_deref(), Some("q\n"));
        assert_eq!(ambient.timeout, Some(AMBIENT_TIMEOUT));
        assert_eq!(AMBIENT_TIMEOUT, Duration::from_secs(3));
        assert_eq!(install.timeout, None);
    }
}
