//! User configuration file.
//!
//! A flat YAML mapping of optional keys, for example:
//!
//! ```yaml
//! display: 2
//! white_point: 6000
//! gamma: 2.4
//! author: Studio A
//! red: -2.5
//! log_max_files: 3
//! ```
//!
//! Lookup order when no path is given: `./.autocal.yaml`, `~/.autocal.yaml`,
//! `<config dir>/autocal/config.yaml`. The first existing file wins; no file
//! means all defaults.

use crate::{CalError, CalResult, PartialSettings, RotationPolicy, ToolOptions};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Log file name used when the config names none.
pub const DEFAULT_LOG_NAME: &str = "calibration.log";

/// Parsed configuration; every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Display number.
    pub display: Option<u32>,
    /// Display technology letter for dispcal `-y`.
    pub display_type: Option<String>,
    /// White point override in Kelvin.
    pub white_point: Option<u32>,
    /// Gamma override.
    pub gamma: Option<f64>,
    /// Brightness override in cd/m².
    pub brightness: Option<u32>,
    /// dispcal quality letter.
    pub measure_quality: Option<String>,
    /// colprof quality letter.
    pub profile_quality: Option<String>,
    /// Profile author.
    pub author: Option<String>,
    /// Red trim in percent.
    pub red: Option<f64>,
    /// Green trim in percent.
    pub green: Option<f64>,
    /// Blue trim in percent.
    pub blue: Option<f64>,
    /// Profile base name override.
    pub profile_name: Option<String>,
    /// Where new `.cal`/`.icc` files go.
    pub output_dir: Option<PathBuf>,
    /// First directory searched in apply-only mode.
    pub profile_dir: Option<PathBuf>,
    /// Where reports and ICC backups go.
    pub report_dir: Option<PathBuf>,
    /// Log file path.
    pub log_file: Option<PathBuf>,
    /// Rotation threshold in bytes.
    pub log_max_bytes: Option<u64>,
    /// Rotated backups kept.
    pub log_max_files: Option<usize>,
    /// Probe attempts per round.
    pub probe_retries: Option<u32>,
    /// Seconds between probe attempts.
    pub probe_delay_secs: Option<u64>,
    /// Try a spotread ambient reading before falling back to the clock.
    pub ambient_sensor: Option<bool>,
}

impl Config {
    /// Loads configuration from a file.
    pub fn from_file(path: impl AsRef<Path>) -> CalResult<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(CalError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Loads configuration from YAML text. Empty text is an empty config.
    pub fn from_yaml_str(yaml: &str) -> CalResult<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Loads `explicit` if given, else the first default location that exists.
    ///
    /// Returns the config and the file it came from.
    pub fn discover(explicit: Option<&Path>) -> CalResult<(Self, Option<PathBuf>)> {
        if let Some(path) = explicit {
            return Ok((Self::from_file(path)?, Some(path.to_path_buf())));
        }
        for path in Self::candidate_paths() {
            if path.is_file() {
                let config = Self::from_file(&path)?;
                return Ok((config, Some(path)));
            }
        }
        Ok((Self::default(), None))
    }

    /// Default lookup locations, in order.
    pub fn candidate_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(".autocal.yaml")];
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".autocal.yaml"));
        }
        if let Some(config) = dirs::config_dir() {
            paths.push(config.join("autocal").join("config.yaml"));
        }
        paths
    }

    /// Calibration overrides carried by the file.
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

    /// Tool invocation options, defaults filled in.
    pub fn tool_options(&self) -> ToolOptions {
        let d = ToolOptions::default();
        ToolOptions {
            display: self.display.unwrap_or(d.display),
            display_type: self.display_type.clone().unwrap_or(d.display_type),
            measure_quality: self.measure_quality.clone().unwrap_or(d.measure_quality),
            profile_quality: self.profile_quality.clone().unwrap_or(d.profile_quality),
            author: self.author.clone().unwrap_or(d.author),
        }
    }

    /// Log rotation policy, defaults filled in.
    pub fn rotation_policy(&self) -> RotationPolicy {
        let d = RotationPolicy::default();
        RotationPolicy {
            max_bytes: self.log_max_bytes.unwrap_or(d.max_bytes),
            max_files: self.log_max_files.unwrap_or(d.max_files),
        }
    }

    /// Log file path; the per-user data dir when unset.
    pub fn log_path(&self) -> PathBuf {
        self.log_file.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .map(|d| d.join("autocal").join(DEFAULT_LOG_NAME))
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_NAME))
        })
    }

    /// Output directory for new artifacts; the current dir when unset.
    pub fn output_dir(&self) -> PathBuf {
        self.output_dir.clone().unwrap_or_else(|| PathBuf::from("."))
    }

    /// Directory searched first for stored profiles.
    pub fn profile_dir(&self) -> PathBuf {
        self.profile_dir.clone().unwrap_or_else(|| self.output_dir())
    }

    /// Report directory; `~/Documents/Calibration_Reports` when unset.
    pub fn report_dir(&self) -> Option<PathBuf> {
        self.report_dir.clone().or_else(|| {
            dirs::document_dir().map(|d| d.join("Calibration_Reports"))
        })
    }

    /// Pause between probe attempts.
    pub fn probe_delay(&self) -> Duration {
        Duration::from_secs(self.probe_delay_secs.unwrap_or(2))
    }
}
