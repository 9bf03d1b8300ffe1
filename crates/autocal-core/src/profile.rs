//! Profile artifact naming and discovery.
//!
//! A run produces `<base>_<YYYYMMDD_HHMMSS>.cal` and `.icc` next to each
//! other. Publishing copies the ICC to the stable `<base>.icc`, which is what
//! apply-only mode looks for.

use crate::{LightBucket, default_profile_name};
use chrono::{Local, NaiveDateTime, Timelike};
use std::fmt;
use std::path::{Path, PathBuf};

/// Timestamp suffix format for artifacts.
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Local wall-clock instant a run started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp(NaiveDateTime);

impl Timestamp {
    /// Current local time.
    pub fn now() -> Self {
        Self(Local::now().naive_local())
    }

    /// Wraps an explicit time.
    pub fn from_naive(time: NaiveDateTime) -> Self {
        Self(time)
    }

    /// `YYYYMMDD_HHMMSS`.
    pub fn stamp(&self) -> String {
        self.0.format(TIMESTAMP_FORMAT).to_string()
    }

    /// `YYYY-MM-DD HH:MM:SS`, for humans.
    pub fn human(&self) -> String {
        self.0.format("%Y-%m-%d %H:%M:%S").to_string()
    }

    /// Hour of day, 0-23.
    pub fn hour(&self) -> u32 {
        self.0.hour()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.stamp())
    }
}

/// Files belonging to one calibration run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileArtifact {
    dir: PathBuf,
    base_name: String,
    timestamp: Timestamp,
}

impl ProfileArtifact {
    /// Artifact for `base_name` created at `timestamp` inside `dir`.
    pub fn new(
        dir: impl Into<PathBuf>,
        base_name: impl Into<String>,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            dir: dir.into(),
            base_name: base_name.into(),
            timestamp,
        }
    }

    /// Profile base name without timestamp.
    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    /// Run timestamp.
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// Output directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `<base>_<timestamp>`.
    pub fn stem(&self) -> String {
        format!("{}_{}", self.base_name, self.timestamp.stamp())
    }

    /// Path without extension; dispcal appends `.cal` itself.
    pub fn base_path(&self) -> PathBuf {
        self.dir.join(self.stem())
    }

    /// Calibration curves written by the measurement step.
    pub fn cal_path(&self) -> PathBuf {
        self.with_suffix(".cal")
    }

    /// ICC profile written by the profiling step.
    pub fn icc_path(&self) -> PathBuf {
        self.with_suffix(".icc")
    }

    /// Stable `<base>.icc` used by apply-only mode.
    pub fn published_path(&self) -> PathBuf {
        self.dir.join(format!("{}.icc", self.base_name))
    }

    /// `Report_<base>_<timestamp>.txt`.
    pub fn report_file_name(&self) -> String {
        format!("Report_{}.txt", self.stem())
    }

    // Appending keeps dots inside user-supplied names intact.
    fn with_suffix(&self, suffix: &str) -> PathBuf {
        self.dir.join(format!("{}{}", self.stem(), suffix))
    }
}

/// Searches a list of directories for stored profiles.
#[derive(Debug, Clone, Default)]
pub struct ProfileLocator {
    dirs: Vec<PathBuf>,
}

impl ProfileLocator {
    /// Searches only `dirs`, in order.
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self { dirs }
    }

    /// `profile_dir` first, then the platform's per-user and system ICC dirs.
    pub fn with_system_dirs(profile_dir: impl Into<PathBuf>) -> Self {
        let mut dirs = vec![profile_dir.into()];
        dirs.extend(system_profile_dirs());
        Self { dirs }
    }

    /// Directories searched, in order.
    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// First existing `<dir>/<file_name>`.
    pub fn find(&self, file_name: &str) -> Option<PathBuf> {
        self.dirs
            .iter()
            .map(|d| d.join(file_name))
            .find(|p| p.is_file())
    }

    /// Stored profile for `bucket`, if any.
    pub fn find_for_bucket(&self, bucket: LightBucket) -> Option<PathBuf> {
        self.find(&published_file_name(bucket))
    }
}

/// `<default base>.icc` for a bucket.
pub fn published_file_name(bucket: LightBucket) -> String {
    format!("{}.icc", default_profile_name(bucket))
}

fn system_profile_dirs() -> Vec<PathBuf> {
    let mut out = Vec::new();
    if cfg!(target_os = "macos") {
        if let Some(home) = dirs::home_dir() {
            out.push(home.join("Library/ColorSync/Profiles"));
        }
        out.push(PathBuf::from("/Library/ColorSync/Profiles"));
    } else if cfg!(target_os = "windows") {
        out.push(PathBuf::from(r"C:\Windows\System32\spool\drivers\color"));
    } else {
        if let Some(data) = dirs::data_dir() {
            out.push(data.join("icc"));
        }
        out.push(PathBuf::from("/usr/share/color/icc"));
    }
    out
}
