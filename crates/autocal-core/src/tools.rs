//! ArgyllCMS binary discovery.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Install locations checked after `PATH`.
const COMMON_DIRS: &[&str] = &[
    "/usr/local/bin",
    "/opt/homebrew/bin",
    "/Applications/DisplayCAL/DisplayCAL.app/Contents/MacOS",
    "/usr/bin",
    r"C:\Argyll_V3.1.0\bin",
    r"C:\Program Files\ArgyllCMS\bin",
];

/// Finds `name` on `PATH`, then in common ArgyllCMS install locations.
pub fn find_binary(name: &str) -> Option<PathBuf> {
    let file = executable_name(name);
    let path_dirs = env::var_os("PATH")
        .map(|p| env::split_paths(&p).collect::<Vec<_>>())
        .unwrap_or_default();

    path_dirs
        .into_iter()
        .chain(COMMON_DIRS.iter().map(PathBuf::from))
        .map(|dir| dir.join(&file))
        .find(|candidate| candidate.is_file())
}

fn executable_name(name: &str) -> String {
    if cfg!(windows) && Path::new(name).extension().is_none() {
        format!("{name}.exe")
    } else {
        name.to_string()
    }
}

/// Programs used for each calibration step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgyllTools {
    /// Display measurement and calibration.
    pub dispcal: String,
    /// ICC profile builder.
    pub colprof: String,
    /// Video LUT loader and profile installer.
    pub dispwin: String,
    /// Spot/ambient reader.
    pub spotread: String,
}

impl Default for ArgyllTools {
    fn default() -> Self {
        Self {
            dispcal: "dispcal".into(),
            colprof: "colprof".into(),
            dispwin: "dispwin".into(),
            spotread: "spotread".into(),
        }
    }
}

impl ArgyllTools {
    /// Resolves each tool to a full path where one can be found.
    ///
    /// Unresolved tools keep their bare name so the spawn error names them.
    pub fn locate() -> Self {
        let resolve = |name: &str| match find_binary(name) {
            Some(path) => {
                debug!(tool = name, path = %path.display(), "located tool");
                path.display().to_string()
            }
            None => {
                debug!(tool = name, "tool not found, using bare name");
                name.to_string()
            }
        };
        Self {
            dispcal: resolve("dispcal"),
            colprof: resolve("colprof"),
            dispwin: resolve("dispwin"),
            spotread: resolve("spotread"),
        }
    }

    /// Names of tools that could not be located.
    pub fn missing(&self) -> Vec<&str> {
        [&self.dispcal, &self.colprof, &self.dispwin]
            .into_iter()
            .filter(|t| !Path::new(t.as_str()).is_file() && find_binary(t).is_none())
            .map(String::as_str)
            .collect()
    }
}

/// Invocation options shared by every command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOptions {
    /// Display number passed as `-d<n>`.
    pub display: u32,
    /// Display technology letter passed as `-y<t>` (`l` = LCD).
    pub display_type: String,
    /// dispcal quality (`l`, `m`, `h`, `u`).
    pub measure_quality: String,
    /// colprof quality (`l`, `m`, `h`, `u`, `f`).
    pub profile_quality: String,
    /// Profile author recorded by colprof.
    pub author: String,
}

impl Default for ToolOptions {
    fn default() -> Self {
        Self {
            display: 1,
            display_type: "l".into(),
            measure_quality: "m".into(),
            profile_quality: "f".into(),
            author: "AutoCal".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_binary() {
        assert!(find_binary("autocal-definitely-missing-tool").is_none());
    }

    #[test]
    fn test_defaults() {
        let opts = ToolOptions::default();
        assert_eq!(opts.display, 1);
        assert_eq!(opts.author, "AutoCal");
        assert_eq!(ArgyllTools::default().dispcal, "dispcal");
    }
}
