//! Colorimeter presence detection.
//!
//! The OS USB listing is queried once per attempt and matched
//! case-insensitively against known colorimeter names. Absence is a normal
//! `false`, never an error; a failed query just counts as a miss.

use crate::{CommandLine, ProcessRunner};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Substrings identifying supported colorimeters.
pub const DEFAULT_MARKERS: &[&str] = &["spyder", "color munki", "i1 display", "datacolor"];

/// How and how often to look for the colorimeter.
#[derive(Debug, Clone)]
pub struct DeviceProbe {
    command: CommandLine,
    markers: Vec<String>,
    delay: Duration,
}

impl Default for DeviceProbe {
    fn default() -> Self {
        Self::new(default_probe_command())
    }
}

impl DeviceProbe {
    /// Probe running `command` and matching [`DEFAULT_MARKERS`].
    pub fn new(command: CommandLine) -> Self {
        Self {
            command,
            markers: DEFAULT_MARKERS.iter().map(|m| m.to_string()).collect(),
            delay: Duration::from_secs(2),
        }
    }

    /// Pause between attempts.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Replaces the identifying substrings.
    pub fn with_markers<I, S>(mut self, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.markers = markers.into_iter().map(|m| m.into().to_lowercase()).collect();
        self
    }

    /// Command used to enumerate devices.
    pub fn command(&self) -> &CommandLine {
        &self.command
    }

    /// True when `listing` mentions a known colorimeter.
    pub fn matches(&self, listing: &str) -> bool {
        let lower = listing.to_lowercase();
        self.markers.iter().any(|m| lower.contains(m.as_str()))
    }

    /// Queries up to `retries` times (at least once), stopping at the first hit.
    pub fn is_device_connected(&self, runner: &mut dyn ProcessRunner, retries: u32) -> bool {
        let attempts = retries.max(1);
        for attempt in 1..=attempts {
            match runner.run(&self.command) {
                Ok(out) if self.matches(&out.combined()) => {
                    info!(attempt, "colorimeter detected");
                    return true;
                }
                Ok(_) => debug!(attempt, attempts, "colorimeter not listed"),
                Err(e) => {
                    warn!(attempt, error = %e, command = %self.command, "device query failed")
                }
            }
            if attempt < attempts && !self.delay.is_zero() {
                thread::sleep(self.delay);
            }
        }
        false
    }
}

/// USB listing command for the current platform.
///
/// Platforms without a standard listing tool fall back to dispcal's usage
/// text, which names attached instruments.
pub fn default_probe_command() -> CommandLine {
    if cfg!(target_os = "macos") {
        CommandLine::new("system_profiler").arg("SPUSBDataType")
    } else if cfg!(target_os = "linux") {
        CommandLine::new("lsusb")
    } else {
        CommandLine::new("dispcal").arg("-?")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProcessOutput;
    use std::io;

    struct Scripted {
        replies: Vec<io::Result<ProcessOutput>>,
        calls: usize,
    }

    impl ProcessRunner for Scripted {
        fn run(&mut self, _cmd: &CommandLine) -> io::Result<ProcessOutput> {
            self.calls += 1;
            if self.replies.is_empty() {
                return Ok(ProcessOutput::ok(""));
            }
            self.replies.remove(0)
        }
    }

    fn probe() -> DeviceProbe {
        DeviceProbe::new(CommandLine::new("lsusb")).with_delay(Duration::ZERO)
    }

    #[test]
    fn test_matches_case_insensitive() {
        let p = probe();
        assert!(p.matches("Bus 001 Device 004: ID 085c:0a00 Datacolor SPYDER5"));
        assert!(p.matches("X-Rite Color Munki"));
        assert!(!p.matches("Logitech USB Receiver"));
    }

    #[test]
    fn test_retries_until_found() {
        let mut runner = Scripted {
            replies: vec![
                Ok(ProcessOutput::ok("keyboard")),
                Err(io::Error::new(io::ErrorKind::NotFound, "lsusb")),
                Ok(ProcessOutput::ok("Spyder5")),
            ],
            calls: 0,
        };
        assert!(probe().is_device_connected(&mut runner, 3));
        assert_eq!(runner.calls, 3);
    }

    #[test]
    fn test_absent_is_false() {
        let mut runner = Scripted { replies: Vec::new(), calls: 0 };
        assert!(!probe().is_device_connected(&mut runner, 4));
        assert_eq!(runner.calls, 4);
    }

    #[test]
    fn test_zero_retries_still_queries_once() {
        let mut runner = Scripted { replies: Vec::new(), calls: 0 };
        assert!(!probe().is_device_connected(&mut runner, 0));
        assert_eq!(runner.calls, 1);
    }

    #[test]
    fn test_custom_markers() {
        let p = probe().with_markers(["ColorChecker"]);
        assert!(p.matches("calibrite colorchecker display"));
        assert!(!p.matches("spyder"));
    }
}
