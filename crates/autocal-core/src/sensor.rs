//! Ambient illuminance readings through `spotread`.

use crate::{CommandLine, ProcessRunner};
use regex::Regex;
use std::sync::LazyLock;
use tracing::{debug, info, warn};

static AMBIENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Ambient\s*=\s*([\d.]+)\s*Lux").expect("valid regex"));

static RESULT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Result is XYZ:[^\n]*?,\s*([\d.]+)\s*Lux").expect("valid regex")
});

/// Extracts a lux value from spotread output.
pub fn parse_lux(output: &str) -> Option<f64> {
    [&*AMBIENT_RE, &*RESULT_RE]
        .into_iter()
        .find_map(|re| re.captures(output))
        .and_then(|caps| caps[1].parse().ok())
}

/// Takes one ambient reading; `None` when the tool fails or prints nothing usable.
pub fn read_ambient_lux(runner: &mut dyn ProcessRunner, cmd: &CommandLine) -> Option<f64> {
    debug!(command = %cmd, "reading ambient light");
    let out = match runner.run(cmd) {
        Ok(out) => out,
        Err(e) => {
            warn!(error = %e, "ambient reading unavailable");
            return None;
        }
    };
    match parse_lux(&out.stdout) {
        Some(lux) => {
            info!(lux, "measured ambient light");
            Some(lux)
        }
        None => {
            let head: String = out.stdout.chars().take(200).collect();
            debug!(code = out.code, output = %head, "no lux value in spotread output");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DryRunRunner, ProcessOutput};

    #[test]
    fn test_parse_ambient_line() {
        assert_eq!(parse_lux("Ambient = 45.3 Lux, CCT = 4100K"), Some(45.3));
        assert_eq!(parse_lux("Ambient=120Lux"), Some(120.0));
    }

    #[test]
    fn test_parse_result_line() {
        let out = "Result is XYZ: 1.2 3.4 5.6, D50 Lab: 10.0 1.0 2.0, 8.25 Lux\n";
        assert_eq!(parse_lux(out), Some(8.25));
    }

    #[test]
    fn test_parse_garbage() {
        assert_eq!(parse_lux("Instrument not found"), None);
        assert_eq!(parse_lux(""), None);
    }

    struct Fixed(ProcessOutput);

    impl ProcessRunner for Fixed {
        fn run(&mut self, _cmd: &CommandLine) -> std::io::Result<ProcessOutput> {
            Ok(self.0.clone())
        }
    }

    struct Stuck;

    impl ProcessRunner for Stuck {
        fn run(&mut self, cmd: &CommandLine) -> std::io::Result<ProcessOutput> {
            Err(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("{} did not finish", cmd.program),
            ))
        }
    }

    #[test]
    fn test_timed_out_reading_is_none() {
        let cmd = CommandLine::new("spotread").args(["-a", "-N"]);
        assert_eq!(read_ambient_lux(&mut Stuck, &cmd), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_blocked_tool_gives_up() {
        use std::time::{Duration, Instant};
        let cmd = CommandLine::new("sleep")
            .arg("5")
            .with_timeout(Duration::from_millis(200));
        let started = Instant::now();
        assert_eq!(read_ambient_lux(&mut crate::SystemRunner, &cmd), None);
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_read_ambient() {
        let cmd = CommandLine::new("spotread").args(["-a", "-N"]);
        let mut runner = Fixed(ProcessOutput::ok("Ambient = 300 Lux"));
        assert_eq!(read_ambient_lux(&mut runner, &cmd), Some(300.0));
        assert_eq!(read_ambient_lux(&mut DryRunRunner::default(), &cmd), None);
    }
}
