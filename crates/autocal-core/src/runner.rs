//! External process execution.
//!
//! Everything that touches ArgyllCMS goes through [`ProcessRunner`]: a command
//! line goes in, an exit code and captured output come out. The orchestrator
//! never inspects output for correctness, only the exit code.

use std::fmt;
use std::io::{self, Read, Write};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Interval between exit checks while a deadline is pending.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// A program invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    /// Program name or path.
    pub program: String,
    /// Arguments, not including the program.
    pub args: Vec<String>,
    /// Inherit the terminal instead of capturing output.
    pub interactive: bool,
    /// Text fed to stdin when captured.
    pub stdin: Option<String>,
    /// Kill the process when it runs longer than this. Captured runs only.
    pub timeout: Option<Duration>,
}

impl CommandLine {
    /// Captured invocation of `program` with no arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            interactive: false,
            stdin: None,
            timeout: None,
        }
    }

    /// Appends one argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Marks the command as needing the operator's terminal.
    pub fn interactive(mut self) -> Self {
        self.interactive = true;
        self
    }

    /// Sets text written to stdin.
    pub fn with_stdin(mut self, input: impl Into<String>) -> Self {
        self.stdin = Some(input.into());
        self
    }

    /// Sets a wall-clock limit for a captured run.
    pub fn with_timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }

    /// Program followed by arguments.
    pub fn argv(&self) -> Vec<&str> {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect()
    }

    /// True when `needle` appears verbatim among the arguments.
    pub fn contains(&self, needle: &str) -> bool {
        self.args.iter().any(|a| a == needle)
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " \"{arg}\"")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// Exit status plus whatever was captured.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code; -1 when the process was killed by a signal.
    pub code: i32,
    /// Captured stdout (empty for interactive runs).
    pub stdout: String,
    /// Captured stderr (empty for interactive runs).
    pub stderr: String,
}

impl ProcessOutput {
    /// Successful run with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Failed run with the given exit code.
    pub fn failed(code: i32) -> Self {
        Self {
            code,
            ..Self::default()
        }
    }

    /// Exit code 0.
    pub fn success(&self) -> bool {
        self.code == 0
    }

    /// Stdout followed by stderr.
    pub fn combined(&self) -> String {
        format!("{}{}", self.stdout, self.stderr)
    }
}

/// Runs external commands synchronously.
pub trait ProcessRunner {
    /// Runs `cmd` to completion.
    ///
    /// # Errors
    ///
    /// Returns the I/O error when the process cannot be started, and an
    /// [`io::ErrorKind::TimedOut`] error when it outlives
    /// [`CommandLine::timeout`].
    fn run(&mut self, cmd: &CommandLine) -> std::io::Result<ProcessOutput>;
}

/// Runs commands with [`std::process::Command`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(&mut self, cmd: &CommandLine) -> std::io::Result<ProcessOutput> {
        trace!(command = %cmd, interactive = cmd.interactive, "SystemRunner::run");
        let mut command = Command::new(&cmd.program);
        command.args(&cmd.args);

        if cmd.interactive {
            let status = command.status()?;
            return Ok(ProcessOutput {
                code: status.code().unwrap_or(-1),
                ..ProcessOutput::default()
            });
        }

        command
            .stdin(if cmd.stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = command.spawn()?;
        if let (Some(input), Some(mut pipe)) = (cmd.stdin.as_deref(), child.stdin.take()) {
            // A tool that exits before reading its input is not an error.
            let _ = pipe.write_all(input.as_bytes());
        }
        let result = match cmd.timeout {
            None => {
                let output = child.wait_with_output()?;
                ProcessOutput {
                    code: output.status.code().unwrap_or(-1),
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                }
            }
            Some(limit) => wait_with_deadline(child, cmd, limit)?,
        };
        debug!(program = %cmd.program, code = result.code, "process exited");
        Ok(result)
    }
}

/// Drains a pipe on its own thread so a chatty child cannot block on it.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn wait_with_deadline(
    mut child: Child,
    cmd: &CommandLine,
    limit: Duration,
) -> io::Result<ProcessOutput> {
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());
    let deadline = Instant::now() + limit;

    let status = loop {
        if let Some(status) = child.try_wait()? {
            break status;
        }
        if Instant::now() >= deadline {
            warn!(program = %cmd.program, ?limit, "killing process after timeout");
            // The child may exit between the check and the kill.
            let _ = child.kill();
            let _ = child.wait();
            return Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("{} did not finish within {limit:?}", cmd.program),
            ));
        }
        thread::sleep(POLL_INTERVAL);
    };

    Ok(ProcessOutput {
        code: status.code().unwrap_or(-1),
        stdout: stdout.join().unwrap_or_default(),
        stderr: stderr.join().unwrap_or_default(),
    })
}

/// Records commands without running them; every command "succeeds".
#[derive(Debug, Default, Clone)]
pub struct DryRunRunner {
    /// Commands seen so far, in order.
    pub commands: Vec<CommandLine>,
}

impl ProcessRunner for DryRunRunner {
    fn run(&mut self, cmd: &CommandLine) -> std::io::Result<ProcessOutput> {
        println!("[dry-run] {cmd}");
        self.commands.push(cmd.clone());
        Ok(ProcessOutput::ok(""))
    }
}
