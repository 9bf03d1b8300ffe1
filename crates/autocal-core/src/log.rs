//! Run logging.
//!
//! Two pieces live here:
//!
//! - [`RunLog`], the audit sink the orchestrator writes its transitions to.
//!   It is injected, so tests can capture a run with [`MemoryLog`] while the
//!   binary forwards to `tracing` with [`TracingLog`].
//! - [`LogManager`], a size-rotated append-only log file. It also implements
//!   [`std::io::Write`] so a `tracing` fmt layer can write through it.
//!
//! Rotation happens before a write when the live file exceeds
//! [`RotationPolicy::max_bytes`]. Backups are `<name>.old`, `<name>.old.2`, ...
//! up to [`RotationPolicy::max_files`]; the oldest is dropped. A failed
//! rotation is recorded in the log itself and writing carries on unrotated.

use chrono::Local;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// Default rotation threshold: 10 MiB.
pub const DEFAULT_MAX_BYTES: u64 = 10 * 1024 * 1024;

/// Severity of an audit line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Diagnostic detail.
    Debug,
    /// Normal progress.
    Info,
    /// Recoverable problem.
    Warn,
    /// Fatal problem for the current run.
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warn => "WARNING",
            Self::Error => "ERROR",
        })
    }
}

/// Destination for a run's audit trail.
pub trait RunLog {
    /// Records one line.
    fn record(&self, level: LogLevel, message: &str);

    /// Records at [`LogLevel::Debug`].
    fn debug(&self, message: &str) {
        self.record(LogLevel::Debug, message);
    }

    /// Records at [`LogLevel::Info`].
    fn info(&self, message: &str) {
        self.record(LogLevel::Info, message);
    }

    /// Records at [`LogLevel::Warn`].
    fn warn(&self, message: &str) {
        self.record(LogLevel::Warn, message);
    }

    /// Records at [`LogLevel::Error`].
    fn error(&self, message: &str) {
        self.record(LogLevel::Error, message);
    }
}

/// Forwards audit lines to `tracing` under the `autocal::audit` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLog;

impl RunLog for TracingLog {
    fn record(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Debug => tracing::debug!(target: "autocal::audit", "{message}"),
            LogLevel::Info => tracing::info!(target: "autocal::audit", "{message}"),
            LogLevel::Warn => tracing::warn!(target: "autocal::audit", "{message}"),
            LogLevel::Error => tracing::error!(target: "autocal::audit", "{message}"),
        }
    }
}

/// Keeps audit lines in memory.
#[derive(Debug, Default)]
pub struct MemoryLog {
    lines: Mutex<Vec<(LogLevel, String)>>,
}

impl MemoryLog {
    /// Empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every line recorded so far.
    pub fn lines(&self) -> Vec<(LogLevel, String)> {
        self.lines.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// True when any line at `level` contains `needle`.
    pub fn contains(&self, level: LogLevel, needle: &str) -> bool {
        self.lines()
            .iter()
            .any(|(l, m)| *l == level && m.contains(needle))
    }

    /// True when any line at any level contains `needle`.
    pub fn mentions(&self, needle: &str) -> bool {
        self.lines().iter().any(|(_, m)| m.contains(needle))
    }
}

impl RunLog for MemoryLog {
    fn record(&self, level: LogLevel, message: &str) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((level, message.to_string()));
    }
}

/// When and how far to rotate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationPolicy {
    /// Rotate once the live file is larger than this.
    pub max_bytes: u64,
    /// Backups kept; 0 discards the old contents outright.
    pub max_files: usize,
}

impl Default for RotationPolicy {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_BYTES,
            max_files: 1,
        }
    }
}

struct Inner {
    path: PathBuf,
    policy: RotationPolicy,
    file: Option<File>,
    size: u64,
    rotation_failed: bool,
}

/// Size-rotated, append-only log file. Clones share the same file.
#[derive(Clone)]
pub struct LogManager {
    inner: Arc<Mutex<Inner>>,
}

impl fmt::Debug for LogManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("LogManager")
            .field("path", &inner.path)
            .field("policy", &inner.policy)
            .field("size", &inner.size)
            .finish()
    }
}

impl LogManager {
    /// Log at `path`. Nothing is touched on disk until the first write.
    pub fn new(path: impl Into<PathBuf>, policy: RotationPolicy) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                path: path.into(),
                policy,
                file: None,
                size: 0,
                rotation_failed: false,
            })),
        }
    }

    /// Live log path.
    pub fn path(&self) -> PathBuf {
        self.lock().path.clone()
    }

    /// Path of backup `index` (1-based): `<name>.old`, `<name>.old.2`, ...
    pub fn backup_path(&self, index: usize) -> PathBuf {
        backup_path(&self.lock().path, index)
    }

    /// Appends `line` prefixed with the local time.
    pub fn append(&self, line: &str) -> io::Result<()> {
        let stamped = format!("{} - {}\n", now(), line.trim_end_matches('\n'));
        self.lock().write_all(stamped.as_bytes())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RunLog for LogManager {
    fn record(&self, level: LogLevel, message: &str) {
        // An unwritable log must not abort a calibration.
        let _ = self.append(&format!("{level} - {message}"));
    }
}

impl Write for LogManager {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.lock().write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.lock().file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

impl Inner {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.ensure_open()?;

        if self.size > self.policy.max_bytes && !self.rotation_failed {
            if let Err(e) = self.rotate() {
                self.rotation_failed = true;
                self.ensure_open()?;
                let note = format!("{} - WARNING - log rotation failed: {e}\n", now());
                self.write_raw(note.as_bytes())?;
            }
        }

        self.write_raw(buf)
    }

    fn write_raw(&mut self, buf: &[u8]) -> io::Result<()> {
        self.ensure_open()?;
        if let Some(file) = self.file.as_mut() {
            file.write_all(buf)?;
            self.size += buf.len() as u64;
        }
        Ok(())
    }

    fn ensure_open(&mut self) -> io::Result<()> {
        if self.file.is_some() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        self.size = file.metadata()?.len();
        self.file = Some(file);
        Ok(())
    }

    fn rotate(&mut self) -> io::Result<()> {
        // Windows refuses to rename an open file.
        self.file = None;

        let keep = self.policy.max_files;
        if keep == 0 {
            fs::remove_file(&self.path)?;
        } else {
            remove_if_exists(&backup_path(&self.path, keep))?;
            for index in (1..keep).rev() {
                let from = backup_path(&self.path, index);
                if from.exists() {
                    fs::rename(&from, backup_path(&self.path, index + 1))?;
                }
            }
            fs::rename(&self.path, backup_path(&self.path, 1))?;
        }

        self.size = 0;
        self.ensure_open()
    }
}

fn backup_path(path: &Path, index: usize) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".old");
    if index > 1 {
        name.push(format!(".{index}"));
    }
    PathBuf::from(name)
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

fn now() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small(max_files: usize) -> RotationPolicy {
        RotationPolicy { max_bytes: 64, max_files }
    }

    #[test]
    fn test_append_is_line_oriented() {
        let dir = tempfile::tempdir().unwrap();
        let log = LogManager::new(dir.path().join("cal.log"), RotationPolicy::default());
        log.append("first").unwrap();
        log.append("second\n").unwrap();
        let text = fs::read_to_string(log.path()).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(" - first"));
        assert!(lines[1].ends_with(" - second"));
    }

    #[test]
    fn test_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/logs/cal.log");
        let log = LogManager::new(path, RotationPolicy::default());
        log.info("hello");
        assert!(log.path().is_file());
    }

    #[test]
    fn test_rotates_oversized_file_on_next_append() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calibration.log");
        fs::write(&path, vec![b'x'; (DEFAULT_MAX_BYTES + 1) as usize]).unwrap();

        let log = LogManager::new(&path, RotationPolicy::default());
        log.append("fresh line").unwrap();

        let old = dir.path().join("calibration.log.old");
        assert_eq!(log.backup_path(1), old);
        assert_eq!(fs::metadata(&old).unwrap().len(), DEFAULT_MAX_BYTES + 1);
        let live = fs::read_to_string(&path).unwrap();
        assert!(live.ends_with(" - fresh line\n"));
        assert_eq!(live.lines().count(), 1);
    }

    #[test]
    fn test_second_rotation_overwrites_old() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cal.log");
        let log = LogManager::new(&path, small(1));

        fs::write(&path, vec![b'a'; 100]).unwrap();
        log.append("one").unwrap();
        assert!(fs::read(log.backup_path(1)).unwrap().iter().all(|&b| b == b'a'));

        log.append(&"b".repeat(100)).unwrap();
        log.append("two").unwrap();
        let old = fs::read_to_string(log.backup_path(1)).unwrap();
        assert!(old.contains("one"));
        assert!(!old.contains('a'.to_string().repeat(100).as_str()));
        assert!(!log.backup_path(2).exists());
        assert!(fs::read_to_string(&path).unwrap().contains("two"));
    }

    #[test]
    fn test_keeps_at_most_max_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cal.log");
        let log = LogManager::new(&path, small(3));

        for round in 0..6 {
            log.append(&format!("round {round} {}", "x".repeat(80))).unwrap();
        }
        assert!(log.backup_path(1).exists());
        assert!(log.backup_path(2).exists());
        assert!(log.backup_path(3).exists());
        assert!(!log.backup_path(4).exists());
        assert!(fs::read_to_string(log.backup_path(1)).unwrap().contains("round 4"));
        assert!(fs::read_to_string(log.backup_path(3)).unwrap().contains("round 2"));
    }

    #[test]
    fn test_failed_rotation_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cal.log");
        fs::write(&path, vec![b'r'; 100]).unwrap();
        let log = LogManager::new(&path, small(1));

        let blocker = log.backup_path(1);
        fs::create_dir(&blocker).unwrap();
        fs::write(blocker.join("keep"), b"occupied").unwrap();

        assert!(log.append("after").is_ok());
        assert!(log.append("later").is_ok());

        let live = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = live.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with(&"r".repeat(100)));
        assert!(lines[0].contains("WARNING - log rotation failed"));
        assert!(lines[1].ends_with(" - after"));
        assert!(lines[2].ends_with(" - later"));
        assert_eq!(live.matches("log rotation failed").count(), 1);
        assert!(blocker.join("keep").exists());
    }

    #[test]
    fn test_zero_backups_discards() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cal.log");
        fs::write(&path, vec![b'z'; 100]).unwrap();
        let log = LogManager::new(&path, small(0));
        log.append("kept").unwrap();
        assert!(!log.backup_path(1).exists());
        assert!(!fs::read_to_string(&path).unwrap().contains('z'));
    }

    #[test]
    fn test_write_impl_goes_through_rotation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cal.log");
        fs::write(&path, vec![b'q'; 100]).unwrap();
        let mut log = LogManager::new(&path, small(1));
        log.write_all(b"event\n").unwrap();
        log.flush().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "event\n");
    }

    #[test]
    fn test_memory_log() {
        let log = MemoryLog::new();
        log.warn("colorimeter not detected");
        log.info("starting");
        assert!(log.contains(LogLevel::Warn, "not detected"));
        assert!(!log.contains(LogLevel::Info, "not detected"));
        assert!(log.mentions("starting"));
        assert_eq!(log.lines().len(), 2);
    }
}
