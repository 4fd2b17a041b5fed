// crates/fleet-edge-core/src/runtime/logging.rs
// ============================================================================
// Module: Fleet Edge Agent Log
// Description: File-backed line log for agent cycles.
// Purpose: Persist a human-readable record of cycle decisions and failures.
// Dependencies: std, time
// ============================================================================

//! ## Overview
//! The agent log writes `"%Y-%m-%d %H:%M:%S LEVEL message"` lines (UTC) to
//! `edge-agent.log` in the configured log directory. Writes are serialized
//! through a mutex and are best-effort: a failed log write never aborts the
//! cycle that produced it. The file lives in the log directory, so remote
//! log capture naturally includes it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use time::OffsetDateTime;
use time::macros::format_description;

// ============================================================================
// SECTION: Log Levels
// ============================================================================

/// Severity of one log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Diagnostic detail.
    Debug,
    /// Routine cycle events.
    Info,
    /// Degraded but recoverable conditions.
    Warning,
    /// Failed operations.
    Error,
}

impl LogLevel {
    /// Returns the stable line label for the level.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }
}

// ============================================================================
// SECTION: Agent Log
// ============================================================================

/// Append-only file log for agent cycles.
///
/// # Invariants
/// - Writes are serialized through the internal mutex.
/// - Write failures are swallowed; logging never fails a cycle.
pub struct AgentLog {
    /// Log file handle guarded for cross-thread use.
    writer: Mutex<File>,
}

impl AgentLog {
    /// Opens (or creates) the log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an [`io::Error`] when the file cannot be opened.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: Mutex::new(file),
        })
    }

    /// Writes one line at the given level, best-effort.
    pub fn log(&self, level: LogLevel, message: &str) {
        let _unused = self.write_line(level, message);
    }

    /// Writes a DEBUG line.
    pub fn debug(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Debug, message.as_ref());
    }

    /// Writes an INFO line.
    pub fn info(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Info, message.as_ref());
    }

    /// Writes a WARNING line.
    pub fn warning(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Warning, message.as_ref());
    }

    /// Writes an ERROR line.
    pub fn error(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Error, message.as_ref());
    }

    /// Formats and appends one line, surfacing the underlying failure.
    fn write_line(&self, level: LogLevel, message: &str) -> io::Result<()> {
        let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
        let stamp = OffsetDateTime::now_utc()
            .format(&format)
            .map_err(|err| io::Error::other(err.to_string()))?;
        let mut guard = self
            .writer
            .lock()
            .map_err(|_| io::Error::other("log writer mutex poisoned"))?;
        writeln!(guard, "{stamp} {} {message}", level.as_str())
    }
}
