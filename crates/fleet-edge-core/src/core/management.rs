// crates/fleet-edge-core/src/core/management.rs
// ============================================================================
// Module: Fleet Edge Remote Management
// Description: Inventory/diagnostics collection and remote command dispatch.
// Purpose: Answer backend commands with host facts and log captures.
// Dependencies: serde, serde_json, sysinfo
// ============================================================================

//! ## Overview
//! Remote management collects host facts through `sysinfo` and dispatches
//! named backend commands through a handler map built at construction.
//! Dispatch never raises: unknown names yield an `unknown-command` status
//! and per-command failures yield a same-shape result carrying the error
//! description. Results preserve input order.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use sysinfo::Disks;
use sysinfo::System;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Command name for log capture.
pub const CMD_CAPTURE_LOGS: &str = "capture_logs";
/// Command name for a diagnostics run.
pub const CMD_RUN_DIAGNOSTIC: &str = "run_diagnostic";
/// Command name for an inventory fetch.
pub const CMD_FETCH_INVENTORY: &str = "fetch_inventory";
/// Status reported for unrecognized command names.
pub const STATUS_UNKNOWN_COMMAND: &str = "unknown-command";
/// Default line limit for `capture_logs` when the command omits one.
const DEFAULT_CAPTURE_LINES: i64 = 200;

// ============================================================================
// SECTION: Command Types
// ============================================================================

/// A remote command as fetched from the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRequest {
    /// Command name dispatched against the handler map.
    pub command: String,
    /// Command parameters; an empty object when omitted.
    #[serde(default = "empty_parameters")]
    pub parameters: Value,
}

/// Returns the default empty parameter object.
fn empty_parameters() -> Value {
    Value::Object(Map::new())
}

/// Result of one dispatched command.
///
/// # Invariants
/// - Exactly the populated fields appear on the wire; absent fields are
///   omitted, so every result serializes as the same shape of object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResult {
    /// Echoed command name.
    pub command: String,
    /// Captured log tails, for `capture_logs`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logs: Option<BTreeMap<String, Vec<String>>>,
    /// Diagnostics document, for `run_diagnostic`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<Value>,
    /// Inventory document, for `fetch_inventory`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inventory: Option<Value>,
    /// Dispatch status, set for unrecognized commands.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Error description when the handler failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommandResult {
    /// Creates a result carrying only the echoed command name.
    #[must_use]
    fn named(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            logs: None,
            diagnostics: None,
            inventory: None,
            status: None,
            error: None,
        }
    }
}

// ============================================================================
// SECTION: Reports
// ============================================================================

/// Host inventory facts posted to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryReport {
    /// Host name as reported by the OS.
    pub hostname: String,
    /// OS name and version.
    pub platform: String,
    /// CPU architecture label.
    pub architecture: String,
    /// Number of logical CPUs.
    pub cpu_count: usize,
    /// Total memory in MiB; absent when the OS mechanism is unavailable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_mb: Option<u64>,
    /// Kernel release string.
    pub kernel_version: String,
    /// Collection time in wall-clock seconds.
    pub timestamp: f64,
}

/// One sampled process in a diagnostics report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessSample {
    /// Process identifier.
    pub pid: u32,
    /// Process command name.
    pub command: String,
    /// CPU usage in percent.
    pub cpu: f32,
    /// Resident memory in bytes.
    pub memory: u64,
}

/// Filesystem usage for the log directory's volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskUsage {
    /// Total volume size in bytes; zero when unavailable.
    pub total_bytes: u64,
    /// Free space in bytes; zero when unavailable.
    pub free_bytes: u64,
}

/// Diagnostics document posted to the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticsReport {
    /// Sampled running processes.
    pub processes: Vec<ProcessSample>,
    /// Usage of the volume holding the log directory.
    pub disk_usage: DiskUsage,
    /// Log tails keyed by filename.
    pub logs: BTreeMap<String, Vec<String>>,
    /// Collection time in wall-clock seconds.
    pub timestamp: f64,
}

// ============================================================================
// SECTION: Remote Management
// ============================================================================

/// Command handler dispatched by name.
type CommandHandler = fn(&RemoteManagement, &Value, f64) -> Result<CommandResult, String>;

/// Collects host facts and dispatches named backend commands.
pub struct RemoteManagement {
    /// Directory scanned for `*.log` files.
    log_directory: PathBuf,
    /// Lines captured per log file in diagnostics runs.
    diag_log_lines: usize,
    /// Handler map built at construction; unknown names fall through to the
    /// `unknown-command` result.
    handlers: BTreeMap<&'static str, CommandHandler>,
}

impl RemoteManagement {
    /// Creates a management surface over the given log directory.
    #[must_use]
    pub fn new(log_directory: impl Into<PathBuf>, diag_log_lines: usize) -> Self {
        let mut handlers: BTreeMap<&'static str, CommandHandler> = BTreeMap::new();
        handlers.insert(CMD_CAPTURE_LOGS, Self::cmd_capture_logs);
        handlers.insert(CMD_RUN_DIAGNOSTIC, Self::cmd_run_diagnostic);
        handlers.insert(CMD_FETCH_INVENTORY, Self::cmd_fetch_inventory);
        Self {
            log_directory: log_directory.into(),
            diag_log_lines,
            handlers,
        }
    }

    /// Collects host inventory facts.
    #[must_use]
    pub fn collect_inventory(&self, now: f64) -> InventoryReport {
        let mut system = System::new_all();
        system.refresh_all();
        let os_name = System::name().unwrap_or_else(|| "unknown".to_string());
        let os_version = System::os_version().unwrap_or_default();
        let memory_bytes = system.total_memory();
        InventoryReport {
            hostname: System::host_name().unwrap_or_else(|| "unknown".to_string()),
            platform: format!("{os_name} {os_version}").trim_end().to_string(),
            architecture: System::cpu_arch()
                .unwrap_or_else(|| std::env::consts::ARCH.to_string()),
            cpu_count: system.cpus().len(),
            memory_mb: if memory_bytes == 0 {
                None
            } else {
                Some(memory_bytes / (1024 * 1024))
            },
            kernel_version: System::kernel_version().unwrap_or_else(|| "unknown".to_string()),
            timestamp: now,
        }
    }

    /// Collects a diagnostics document: processes, disk usage, and log tails.
    ///
    /// # Errors
    ///
    /// Returns an [`io::Error`] when a log file cannot be read.
    pub fn collect_diagnostics(&self, now: f64) -> io::Result<DiagnosticsReport> {
        let mut system = System::new_all();
        system.refresh_all();
        let mut processes: Vec<ProcessSample> = system
            .processes()
            .iter()
            .map(|(pid, process)| ProcessSample {
                pid: pid.as_u32(),
                command: process.name().to_string(),
                cpu: process.cpu_usage(),
                memory: process.memory(),
            })
            .collect();
        processes.sort_by_key(|sample| sample.pid);
        Ok(DiagnosticsReport {
            processes,
            disk_usage: self.disk_usage(),
            logs: self.capture_logs(self.diag_log_lines)?,
            timestamp: now,
        })
    }

    /// Returns the last `limit` lines of every `*.log` file in the log
    /// directory, keyed by filename and sorted by name. An absent directory
    /// yields an empty map; a zero limit yields empty line lists.
    ///
    /// # Errors
    ///
    /// Returns an [`io::Error`] when the directory or a log file cannot be
    /// read.
    pub fn capture_logs(&self, limit: usize) -> io::Result<BTreeMap<String, Vec<String>>> {
        let mut captured = BTreeMap::new();
        if !self.log_directory.exists() {
            return Ok(captured);
        }
        let mut log_files: Vec<PathBuf> = fs::read_dir(&self.log_directory)?
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "log"))
            .collect();
        log_files.sort();
        for path in log_files {
            let Some(name) = path.file_name().map(|name| name.to_string_lossy().into_owned())
            else {
                continue;
            };
            captured.insert(name, tail_lines(&path, limit)?);
        }
        Ok(captured)
    }

    /// Dispatches commands in input order. Never raises; unknown names and
    /// handler failures become same-shape results.
    #[must_use]
    pub fn execute_commands(&self, commands: &[CommandRequest], now: f64) -> Vec<CommandResult> {
        commands
            .iter()
            .map(|request| match self.handlers.get(request.command.as_str()) {
                Some(handler) => {
                    handler(self, &request.parameters, now).unwrap_or_else(|description| {
                        let mut result = CommandResult::named(&request.command);
                        result.error = Some(description);
                        result
                    })
                }
                None => {
                    let mut result = CommandResult::named(&request.command);
                    result.status = Some(STATUS_UNKNOWN_COMMAND.to_string());
                    result
                }
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Command handlers
    // ------------------------------------------------------------------

    /// Handles `capture_logs`: tails each log file up to the requested limit.
    fn cmd_capture_logs(&self, parameters: &Value, _now: f64) -> Result<CommandResult, String> {
        let limit = parameters
            .get("limit")
            .and_then(Value::as_i64)
            .unwrap_or(DEFAULT_CAPTURE_LINES);
        let limit = usize::try_from(limit).unwrap_or(0);
        let logs = self.capture_logs(limit).map_err(|err| err.to_string())?;
        let mut result = CommandResult::named(CMD_CAPTURE_LOGS);
        result.logs = Some(logs);
        Ok(result)
    }

    /// Handles `run_diagnostic`: collects a full diagnostics document.
    fn cmd_run_diagnostic(&self, _parameters: &Value, now: f64) -> Result<CommandResult, String> {
        let report = self.collect_diagnostics(now).map_err(|err| err.to_string())?;
        let document = serde_json::to_value(report).map_err(|err| err.to_string())?;
        let mut result = CommandResult::named(CMD_RUN_DIAGNOSTIC);
        result.diagnostics = Some(document);
        Ok(result)
    }

    /// Handles `fetch_inventory`: collects host inventory facts.
    fn cmd_fetch_inventory(&self, _parameters: &Value, now: f64) -> Result<CommandResult, String> {
        let report = self.collect_inventory(now);
        let document = serde_json::to_value(report).map_err(|err| err.to_string())?;
        let mut result = CommandResult::named(CMD_FETCH_INVENTORY);
        result.inventory = Some(document);
        Ok(result)
    }

    /// Returns usage for the volume holding the log directory, zeros when no
    /// mounted volume matches.
    fn disk_usage(&self) -> DiskUsage {
        let disks = Disks::new_with_refreshed_list();
        let mut best: Option<(usize, DiskUsage)> = None;
        for disk in disks.iter() {
            let mount = disk.mount_point();
            if self.log_directory.starts_with(mount) {
                let depth = mount.components().count();
                let usage = DiskUsage {
                    total_bytes: disk.total_space(),
                    free_bytes: disk.available_space(),
                };
                if best.is_none_or(|(best_depth, _)| depth > best_depth) {
                    best = Some((depth, usage));
                }
            }
        }
        best.map_or(
            DiskUsage {
                total_bytes: 0,
                free_bytes: 0,
            },
            |(_, usage)| usage,
        )
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the last `limit` lines of a file; zero yields an empty list.
fn tail_lines(path: &PathBuf, limit: usize) -> io::Result<Vec<String>> {
    if limit == 0 {
        return Ok(Vec::new());
    }
    let contents = fs::read_to_string(path)?;
    let lines: Vec<&str> = contents.lines().collect();
    let start = lines.len().saturating_sub(limit);
    Ok(lines[start ..].iter().map(ToString::to_string).collect())
}
