// crates/fleet-edge-core/src/core/config.rs
// ============================================================================
// Module: Fleet Edge Agent Configuration
// Description: Static runtime parameters for one agent process.
// Purpose: Carry site identity, intervals, sizes, and writable paths.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! `AgentConfig` is the validated, in-memory parameter set the runtime is
//! constructed from. Loading and strict validation of the on-disk TOML form
//! live in the `fleet-edge-config` crate; this type only carries values and
//! prepares the writable directories the agent relies on.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::io;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Default delay between process cycles in `run`.
const fn default_sync_interval_seconds() -> u64 {
    30
}

/// Default per-call batch cap.
const fn default_max_batch_size() -> usize {
    100
}

/// Default offline cache trim threshold (200 MiB).
const fn default_offline_cache_limit_bytes() -> u64 {
    200 * 1024 * 1024
}

/// Default non-forced metric flush period.
const fn default_telemetry_push_interval_seconds() -> u64 {
    60
}

/// Default minimum seconds between update polls.
const fn default_update_poll_interval_seconds() -> u64 {
    300
}

/// Default minimum hours between inventory posts.
const fn default_inventory_refresh_hours() -> u64 {
    12
}

/// Default lines per log file in diagnostics.
const fn default_diag_log_lines() -> usize {
    500
}

/// Default advisory ping timeout forwarded to transports.
const fn default_ping_timeout_seconds() -> u64 {
    5
}

/// Default log directory.
fn default_log_directory() -> PathBuf {
    PathBuf::from("/var/log/edge-agent")
}

/// Default data directory.
fn default_data_directory() -> PathBuf {
    PathBuf::from("/var/lib/edge-agent")
}

// ============================================================================
// SECTION: Agent Config
// ============================================================================

/// Static parameters for one agent process.
///
/// # Invariants
/// - `site_id`, `backend_url`, `secret_key`, and `cache_path` are required
///   and non-empty after config-layer validation.
/// - The cache file is used by exactly one agent process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Site identity included in all backend calls.
    pub site_id: String,
    /// Backend transport endpoint.
    pub backend_url: String,
    /// HMAC key for update manifest signatures.
    pub secret_key: String,
    /// Offline cache file location.
    pub cache_path: PathBuf,
    /// Delay between process cycles in `run`.
    #[serde(default = "default_sync_interval_seconds")]
    pub sync_interval_seconds: u64,
    /// Per-call batch cap when draining the cache.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
    /// Offline cache trim threshold in bytes.
    #[serde(default = "default_offline_cache_limit_bytes")]
    pub offline_cache_limit_bytes: u64,
    /// Non-forced metric flush period in seconds.
    #[serde(default = "default_telemetry_push_interval_seconds")]
    pub telemetry_push_interval_seconds: u64,
    /// Minimum seconds between update polls.
    #[serde(default = "default_update_poll_interval_seconds")]
    pub update_poll_interval_seconds: u64,
    /// Minimum hours between inventory posts.
    #[serde(default = "default_inventory_refresh_hours")]
    pub inventory_refresh_hours: u64,
    /// Lines captured per log file in diagnostics.
    #[serde(default = "default_diag_log_lines")]
    pub diag_log_lines: usize,
    /// Advisory probe timeout forwarded to transport implementations.
    #[serde(default = "default_ping_timeout_seconds")]
    pub ping_timeout_seconds: u64,
    /// Directory holding the agent log and captured `*.log` files.
    #[serde(default = "default_log_directory")]
    pub log_directory: PathBuf,
    /// Directory for command results and staged update artifacts.
    #[serde(default = "default_data_directory")]
    pub data_directory: PathBuf,
}

impl AgentConfig {
    /// Creates a config with required identity fields and default tunables.
    #[must_use]
    pub fn new(
        site_id: impl Into<String>,
        backend_url: impl Into<String>,
        secret_key: impl Into<String>,
        cache_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            site_id: site_id.into(),
            backend_url: backend_url.into(),
            secret_key: secret_key.into(),
            cache_path: cache_path.into(),
            sync_interval_seconds: default_sync_interval_seconds(),
            max_batch_size: default_max_batch_size(),
            offline_cache_limit_bytes: default_offline_cache_limit_bytes(),
            telemetry_push_interval_seconds: default_telemetry_push_interval_seconds(),
            update_poll_interval_seconds: default_update_poll_interval_seconds(),
            inventory_refresh_hours: default_inventory_refresh_hours(),
            diag_log_lines: default_diag_log_lines(),
            ping_timeout_seconds: default_ping_timeout_seconds(),
            log_directory: default_log_directory(),
            data_directory: default_data_directory(),
        }
    }

    /// Returns the staging directory for installed update artifacts.
    #[must_use]
    pub fn updates_directory(&self) -> PathBuf {
        self.data_directory.join("updates")
    }

    /// Returns the agent log file path.
    #[must_use]
    pub fn agent_log_path(&self) -> PathBuf {
        self.log_directory.join("edge-agent.log")
    }

    /// Returns the command results artifact path.
    #[must_use]
    pub fn command_results_path(&self) -> PathBuf {
        self.data_directory.join("command-results.json")
    }

    /// Ensures the cache parent, log, data, and update directories exist.
    ///
    /// # Errors
    ///
    /// Returns an [`io::Error`] when a directory cannot be created.
    pub fn ensure_directories(&self) -> io::Result<()> {
        if let Some(parent) = self.cache_path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        fs::create_dir_all(&self.log_directory)?;
        fs::create_dir_all(&self.data_directory)?;
        fs::create_dir_all(self.updates_directory())?;
        Ok(())
    }
}
