// crates/fleet-edge-config/src/config.rs
// ============================================================================
// Module: Fleet Edge Configuration
// Description: Configuration loading and validation for the edge agent.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: fleet-edge-core, fleet-edge-store-sqlite,
//               fleet-edge-backend-http, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size limits and
//! unknown keys rejected. The `[agent]` section carries identity and
//! intervals; optional `[backend]` and `[store]` sections tune the HTTP
//! transport and the `SQLite` cache. Validation fails closed on missing
//! identity, empty secrets, or zero-sized limits.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use fleet_edge_backend_http::HttpBackendConfig;
use fleet_edge_core::AgentConfig;
use fleet_edge_store_sqlite::SqliteCacheConfig;
use fleet_edge_store_sqlite::SqliteJournalMode;
use fleet_edge_store_sqlite::SqliteSyncMode;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
pub const DEFAULT_CONFIG_NAME: &str = "fleet-edge.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "FLEET_EDGE_CONFIG";
/// Maximum configuration file size in bytes.
pub const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum accepted site identifier length.
const MAX_SITE_ID_LENGTH: usize = 128;
/// Minimum accepted secret key length.
const MIN_SECRET_KEY_LENGTH: usize = 8;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - Messages never embed the secret key.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("config io error: {0}")]
    Io(String),
    /// Config file could not be parsed.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Config contents violate validation rules.
    #[error("config invalid: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: File Model
// ============================================================================

/// Raw `[agent]` section before validation.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AgentSection {
    /// Site identity in all backend calls.
    site_id: String,
    /// Backend transport endpoint.
    backend_url: String,
    /// HMAC key for update manifests.
    secret_key: String,
    /// Offline cache location.
    cache_path: PathBuf,
    /// Delay between process cycles.
    sync_interval_seconds: Option<u64>,
    /// Per-call batch cap.
    max_batch_size: Option<usize>,
    /// Cache trim threshold in bytes.
    offline_cache_limit_bytes: Option<u64>,
    /// Non-forced metric flush period.
    telemetry_push_interval_seconds: Option<u64>,
    /// Minimum seconds between update polls.
    update_poll_interval_seconds: Option<u64>,
    /// Minimum hours between inventory posts.
    inventory_refresh_hours: Option<u64>,
    /// Lines per log file in diagnostics.
    diag_log_lines: Option<usize>,
    /// Advisory probe timeout in seconds.
    ping_timeout_seconds: Option<u64>,
    /// Writable log directory.
    log_directory: Option<PathBuf>,
    /// Writable data directory.
    data_directory: Option<PathBuf>,
}

/// Raw `[backend]` section before composition.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct BackendSection {
    /// Request timeout in milliseconds.
    timeout_ms: Option<u64>,
    /// Allow cleartext HTTP.
    allow_http: Option<bool>,
    /// Outbound user agent.
    user_agent: Option<String>,
    /// Response size cap in bytes.
    max_response_bytes: Option<usize>,
}

/// Raw `[store]` section before composition.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct StoreSection {
    /// Busy timeout in milliseconds.
    busy_timeout_ms: Option<u64>,
    /// `SQLite` journal mode.
    journal_mode: Option<SqliteJournalMode>,
    /// `SQLite` sync mode.
    sync_mode: Option<SqliteSyncMode>,
}

/// Whole config file as parsed from TOML.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    /// Agent identity and intervals.
    agent: AgentSection,
    /// HTTP transport tuning.
    #[serde(default)]
    backend: BackendSection,
    /// `SQLite` cache tuning.
    #[serde(default)]
    store: StoreSection,
}

// ============================================================================
// SECTION: Composed Config
// ============================================================================

/// Validated configuration for one agent process.
#[derive(Debug, Clone)]
pub struct FleetEdgeConfig {
    /// Core agent parameters.
    pub agent: AgentConfig,
    /// HTTP transport parameters derived from the agent identity.
    pub http: HttpBackendConfig,
    /// `SQLite` cache parameters derived from the agent identity.
    pub cache: SqliteCacheConfig,
}

// ============================================================================
// SECTION: Loading
// ============================================================================

/// Resolves the config path from an explicit argument, the environment
/// override, or the default filename, in that order.
#[must_use]
pub fn resolve_config_path(explicit: Option<PathBuf>, env_value: Option<OsString>) -> PathBuf {
    if let Some(path) = explicit {
        return path;
    }
    if let Some(value) = env_value
        && !value.is_empty()
    {
        return PathBuf::from(value);
    }
    PathBuf::from(DEFAULT_CONFIG_NAME)
}

/// Loads the configuration from the explicit path, the `FLEET_EDGE_CONFIG`
/// override, or `fleet-edge.toml`.
///
/// # Errors
///
/// Returns [`ConfigError`] when the file is missing, oversized, unparsable,
/// or invalid.
pub fn load_config(explicit: Option<PathBuf>) -> Result<FleetEdgeConfig, ConfigError> {
    let path = resolve_config_path(explicit, env::var_os(CONFIG_ENV_VAR));
    load_config_from_path(&path)
}

/// Loads the configuration from a specific file.
///
/// # Errors
///
/// Returns [`ConfigError`] when the file is missing, oversized, unparsable,
/// or invalid.
pub fn load_config_from_path(path: &Path) -> Result<FleetEdgeConfig, ConfigError> {
    let metadata = fs::metadata(path).map_err(|err| ConfigError::Io(err.to_string()))?;
    if metadata.len() > MAX_CONFIG_FILE_SIZE as u64 {
        return Err(ConfigError::Invalid(format!(
            "config file exceeds {MAX_CONFIG_FILE_SIZE} bytes"
        )));
    }
    let contents = fs::read_to_string(path).map_err(|err| ConfigError::Io(err.to_string()))?;
    load_config_from_str(&contents)
}

/// Parses and validates configuration from TOML text.
///
/// # Errors
///
/// Returns [`ConfigError`] when the text is unparsable or invalid.
pub fn load_config_from_str(contents: &str) -> Result<FleetEdgeConfig, ConfigError> {
    if contents.len() > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::Invalid(format!(
            "config file exceeds {MAX_CONFIG_FILE_SIZE} bytes"
        )));
    }
    let file: ConfigFile =
        toml::from_str(contents).map_err(|err| ConfigError::Parse(err.to_string()))?;
    compose(file)
}

// ============================================================================
// SECTION: Composition and Validation
// ============================================================================

/// Builds the validated config from the raw file model.
fn compose(file: ConfigFile) -> Result<FleetEdgeConfig, ConfigError> {
    let section = file.agent;
    validate_agent_section(&section)?;
    let mut agent = AgentConfig::new(
        section.site_id,
        section.backend_url,
        section.secret_key,
        section.cache_path,
    );
    if let Some(value) = section.sync_interval_seconds {
        agent.sync_interval_seconds = value;
    }
    if let Some(value) = section.max_batch_size {
        agent.max_batch_size = value;
    }
    if let Some(value) = section.offline_cache_limit_bytes {
        agent.offline_cache_limit_bytes = value;
    }
    if let Some(value) = section.telemetry_push_interval_seconds {
        agent.telemetry_push_interval_seconds = value;
    }
    if let Some(value) = section.update_poll_interval_seconds {
        agent.update_poll_interval_seconds = value;
    }
    if let Some(value) = section.inventory_refresh_hours {
        agent.inventory_refresh_hours = value;
    }
    if let Some(value) = section.diag_log_lines {
        agent.diag_log_lines = value;
    }
    if let Some(value) = section.ping_timeout_seconds {
        agent.ping_timeout_seconds = value;
    }
    if let Some(value) = section.log_directory {
        agent.log_directory = value;
    }
    if let Some(value) = section.data_directory {
        agent.data_directory = value;
    }
    validate_agent(&agent)?;

    let mut http = HttpBackendConfig::new(agent.backend_url.clone());
    http.ping_timeout_ms = agent.ping_timeout_seconds.saturating_mul(1_000);
    if let Some(value) = file.backend.timeout_ms {
        http.timeout_ms = value;
    }
    if let Some(value) = file.backend.allow_http {
        http.allow_http = value;
    }
    if let Some(value) = file.backend.user_agent {
        http.user_agent = value;
    }
    if let Some(value) = file.backend.max_response_bytes {
        http.max_response_bytes = value;
    }

    let mut cache = SqliteCacheConfig::new(agent.cache_path.clone());
    if let Some(value) = file.store.busy_timeout_ms {
        cache.busy_timeout_ms = value;
    }
    if let Some(value) = file.store.journal_mode {
        cache.journal_mode = value;
    }
    if let Some(value) = file.store.sync_mode {
        cache.sync_mode = value;
    }

    Ok(FleetEdgeConfig {
        agent,
        http,
        cache,
    })
}

/// Validates required identity fields in the raw section.
fn validate_agent_section(section: &AgentSection) -> Result<(), ConfigError> {
    if section.site_id.trim().is_empty() {
        return Err(ConfigError::Invalid("site_id must not be empty".to_string()));
    }
    if section.site_id.len() > MAX_SITE_ID_LENGTH {
        return Err(ConfigError::Invalid(format!(
            "site_id exceeds {MAX_SITE_ID_LENGTH} bytes"
        )));
    }
    if section.backend_url.trim().is_empty() {
        return Err(ConfigError::Invalid("backend_url must not be empty".to_string()));
    }
    if section.secret_key.len() < MIN_SECRET_KEY_LENGTH {
        return Err(ConfigError::Invalid(format!(
            "secret_key must be at least {MIN_SECRET_KEY_LENGTH} bytes"
        )));
    }
    if section.cache_path.as_os_str().is_empty() {
        return Err(ConfigError::Invalid("cache_path must not be empty".to_string()));
    }
    Ok(())
}

/// Validates tunables on the composed agent config.
fn validate_agent(agent: &AgentConfig) -> Result<(), ConfigError> {
    if agent.max_batch_size == 0 {
        return Err(ConfigError::Invalid(
            "max_batch_size must be greater than zero".to_string(),
        ));
    }
    if agent.offline_cache_limit_bytes == 0 {
        return Err(ConfigError::Invalid(
            "offline_cache_limit_bytes must be greater than zero".to_string(),
        ));
    }
    Ok(())
}
