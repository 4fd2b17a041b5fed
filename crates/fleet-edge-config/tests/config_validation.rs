// crates/fleet-edge-config/tests/config_validation.rs
// ============================================================================
// Module: Config Validation Unit Tests
// Description: TOML parsing, defaults, and fail-closed validation.
// Purpose: Validate strict rejection of unknown keys and bad identity.
// ============================================================================

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::ffi::OsString;
use std::path::PathBuf;

use fleet_edge_config::ConfigError;
use fleet_edge_config::DEFAULT_CONFIG_NAME;
use fleet_edge_config::load_config_from_path;
use fleet_edge_config::load_config_from_str;
use fleet_edge_config::resolve_config_path;
use fleet_edge_store_sqlite::SqliteJournalMode;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

const MINIMAL: &str = r#"
[agent]
site_id = "site-123"
backend_url = "https://backend.example.com"
secret_key = "super-secret"
cache_path = "/var/lib/edge-agent/cache.db"
"#;

// ============================================================================
// SECTION: Defaults and Sections
// ============================================================================

#[test]
fn minimal_config_applies_documented_defaults() {
    let config = load_config_from_str(MINIMAL).unwrap();
    assert_eq!(config.agent.site_id, "site-123");
    assert_eq!(config.agent.sync_interval_seconds, 30);
    assert_eq!(config.agent.max_batch_size, 100);
    assert_eq!(config.agent.offline_cache_limit_bytes, 200 * 1024 * 1024);
    assert_eq!(config.agent.telemetry_push_interval_seconds, 60);
    assert_eq!(config.agent.update_poll_interval_seconds, 300);
    assert_eq!(config.agent.inventory_refresh_hours, 12);
    assert_eq!(config.agent.diag_log_lines, 500);
    assert_eq!(config.agent.log_directory, PathBuf::from("/var/log/edge-agent"));
    assert_eq!(config.agent.data_directory, PathBuf::from("/var/lib/edge-agent"));
    assert_eq!(config.http.base_url, "https://backend.example.com");
    assert_eq!(config.http.ping_timeout_ms, 5_000);
    assert!(!config.http.allow_http);
    assert_eq!(config.cache.path, PathBuf::from("/var/lib/edge-agent/cache.db"));
}

#[test]
fn sections_override_defaults() {
    let contents = format!(
        "{MINIMAL}\nsync_interval_seconds = 5\nmax_batch_size = 10\n\n\
         [backend]\ntimeout_ms = 250\nallow_http = true\n\n\
         [store]\njournal_mode = \"delete\"\n"
    );
    let config = load_config_from_str(&contents).unwrap();
    assert_eq!(config.agent.sync_interval_seconds, 5);
    assert_eq!(config.agent.max_batch_size, 10);
    assert_eq!(config.http.timeout_ms, 250);
    assert!(config.http.allow_http);
    assert_eq!(config.cache.journal_mode, SqliteJournalMode::Delete);
}

#[test]
fn ping_timeout_propagates_to_transport() {
    let contents = format!("{MINIMAL}\nping_timeout_seconds = 2\n");
    let config = load_config_from_str(&contents).unwrap();
    assert_eq!(config.http.ping_timeout_ms, 2_000);
}

// ============================================================================
// SECTION: Fail-Closed Rejection
// ============================================================================

#[test]
fn unknown_keys_are_rejected() {
    let contents = format!("{MINIMAL}\nsurprise_knob = true\n");
    let Err(err) = load_config_from_str(&contents) else {
        panic!("expected unknown key to fail");
    };
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn missing_identity_is_rejected() {
    let contents = r#"
[agent]
backend_url = "https://backend.example.com"
secret_key = "super-secret"
cache_path = "/tmp/cache.db"
"#;
    let Err(err) = load_config_from_str(contents) else {
        panic!("expected missing site_id to fail");
    };
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn empty_site_id_is_rejected() {
    let contents = MINIMAL.replace("site-123", " ");
    let Err(err) = load_config_from_str(&contents) else {
        panic!("expected empty site_id to fail");
    };
    assert!(matches!(err, ConfigError::Invalid(_)));
}

#[test]
fn short_secret_key_is_rejected() {
    let contents = MINIMAL.replace("super-secret", "short");
    let Err(err) = load_config_from_str(&contents) else {
        panic!("expected short secret to fail");
    };
    assert!(matches!(err, ConfigError::Invalid(_)));
}

#[test]
fn zero_batch_size_is_rejected() {
    let contents = format!("{MINIMAL}\nmax_batch_size = 0\n");
    let Err(err) = load_config_from_str(&contents) else {
        panic!("expected zero batch size to fail");
    };
    assert!(matches!(err, ConfigError::Invalid(_)));
}

#[test]
fn zero_cache_limit_is_rejected() {
    let contents = format!("{MINIMAL}\noffline_cache_limit_bytes = 0\n");
    let Err(err) = load_config_from_str(&contents) else {
        panic!("expected zero cache limit to fail");
    };
    assert!(matches!(err, ConfigError::Invalid(_)));
}

#[test]
fn oversized_config_file_is_rejected() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("fleet-edge.toml");
    let padding = format!("{MINIMAL}\n# {}\n", "x".repeat(2 * 1024 * 1024));
    std::fs::write(&path, padding).unwrap();
    let Err(err) = load_config_from_path(&path) else {
        panic!("expected oversized file to fail");
    };
    assert!(matches!(err, ConfigError::Invalid(_)));
}

#[test]
fn missing_file_is_an_io_error() {
    let temp = TempDir::new().unwrap();
    let Err(err) = load_config_from_path(&temp.path().join("absent.toml")) else {
        panic!("expected missing file to fail");
    };
    assert!(matches!(err, ConfigError::Io(_)));
}

// ============================================================================
// SECTION: Path Resolution
// ============================================================================

#[test]
fn explicit_path_wins_over_environment() {
    let resolved = resolve_config_path(
        Some(PathBuf::from("/etc/fleet-edge/agent.toml")),
        Some(OsString::from("/ignored.toml")),
    );
    assert_eq!(resolved, PathBuf::from("/etc/fleet-edge/agent.toml"));
}

#[test]
fn environment_wins_over_default() {
    let resolved = resolve_config_path(None, Some(OsString::from("/env.toml")));
    assert_eq!(resolved, PathBuf::from("/env.toml"));
}

#[test]
fn empty_environment_falls_back_to_default() {
    let resolved = resolve_config_path(None, Some(OsString::new()));
    assert_eq!(resolved, PathBuf::from(DEFAULT_CONFIG_NAME));
    let resolved = resolve_config_path(None, None);
    assert_eq!(resolved, PathBuf::from(DEFAULT_CONFIG_NAME));
}
