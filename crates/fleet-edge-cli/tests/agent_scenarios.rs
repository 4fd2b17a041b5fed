// crates/fleet-edge-cli/tests/agent_scenarios.rs
// ============================================================================
// Module: Agent End-to-End Scenarios
// Description: Full-stack cycles over the SQLite cache and mock backend.
// Purpose: Validate outage recovery, secure updates, remote commands,
//          cache trimming, and partial batch rejection.
// ============================================================================

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::float_cmp,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::path::Path;
use std::sync::Arc;

use fleet_edge_core::AgentConfig;
use fleet_edge_core::AgentOptions;
use fleet_edge_core::Clock;
use fleet_edge_core::CommandRequest;
use fleet_edge_core::EdgeAgent;
use fleet_edge_core::FleetBackend;
use fleet_edge_core::ManualClock;
use fleet_edge_core::MockFleetBackend;
use fleet_edge_core::OfflineStore;
use fleet_edge_core::UpdateManifest;
use fleet_edge_core::compute_manifest_signature;
use fleet_edge_store_sqlite::SqliteCacheConfig;
use fleet_edge_store_sqlite::SqliteOfflineCache;
use serde_json::Value;
use serde_json::json;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

const SECRET: &str = "super-secret";

fn build_config(base: &Path) -> AgentConfig {
    let mut config = AgentConfig::new(
        "site-123",
        "https://backend.example.com",
        SECRET,
        base.join("cache.db"),
    );
    config.log_directory = base.join("logs");
    config.data_directory = base.join("data");
    config.sync_interval_seconds = 0;
    config.telemetry_push_interval_seconds = 0;
    config.update_poll_interval_seconds = 0;
    config.inventory_refresh_hours = 0;
    config
}

struct Harness {
    backend: Arc<MockFleetBackend>,
    cache: Arc<SqliteOfflineCache>,
    clock: Arc<ManualClock>,
    agent: EdgeAgent,
    workspace: TempDir,
}

fn harness_with(configure: impl FnOnce(&mut AgentConfig)) -> Harness {
    let workspace = TempDir::new().unwrap();
    let mut config = build_config(workspace.path());
    configure(&mut config);
    let backend = Arc::new(MockFleetBackend::new());
    let cache = Arc::new(
        SqliteOfflineCache::new(SqliteCacheConfig::new(&config.cache_path)).expect("cache init"),
    );
    let clock = Arc::new(ManualClock::new(1_000.0));
    let agent = EdgeAgent::new(
        config,
        Arc::clone(&backend) as Arc<dyn FleetBackend>,
        Arc::clone(&cache) as Arc<dyn OfflineStore>,
        AgentOptions {
            clock: Some(Arc::clone(&clock) as Arc<dyn Clock>),
            ..AgentOptions::default()
        },
    )
    .expect("agent init");
    Harness {
        backend,
        cache,
        clock,
        agent,
        workspace,
    }
}

fn harness() -> Harness {
    harness_with(|_| {})
}

fn signed_manifest(version: &str, timestamp: f64) -> UpdateManifest {
    let artifact_url = format!("https://cdn.example.com/{version}/artifact.tar.gz");
    let signature =
        compute_manifest_signature(SECRET.as_bytes(), version, &artifact_url, timestamp);
    UpdateManifest {
        version: version.to_string(),
        artifact_url,
        signature,
        timestamp,
    }
}

// ============================================================================
// SECTION: S1 — Outage and Recovery
// ============================================================================

#[test]
fn agent_recovers_and_resyncs_after_outage() {
    let mut fixture = harness();
    fixture.backend.set_online(false);

    fixture.agent.ingest(json!({"temperature": 18.9})).unwrap();
    fixture.agent.process_cycle().unwrap();
    assert!(fixture.backend.received_batches().is_empty());
    assert_eq!(fixture.agent.state().events_cached, 1);

    fixture.backend.set_online(true);
    fixture.clock.advance(30.0);
    fixture.agent.process_cycle().unwrap();

    let batches = fixture.backend.received_batches();
    assert_eq!(batches.len(), 1);
    let shipped = &batches[0];
    assert_eq!(shipped.pointer("/payload/temperature").and_then(Value::as_f64), Some(18.9));
    assert_eq!(shipped.get("site_id").and_then(Value::as_str), Some("site-123"));
    assert_eq!(fixture.agent.state().events_cached, 0);
    assert_eq!(fixture.agent.state().events_sent, 1);
    assert_eq!(fixture.cache.count().unwrap(), 0);
    fixture.agent.close().unwrap();
}

#[test]
fn offline_entry_and_recovery_are_tracked() {
    let mut fixture = harness();
    fixture.backend.set_online(false);
    fixture.agent.process_cycle().unwrap();
    assert_eq!(fixture.agent.state().offline_since, Some(1_000.0));

    fixture.clock.set(1_120.0);
    fixture.backend.set_online(true);
    fixture.agent.process_cycle().unwrap();
    assert_eq!(fixture.agent.state().offline_since, None);

    // The outage gauge was flushed to the backend during the online cycle.
    let pushed = fixture.backend.received_metrics();
    assert!(pushed.iter().any(|metrics| {
        metrics.get("offline_duration_seconds").and_then(Value::as_f64) == Some(120.0)
    }));
}

// ============================================================================
// SECTION: S2/S3 — Secure Updates
// ============================================================================

#[test]
fn signed_update_is_applied_and_reported() {
    let mut fixture = harness();
    let manifest = signed_manifest("1.0.0", 1_000.0);
    fixture.backend.set_manifest(Some(manifest));

    fixture.agent.process_cycle().unwrap();
    assert!(fixture.agent.state().last_update_poll > 0.0);
    assert_eq!(fixture.agent.current_version(), "1.0.0");

    // The applied counter is flushed on the next cycle's metrics push.
    fixture.agent.process_cycle().unwrap();
    let pushed = fixture.backend.received_metrics();
    assert!(pushed.iter().any(|metrics| {
        metrics.get("updates_applied").and_then(Value::as_f64) == Some(1.0)
    }));
    fixture.agent.close().unwrap();
}

#[test]
fn tampered_manifest_is_rejected_and_counted() {
    let mut fixture = harness();
    let mut manifest = signed_manifest("1.0.0", 1_000.0);
    let mut signature = manifest.signature.into_bytes();
    signature[0] = if signature[0] == b'0' { b'1' } else { b'0' };
    manifest.signature = String::from_utf8(signature).unwrap();
    fixture.backend.set_manifest(Some(manifest));

    fixture.agent.process_cycle().unwrap();
    assert_eq!(fixture.agent.current_version(), "0.0.0");
    let snapshot = fixture.agent.telemetry().snapshot(1_001.0);
    assert!(snapshot.get("update_failures").copied().unwrap_or_default() >= 1.0);
}

// ============================================================================
// SECTION: S4 — Remote Commands
// ============================================================================

#[test]
fn remote_commands_execute_and_persist_results() {
    let mut fixture = harness();
    let log_dir = fixture.workspace.path().join("logs");
    std::fs::write(log_dir.join("app.log"), "line-1\nline-2\nline-3\n").unwrap();

    fixture.backend.queue_command(CommandRequest {
        command: "capture_logs".to_string(),
        parameters: json!({"limit": 2}),
    });
    fixture.backend.queue_command(CommandRequest {
        command: "run_diagnostic".to_string(),
        parameters: json!({}),
    });

    fixture.agent.process_cycle().unwrap();

    let results_path = fixture.workspace.path().join("data").join("command-results.json");
    assert!(results_path.exists());
    let parsed: Vec<Value> =
        serde_json::from_str(&std::fs::read_to_string(&results_path).unwrap()).unwrap();
    let commands: Vec<&str> =
        parsed.iter().filter_map(|entry| entry.get("command").and_then(Value::as_str)).collect();
    assert!(commands.contains(&"capture_logs"));
    assert!(commands.contains(&"run_diagnostic"));

    let capture = parsed
        .iter()
        .find(|entry| entry.get("command").and_then(Value::as_str) == Some("capture_logs"))
        .unwrap();
    assert_eq!(
        capture.pointer("/logs/app.log").unwrap(),
        &json!(["line-2", "line-3"])
    );

    assert!(!fixture.backend.received_inventory().is_empty());
    assert!(!fixture.backend.received_diagnostics().is_empty());
    fixture.agent.close().unwrap();
}

#[test]
fn unknown_remote_command_is_reported_not_fatal() {
    let mut fixture = harness();
    fixture.backend.queue_command(CommandRequest {
        command: "reboot_reactor".to_string(),
        parameters: json!({}),
    });
    fixture.agent.process_cycle().unwrap();
    let results_path = fixture.workspace.path().join("data").join("command-results.json");
    let parsed: Vec<Value> =
        serde_json::from_str(&std::fs::read_to_string(&results_path).unwrap()).unwrap();
    assert_eq!(parsed[0].get("status").and_then(Value::as_str), Some("unknown-command"));
}

// ============================================================================
// SECTION: S5 — Cache Trim
// ============================================================================

#[test]
fn offline_cache_is_trimmed_to_limit_keeping_recent_rows() {
    let mut fixture = harness_with(|config| {
        config.offline_cache_limit_bytes = 1024;
    });
    fixture.backend.set_online(false);

    for index in 0 .. 58 {
        fixture.agent.ingest(json!({"reading": format!("{index:03}")})).unwrap();
    }
    assert!(fixture.cache.total_size_bytes().unwrap() > 1024);

    fixture.agent.process_cycle().unwrap();
    assert!(fixture.cache.total_size_bytes().unwrap() <= 1024);

    let remaining = fixture.cache.get_batch(100).unwrap();
    assert!(!remaining.is_empty());
    assert!(
        remaining.iter().all(|item| item.id > 50),
        "survivors must be the most recently ingested rows"
    );
    assert_eq!(fixture.agent.state().events_cached, fixture.cache.count().unwrap());
}

// ============================================================================
// SECTION: S6 — Partial Batch Rejection
// ============================================================================

#[test]
fn partial_rejection_removes_poisoned_rows_and_counts_them() {
    let mut fixture = harness();
    fixture.backend.reject_event(2, "corrupted");

    for reading in [1, 2, 3] {
        fixture.agent.ingest(json!({"reading": reading})).unwrap();
    }
    fixture.agent.process_cycle().unwrap();

    assert_eq!(fixture.cache.count().unwrap(), 0);
    assert_eq!(fixture.agent.state().events_sent, 2);
    assert_eq!(fixture.agent.state().rejected_events, 1);
    assert_eq!(fixture.agent.state().events_cached, 0);
    assert_eq!(fixture.backend.received_batches().len(), 2);
    fixture.agent.close().unwrap();
}
