// crates/fleet-edge-core/tests/connectivity_unit.rs
// ============================================================================
// Module: Connectivity Monitor Unit Tests
// Description: Online/offline transitions from probe outcomes.
// Purpose: Validate failure counting and single-ping recovery.
// ============================================================================

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::float_cmp,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::sync::Arc;

use fleet_edge_core::ConnectivityMonitor;
use fleet_edge_core::FleetBackend;
use fleet_edge_core::MockFleetBackend;

#[test]
fn monitor_assumes_online_until_probed() {
    let backend = Arc::new(MockFleetBackend::new());
    let monitor = ConnectivityMonitor::new(backend, "site-1");
    assert!(monitor.online());
    assert_eq!(monitor.state().consecutive_failures, 0);
}

#[test]
fn successful_probe_records_time_and_resets_failures() {
    let backend = Arc::new(MockFleetBackend::new());
    backend.set_online(false);
    let mut monitor = ConnectivityMonitor::new(Arc::clone(&backend) as Arc<dyn FleetBackend>, "site-1");
    let _state = monitor.evaluate(10.0);
    let _state = monitor.evaluate(20.0);
    assert_eq!(monitor.state().consecutive_failures, 2);

    backend.set_online(true);
    let state = monitor.evaluate(30.0);
    assert!(state.is_online);
    assert_eq!(state.consecutive_failures, 0);
    assert_eq!(state.last_successful_ping, Some(30.0));
    assert_eq!(state.last_failure, Some(20.0));
}

#[test]
fn failed_probe_drops_offline_immediately() {
    let backend = Arc::new(MockFleetBackend::new());
    backend.set_online(false);
    let mut monitor = ConnectivityMonitor::new(Arc::clone(&backend) as Arc<dyn FleetBackend>, "site-1");
    let state = monitor.evaluate(5.0);
    assert!(!state.is_online);
    assert_eq!(state.consecutive_failures, 1);
    assert_eq!(state.last_failure, Some(5.0));
    assert_eq!(state.last_successful_ping, None);
}
