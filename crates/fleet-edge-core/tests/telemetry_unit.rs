// crates/fleet-edge-core/tests/telemetry_unit.rs
// ============================================================================
// Module: Telemetry Buffer Unit Tests
// Description: Counter/gauge aggregation and flush-and-reset semantics.
// Purpose: Validate the flush law and interval bookkeeping.
// ============================================================================

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::float_cmp,
    reason = "Test-only assertions and helpers are permitted."
)]

use fleet_edge_core::TelemetryBuffer;
use fleet_edge_core::core::telemetry::TIMESTAMP_KEY;

#[test]
fn increment_starts_from_zero_and_accumulates() {
    let mut buffer = TelemetryBuffer::new(0.0);
    buffer.increment("events_ingested", 1.0);
    buffer.increment("events_ingested", 2.5);
    let snapshot = buffer.snapshot(10.0);
    assert_eq!(snapshot.get("events_ingested"), Some(&3.5));
}

#[test]
fn gauge_overwrites_previous_value() {
    let mut buffer = TelemetryBuffer::new(0.0);
    buffer.gauge("cache_depth", 4.0);
    buffer.gauge("cache_depth", 2.0);
    assert_eq!(buffer.snapshot(1.0).get("cache_depth"), Some(&2.0));
}

#[test]
fn snapshot_always_carries_timestamp() {
    let buffer = TelemetryBuffer::new(0.0);
    let snapshot = buffer.snapshot(42.0);
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot.get(TIMESTAMP_KEY), Some(&42.0));
}

#[test]
fn flush_clears_all_keys() {
    let mut buffer = TelemetryBuffer::new(0.0);
    buffer.increment("events_sent", 5.0);
    buffer.gauge("cache_depth", 1.0);
    let flushed = buffer.flush(100.0);
    assert_eq!(flushed.get("events_sent"), Some(&5.0));
    assert_eq!(flushed.get(TIMESTAMP_KEY), Some(&100.0));

    let after = buffer.snapshot(101.0);
    assert_eq!(after.len(), 1, "only the timestamp survives a flush");
    assert!(buffer.is_empty());
}

#[test]
fn increment_after_flush_restarts_from_zero() {
    let mut buffer = TelemetryBuffer::new(0.0);
    buffer.increment("events_sent", 7.0);
    let _flushed = buffer.flush(10.0);
    buffer.increment("events_sent", 1.0);
    assert_eq!(buffer.snapshot(11.0).get("events_sent"), Some(&1.0));
}

#[test]
fn flush_resets_interval_clock() {
    let mut buffer = TelemetryBuffer::new(0.0);
    assert_eq!(buffer.seconds_since_flush(30.0), 30.0);
    let _flushed = buffer.flush(30.0);
    assert_eq!(buffer.seconds_since_flush(45.0), 15.0);
}
