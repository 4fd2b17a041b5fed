// crates/fleet-edge-core/src/core/telemetry.rs
// ============================================================================
// Module: Fleet Edge Telemetry Buffer
// Description: In-memory counter/gauge aggregator with flush-and-reset.
// Purpose: Accumulate operational metrics between pushes to the backend.
// Dependencies: std
// ============================================================================

//! ## Overview
//! The telemetry buffer is a keyed scalar aggregator owned by the agent
//! runtime. It is not thread-safe; all access goes through orchestrator-owned
//! methods on a single logical task. Time is supplied by the caller so the
//! buffer never reads the wall clock itself.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Reserved key carrying the snapshot time.
pub const TIMESTAMP_KEY: &str = "timestamp";

// ============================================================================
// SECTION: Telemetry Buffer
// ============================================================================

/// Keyed scalar aggregator for counters and gauges.
///
/// # Invariants
/// - After `flush` the buffer has no keys; a subsequent `increment` starts
///   from zero.
/// - Snapshots always carry a `timestamp` entry in wall-clock seconds.
#[derive(Debug)]
pub struct TelemetryBuffer {
    /// Current metric values keyed by name.
    metrics: BTreeMap<String, f64>,
    /// Time of the last flush in wall-clock seconds.
    last_flush: f64,
}

impl TelemetryBuffer {
    /// Creates an empty buffer whose flush clock starts at `now`.
    #[must_use]
    pub fn new(now: f64) -> Self {
        Self {
            metrics: BTreeMap::new(),
            last_flush: now,
        }
    }

    /// Adds `value` to the metric, starting from zero when absent.
    pub fn increment(&mut self, key: &str, value: f64) {
        *self.metrics.entry(key.to_string()).or_insert(0.0) += value;
    }

    /// Overwrites the metric with `value`.
    pub fn gauge(&mut self, key: &str, value: f64) {
        self.metrics.insert(key.to_string(), value);
    }

    /// Returns a copy of the current metrics plus a `timestamp` entry.
    #[must_use]
    pub fn snapshot(&self, now: f64) -> BTreeMap<String, f64> {
        let mut snapshot = self.metrics.clone();
        snapshot.insert(TIMESTAMP_KEY.to_string(), now);
        snapshot
    }

    /// Returns the snapshot, clears all entries, and resets the flush clock.
    pub fn flush(&mut self, now: f64) -> BTreeMap<String, f64> {
        let snapshot = self.snapshot(now);
        self.metrics.clear();
        self.last_flush = now;
        snapshot
    }

    /// Returns the seconds elapsed since the last flush.
    #[must_use]
    pub fn seconds_since_flush(&self, now: f64) -> f64 {
        now - self.last_flush
    }

    /// Returns true when no metrics have been recorded since the last flush.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}
