// crates/fleet-edge-core/tests/proptest_telemetry.rs
// ============================================================================
// Module: Telemetry Buffer Property Tests
// Description: Randomized checks of aggregation and flush laws.
// Purpose: Validate the flush law under arbitrary operation sequences.
// ============================================================================

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::float_cmp,
    reason = "Test-only assertions and helpers are permitted."
)]

use fleet_edge_core::TelemetryBuffer;
use proptest::prelude::*;

/// One randomized buffer operation.
#[derive(Debug, Clone)]
enum Op {
    /// Add to a counter.
    Increment(String, f64),
    /// Overwrite a gauge.
    Gauge(String, f64),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    let key = prop_oneof![
        Just("events_sent".to_string()),
        Just("events_rejected".to_string()),
        Just("cache_depth".to_string()),
    ];
    let value = -1_000.0_f64 .. 1_000.0_f64;
    prop_oneof![
        (key.clone(), value.clone()).prop_map(|(k, v)| Op::Increment(k, v)),
        (key, value).prop_map(|(k, v)| Op::Gauge(k, v)),
    ]
}

proptest! {
    #[test]
    fn flush_always_leaves_only_the_timestamp(ops in proptest::collection::vec(op_strategy(), 0..64)) {
        let mut buffer = TelemetryBuffer::new(0.0);
        for op in &ops {
            match op {
                Op::Increment(key, value) => buffer.increment(key, *value),
                Op::Gauge(key, value) => buffer.gauge(key, *value),
            }
        }
        let _flushed = buffer.flush(10.0);
        let snapshot = buffer.snapshot(11.0);
        prop_assert_eq!(snapshot.len(), 1);
        prop_assert!(snapshot.contains_key("timestamp"));
    }

    #[test]
    fn increments_sum_linearly(values in proptest::collection::vec(-100.0_f64..100.0, 1..32)) {
        let mut buffer = TelemetryBuffer::new(0.0);
        for value in &values {
            buffer.increment("counter", *value);
        }
        let expected: f64 = values.iter().sum();
        let snapshot = buffer.snapshot(1.0);
        let recorded = snapshot.get("counter").copied().unwrap();
        prop_assert!((recorded - expected).abs() < 1e-9);
    }
}
