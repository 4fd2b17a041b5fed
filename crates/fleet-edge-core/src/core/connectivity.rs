// crates/fleet-edge-core/src/core/connectivity.rs
// ============================================================================
// Module: Fleet Edge Connectivity Monitor
// Description: Online/offline evaluation via backend liveness probes.
// Purpose: Gate online-only work behind a single authoritative state.
// Dependencies: crate::interfaces, serde
// ============================================================================

//! ## Overview
//! The connectivity monitor asks the backend for a liveness probe each cycle
//! and folds the outcome into a small state machine. There is no hysteresis:
//! a single successful ping restores online, a single failure drops to
//! offline. The probe never raises; transports report failure as `false`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;

use crate::interfaces::FleetBackend;

// ============================================================================
// SECTION: Connectivity State
// ============================================================================

/// Observed backend reachability.
///
/// # Invariants
/// - `is_online` starts `true`; the agent assumes connectivity until a probe
///   says otherwise.
/// - `consecutive_failures` resets to zero on any successful probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectivityState {
    /// Time of the last successful probe, in wall-clock seconds.
    pub last_successful_ping: Option<f64>,
    /// Time of the last failed probe, in wall-clock seconds.
    pub last_failure: Option<f64>,
    /// Number of probe failures since the last success.
    pub consecutive_failures: u32,
    /// Current reachability verdict.
    pub is_online: bool,
}

impl Default for ConnectivityState {
    fn default() -> Self {
        Self {
            last_successful_ping: None,
            last_failure: None,
            consecutive_failures: 0,
            is_online: true,
        }
    }
}

// ============================================================================
// SECTION: Connectivity Monitor
// ============================================================================

/// Evaluates reachability against the fleet backend.
pub struct ConnectivityMonitor {
    /// Backend used for liveness probes.
    backend: Arc<dyn FleetBackend>,
    /// Site identity passed to probes.
    site_id: String,
    /// Current observed state.
    state: ConnectivityState,
}

impl ConnectivityMonitor {
    /// Creates a monitor that probes the given backend.
    #[must_use]
    pub fn new(backend: Arc<dyn FleetBackend>, site_id: impl Into<String>) -> Self {
        Self {
            backend,
            site_id: site_id.into(),
            state: ConnectivityState::default(),
        }
    }

    /// Probes the backend once and folds the outcome into the state.
    pub fn evaluate(&mut self, now: f64) -> &ConnectivityState {
        if self.backend.ping(&self.site_id) {
            self.state.last_successful_ping = Some(now);
            self.state.consecutive_failures = 0;
            self.state.is_online = true;
        } else {
            self.state.last_failure = Some(now);
            self.state.consecutive_failures += 1;
            self.state.is_online = false;
        }
        &self.state
    }

    /// Returns the last evaluated state without probing.
    #[must_use]
    pub const fn state(&self) -> &ConnectivityState {
        &self.state
    }

    /// Returns the current reachability verdict without probing.
    #[must_use]
    pub const fn online(&self) -> bool {
        self.state.is_online
    }
}
