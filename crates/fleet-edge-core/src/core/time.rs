// crates/fleet-edge-core/src/core/time.rs
// ============================================================================
// Module: Fleet Edge Time Model
// Description: Injectable wall-clock source for agent timestamps.
// Purpose: Keep cycle timing deterministic in tests while production reads
//          the system clock.
// Dependencies: std
// ============================================================================

//! ## Overview
//! All agent timestamps are wall-clock seconds since the Unix epoch,
//! represented as `f64`. Components never compare timestamps from different
//! cycles to establish ordering; they only compute durations. The runtime
//! reads time exclusively through [`Clock`] so tests can drive the agent
//! with a [`ManualClock`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

// ============================================================================
// SECTION: Clock Trait
// ============================================================================

/// Wall-clock source for agent timestamps.
pub trait Clock: Send + Sync {
    /// Returns the current wall-clock time in seconds since the Unix epoch.
    fn now(&self) -> f64;
}

// ============================================================================
// SECTION: System Clock
// ============================================================================

/// Production clock backed by [`SystemTime`].
///
/// # Invariants
/// - Times before the Unix epoch clamp to `0.0`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs_f64()
    }
}

// ============================================================================
// SECTION: Manual Clock
// ============================================================================

/// Test clock returning an explicitly set time.
///
/// # Invariants
/// - `now` returns the last value set; it never advances on its own.
#[derive(Debug, Default)]
pub struct ManualClock {
    /// Current time in seconds, guarded for cross-thread test use.
    seconds: Mutex<f64>,
}

impl ManualClock {
    /// Creates a manual clock starting at the given time.
    #[must_use]
    pub fn new(seconds: f64) -> Self {
        Self {
            seconds: Mutex::new(seconds),
        }
    }

    /// Sets the clock to an absolute time.
    pub fn set(&self, seconds: f64) {
        let mut guard = self.seconds.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard = seconds;
    }

    /// Advances the clock by a relative number of seconds.
    pub fn advance(&self, seconds: f64) {
        let mut guard = self.seconds.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard += seconds;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        *self.seconds.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
