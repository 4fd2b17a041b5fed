// crates/fleet-edge-core/src/interfaces/mod.rs
// ============================================================================
// Module: Fleet Edge Interfaces
// Description: Backend-agnostic contracts for transport, storage, and updates.
// Purpose: Define the surfaces the agent runtime depends on without embedding
//          transport or storage details.
// Dependencies: crate::core, serde, thiserror
// ============================================================================

//! ## Overview
//! Interfaces define how the agent integrates with external systems: the
//! fleet backend, the durable offline store, the update artifact fetcher,
//! and the install effector. Implementations must fail closed; a backend
//! failure is always recoverable by retrying on a later cycle, while a
//! storage failure is fatal to the current operation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::path::Path;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::core::envelope::CacheItem;
use crate::core::envelope::EventEnvelope;
use crate::core::envelope::WireEvent;
use crate::core::management::CommandRequest;
use crate::core::update::UpdateManifest;

// ============================================================================
// SECTION: Sync Result
// ============================================================================

/// Per-item backend decisions for one submitted batch.
///
/// # Invariants
/// - `acknowledged` and `rejected` are disjoint.
/// - Their union is a subset of the submitted batch ids; absent ids remain
///   unresolved and stay in the cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    /// Ids the backend accepted and persisted.
    pub acknowledged: BTreeSet<i64>,
    /// Ids the backend refused, with a reason per id.
    pub rejected: BTreeMap<i64, String>,
}

impl SyncResult {
    /// Returns all ids the backend resolved, accepted or rejected.
    #[must_use]
    pub fn resolved_ids(&self) -> Vec<i64> {
        self.acknowledged.iter().chain(self.rejected.keys()).copied().collect()
    }
}

// ============================================================================
// SECTION: Backend Errors
// ============================================================================

/// Errors raised by fleet backend implementations.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - Any variant signals a transient condition; the runtime retries the
///   operation on a later cycle.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Backend is unreachable or refused the request.
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    /// Backend answered with an invalid or undecodable document.
    #[error("backend response invalid: {0}")]
    InvalidResponse(String),
}

// ============================================================================
// SECTION: Fleet Backend
// ============================================================================

/// Transport-agnostic contract for the central fleet backend.
pub trait FleetBackend: Send + Sync {
    /// Liveness probe. Never raises; network failure reports `false`.
    fn ping(&self, site_id: &str) -> bool;

    /// Submits a batch of wire events for acknowledgment.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] when the batch cannot be delivered; the
    /// runtime treats any failure as "none acknowledged" and stops draining
    /// for the cycle.
    fn send_batch(&self, site_id: &str, items: &[WireEvent]) -> Result<SyncResult, BackendError>;

    /// Fetches pending remote commands. The backend deletes returned
    /// commands on successful fetch (at-most-once from the agent's view).
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] when commands cannot be fetched.
    fn fetch_commands(&self, site_id: &str) -> Result<Vec<CommandRequest>, BackendError>;

    /// Returns the currently offered update manifest, if any.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] when the manifest cannot be fetched.
    fn get_update_manifest(&self, site_id: &str) -> Result<Option<UpdateManifest>, BackendError>;

    /// Posts an inventory report.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] on delivery failure; the runtime does not
    /// advance the inventory timestamp and retries next cycle.
    fn post_inventory(&self, site_id: &str, inventory: &Value) -> Result<(), BackendError>;

    /// Posts a diagnostics report.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] on delivery failure.
    fn post_diagnostics(&self, site_id: &str, diagnostics: &Value) -> Result<(), BackendError>;

    /// Posts a metrics snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] on delivery failure; the lost snapshot is
    /// accepted and later increments repopulate the buffer.
    fn post_metrics(&self, site_id: &str, metrics: &Value) -> Result<(), BackendError>;
}

// ============================================================================
// SECTION: Store Errors
// ============================================================================

/// Errors raised by offline store implementations.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - Storage errors are fatal to the current sub-step; the agent does not
///   retry them within a cycle.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Store I/O error.
    #[error("offline store io error: {0}")]
    Io(String),
    /// Embedded database engine error.
    #[error("offline store db error: {0}")]
    Db(String),
    /// Invalid store data or configuration.
    #[error("offline store invalid: {0}")]
    Invalid(String),
    /// Store schema version is incompatible.
    #[error("offline store version mismatch: {0}")]
    VersionMismatch(String),
    /// Store handle has been closed.
    #[error("offline store closed")]
    Closed,
}

// ============================================================================
// SECTION: Offline Store
// ============================================================================

/// Durable FIFO queue keyed by auto-assigned monotonic id.
pub trait OfflineStore: Send + Sync {
    /// Serializes and appends an envelope, assigning the next id atomically.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the row cannot be committed.
    fn append(&self, envelope: &EventEnvelope, now: f64) -> Result<(), StoreError>;

    /// Returns up to `limit` items in ascending id order without removing
    /// them.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when rows cannot be read.
    fn get_batch(&self, limit: usize) -> Result<Vec<CacheItem>, StoreError>;

    /// Deletes the named rows; absent ids are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the deletion cannot be committed.
    fn remove(&self, ids: &[i64]) -> Result<(), StoreError>;

    /// Returns the summed serialized size of all live rows.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the aggregate cannot be read.
    fn total_size_bytes(&self) -> Result<u64, StoreError>;

    /// Returns the number of live rows.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the aggregate cannot be read.
    fn count(&self) -> Result<u64, StoreError>;

    /// Deletes oldest rows until the total size fits within `limit_bytes`,
    /// removing at most 50 ids per step. Returns the number removed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when trimming cannot be committed.
    fn trim_to_limit(&self, limit_bytes: u64) -> Result<u64, StoreError>;

    /// Releases the underlying handle. Subsequent operations fail with
    /// [`StoreError::Closed`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the handle cannot be released cleanly.
    fn close(&self) -> Result<(), StoreError>;
}

// ============================================================================
// SECTION: Update Hooks
// ============================================================================

/// Downloads an update artifact to a destination path.
pub trait ArtifactFetcher: Send + Sync {
    /// Fetches `artifact_url` into `destination`.
    ///
    /// # Errors
    ///
    /// Returns a message describing why the artifact could not be fetched.
    fn fetch(&self, artifact_url: &str, destination: &Path) -> Result<(), String>;
}

/// Stages a fetched artifact somewhere the host system can adopt it.
pub trait InstallHook: Send + Sync {
    /// Installs the artifact at `artifact_path`.
    ///
    /// # Errors
    ///
    /// Returns a message describing why the install failed.
    fn install(&self, artifact_path: &Path) -> Result<(), String>;
}
