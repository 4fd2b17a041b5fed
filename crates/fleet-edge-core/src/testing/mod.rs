// crates/fleet-edge-core/src/testing/mod.rs
// ============================================================================
// Module: Fleet Edge Test Doubles
// Description: In-memory backend and store used by tests and simulations.
// Purpose: Exercise the runtime without network or disk stores.
// Dependencies: crate::core, crate::interfaces, serde_json
// ============================================================================

//! ## Overview
//! `MockFleetBackend` records everything the agent ships and lets callers
//! script connectivity, pending commands, update manifests, and per-id batch
//! rejections. `MemoryOfflineStore` implements the offline store contract
//! over a plain vector. Both are used by the workspace's scenario tests and
//! by the CLI's offline simulation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::PoisonError;

use serde_json::Value;

use crate::core::envelope::CacheItem;
use crate::core::envelope::EventEnvelope;
use crate::core::envelope::WireEvent;
use crate::core::management::CommandRequest;
use crate::core::update::UpdateManifest;
use crate::interfaces::BackendError;
use crate::interfaces::FleetBackend;
use crate::interfaces::OfflineStore;
use crate::interfaces::StoreError;
use crate::interfaces::SyncResult;

// ============================================================================
// SECTION: Mock Backend
// ============================================================================

/// Scripted backend state behind the mutex.
#[derive(Debug, Default)]
struct MockBackendState {
    /// Whether probes and deliveries succeed.
    online: bool,
    /// Wire events the backend accepted, in arrival order.
    received_batches: Vec<Value>,
    /// Inventory documents received.
    received_inventory: Vec<Value>,
    /// Diagnostics documents received.
    received_diagnostics: Vec<Value>,
    /// Metrics documents received.
    received_metrics: Vec<Value>,
    /// Commands pending fetch.
    commands: Vec<CommandRequest>,
    /// One-shot manifest offer, cleared on fetch.
    manifest: Option<UpdateManifest>,
    /// Planned per-id rejections with reasons.
    reject_reasons: BTreeMap<i64, String>,
}

/// In-memory backend emulation used for tests and simulations.
///
/// # Invariants
/// - Starts online; `set_online(false)` makes probes fail and deliveries
///   raise.
/// - The manifest offer is consumed by a single successful fetch.
pub struct MockFleetBackend {
    /// Scripted state guarded for cross-thread use.
    state: Mutex<MockBackendState>,
}

impl Default for MockFleetBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockFleetBackend {
    /// Creates an online mock with nothing queued.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockBackendState {
                online: true,
                ..MockBackendState::default()
            }),
        }
    }

    /// Scripts backend reachability.
    pub fn set_online(&self, online: bool) {
        self.lock().online = online;
    }

    /// Queues a command for the next fetch.
    pub fn queue_command(&self, command: CommandRequest) {
        self.lock().commands.push(command);
    }

    /// Offers a manifest for the next fetch; `None` clears the offer.
    pub fn set_manifest(&self, manifest: Option<UpdateManifest>) {
        self.lock().manifest = manifest;
    }

    /// Plans a rejection for the given cache id.
    pub fn reject_event(&self, id: i64, reason: impl Into<String>) {
        self.lock().reject_reasons.insert(id, reason.into());
    }

    /// Returns the accepted wire events in arrival order.
    #[must_use]
    pub fn received_batches(&self) -> Vec<Value> {
        self.lock().received_batches.clone()
    }

    /// Returns the inventory documents received.
    #[must_use]
    pub fn received_inventory(&self) -> Vec<Value> {
        self.lock().received_inventory.clone()
    }

    /// Returns the diagnostics documents received.
    #[must_use]
    pub fn received_diagnostics(&self) -> Vec<Value> {
        self.lock().received_diagnostics.clone()
    }

    /// Returns the metrics documents received.
    #[must_use]
    pub fn received_metrics(&self) -> Vec<Value> {
        self.lock().received_metrics.clone()
    }

    /// Locks the scripted state, recovering from poisoning.
    fn lock(&self) -> std::sync::MutexGuard<'_, MockBackendState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl FleetBackend for MockFleetBackend {
    fn ping(&self, _site_id: &str) -> bool {
        self.lock().online
    }

    fn send_batch(&self, _site_id: &str, items: &[WireEvent]) -> Result<SyncResult, BackendError> {
        let mut state = self.lock();
        if !state.online {
            return Err(BackendError::Unavailable("backend offline".to_string()));
        }
        let mut result = SyncResult::default();
        for item in items {
            if let Some(reason) = state.reject_reasons.get(&item.id) {
                result.rejected.insert(item.id, reason.clone());
            } else {
                let document = serde_json::to_value(item)
                    .map_err(|err| BackendError::InvalidResponse(err.to_string()))?;
                state.received_batches.push(document);
                result.acknowledged.insert(item.id);
            }
        }
        Ok(result)
    }

    fn fetch_commands(&self, _site_id: &str) -> Result<Vec<CommandRequest>, BackendError> {
        let mut state = self.lock();
        if !state.online {
            return Err(BackendError::Unavailable("backend offline".to_string()));
        }
        Ok(std::mem::take(&mut state.commands))
    }

    fn get_update_manifest(
        &self,
        _site_id: &str,
    ) -> Result<Option<UpdateManifest>, BackendError> {
        let mut state = self.lock();
        if !state.online {
            return Ok(None);
        }
        Ok(state.manifest.take())
    }

    fn post_inventory(&self, _site_id: &str, inventory: &Value) -> Result<(), BackendError> {
        let mut state = self.lock();
        if !state.online {
            return Err(BackendError::Unavailable("backend offline".to_string()));
        }
        state.received_inventory.push(inventory.clone());
        Ok(())
    }

    fn post_diagnostics(&self, _site_id: &str, diagnostics: &Value) -> Result<(), BackendError> {
        let mut state = self.lock();
        if !state.online {
            return Err(BackendError::Unavailable("backend offline".to_string()));
        }
        state.received_diagnostics.push(diagnostics.clone());
        Ok(())
    }

    fn post_metrics(&self, _site_id: &str, metrics: &Value) -> Result<(), BackendError> {
        let mut state = self.lock();
        if !state.online {
            return Err(BackendError::Unavailable("backend offline".to_string()));
        }
        state.received_metrics.push(metrics.clone());
        Ok(())
    }
}

// ============================================================================
// SECTION: Memory Store
// ============================================================================

/// One stored row in the in-memory store.
#[derive(Debug, Clone)]
struct MemoryRow {
    /// Assigned monotonic id.
    id: i64,
    /// Persisted envelope.
    envelope: EventEnvelope,
    /// Insertion time in wall-clock seconds.
    created_at: f64,
    /// Serialized envelope length in bytes.
    size_bytes: u64,
}

/// Mutable store state behind the mutex.
#[derive(Debug, Default)]
struct MemoryStoreState {
    /// Live rows in insertion order.
    rows: Vec<MemoryRow>,
    /// Next id to assign; starts at 1.
    next_id: i64,
    /// Whether the handle has been closed.
    closed: bool,
}

/// In-memory offline store honoring the durable-queue contract, minus
/// durability.
///
/// # Invariants
/// - Ids strictly increase with insertion order.
/// - `size_bytes` equals the compact serialized envelope length.
#[derive(Default)]
pub struct MemoryOfflineStore {
    /// Store state guarded for cross-thread use.
    state: Mutex<MemoryStoreState>,
}

impl MemoryOfflineStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryStoreState {
                rows: Vec::new(),
                next_id: 1,
                closed: false,
            }),
        }
    }

    /// Locks the store state, recovering from poisoning.
    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryStoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl OfflineStore for MemoryOfflineStore {
    fn append(&self, envelope: &EventEnvelope, now: f64) -> Result<(), StoreError> {
        let encoded = envelope
            .to_compact_json()
            .map_err(|err| StoreError::Invalid(err.to_string()))?;
        let mut state = self.lock();
        if state.closed {
            return Err(StoreError::Closed);
        }
        let id = state.next_id;
        state.next_id += 1;
        state.rows.push(MemoryRow {
            id,
            envelope: envelope.clone(),
            created_at: now,
            size_bytes: encoded.len() as u64,
        });
        Ok(())
    }

    fn get_batch(&self, limit: usize) -> Result<Vec<CacheItem>, StoreError> {
        let state = self.lock();
        if state.closed {
            return Err(StoreError::Closed);
        }
        Ok(state
            .rows
            .iter()
            .take(limit)
            .map(|row| CacheItem {
                id: row.id,
                envelope: row.envelope.clone(),
                created_at: row.created_at,
                size_bytes: row.size_bytes,
            })
            .collect())
    }

    fn remove(&self, ids: &[i64]) -> Result<(), StoreError> {
        let mut state = self.lock();
        if state.closed {
            return Err(StoreError::Closed);
        }
        state.rows.retain(|row| !ids.contains(&row.id));
        Ok(())
    }

    fn total_size_bytes(&self) -> Result<u64, StoreError> {
        let state = self.lock();
        if state.closed {
            return Err(StoreError::Closed);
        }
        Ok(state.rows.iter().map(|row| row.size_bytes).sum())
    }

    fn count(&self) -> Result<u64, StoreError> {
        let state = self.lock();
        if state.closed {
            return Err(StoreError::Closed);
        }
        Ok(state.rows.len() as u64)
    }

    fn trim_to_limit(&self, limit_bytes: u64) -> Result<u64, StoreError> {
        let mut state = self.lock();
        if state.closed {
            return Err(StoreError::Closed);
        }
        let mut removed = 0_u64;
        while state.rows.iter().map(|row| row.size_bytes).sum::<u64>() > limit_bytes {
            let step = state.rows.len().min(50);
            if step == 0 {
                break;
            }
            state.rows.drain(.. step);
            removed += step as u64;
        }
        Ok(removed)
    }

    fn close(&self) -> Result<(), StoreError> {
        self.lock().closed = true;
        Ok(())
    }
}
