// crates/fleet-edge-core/src/core/envelope.rs
// ============================================================================
// Module: Fleet Edge Event Envelopes
// Description: Wrappers the agent places around raw payloads before caching.
// Purpose: Provide stable persisted and wire forms for ingested events.
// Dependencies: serde, serde_json, uuid
// ============================================================================

//! ## Overview
//! An [`EventEnvelope`] is what the agent persists and ultimately ships: the
//! opaque payload plus ingestion metadata. A [`CacheItem`] is an envelope as
//! read back from the offline store, keyed by its monotonically increasing
//! row id. The wire form ([`WireEvent`]) is the envelope with the cache id
//! merged in at send time; the backend acknowledges by that id.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

// ============================================================================
// SECTION: Event Envelope
// ============================================================================

/// Persisted wrapper around a raw ingested payload.
///
/// # Invariants
/// - `payload` is opaque; only length matters for cache accounting.
/// - `uuid` is a random 128-bit value rendered as lowercase hex.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Opaque structured payload as handed to `ingest`.
    pub payload: Value,
    /// Ingestion time in wall-clock seconds.
    pub ingested_at: f64,
    /// Site identity the envelope was ingested under.
    pub site_id: String,
    /// Random per-envelope identifier (32 lowercase hex characters).
    pub uuid: String,
}

impl EventEnvelope {
    /// Wraps a raw payload with ingestion metadata.
    #[must_use]
    pub fn new(payload: Value, site_id: impl Into<String>, ingested_at: f64) -> Self {
        Self {
            payload,
            ingested_at,
            site_id: site_id.into(),
            uuid: Uuid::new_v4().simple().to_string(),
        }
    }

    /// Returns the compact serialized form used for persistence and sizing.
    ///
    /// # Errors
    ///
    /// Returns a `serde_json` error when the payload cannot be serialized.
    pub fn to_compact_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// ============================================================================
// SECTION: Cache Item
// ============================================================================

/// An envelope as stored in the offline cache.
///
/// # Invariants
/// - `id` values strictly increase with insertion order per cache file.
/// - `size_bytes` equals the serialized envelope length used for accounting.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheItem {
    /// Monotonic row identifier, unique per cache file.
    pub id: i64,
    /// The persisted envelope.
    pub envelope: EventEnvelope,
    /// Insertion time in wall-clock seconds.
    pub created_at: f64,
    /// Serialized envelope length in bytes.
    pub size_bytes: u64,
}

// ============================================================================
// SECTION: Wire Form
// ============================================================================

/// Envelope as submitted to the backend, with the cache id merged in.
///
/// # Invariants
/// - Serializes to the persisted envelope object plus an `id` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireEvent {
    /// Cache row id the backend must acknowledge by.
    pub id: i64,
    /// The persisted envelope fields, flattened into the same object.
    #[serde(flatten)]
    pub envelope: EventEnvelope,
}

impl WireEvent {
    /// Builds the wire form of a cache item.
    #[must_use]
    pub fn from_item(item: &CacheItem) -> Self {
        Self {
            id: item.id,
            envelope: item.envelope.clone(),
        }
    }
}
