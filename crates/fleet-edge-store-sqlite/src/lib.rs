// crates/fleet-edge-store-sqlite/src/lib.rs
// ============================================================================
// Module: Fleet Edge SQLite Store Library
// Description: Durable offline cache backed by a single-file SQLite store.
// Purpose: Persist ingested envelopes across process restarts.
// Dependencies: fleet-edge-core, rusqlite, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! This crate implements the agent's [`fleet_edge_core::OfflineStore`]
//! contract over `SQLite`. Rows survive restarts until explicitly removed or
//! trimmed; the cache file is owned by exactly one agent process.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::SqliteCacheConfig;
pub use store::SqliteCacheError;
pub use store::SqliteJournalMode;
pub use store::SqliteOfflineCache;
pub use store::SqliteSyncMode;
