// crates/fleet-edge-core/src/lib.rs
// ============================================================================
// Module: Fleet Edge Core Library
// Description: Canonical types, interfaces, and runtime for the edge agent.
// Purpose: Single source of truth for agent semantics independent of transports.
// Dependencies: serde, serde_json, thiserror, hmac, sha2, subtle, uuid, time,
//               sysinfo, tempfile
// ============================================================================

//! ## Overview
//! `fleet-edge-core` defines the edge agent's data model (envelopes, cache
//! items, sync results, update manifests), the interfaces the agent depends
//! on (fleet backend, offline store, artifact fetcher, install hook), and the
//! runtime that coordinates them under a partial-failure model. Concrete
//! transports and stores live in sibling crates; this crate stays
//! backend-agnostic and fails closed on invalid inputs.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;
pub mod testing;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::config::AgentConfig;
pub use core::connectivity::ConnectivityMonitor;
pub use core::connectivity::ConnectivityState;
pub use core::envelope::CacheItem;
pub use core::envelope::EventEnvelope;
pub use core::envelope::WireEvent;
pub use core::management::CommandRequest;
pub use core::management::CommandResult;
pub use core::management::DiagnosticsReport;
pub use core::management::DiskUsage;
pub use core::management::InventoryReport;
pub use core::management::ProcessSample;
pub use core::management::RemoteManagement;
pub use core::telemetry::TelemetryBuffer;
pub use core::time::Clock;
pub use core::time::ManualClock;
pub use core::time::SystemClock;
pub use core::update::PlaceholderFetcher;
pub use core::update::UpdateError;
pub use core::update::UpdateManager;
pub use core::update::UpdateManifest;
pub use core::update::UpdateState;
pub use core::update::compute_manifest_signature;
pub use interfaces::ArtifactFetcher;
pub use interfaces::BackendError;
pub use interfaces::FleetBackend;
pub use interfaces::InstallHook;
pub use interfaces::OfflineStore;
pub use interfaces::StoreError;
pub use interfaces::SyncResult;
pub use runtime::agent::AgentError;
pub use runtime::agent::AgentOptions;
pub use runtime::agent::AgentState;
pub use runtime::agent::EdgeAgent;
pub use runtime::logging::AgentLog;
pub use runtime::logging::LogLevel;
pub use testing::MemoryOfflineStore;
pub use testing::MockFleetBackend;
