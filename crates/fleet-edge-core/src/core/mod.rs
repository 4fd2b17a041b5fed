// crates/fleet-edge-core/src/core/mod.rs
// ============================================================================
// Module: Fleet Edge Core Types
// Description: Canonical data model and leaf components of the edge agent.
// Purpose: Provide stable, serializable types shared by runtime and transports.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Core types define what the agent persists, ships, and tracks: event
//! envelopes and cache items, the telemetry buffer, the connectivity state
//! machine, the secure update pipeline, and remote-management collection.
//! These types are the canonical source of truth for any wire encoding.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod config;
pub mod connectivity;
pub mod envelope;
pub mod management;
pub mod telemetry;
pub mod time;
pub mod update;
