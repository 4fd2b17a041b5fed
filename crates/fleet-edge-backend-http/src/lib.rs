// crates/fleet-edge-backend-http/src/lib.rs
// ============================================================================
// Module: Fleet Edge HTTP Backend Library
// Description: Blocking HTTP transport implementing the fleet backend.
// Purpose: Ship batches, commands, manifests, and reports over HTTP.
// Dependencies: fleet-edge-core, reqwest, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! This crate implements [`fleet_edge_core::FleetBackend`] over blocking
//! HTTP with strict limits: redirects disabled, bounded response reads, and
//! scheme restrictions that block cleartext HTTP unless explicitly allowed.
//! It also provides the HTTP artifact fetcher used by the update pipeline.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod http;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use http::HttpArtifactFetcher;
pub use http::HttpBackendConfig;
pub use http::HttpFleetBackend;
