// crates/fleet-edge-config/src/lib.rs
// ============================================================================
// Module: Fleet Edge Config Library
// Description: Canonical config model and fail-closed TOML loading.
// Purpose: Single source of truth for fleet-edge.toml semantics.
// Dependencies: fleet-edge-core, fleet-edge-store-sqlite,
//               fleet-edge-backend-http, serde, toml, thiserror
// ============================================================================

//! ## Overview
//! `fleet-edge-config` loads and validates the agent's TOML configuration.
//! Missing or invalid configuration fails closed: the agent refuses to start
//! rather than running with guessed values. The loader composes the core
//! [`fleet_edge_core::AgentConfig`] with the HTTP transport and `SQLite`
//! cache sections consumed by the satellite crates.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::CONFIG_ENV_VAR;
pub use config::ConfigError;
pub use config::DEFAULT_CONFIG_NAME;
pub use config::FleetEdgeConfig;
pub use config::load_config;
pub use config::load_config_from_path;
pub use config::load_config_from_str;
pub use config::resolve_config_path;
