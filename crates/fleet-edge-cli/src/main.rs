// crates/fleet-edge-cli/src/main.rs
// ============================================================================
// Module: Fleet Edge CLI Entry Point
// Description: Command dispatcher for running and inspecting the edge agent.
// Purpose: Wire config, cache, transport, and runtime into one binary.
// Dependencies: clap, fleet-edge-core, fleet-edge-store-sqlite,
//               fleet-edge-backend-http, fleet-edge-config, rand, serde_json,
//               tempfile, thiserror
// ============================================================================

//! ## Overview
//! The `fleet-edge` binary runs the agent loop against a configured backend
//! (`run`), validates configuration without side effects (`check-config`),
//! and exercises the full stack against an in-memory backend
//! (`simulate`). Configuration is loaded fail-closed from `fleet-edge.toml`
//! or the `FLEET_EDGE_CONFIG` override.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::Parser;
use clap::Subcommand;
use fleet_edge_backend_http::HttpArtifactFetcher;
use fleet_edge_backend_http::HttpFleetBackend;
use fleet_edge_config::ConfigError;
use fleet_edge_config::FleetEdgeConfig;
use fleet_edge_config::load_config;
use fleet_edge_core::AgentConfig;
use fleet_edge_core::AgentError;
use fleet_edge_core::AgentOptions;
use fleet_edge_core::BackendError;
use fleet_edge_core::EdgeAgent;
use fleet_edge_core::FleetBackend;
use fleet_edge_core::MockFleetBackend;
use fleet_edge_core::StoreError;
use fleet_edge_store_sqlite::SqliteCacheConfig;
use fleet_edge_store_sqlite::SqliteCacheError;
use fleet_edge_store_sqlite::SqliteOfflineCache;
use rand::Rng;
use serde_json::json;
use thiserror::Error;

// ============================================================================
// SECTION: CLI Model
// ============================================================================

/// Resilient edge-site agent bridging local telemetry with a fleet backend.
#[derive(Debug, Parser)]
#[command(name = "fleet-edge", version, about)]
struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Supported subcommands.
#[derive(Debug, Subcommand)]
enum Command {
    /// Run the agent cycle loop against the configured backend.
    Run {
        /// Path to the configuration file.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Number of cycles to run; omit to run until interrupted.
        #[arg(long)]
        cycles: Option<u64>,
    },
    /// Load and validate the configuration, then print a summary.
    CheckConfig {
        /// Path to the configuration file.
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Run an offline/recovery simulation against an in-memory backend.
    Simulate {
        /// Number of simulated cycles.
        #[arg(long, default_value_t = 10)]
        cycles: u64,
    },
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI-level failures surfaced to the operator.
#[derive(Debug, Error)]
enum CliError {
    /// Configuration loading or validation failed.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Agent runtime failed fatally.
    #[error(transparent)]
    Agent(#[from] AgentError),
    /// Transport could not be constructed.
    #[error(transparent)]
    Backend(#[from] BackendError),
    /// Offline store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// `SQLite` cache could not be opened.
    #[error(transparent)]
    Cache(#[from] SqliteCacheError),
    /// Filesystem failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

fn main() -> ExitCode {
    let cli = Cli::parse();
    match dispatch(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("fleet-edge: {err}");
            ExitCode::FAILURE
        }
    }
}

/// Routes the parsed subcommand to its handler.
fn dispatch(command: Command) -> Result<(), CliError> {
    match command {
        Command::Run {
            config,
            cycles,
        } => run_agent(config, cycles),
        Command::CheckConfig {
            config,
        } => check_config(config),
        Command::Simulate {
            cycles,
        } => run_simulation(cycles),
    }
}

// ============================================================================
// SECTION: Run
// ============================================================================

/// Builds the production stack and runs the cycle loop.
fn run_agent(config_path: Option<PathBuf>, cycles: Option<u64>) -> Result<(), CliError> {
    let config = load_config(config_path)?;
    let backend = Arc::new(HttpFleetBackend::new(config.http.clone())?);
    let cache = Arc::new(SqliteOfflineCache::new(config.cache.clone())?);
    let fetcher = HttpArtifactFetcher::new(
        config.http.timeout_ms,
        config.http.user_agent.clone(),
        HttpArtifactFetcher::DEFAULT_MAX_ARTIFACT_BYTES,
    )?;
    let mut agent = EdgeAgent::new(
        config.agent,
        backend,
        cache,
        AgentOptions {
            artifact_fetcher: Some(Box::new(fetcher)),
            ..AgentOptions::default()
        },
    )?;
    match cycles {
        Some(count) => agent.run(count)?,
        None => loop {
            agent.run(1)?;
        },
    }
    agent.close()?;
    Ok(())
}

// ============================================================================
// SECTION: Check Config
// ============================================================================

/// Loads the configuration and prints an operator summary.
fn check_config(config_path: Option<PathBuf>) -> Result<(), CliError> {
    let config = load_config(config_path)?;
    print_summary(&config);
    Ok(())
}

/// Prints the validated configuration without secrets.
fn print_summary(config: &FleetEdgeConfig) {
    let agent = &config.agent;
    println!("configuration ok");
    println!("  site_id:                  {}", agent.site_id);
    println!("  backend_url:              {}", agent.backend_url);
    println!("  cache_path:               {}", agent.cache_path.display());
    println!("  log_directory:            {}", agent.log_directory.display());
    println!("  data_directory:           {}", agent.data_directory.display());
    println!("  sync_interval_seconds:    {}", agent.sync_interval_seconds);
    println!("  max_batch_size:           {}", agent.max_batch_size);
    println!("  offline_cache_limit:      {} bytes", agent.offline_cache_limit_bytes);
    println!("  telemetry_push_interval:  {}s", agent.telemetry_push_interval_seconds);
    println!("  update_poll_interval:     {}s", agent.update_poll_interval_seconds);
    println!("  inventory_refresh_hours:  {}", agent.inventory_refresh_hours);
}

// ============================================================================
// SECTION: Simulate
// ============================================================================

/// Runs the full agent stack against the in-memory backend, dropping
/// connectivity mid-run and recovering, then prints a delivery summary.
fn run_simulation(cycles: u64) -> Result<(), CliError> {
    let backend = Arc::new(MockFleetBackend::new());
    let workspace = tempfile::tempdir()?;
    let base = workspace.path();

    let mut config = AgentConfig::new(
        "simulated-site",
        "https://backend.simulated",
        "simulation-secret",
        base.join("cache.db"),
    );
    config.log_directory = base.join("logs");
    config.data_directory = base.join("data");
    config.sync_interval_seconds = 0;
    config.telemetry_push_interval_seconds = 5;
    config.update_poll_interval_seconds = 10;
    config.inventory_refresh_hours = 0;

    let cache = Arc::new(SqliteOfflineCache::new(SqliteCacheConfig::new(&config.cache_path))?);
    let mut agent = EdgeAgent::new(
        config,
        Arc::clone(&backend) as Arc<dyn FleetBackend>,
        cache,
        AgentOptions::default(),
    )?;

    let mut rng = rand::thread_rng();
    for cycle in 0 .. cycles {
        if cycle == 2 {
            backend.set_online(false);
        }
        if cycle == 5 {
            backend.set_online(true);
        }
        let payload = json!({
            "temperature": round_to(rng.gen_range(18.0 .. 24.0), 100.0),
            "humidity": round_to(rng.gen_range(30.0 .. 45.0), 10.0),
            "cycle": cycle,
        });
        agent.ingest(payload)?;
        agent.process_cycle()?;
        thread::sleep(Duration::from_millis(100));
    }
    agent.close()?;

    println!("=== Simulation Summary ===");
    println!("Measurements delivered: {}", backend.received_batches().len());
    println!("Inventory syncs:        {}", backend.received_inventory().len());
    println!("Diagnostics captured:   {}", backend.received_diagnostics().len());
    println!("Metrics pushed:         {}", backend.received_metrics().len());
    Ok(())
}

/// Rounds a reading to a fixed decimal scale.
fn round_to(value: f64, scale: f64) -> f64 {
    (value * scale).round() / scale
}
