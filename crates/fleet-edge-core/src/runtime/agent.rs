// crates/fleet-edge-core/src/runtime/agent.rs
// ============================================================================
// Module: Fleet Edge Agent Orchestrator
// Description: The process cycle composing cache, connectivity, sync, update,
//              and remote management under a partial-failure model.
// Purpose: Keep ingesting while offline and catch up cleanly when online.
// Dependencies: crate::core, crate::interfaces, serde_json
// ============================================================================

//! ## Overview
//! The orchestrator owns [`AgentState`] and the telemetry buffer and runs
//! `process_cycle` on a single logical task. Backend failures are logged and
//! retried next cycle; storage failures propagate to the caller and end the
//! cycle. Within a cycle the steps run in a fixed order: gauges, trim,
//! connectivity, then (online) drain, inventory, metrics, commands, updates,
//! or (offline) a non-forced metric flush only.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

use crate::core::config::AgentConfig;
use crate::core::connectivity::ConnectivityMonitor;
use crate::core::connectivity::ConnectivityState;
use crate::core::envelope::CacheItem;
use crate::core::envelope::EventEnvelope;
use crate::core::envelope::WireEvent;
use crate::core::management::CommandResult;
use crate::core::management::RemoteManagement;
use crate::core::telemetry::TelemetryBuffer;
use crate::core::time::Clock;
use crate::core::time::SystemClock;
use crate::core::update::PlaceholderFetcher;
use crate::core::update::UpdateManager;
use crate::core::update::UpdateState;
use crate::interfaces::ArtifactFetcher;
use crate::interfaces::FleetBackend;
use crate::interfaces::InstallHook;
use crate::interfaces::OfflineStore;
use crate::interfaces::StoreError;
use crate::interfaces::SyncResult;
use crate::runtime::logging::AgentLog;

// ============================================================================
// SECTION: Agent State
// ============================================================================

/// Orchestrator-owned cycle bookkeeping.
///
/// # Invariants
/// - All mutations occur inside the orchestrator.
/// - `events_cached` mirrors the cache row count after every mutation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentState {
    /// Time the current outage began, when offline.
    pub offline_since: Option<f64>,
    /// Time of the last successful inventory post.
    pub last_inventory_sync: f64,
    /// Time of the last successful metrics post.
    pub last_metrics_flush: f64,
    /// Time the update step last polled for a manifest.
    pub last_update_poll: f64,
    /// Events acknowledged by the backend so far.
    pub events_sent: u64,
    /// Events currently held in the offline cache.
    pub events_cached: u64,
    /// Events the backend rejected as poisoned.
    pub rejected_events: u64,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Fatal agent errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - Backend failures never surface here; they are logged and retried.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Offline store failure; the agent expects a restart.
    #[error("offline store failure: {0}")]
    Store(#[from] StoreError),
    /// Filesystem failure while preparing agent directories or the log.
    #[error("agent io error: {0}")]
    Io(String),
}

// ============================================================================
// SECTION: Construction Options
// ============================================================================

/// Optional overrides for agent construction.
#[derive(Default)]
pub struct AgentOptions {
    /// Installed-version state; defaults to version `0.0.0`.
    pub update_state: Option<UpdateState>,
    /// Artifact fetcher; defaults to the placeholder fetcher.
    pub artifact_fetcher: Option<Box<dyn ArtifactFetcher>>,
    /// Install hook; defaults to staging into `data_directory/updates`.
    pub install_hook: Option<Box<dyn InstallHook>>,
    /// Clock; defaults to the system clock.
    pub clock: Option<Arc<dyn Clock>>,
}

/// Default install hook: copies the artifact into the updates directory,
/// keeping its basename.
struct StagedInstall {
    /// Destination directory for staged artifacts.
    updates_directory: PathBuf,
}

impl InstallHook for StagedInstall {
    fn install(&self, artifact_path: &Path) -> Result<(), String> {
        let name = artifact_path
            .file_name()
            .ok_or_else(|| "artifact path has no basename".to_string())?;
        let destination = self.updates_directory.join(name);
        fs::copy(artifact_path, &destination).map_err(|err| err.to_string())?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Edge Agent
// ============================================================================

/// Resilient edge runtime coordinating connectivity, caching, and updates.
pub struct EdgeAgent {
    /// Static parameters for this process.
    config: AgentConfig,
    /// Durable offline queue.
    cache: Arc<dyn OfflineStore>,
    /// Central fleet backend.
    backend: Arc<dyn FleetBackend>,
    /// Reachability state machine.
    connectivity: ConnectivityMonitor,
    /// Inventory, diagnostics, and command dispatch.
    management: RemoteManagement,
    /// Metric aggregator, confined to the orchestrator.
    telemetry: TelemetryBuffer,
    /// Cycle bookkeeping, owned by the orchestrator.
    state: AgentState,
    /// Secure update pipeline.
    update_manager: UpdateManager,
    /// Cycle log file.
    log: AgentLog,
    /// Wall-clock source.
    clock: Arc<dyn Clock>,
}

impl EdgeAgent {
    /// Builds an agent over the given backend and cache, preparing the
    /// writable directories and the log file.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Io`] when directories or the log file cannot be
    /// created.
    pub fn new(
        config: AgentConfig,
        backend: Arc<dyn FleetBackend>,
        cache: Arc<dyn OfflineStore>,
        options: AgentOptions,
    ) -> Result<Self, AgentError> {
        config.ensure_directories().map_err(|err| AgentError::Io(err.to_string()))?;
        let log = AgentLog::open(&config.agent_log_path())
            .map_err(|err| AgentError::Io(err.to_string()))?;
        let clock: Arc<dyn Clock> = options.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let fetcher = options
            .artifact_fetcher
            .unwrap_or_else(|| Box::new(PlaceholderFetcher));
        let installer = options.install_hook.unwrap_or_else(|| {
            Box::new(StagedInstall {
                updates_directory: config.updates_directory(),
            })
        });
        let update_manager = UpdateManager::new(
            &config.secret_key,
            options.update_state.unwrap_or_else(|| UpdateState::new("0.0.0")),
            fetcher,
            installer,
        );
        let connectivity = ConnectivityMonitor::new(Arc::clone(&backend), &config.site_id);
        let management = RemoteManagement::new(&config.log_directory, config.diag_log_lines);
        let telemetry = TelemetryBuffer::new(clock.now());
        Ok(Self {
            config,
            cache,
            backend,
            connectivity,
            management,
            telemetry,
            state: AgentState::default(),
            update_manager,
            log,
            clock,
        })
    }

    /// Returns the orchestrator's cycle bookkeeping.
    #[must_use]
    pub const fn state(&self) -> &AgentState {
        &self.state
    }

    /// Returns the telemetry buffer for read-only inspection.
    #[must_use]
    pub const fn telemetry(&self) -> &TelemetryBuffer {
        &self.telemetry
    }

    /// Returns the currently installed software version.
    #[must_use]
    pub fn current_version(&self) -> &str {
        self.update_manager.current_version()
    }

    /// Returns the last evaluated connectivity state.
    #[must_use]
    pub const fn connectivity(&self) -> &ConnectivityState {
        self.connectivity.state()
    }

    /// Wraps a raw payload in an envelope and persists it.
    ///
    /// May be called from other threads than the cycle task; the offline
    /// store serializes access internally.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the envelope cannot be committed.
    pub fn ingest(&mut self, payload: Value) -> Result<(), StoreError> {
        let now = self.clock.now();
        let envelope = EventEnvelope::new(payload, &self.config.site_id, now);
        self.cache.append(&envelope, now)?;
        self.state.events_cached = self.cache.count()?;
        self.telemetry.increment("events_ingested", 1.0);
        Ok(())
    }

    /// Executes one coordination cycle.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Store`] on storage failure; backend failures are
    /// logged and retried on a later cycle.
    pub fn process_cycle(&mut self) -> Result<(), AgentError> {
        let depth = self.cache.count()?;
        let size = self.cache.total_size_bytes()?;
        self.telemetry.gauge("cache_depth", depth as f64);
        self.telemetry.gauge("cache_size_bytes", size as f64);
        let trimmed = self.cache.trim_to_limit(self.config.offline_cache_limit_bytes)?;
        if trimmed > 0 {
            self.state.events_cached = self.cache.count()?;
            self.log.warning(format!("Trimmed {trimmed} cached events to honor the size limit"));
        }
        let now = self.clock.now();
        let online = self.connectivity.evaluate(now).is_online;
        if online {
            self.online_cycle()
        } else {
            self.offline_cycle();
            Ok(())
        }
    }

    /// Runs `cycles` process cycles, sleeping the sync interval in between.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] when a cycle fails fatally.
    pub fn run(&mut self, cycles: u64) -> Result<(), AgentError> {
        for _ in 0 .. cycles {
            self.process_cycle()?;
            thread::sleep(Duration::from_secs(self.config.sync_interval_seconds));
        }
        Ok(())
    }

    /// Releases the offline cache handle.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the cache cannot be closed cleanly.
    pub fn close(&self) -> Result<(), StoreError> {
        self.cache.close()
    }

    // ------------------------------------------------------------------
    // Cycle branches
    // ------------------------------------------------------------------

    /// Online branch: recovery bookkeeping, drain, inventory, metrics,
    /// commands, updates.
    fn online_cycle(&mut self) -> Result<(), AgentError> {
        if let Some(since) = self.state.offline_since {
            let duration = self.clock.now() - since;
            self.telemetry.gauge("offline_duration_seconds", duration);
            self.state.offline_since = None;
            self.log.info(format!("Recovered connectivity after {duration:.2}s"));
        }
        self.drain_cache()?;
        self.sync_inventory_if_due();
        self.flush_metrics(true);
        self.poll_remote_commands();
        self.poll_updates_if_due();
        Ok(())
    }

    /// Offline branch: record outage start and flush metrics on the
    /// non-forced schedule only.
    fn offline_cycle(&mut self) {
        if self.state.offline_since.is_none() {
            self.state.offline_since = Some(self.clock.now());
            self.log.warning("Connectivity lost, entering offline mode");
        }
        self.flush_metrics(false);
    }

    // ------------------------------------------------------------------
    // Drain
    // ------------------------------------------------------------------

    /// Ships batches in ascending id order until the cache is empty, the
    /// backend fails, or the backend resolves nothing.
    fn drain_cache(&mut self) -> Result<(), AgentError> {
        loop {
            let batch = self.cache.get_batch(self.config.max_batch_size)?;
            if batch.is_empty() {
                return Ok(());
            }
            let wire: Vec<WireEvent> = batch.iter().map(WireEvent::from_item).collect();
            let result = match self.backend.send_batch(&self.config.site_id, &wire) {
                Ok(result) => result,
                Err(err) => {
                    self.log.error(format!("Failed to send batch: {err}"));
                    return Ok(());
                }
            };
            let resolved = self.apply_sync_result(&batch, &result)?;
            if resolved == 0 {
                // Nothing left the cache; a retry this cycle would resend the
                // same batch.
                self.log.warning("Backend resolved no events, stopping drain");
                return Ok(());
            }
        }
    }

    /// Removes acknowledged and rejected rows and updates counters. Returns
    /// the number of rows resolved out of the cache.
    fn apply_sync_result(
        &mut self,
        batch: &[CacheItem],
        result: &SyncResult,
    ) -> Result<usize, AgentError> {
        debug_assert!(result
            .resolved_ids()
            .iter()
            .all(|id| batch.iter().any(|item| item.id == *id)));
        let resolved = result.resolved_ids();
        self.cache.remove(&resolved)?;
        let rejected = result.rejected.len() as u64;
        if rejected > 0 {
            self.state.rejected_events += rejected;
            self.telemetry.increment("events_rejected", rejected as f64);
            self.log
                .warning(format!("Rejected {rejected} events: {:?}", result.rejected));
        }
        let sent = result.acknowledged.len() as u64;
        self.state.events_sent += sent;
        self.telemetry.increment("events_sent", sent as f64);
        self.state.events_cached = self.cache.count()?;
        Ok(resolved.len())
    }

    // ------------------------------------------------------------------
    // Inventory
    // ------------------------------------------------------------------

    /// Posts an inventory report when the refresh interval has elapsed. The
    /// timestamp advances only on success, so failures retry next cycle.
    fn sync_inventory_if_due(&mut self) {
        let now = self.clock.now();
        let refresh_seconds = (self.config.inventory_refresh_hours * 3600) as f64;
        if now - self.state.last_inventory_sync < refresh_seconds {
            return;
        }
        let report = self.management.collect_inventory(now);
        let document = match serde_json::to_value(&report) {
            Ok(document) => document,
            Err(err) => {
                self.log.error(format!("Failed to encode inventory: {err}"));
                return;
            }
        };
        match self.backend.post_inventory(&self.config.site_id, &document) {
            Ok(()) => {
                self.state.last_inventory_sync = now;
                self.log.info("Inventory sync completed");
            }
            Err(err) => self.log.error(format!("Failed to sync inventory: {err}")),
        }
    }

    // ------------------------------------------------------------------
    // Metrics
    // ------------------------------------------------------------------

    /// Flushes the telemetry buffer to the backend. Non-forced flushes honor
    /// the push interval; a lost snapshot is accepted on delivery failure.
    fn flush_metrics(&mut self, force: bool) {
        let now = self.clock.now();
        if !force
            && self.telemetry.seconds_since_flush(now)
                < self.config.telemetry_push_interval_seconds as f64
        {
            return;
        }
        let metrics = self.telemetry.flush(now);
        if metrics.len() <= 1 {
            // Only the timestamp entry; nothing worth shipping.
            return;
        }
        let document = match serde_json::to_value(&metrics) {
            Ok(document) => document,
            Err(err) => {
                self.log.error(format!("Failed to encode metrics: {err}"));
                return;
            }
        };
        match self.backend.post_metrics(&self.config.site_id, &document) {
            Ok(()) => self.state.last_metrics_flush = self.clock.now(),
            Err(_) => {
                // Subsequent increments repopulate the buffer; losing one
                // snapshot is acceptable.
                self.log.debug("Metric flush skipped due to backend failure");
            }
        }
    }

    // ------------------------------------------------------------------
    // Remote commands
    // ------------------------------------------------------------------

    /// Fetches and executes remote commands, posts diagnostics/inventory
    /// results, and writes the results artifact.
    fn poll_remote_commands(&mut self) {
        let commands = match self.backend.fetch_commands(&self.config.site_id) {
            Ok(commands) => commands,
            Err(err) => {
                self.log.error(format!("Failed to fetch commands: {err}"));
                return;
            }
        };
        if commands.is_empty() {
            return;
        }
        let results = self.management.execute_commands(&commands, self.clock.now());
        for result in &results {
            self.post_command_result(result);
        }
        if let Err(err) = self.write_command_results(&results) {
            self.log.error(format!("Failed to write command results: {err}"));
        }
        self.log.info(format!("Executed {} remote commands", results.len()));
    }

    /// Posts diagnostics and inventory documents carried by one result.
    fn post_command_result(&self, result: &CommandResult) {
        if let Some(diagnostics) = &result.diagnostics
            && let Err(err) = self.backend.post_diagnostics(&self.config.site_id, diagnostics)
        {
            self.log.error(format!("Failed to post command result: {err}"));
        }
        if let Some(inventory) = &result.inventory
            && let Err(err) = self.backend.post_inventory(&self.config.site_id, inventory)
        {
            self.log.error(format!("Failed to post command result: {err}"));
        }
    }

    /// Overwrites `command-results.json` with the latest batch of results.
    fn write_command_results(&self, results: &[CommandResult]) -> std::io::Result<()> {
        let rendered = serde_json::to_string_pretty(results)?;
        fs::write(self.config.command_results_path(), rendered)
    }

    // ------------------------------------------------------------------
    // Updates
    // ------------------------------------------------------------------

    /// Polls for an update manifest when the poll interval has elapsed and
    /// applies it when the version differs. The poll timestamp advances
    /// unconditionally at the start of the step.
    fn poll_updates_if_due(&mut self) {
        let now = self.clock.now();
        if now - self.state.last_update_poll < self.config.update_poll_interval_seconds as f64 {
            return;
        }
        self.state.last_update_poll = now;
        let manifest = match self.backend.get_update_manifest(&self.config.site_id) {
            Ok(manifest) => manifest,
            Err(err) => {
                self.log.error(format!("Failed to fetch update manifest: {err}"));
                return;
            }
        };
        let Some(manifest) = manifest else {
            return;
        };
        if !self.update_manager.needs_update(&manifest.version) {
            return;
        }
        match self.update_manager.apply_update(&manifest) {
            Ok(version) => {
                self.telemetry.increment("updates_applied", 1.0);
                self.log.info(format!("Applied update {version}"));
            }
            Err(err) => {
                self.telemetry.increment("update_failures", 1.0);
                self.log.error(format!("Update application failed: {err}"));
            }
        }
    }
}
