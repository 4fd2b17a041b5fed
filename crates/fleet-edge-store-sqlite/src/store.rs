// crates/fleet-edge-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Offline Cache
// Description: Durable FIFO queue keyed by monotonic id, backed by SQLite.
// Purpose: Buffer ingested envelopes while the backend is unreachable.
// Dependencies: fleet-edge-core, rusqlite, serde, thiserror
// ============================================================================

//! ## Overview
//! The offline cache is an append-only queue over a single `SQLite` file.
//! Ids are assigned by the engine and strictly increase with insertion
//! order; `size_bytes` records the compact serialized envelope length used
//! for byte accounting and trimming. All operations serialize on one mutex,
//! which makes concurrent `ingest` calls safe alongside the cycle task.
//! Eviction is oldest-first and lossy: trimmed events are dropped
//! permanently.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Component;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::time::Duration;

use fleet_edge_core::CacheItem;
use fleet_edge_core::EventEnvelope;
use fleet_edge_core::OfflineStore;
use fleet_edge_core::StoreError;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the cache.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Rows deleted per trim step.
const TRIM_STEP_ROWS: usize = 50;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteJournalMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteJournalMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `synchronous` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` offline cache.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
/// - `busy_timeout_ms` is interpreted as milliseconds.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteCacheConfig {
    /// Path to the cache database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteJournalMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl SqliteCacheConfig {
    /// Creates a config with default pragmas for the given path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteJournalMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` cache errors.
///
/// # Invariants
/// - Error messages avoid embedding raw payloads.
#[derive(Debug, Error)]
pub enum SqliteCacheError {
    /// Cache I/O error.
    #[error("sqlite cache io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite cache db error: {0}")]
    Db(String),
    /// Invalid cache data or configuration.
    #[error("sqlite cache invalid: {0}")]
    Invalid(String),
    /// Cache schema version mismatch.
    #[error("sqlite cache version mismatch: {0}")]
    VersionMismatch(String),
    /// Cache handle has been closed.
    #[error("sqlite cache closed")]
    Closed,
}

impl From<SqliteCacheError> for StoreError {
    fn from(error: SqliteCacheError) -> Self {
        match error {
            SqliteCacheError::Io(message) => Self::Io(message),
            SqliteCacheError::Db(message) => Self::Db(message),
            SqliteCacheError::Invalid(message) => Self::Invalid(message),
            SqliteCacheError::VersionMismatch(message) => Self::VersionMismatch(message),
            SqliteCacheError::Closed => Self::Closed,
        }
    }
}

// ============================================================================
// SECTION: Cache
// ============================================================================

/// `SQLite`-backed durable offline cache.
///
/// # Invariants
/// - Connection access is serialized through a single mutex.
/// - Ids strictly increase with insertion order per cache file.
pub struct SqliteOfflineCache {
    /// Shared connection; `None` once closed.
    connection: Mutex<Option<Connection>>,
}

impl SqliteOfflineCache {
    /// Opens the cache, creating the file and schema when absent.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteCacheError`] when the path is invalid or the database
    /// cannot be opened or initialized.
    pub fn new(config: SqliteCacheConfig) -> Result<Self, SqliteCacheError> {
        validate_cache_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(&config)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            connection: Mutex::new(Some(connection)),
        })
    }

    /// Appends an envelope, assigning the next id.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteCacheError`] when the row cannot be committed.
    pub fn append(&self, envelope: &EventEnvelope, now: f64) -> Result<(), SqliteCacheError> {
        let encoded = envelope
            .to_compact_json()
            .map_err(|err| SqliteCacheError::Invalid(err.to_string()))?;
        let size_bytes = encoded.len() as i64;
        let guard = self.lock();
        let connection = live_connection(&guard)?;
        connection
            .execute(
                "INSERT INTO queue (payload, created_at, size_bytes) VALUES (?1, ?2, ?3)",
                params![encoded, now, size_bytes],
            )
            .map_err(|err| SqliteCacheError::Db(err.to_string()))?;
        Ok(())
    }

    /// Returns up to `limit` items in ascending id order.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteCacheError`] when rows cannot be read or decoded.
    pub fn get_batch(&self, limit: usize) -> Result<Vec<CacheItem>, SqliteCacheError> {
        let guard = self.lock();
        let connection = live_connection(&guard)?;
        let mut statement = connection
            .prepare(
                "SELECT id, payload, created_at, size_bytes FROM queue ORDER BY id ASC LIMIT ?1",
            )
            .map_err(|err| SqliteCacheError::Db(err.to_string()))?;
        let rows = statement
            .query_map(params![limit as i64], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, f64>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            })
            .map_err(|err| SqliteCacheError::Db(err.to_string()))?;
        let mut items = Vec::new();
        for row in rows {
            let (id, payload, created_at, size_bytes) =
                row.map_err(|err| SqliteCacheError::Db(err.to_string()))?;
            let envelope: EventEnvelope = serde_json::from_str(&payload)
                .map_err(|err| SqliteCacheError::Invalid(format!("row {id}: {err}")))?;
            items.push(CacheItem {
                id,
                envelope,
                created_at,
                size_bytes: size_bytes.max(0) as u64,
            });
        }
        Ok(items)
    }

    /// Deletes the named rows; absent ids are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteCacheError`] when the deletion cannot be committed.
    pub fn remove(&self, ids: &[i64]) -> Result<(), SqliteCacheError> {
        if ids.is_empty() {
            return Ok(());
        }
        let mut guard = self.lock();
        let connection = live_connection_mut(&mut guard)?;
        let tx = connection
            .transaction()
            .map_err(|err| SqliteCacheError::Db(err.to_string()))?;
        {
            let mut statement = tx
                .prepare("DELETE FROM queue WHERE id = ?1")
                .map_err(|err| SqliteCacheError::Db(err.to_string()))?;
            for id in ids {
                statement
                    .execute(params![id])
                    .map_err(|err| SqliteCacheError::Db(err.to_string()))?;
            }
        }
        tx.commit().map_err(|err| SqliteCacheError::Db(err.to_string()))
    }

    /// Returns the summed serialized size of all live rows.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteCacheError`] when the aggregate cannot be read.
    pub fn total_size_bytes(&self) -> Result<u64, SqliteCacheError> {
        let guard = self.lock();
        let connection = live_connection(&guard)?;
        let total: i64 = connection
            .query_row("SELECT COALESCE(SUM(size_bytes), 0) FROM queue", params![], |row| {
                row.get(0)
            })
            .map_err(|err| SqliteCacheError::Db(err.to_string()))?;
        Ok(total.max(0) as u64)
    }

    /// Returns the number of live rows.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteCacheError`] when the aggregate cannot be read.
    pub fn count(&self) -> Result<u64, SqliteCacheError> {
        let guard = self.lock();
        let connection = live_connection(&guard)?;
        let count: i64 = connection
            .query_row("SELECT COUNT(1) FROM queue", params![], |row| row.get(0))
            .map_err(|err| SqliteCacheError::Db(err.to_string()))?;
        Ok(count.max(0) as u64)
    }

    /// Deletes oldest rows until the total size fits within `limit_bytes`.
    /// Returns the number of rows removed.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteCacheError`] when trimming cannot be committed.
    pub fn trim_to_limit(&self, limit_bytes: u64) -> Result<u64, SqliteCacheError> {
        let mut removed = 0_u64;
        loop {
            if self.total_size_bytes()? <= limit_bytes {
                return Ok(removed);
            }
            let oldest = self.oldest_ids(TRIM_STEP_ROWS)?;
            if oldest.is_empty() {
                return Ok(removed);
            }
            self.remove(&oldest)?;
            removed += oldest.len() as u64;
        }
    }

    /// Releases the connection; later operations fail with
    /// [`SqliteCacheError::Closed`].
    ///
    /// # Errors
    ///
    /// Returns [`SqliteCacheError`] when the connection cannot be closed
    /// cleanly.
    pub fn close(&self) -> Result<(), SqliteCacheError> {
        let mut guard = self.lock();
        match guard.take() {
            None => Ok(()),
            Some(connection) => connection
                .close()
                .map_err(|(_, err)| SqliteCacheError::Db(err.to_string())),
        }
    }

    /// Returns the ids of the oldest rows, ascending, up to `limit`.
    fn oldest_ids(&self, limit: usize) -> Result<Vec<i64>, SqliteCacheError> {
        let guard = self.lock();
        let connection = live_connection(&guard)?;
        let mut statement = connection
            .prepare("SELECT id FROM queue ORDER BY id ASC LIMIT ?1")
            .map_err(|err| SqliteCacheError::Db(err.to_string()))?;
        let rows = statement
            .query_map(params![limit as i64], |row| row.get::<_, i64>(0))
            .map_err(|err| SqliteCacheError::Db(err.to_string()))?;
        let mut ids = Vec::new();
        for row in rows {
            ids.push(row.map_err(|err| SqliteCacheError::Db(err.to_string()))?);
        }
        Ok(ids)
    }

    /// Locks the connection slot, recovering from poisoning.
    fn lock(&self) -> MutexGuard<'_, Option<Connection>> {
        self.connection.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Returns the live connection or the closed error.
fn live_connection<'a>(
    guard: &'a MutexGuard<'_, Option<Connection>>,
) -> Result<&'a Connection, SqliteCacheError> {
    guard.as_ref().ok_or(SqliteCacheError::Closed)
}

/// Returns the live connection mutably or the closed error.
fn live_connection_mut<'a>(
    guard: &'a mut MutexGuard<'_, Option<Connection>>,
) -> Result<&'a mut Connection, SqliteCacheError> {
    guard.as_mut().ok_or(SqliteCacheError::Closed)
}

// ============================================================================
// SECTION: Trait Implementation
// ============================================================================

impl OfflineStore for SqliteOfflineCache {
    fn append(&self, envelope: &EventEnvelope, now: f64) -> Result<(), StoreError> {
        Self::append(self, envelope, now).map_err(StoreError::from)
    }

    fn get_batch(&self, limit: usize) -> Result<Vec<CacheItem>, StoreError> {
        Self::get_batch(self, limit).map_err(StoreError::from)
    }

    fn remove(&self, ids: &[i64]) -> Result<(), StoreError> {
        Self::remove(self, ids).map_err(StoreError::from)
    }

    fn total_size_bytes(&self) -> Result<u64, StoreError> {
        Self::total_size_bytes(self).map_err(StoreError::from)
    }

    fn count(&self) -> Result<u64, StoreError> {
        Self::count(self).map_err(StoreError::from)
    }

    fn trim_to_limit(&self, limit_bytes: u64) -> Result<u64, StoreError> {
        Self::trim_to_limit(self, limit_bytes).map_err(StoreError::from)
    }

    fn close(&self) -> Result<(), StoreError> {
        Self::close(self).map_err(StoreError::from)
    }
}

// ============================================================================
// SECTION: Connection Setup
// ============================================================================

/// Validates the cache file path before opening.
fn validate_cache_path(path: &Path) -> Result<(), SqliteCacheError> {
    if path.as_os_str().is_empty() {
        return Err(SqliteCacheError::Invalid("cache path must not be empty".to_string()));
    }
    if path.as_os_str().len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteCacheError::Invalid(format!(
            "cache path exceeds {MAX_TOTAL_PATH_LENGTH} bytes"
        )));
    }
    for component in path.components() {
        if let Component::Normal(part) = component
            && part.len() > MAX_PATH_COMPONENT_LENGTH
        {
            return Err(SqliteCacheError::Invalid(format!(
                "cache path component exceeds {MAX_PATH_COMPONENT_LENGTH} bytes"
            )));
        }
    }
    if path.exists() && path.is_dir() {
        return Err(SqliteCacheError::Invalid(
            "cache path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Creates the parent directory of the cache file when missing.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteCacheError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|err| SqliteCacheError::Io(err.to_string()))?;
    }
    Ok(())
}

/// Opens an `SQLite` connection with durable defaults.
fn open_connection(config: &SqliteCacheConfig) -> Result<Connection, SqliteCacheError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags)
        .map_err(|err| SqliteCacheError::Db(err.to_string()))?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies `SQLite` pragmas required for durability.
fn apply_pragmas(
    connection: &Connection,
    config: &SqliteCacheConfig,
) -> Result<(), SqliteCacheError> {
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(|err| SqliteCacheError::Db(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(|err| SqliteCacheError::Db(err.to_string()))?;
    connection
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| SqliteCacheError::Db(err.to_string()))?;
    Ok(())
}

/// Initializes the queue schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteCacheError> {
    let tx = connection.transaction().map_err(|err| SqliteCacheError::Db(err.to_string()))?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(|err| SqliteCacheError::Db(err.to_string()))?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| SqliteCacheError::Db(err.to_string()))?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|err| SqliteCacheError::Db(err.to_string()))?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS queue (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    payload TEXT NOT NULL,
                    created_at REAL NOT NULL,
                    size_bytes INTEGER NOT NULL
                );",
            )
            .map_err(|err| SqliteCacheError::Db(err.to_string()))?;
        }
        Some(SCHEMA_VERSION) => {}
        Some(found) => {
            return Err(SqliteCacheError::VersionMismatch(format!(
                "expected schema version {SCHEMA_VERSION}, found {found}"
            )));
        }
    }
    tx.commit().map_err(|err| SqliteCacheError::Db(err.to_string()))
}
