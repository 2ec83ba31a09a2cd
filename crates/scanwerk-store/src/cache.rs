// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Content-addressed result cache backed by SQLite.
//
// Entries are JSON values keyed by `(scope, content hash)`. An entry is only
// served while every output file it points at still exists, so deleting a
// photo on disk is enough to force its scan to be processed again.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info, instrument, warn};

use scanwerk_core::error::{Result, ScanwerkError};
use scanwerk_core::types::{PhotoMetadata, ScanRecord};

/// SQLite schema for the cache table.
const CREATE_TABLE_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS cache_entries (
        scope TEXT NOT NULL,
        key TEXT NOT NULL,
        value TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        PRIMARY KEY (scope, key)
    )
"#;

/// Namespace of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheScope {
    /// [`ScanRecord`]s keyed by scan id.
    Scans,
    /// [`PhotoMetadata`] keyed by photo id.
    Photos,
}

impl CacheScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scans => "scans",
            Self::Photos => "photos",
        }
    }
}

impl std::fmt::Display for CacheScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value that can be cached. Lists the files the value is only valid
/// alongside.
pub trait CacheValue: Serialize + DeserializeOwned {
    fn referenced_paths(&self) -> Vec<&Path>;
}

impl CacheValue for ScanRecord {
    fn referenced_paths(&self) -> Vec<&Path> {
        self.photos.iter().map(|p| p.path.as_path()).collect()
    }
}

impl CacheValue for PhotoMetadata {
    fn referenced_paths(&self) -> Vec<&Path> {
        vec![self.image.as_path()]
    }
}

type EntryLocks = HashMap<(CacheScope, String), Arc<AsyncMutex<()>>>;

/// Persistent cache of pipeline results.
///
/// Reads and writes are synchronous single statements, safe to call from
/// any task. Read-modify-write sequences on one key are serialized with
/// [`lock_entry`](Self::lock_entry).
pub struct ContentAddressedCache {
    conn: Mutex<Connection>,
    locks: Mutex<EntryLocks>,
}

impl ContentAddressedCache {
    /// Open (or create) the cache database at the given path.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path.as_ref())
            .map_err(|e| ScanwerkError::Database(format!("open: {e}")))?;

        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| ScanwerkError::Database(format!("WAL pragma: {e}")))?;

        conn.execute_batch(CREATE_TABLE_SQL)
            .map_err(|e| ScanwerkError::Database(format!("create table: {e}")))?;

        info!("cache database opened");
        Ok(Self::from_connection(conn))
    }

    /// Open an in-memory database (useful for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| ScanwerkError::Database(format!("open in-memory: {e}")))?;

        conn.execute_batch(CREATE_TABLE_SQL)
            .map_err(|e| ScanwerkError::Database(format!("create table: {e}")))?;

        debug!("in-memory cache database opened");
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| ScanwerkError::Database("connection lock poisoned".into()))
    }

    /// Fetch an entry. `None` if absent, undecodable, or if any file it
    /// references has disappeared.
    #[instrument(skip(self), fields(scope = %scope))]
    pub fn get<T: CacheValue>(&self, scope: CacheScope, key: &str) -> Result<Option<T>> {
        let raw: Option<String> = self
            .conn()?
            .query_row(
                "SELECT value FROM cache_entries WHERE scope = ?1 AND key = ?2",
                params![scope.as_str(), key],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| ScanwerkError::Database(format!("query get: {e}")))?;

        let Some(raw) = raw else {
            return Ok(None);
        };

        let value: T = match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "discarding undecodable cache entry");
                return Ok(None);
            }
        };

        if let Some(missing) = value.referenced_paths().into_iter().find(|p| !p.exists()) {
            debug!(key, missing = %missing.display(), "cache entry is stale");
            return Ok(None);
        }

        Ok(Some(value))
    }

    /// Insert or replace an entry.
    #[instrument(skip(self, value), fields(scope = %scope))]
    pub fn put<T: CacheValue>(&self, scope: CacheScope, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)?;
        let now = Utc::now().to_rfc3339();

        self.conn()?
            .execute(
                "INSERT INTO cache_entries (scope, key, value, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(scope, key) DO UPDATE
                 SET value = excluded.value, updated_at = excluded.updated_at",
                params![scope.as_str(), key, json, now],
            )
            .map_err(|e| ScanwerkError::Database(format!("upsert: {e}")))?;

        debug!(key, "cache entry written");
        Ok(())
    }

    /// Delete an entry. Deleting a missing entry is not an error.
    pub fn remove(&self, scope: CacheScope, key: &str) -> Result<()> {
        self.conn()?
            .execute(
                "DELETE FROM cache_entries WHERE scope = ?1 AND key = ?2",
                params![scope.as_str(), key],
            )
            .map_err(|e| ScanwerkError::Database(format!("delete: {e}")))?;
        Ok(())
    }

    /// Number of entries in `scope`, stale ones included.
    pub fn len(&self, scope: CacheScope) -> Result<usize> {
        let count: i64 = self
            .conn()?
            .query_row(
                "SELECT COUNT(*) FROM cache_entries WHERE scope = ?1",
                params![scope.as_str()],
                |row| row.get(0),
            )
            .map_err(|e| ScanwerkError::Database(format!("count: {e}")))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self, scope: CacheScope) -> Result<bool> {
        Ok(self.len(scope)? == 0)
    }

    /// Take the per-key lock. Holders of the same `(scope, key)` are
    /// serialized; distinct keys never wait on each other.
    ///
    /// Locks nobody holds or waits on are dropped from the registry here, so
    /// it stays as large as the number of keys in flight.
    pub async fn lock_entry(&self, scope: CacheScope, key: &str) -> Result<OwnedMutexGuard<()>> {
        let lock = {
            let mut locks = self
                .locks
                .lock()
                .map_err(|_| ScanwerkError::Database("entry lock registry poisoned".into()))?;
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks
                .entry((scope, key.to_string()))
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        Ok(lock.lock_owned().await)
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        self.locks.lock().map(|locks| locks.len()).unwrap_or(0)
    }
}
