//! Namespaced key/value persistence.
//!
//! The credential store only needs string and integer cells addressed by
//! key. [`SqliteKvStore`] keeps them in the `kv_entries` table, scoped to a
//! namespace; [`MemoryKvStore`] keeps them in a map and can be told to fail,
//! which is how the controller's error paths are tested.

#![allow(async_fn_in_trait)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use sqlx::SqlitePool;

use crate::error::{StorageError, StorageResult};

/// Get/put/remove by key.
///
/// Every write is durable when the returned future completes.
pub trait KeyValueStore: Send + Sync {
    /// Read a string cell.
    async fn get_string(&self, key: &str) -> StorageResult<Option<String>>;

    /// Write a string cell, replacing any previous value.
    async fn put_string(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Delete a cell. Returns whether it existed.
    async fn remove(&self, key: &str) -> StorageResult<bool>;

    /// Whether a cell exists.
    async fn contains_key(&self, key: &str) -> StorageResult<bool> {
        Ok(self.get_string(key).await?.is_some())
    }

    /// Read an integer cell.
    ///
    /// # Errors
    /// Returns `StorageError::CorruptValue` if the cell holds something that
    /// is not an integer.
    async fn get_int(&self, key: &str) -> StorageResult<Option<i64>> {
        match self.get_string(key).await? {
            Some(raw) => raw
                .parse()
                .map(Some)
                .map_err(|_| StorageError::corrupt(key, raw)),
            None => Ok(None),
        }
    }

    /// Write an integer cell.
    async fn put_int(&self, key: &str, value: i64) -> StorageResult<()> {
        self.put_string(key, &value.to_string()).await
    }
}

/// SQLite-backed store scoped to one namespace.
#[derive(Debug, Clone)]
pub struct SqliteKvStore {
    pool: SqlitePool,
    namespace: String,
}

impl SqliteKvStore {
    /// Create a store over an already-migrated pool.
    pub fn new(pool: SqlitePool, namespace: impl Into<String>) -> Self {
        Self {
            pool,
            namespace: namespace.into(),
        }
    }

    /// The namespace this store reads and writes.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

impl KeyValueStore for SqliteKvStore {
    async fn get_string(&self, key: &str) -> StorageResult<Option<String>> {
        let value = sqlx::query_scalar::<_, String>(
            "SELECT value FROM kv_entries WHERE namespace = ? AND key = ?",
        )
        .bind(&self.namespace)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(value)
    }

    async fn put_string(&self, key: &str, value: &str) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO kv_entries (namespace, key, value, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (namespace, key)
            DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(&self.namespace)
        .bind(key)
        .bind(value)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn remove(&self, key: &str) -> StorageResult<bool> {
        let result = sqlx::query("DELETE FROM kv_entries WHERE namespace = ? AND key = ?")
            .bind(&self.namespace)
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// In-memory store with failure injection.
///
/// Clones share the same map, so a test can keep one clone to inspect or
/// sabotage the store the controller owns.
#[derive(Debug, Clone, Default)]
pub struct MemoryKvStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
    fail_reads: Arc<AtomicBool>,
    fail_writes: Arc<AtomicBool>,
}

impl MemoryKvStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent read fail.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent write or removal fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of stored cells.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the store holds no cells.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check(flag: &AtomicBool, operation: &str) -> StorageResult<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable(format!("injected {operation} failure")));
        }
        Ok(())
    }
}

impl KeyValueStore for MemoryKvStore {
    async fn get_string(&self, key: &str) -> StorageResult<Option<String>> {
        Self::check(&self.fail_reads, "read")?;
        Ok(self.lock().get(key).cloned())
    }

    async fn put_string(&self, key: &str, value: &str) -> StorageResult<()> {
        Self::check(&self.fail_writes, "write")?;
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> StorageResult<bool> {
        Self::check(&self.fail_writes, "remove")?;
        Ok(self.lock().remove(key).is_some())
    }
}

/// Enum wrapper for store dispatch.
#[derive(Debug, Clone)]
pub enum AnyKvStore {
    /// SQLite-backed store.
    Sqlite(SqliteKvStore),

    /// In-memory store.
    Memory(MemoryKvStore),
}

impl KeyValueStore for AnyKvStore {
    async fn get_string(&self, key: &str) -> StorageResult<Option<String>> {
        match self {
            Self::Sqlite(store) => store.get_string(key).await,
            Self::Memory(store) => store.get_string(key).await,
        }
    }

    async fn put_string(&self, key: &str, value: &str) -> StorageResult<()> {
        match self {
            Self::Sqlite(store) => store.put_string(key, value).await,
            Self::Memory(store) => store.put_string(key, value).await,
        }
    }

    async fn remove(&self, key: &str) -> StorageResult<bool> {
        match self {
            Self::Sqlite(store) => store.remove(key).await,
            Self::Memory(store) => store.remove(key).await,
        }
    }
}
