//! Persistent key/value state.
//!
//! Values are JSON documents stored under string keys. Readers always get a
//! usable collection back: an absent key yields the type's default, and a
//! value that no longer parses is reset to that default.

use crate::db::Database;
use anyhow::{anyhow, Context, Result};
use rusqlite::{params, OptionalExtension};
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

/// JSON key/value store backed by the local SQLite database
pub struct LocalStore {
    db: Mutex<Database>,
}

impl LocalStore {
    /// Open the store at the given database path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(Database::open(path)?))
    }

    /// Store that lives only as long as the process
    pub fn in_memory() -> Result<Self> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    pub fn new(db: Database) -> Self {
        Self { db: Mutex::new(db) }
    }

    fn db(&self) -> Result<MutexGuard<'_, Database>> {
        self.db.lock().map_err(|_| anyhow!("Local store lock poisoned"))
    }

    /// Read the raw string stored under a key
    pub fn get_raw(&self, key: &str) -> Result<Option<String>> {
        let db = self.db()?;
        db.conn()
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("Failed to read key: {}", key))
    }

    /// Write a raw string under a key, replacing any previous value
    pub fn set_raw(&self, key: &str, value: &str) -> Result<()> {
        let db = self.db()?;
        db.conn()
            .execute(
                "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, CURRENT_TIMESTAMP)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, value],
            )
            .with_context(|| format!("Failed to write key: {}", key))?;
        Ok(())
    }

    /// Delete a key; deleting an absent key is not an error
    pub fn remove(&self, key: &str) -> Result<()> {
        let db = self.db()?;
        db.conn()
            .execute("DELETE FROM kv_store WHERE key = ?1", params![key])
            .with_context(|| format!("Failed to remove key: {}", key))?;
        Ok(())
    }

    /// Load a JSON value, defaulting when absent and resetting when corrupt
    pub fn load<T>(&self, key: &str) -> Result<T>
    where
        T: DeserializeOwned + Serialize + Default,
    {
        let Some(raw) = self.get_raw(key)? else {
            debug!(key = key, "Key absent, using default");
            return Ok(T::default());
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Ok(value),
            Err(e) => {
                warn!(key = key, error = %e, "Stored value is corrupt, resetting to default");
                let value = T::default();
                self.save(key, &value)?;
                Ok(value)
            }
        }
    }

    /// Serialize a value as JSON under a key
    pub fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let content = serde_json::to_string(value)
            .with_context(|| format!("Failed to serialize value for key: {}", key))?;
        self.set_raw(key, &content)
    }
}
