//! SQLite-backed local durable store.
//!
//! # Responsibility
//! - Persist whole `SyncData` blobs under a namespaced key.
//! - Persist small local-only values (scroll position, recent list) by raw key.
//!
//! # Invariants
//! - `SyncData` keys are always stored with [`STATE_KEY_PREFIX`].
//! - Failures are logged and swallowed; corrupt rows read as absent.

use crate::db::{open_db, open_db_in_memory, DbResult};
use crate::logging::error_summary;
use crate::model::now_epoch_ms;
use crate::model::sync_data::SyncData;
use crate::store::StateTier;
use async_trait::async_trait;
use log::{debug, warn};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Namespace for session state rows.
pub const STATE_KEY_PREFIX: &str = "spr_state_";

pub struct LocalStore {
    conn: Mutex<Connection>,
}

impl LocalStore {
    /// Opens (or creates) the store at `path`.
    pub fn open(path: impl AsRef<Path>) -> DbResult<Self> {
        Ok(Self::from_connection(open_db(path)?))
    }

    pub fn in_memory() -> DbResult<Self> {
        Ok(Self::from_connection(open_db_in_memory()?))
    }

    /// Wraps a connection that already went through migrations.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Writes `data` for `key`. Errors are logged, never returned.
    pub fn save(&self, key: &str, data: &SyncData) {
        let payload = match serde_json::to_string(data) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(
                    "event=local_save module=store status=error key={key} error_code=serialize_failed error={}",
                    error_summary(&err)
                );
                return;
            }
        };
        match self.write_payload(&state_key(key), &payload) {
            Ok(()) => debug!(
                "event=local_save module=store status=ok key={key} bytes={}",
                payload.len()
            ),
            Err(err) => warn!(
                "event=local_save module=store status=error key={key} error_code=write_failed error={}",
                error_summary(&err)
            ),
        }
    }

    /// Reads state for `key`; missing or unparsable rows yield `None`.
    pub fn load(&self, key: &str) -> Option<SyncData> {
        let payload = self.read_payload(&state_key(key))?;
        match serde_json::from_str(&payload) {
            Ok(data) => Some(data),
            Err(err) => {
                warn!(
                    "event=local_load module=store status=error key={key} error_code=corrupt_payload error={}",
                    error_summary(&err)
                );
                None
            }
        }
    }

    pub fn clear(&self, key: &str) {
        self.remove_raw(&state_key(key));
    }

    /// Stores an un-namespaced local-only value.
    pub fn save_raw(&self, key: &str, value: &str) {
        if let Err(err) = self.write_payload(key, value) {
            warn!(
                "event=local_save_raw module=store status=error key={key} error={}",
                error_summary(&err)
            );
        }
    }

    pub fn load_raw(&self, key: &str) -> Option<String> {
        self.read_payload(key)
    }

    pub fn remove_raw(&self, key: &str) {
        let result = self
            .lock()
            .execute("DELETE FROM local_state WHERE storage_key = ?1;", params![key]);
        if let Err(err) = result {
            warn!(
                "event=local_remove module=store status=error key={key} error={}",
                error_summary(&err)
            );
        }
    }

    fn write_payload(&self, storage_key: &str, payload: &str) -> rusqlite::Result<()> {
        self.lock().execute(
            "INSERT INTO local_state (storage_key, payload, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(storage_key) DO UPDATE SET
                payload = excluded.payload,
                updated_at = excluded.updated_at;",
            params![storage_key, payload, now_epoch_ms()],
        )?;
        Ok(())
    }

    fn read_payload(&self, storage_key: &str) -> Option<String> {
        let result = self
            .lock()
            .query_row(
                "SELECT payload FROM local_state WHERE storage_key = ?1;",
                params![storage_key],
                |row| row.get::<_, String>(0),
            )
            .optional();
        match result {
            Ok(payload) => payload,
            Err(err) => {
                warn!(
                    "event=local_read module=store status=error key={storage_key} error={}",
                    error_summary(&err)
                );
                None
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        // A panic mid-statement leaves the connection usable.
        self.conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn state_key(key: &str) -> String {
    format!("{STATE_KEY_PREFIX}{key}")
}

#[async_trait]
impl StateTier for LocalStore {
    fn tier_name(&self) -> &'static str {
        "local"
    }

    async fn read(&self, key: &str) -> Option<SyncData> {
        self.load(key)
    }

    async fn warm(&self, key: &str, data: &SyncData) {
        self.save(key, data);
    }
}
