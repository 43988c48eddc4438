//! SQLite-backed keyed store.
//!
//! # Invariants
//! - Records live in `kv_records`; writes are single-statement upserts.
//! - The wrapped connection must be migrated to the latest schema version.

use super::{
    log_event, read_event, remove_event, validate_key, write_event, KeyedStore, StoreError,
    StoreResult,
};
use crate::db::migrations::latest_version;
use crate::db::{open_db, open_db_in_memory};
use log::warn;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

const BACKEND: &str = "sqlite";

/// Keyed store persisting records into the state database.
pub struct SqliteKeyedStore {
    conn: Connection,
}

impl SqliteKeyedStore {
    /// Wraps an already-migrated connection.
    ///
    /// # Errors
    /// - `UninitializedConnection` when `PRAGMA user_version` is behind.
    pub fn try_new(conn: Connection) -> StoreResult<Self> {
        let actual_version =
            conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
        let expected_version = latest_version();
        if actual_version != expected_version {
            return Err(StoreError::UninitializedConnection {
                expected_version,
                actual_version,
            });
        }
        Ok(Self { conn })
    }

    /// Opens (or creates) the state database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::try_new(open_db(path)?)
    }

    /// Opens a throwaway in-memory state database.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::try_new(open_db_in_memory()?)
    }

}

impl KeyedStore for SqliteKeyedStore {
    fn read(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        validate_key(key)?;
        let value = self
            .conn
            .query_row(
                "SELECT value FROM kv_records WHERE key = ?1;",
                [key],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()?;
        log_event(read_event(BACKEND, key, value.is_some()));
        Ok(value)
    }

    fn write(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        validate_key(key)?;
        self.conn.execute(
            "INSERT INTO kv_records (key, value, updated_at)
             VALUES (?1, ?2, (strftime('%s', 'now') * 1000))
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at;",
            params![key, value],
        )?;
        log_event(write_event(BACKEND, key, value.len()));
        Ok(())
    }

    fn exists(&self, key: &str) -> bool {
        if validate_key(key).is_err() {
            return false;
        }
        let result = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM kv_records WHERE key = ?1);",
            [key],
            |row| row.get::<_, i64>(0),
        );
        match result {
            Ok(found) => found == 1,
            Err(err) => {
                warn!(
                    "event=store_exists module=store status=error backend={} key={} error={}",
                    BACKEND, key, err
                );
                false
            }
        }
    }

    fn remove(&self, key: &str) -> StoreResult<bool> {
        validate_key(key)?;
        let changed = self
            .conn
            .execute("DELETE FROM kv_records WHERE key = ?1;", [key])?;
        log_event(remove_event(BACKEND, key, changed > 0));
        Ok(changed > 0)
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key FROM kv_records ORDER BY key ASC;")?;
        let mut rows = stmt.query([])?;
        let mut keys = Vec::new();
        while let Some(row) = rows.next()? {
            keys.push(row.get(0)?);
        }
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::SqliteKeyedStore;
    use crate::store::{KeyedStore, StoreError};
    use rusqlite::Connection;

    #[test]
    fn missing_key_reads_as_none() {
        let store = SqliteKeyedStore::open_in_memory().expect("open store");
        assert_eq!(store.read("Settings").expect("read"), None);
        assert!(!store.exists("Settings"));
    }

    #[test]
    fn write_replaces_previous_value() {
        let store = SqliteKeyedStore::open_in_memory().expect("open store");
        store.write("Sidebar", b"{\"isOpen\":true}").expect("first write");
        store.write("Sidebar", b"{\"isOpen\":false}").expect("second write");

        let stored = store.read("Sidebar").expect("read").expect("record exists");
        assert_eq!(stored, b"{\"isOpen\":false}".to_vec());
        assert_eq!(store.keys().expect("keys"), vec!["Sidebar".to_string()]);
    }

    #[test]
    fn remove_reports_whether_record_existed() {
        let store = SqliteKeyedStore::open_in_memory().expect("open store");
        store.write("Favorites", b"{}").expect("write");
        assert!(store.remove("Favorites").expect("remove existing"));
        assert!(!store.remove("Favorites").expect("remove missing"));
        assert!(!store.exists("Favorites"));
    }

    #[test]
    fn rejects_unmigrated_connection() {
        let conn = Connection::open_in_memory().expect("raw connection");
        let err = SqliteKeyedStore::try_new(conn)
            .err()
            .expect("unmigrated connection must be rejected");
        assert!(matches!(
            err,
            StoreError::UninitializedConnection {
                actual_version: 0,
                ..
            }
        ));
    }
}
