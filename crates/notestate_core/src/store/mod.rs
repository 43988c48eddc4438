//! Keyed record storage boundary.
//!
//! # Responsibility
//! - Define the byte-level key-value contract used by persistent models.
//! - Keep backend details (SQLite, in-memory) behind one trait.
//!
//! # Invariants
//! - A missing key is `Ok(None)`, never an error.
//! - Backend failures are returned as `StoreError`; implementations never panic.
//! - Keys are non-blank; one key backs exactly one entity type.

use crate::db::DbError;
use log::debug;
use std::error::Error;
use std::fmt::{Display, Formatter};

mod memory_store;
mod sqlite_store;

pub use memory_store::MemoryKeyedStore;
pub use sqlite_store::SqliteKeyedStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors reported by keyed store backends.
#[derive(Debug)]
pub enum StoreError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Key is empty or whitespace only.
    InvalidKey(String),
    /// Write would exceed the configured backend quota.
    QuotaExceeded {
        key: String,
        required: usize,
        quota: usize,
    },
    /// Backend refused the write.
    WriteRejected(String),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidKey(key) => write!(f, "invalid store key: `{key}`"),
            Self::QuotaExceeded {
                key,
                required,
                quota,
            } => write!(
                f,
                "store quota exceeded writing `{key}`: {required} bytes required, quota is {quota}"
            ),
            Self::WriteRejected(message) => write!(f, "store write rejected: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "keyed store requires schema version {expected_version}, got {actual_version}"
            ),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Byte-level key-value persistence contract.
///
/// All methods take `&self`; backends use interior mutability because the
/// store is shared by every model on the UI thread.
pub trait KeyedStore {
    /// Reads the raw record bytes for `key`. Absence is `Ok(None)`.
    fn read(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;
    /// Replaces the record for `key` with `value`.
    fn write(&self, key: &str, value: &[u8]) -> StoreResult<()>;
    /// Returns whether a record exists for `key`. Backend failures read as `false`.
    fn exists(&self, key: &str) -> bool;
    /// Deletes the record for `key`; returns whether one existed.
    fn remove(&self, key: &str) -> StoreResult<bool>;
    /// Lists stored keys in ascending order.
    fn keys(&self) -> StoreResult<Vec<String>>;
}

pub(crate) fn validate_key(key: &str) -> StoreResult<()> {
    if key.trim().is_empty() {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// Record-level `store_*` events shared by every backend.
pub(crate) fn read_event(backend: &str, key: &str, found: bool) -> String {
    format!("event=store_read module=store status=ok backend={backend} key={key} found={found}")
}

pub(crate) fn write_event(backend: &str, key: &str, bytes: usize) -> String {
    format!("event=store_write module=store status=ok backend={backend} key={key} bytes={bytes}")
}

pub(crate) fn remove_event(backend: &str, key: &str, removed: bool) -> String {
    format!(
        "event=store_remove module=store status=ok backend={backend} key={key} removed={removed}"
    )
}

pub(crate) fn log_event(event: String) {
    debug!("{event}");
}
