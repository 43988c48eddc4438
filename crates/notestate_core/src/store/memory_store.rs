//! In-memory keyed store.
//!
//! Uses `RefCell` because all state access happens on the UI thread.
//! An optional byte quota models size-limited local storage backends.

use super::{
    log_event, read_event, remove_event, validate_key, write_event, KeyedStore, StoreError,
    StoreResult,
};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

const BACKEND: &str = "memory";

/// Ephemeral keyed store for tests and storage-less sessions.
#[derive(Debug, Default)]
pub struct MemoryKeyedStore {
    records: RefCell<BTreeMap<String, Vec<u8>>>,
    quota_bytes: Option<usize>,
    reject_writes: Cell<bool>,
}

impl MemoryKeyedStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store whose total stored bytes may not exceed `quota_bytes`.
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            quota_bytes: Some(quota_bytes),
            ..Self::default()
        }
    }

    /// Makes every subsequent write fail until switched off again.
    pub fn set_reject_writes(&self, reject: bool) {
        self.reject_writes.set(reject);
    }

    /// Total bytes currently stored across all records.
    pub fn used_bytes(&self) -> usize {
        self.records.borrow().values().map(Vec::len).sum()
    }

    fn check_quota(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        let Some(quota) = self.quota_bytes else {
            return Ok(());
        };
        let records = self.records.borrow();
        let others: usize = records
            .iter()
            .filter(|(existing, _)| existing.as_str() != key)
            .map(|(_, bytes)| bytes.len())
            .sum();
        let required = others + value.len();
        if required > quota {
            return Err(StoreError::QuotaExceeded {
                key: key.to_string(),
                required,
                quota,
            });
        }
        Ok(())
    }
}

impl KeyedStore for MemoryKeyedStore {
    fn read(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        validate_key(key)?;
        let value = self.records.borrow().get(key).cloned();
        log_event(read_event(BACKEND, key, value.is_some()));
        Ok(value)
    }

    fn write(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        validate_key(key)?;
        if self.reject_writes.get() {
            return Err(StoreError::WriteRejected(format!(
                "writes disabled for `{key}`"
            )));
        }
        self.check_quota(key, value)?;
        self.records
            .borrow_mut()
            .insert(key.to_string(), value.to_vec());
        log_event(write_event(BACKEND, key, value.len()));
        Ok(())
    }

    fn exists(&self, key: &str) -> bool {
        self.records.borrow().contains_key(key)
    }

    fn remove(&self, key: &str) -> StoreResult<bool> {
        validate_key(key)?;
        let removed = self.records.borrow_mut().remove(key).is_some();
        log_event(remove_event(BACKEND, key, removed));
        Ok(removed)
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        Ok(self.records.borrow().keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryKeyedStore;
    use crate::store::{KeyedStore, StoreError};

    #[test]
    fn quota_counts_replacement_not_accumulation() {
        let store = MemoryKeyedStore::with_quota(8);
        store.write("a", b"12345678").expect("fits exactly");
        store.write("a", b"87654321").expect("replacement fits");
        assert_eq!(store.used_bytes(), 8);

        let err = store.write("b", b"x").expect_err("second key overflows");
        assert!(matches!(err, StoreError::QuotaExceeded { required: 9, .. }));
        assert!(!store.exists("b"));
    }

    #[test]
    fn rejected_writes_leave_previous_value() {
        let store = MemoryKeyedStore::new();
        store.write("Settings", b"old").expect("write");
        store.set_reject_writes(true);
        assert!(matches!(
            store.write("Settings", b"new"),
            Err(StoreError::WriteRejected(_))
        ));
        assert_eq!(
            store.read("Settings").expect("read"),
            Some(b"old".to_vec())
        );
    }
}
