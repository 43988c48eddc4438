//! Startup configuration.
//!
//! # Responsibility
//! - Resolve where state is stored and how verbose logging is.
//!
//! # Invariants
//! - Resolution never fails: unset or blank variables fall back to defaults.

use crate::logging::default_log_level;
use std::path::PathBuf;

pub const DB_PATH_ENV: &str = "NOTESTATE_DB_PATH";
pub const LOG_LEVEL_ENV: &str = "NOTESTATE_LOG_LEVEL";
pub const LOG_DIR_ENV: &str = "NOTESTATE_LOG_DIR";
pub const MEMORY_STORAGE_VALUE: &str = ":memory:";
pub const DEFAULT_DB_FILE_NAME: &str = "notestate.sqlite3";

/// Backend the keyed store is opened on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageLocation {
    File(PathBuf),
    Memory,
}

impl Default for StorageLocation {
    fn default() -> Self {
        Self::File(std::env::temp_dir().join(DEFAULT_DB_FILE_NAME))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub storage: StorageLocation,
    pub log_level: String,
    /// File logging is skipped when unset.
    pub log_dir: Option<PathBuf>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            storage: StorageLocation::default(),
            log_level: default_log_level().to_string(),
            log_dir: None,
        }
    }
}

impl CoreConfig {
    /// In-memory store, no file logging.
    pub fn in_memory() -> Self {
        Self {
            storage: StorageLocation::Memory,
            ..Self::default()
        }
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolves configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let value = |name: &str| {
            lookup(name)
                .map(|raw| raw.trim().to_string())
                .filter(|raw| !raw.is_empty())
        };

        let storage = match value(DB_PATH_ENV) {
            Some(raw) if raw == MEMORY_STORAGE_VALUE => StorageLocation::Memory,
            Some(raw) => StorageLocation::File(PathBuf::from(raw)),
            None => StorageLocation::default(),
        };

        Self {
            storage,
            log_level: value(LOG_LEVEL_ENV).unwrap_or_else(|| default_log_level().to_string()),
            log_dir: value(LOG_DIR_ENV).map(PathBuf::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CoreConfig, StorageLocation, DB_PATH_ENV, LOG_DIR_ENV, LOG_LEVEL_ENV};
    use crate::logging::default_log_level;
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn unset_variables_use_defaults() {
        let config = CoreConfig::from_lookup(lookup(&[]));
        assert_eq!(config, CoreConfig::default());
        assert_eq!(config.log_level, default_log_level());
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn explicit_values_are_trimmed_and_applied() {
        let config = CoreConfig::from_lookup(lookup(&[
            (DB_PATH_ENV, " /tmp/state.sqlite3 "),
            (LOG_LEVEL_ENV, "warn"),
            (LOG_DIR_ENV, "/tmp/logs"),
        ]));
        assert_eq!(
            config.storage,
            StorageLocation::File(PathBuf::from("/tmp/state.sqlite3"))
        );
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.log_dir, Some(PathBuf::from("/tmp/logs")));
    }

    #[test]
    fn memory_marker_selects_memory_storage() {
        let config = CoreConfig::from_lookup(lookup(&[(DB_PATH_ENV, ":memory:")]));
        assert_eq!(config.storage, StorageLocation::Memory);

        let blank = CoreConfig::from_lookup(lookup(&[(DB_PATH_ENV, "   ")]));
        assert_eq!(blank.storage, StorageLocation::default());
    }
}
