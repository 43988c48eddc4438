//! Process startup: open the store, wire services, build eagerly.
//!
//! # Invariants
//! - Wiring errors surface here, before any UI reads a service.

use crate::config::{CoreConfig, StorageLocation};
use crate::logging::{init_logging, LoggingError};
use crate::registry::app::app_registry;
use crate::registry::{install_global, RegistryError, ServiceRegistry};
use crate::store::{KeyedStore, MemoryKeyedStore, SqliteKeyedStore, StoreError, StoreResult};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::rc::Rc;

/// Fatal startup failures.
#[derive(Debug)]
pub enum StartupError {
    Logging(LoggingError),
    Store(StoreError),
    Registry(RegistryError),
}

impl Display for StartupError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Logging(err) => write!(f, "{err}"),
            Self::Store(err) => write!(f, "{err}"),
            Self::Registry(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StartupError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Logging(err) => Some(err),
            Self::Store(err) => Some(err),
            Self::Registry(err) => Some(err),
        }
    }
}

impl From<LoggingError> for StartupError {
    fn from(value: LoggingError) -> Self {
        Self::Logging(value)
    }
}

impl From<StoreError> for StartupError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<RegistryError> for StartupError {
    fn from(value: RegistryError) -> Self {
        Self::Registry(value)
    }
}

/// Opens the keyed store backend named by `location`.
pub fn open_store(location: &StorageLocation) -> StoreResult<Rc<dyn KeyedStore>> {
    match location {
        StorageLocation::File(path) => Ok(Rc::new(SqliteKeyedStore::open(path)?)),
        StorageLocation::Memory => Ok(Rc::new(MemoryKeyedStore::new())),
    }
}

/// Starts logging (when configured), opens the store and builds every
/// application service.
pub fn start(config: &CoreConfig) -> Result<ServiceRegistry, StartupError> {
    if let Some(log_dir) = &config.log_dir {
        init_logging(&config.log_level, &log_dir.to_string_lossy())?;
    }

    let store = open_store(&config.storage)?;
    let registry = app_registry(store)?;
    registry.initialize()?;

    info!(
        "event=startup module=bootstrap status=ok storage={} services={}",
        storage_label(&config.storage),
        registry.service_names().len()
    );
    Ok(registry)
}

/// [`start`], then installs the registry for the current thread.
pub fn start_global(config: &CoreConfig) -> Result<Rc<ServiceRegistry>, StartupError> {
    let registry = start(config)?;
    Ok(install_global(registry)?)
}

fn storage_label(location: &StorageLocation) -> &'static str {
    match location {
        StorageLocation::File(_) => "file",
        StorageLocation::Memory => "memory",
    }
}

#[cfg(test)]
mod tests {
    use super::{open_store, start, start_global, StartupError};
    use crate::config::{CoreConfig, StorageLocation};
    use crate::registry::app::AppServices;
    use crate::registry::{global, RegistryError};

    #[test]
    fn start_builds_all_services_eagerly() {
        let registry = start(&CoreConfig::in_memory()).expect("startup");
        assert!(registry.is_ready());
        assert!(registry.when_ready(|r| r.settings().is_ok(), false));
    }

    #[test]
    fn file_storage_opens_sqlite_store() {
        let dir = tempfile::tempdir().expect("temp dir");
        let location = StorageLocation::File(dir.path().join("state.sqlite3"));
        let store = open_store(&location).expect("open file store");
        store.write("Sidebar", b"{}").expect("write");
        assert!(store.exists("Sidebar"));
    }

    #[test]
    fn start_global_refuses_second_install() {
        std::thread::spawn(|| {
            let first = start_global(&CoreConfig::in_memory()).expect("first start");
            let again = start_global(&CoreConfig::in_memory()).expect_err("second start");
            assert!(matches!(
                again,
                StartupError::Registry(RegistryError::AlreadyInstalled)
            ));
            let installed = global().expect("installed");
            assert!(std::rc::Rc::ptr_eq(&first, &installed));
        })
        .join()
        .expect("startup thread");
    }
}
