//! State-persistence and service-wiring core for the note editor.
//! Every persisted UI entity flows through a keyed store, a persistent model
//! and a repository owned by the service registry.

pub mod bootstrap;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod registry;
pub mod repo;
pub mod store;

pub use bootstrap::{open_store, start, start_global, StartupError};
pub use config::{CoreConfig, StorageLocation};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::persistent::{
    merge_record, LoadOutcome, ModelData, ModelError, PersistentModel, SubscriptionId,
};
pub use registry::app::{app_registry, AppServices};
pub use registry::{
    global, install_global, RegistryError, RegistryResult, ServiceContext, ServiceRegistry,
};
pub use repo::collapsible_repo::{CollapsibleData, CollapsibleRepository};
pub use repo::favorites_repo::{FavoritesData, FavoritesRepository};
pub use repo::settings_repo::{SettingsData, SettingsRepository, UiMode};
pub use repo::sidebar_repo::{SidebarData, SidebarRepository};
pub use repo::workspace_repo::{NoteReference, Tab, WorkspaceData, WorkspaceRepository};
pub use repo::PersistentRepository;
pub use store::{KeyedStore, MemoryKeyedStore, SqliteKeyedStore, StoreError, StoreResult};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
