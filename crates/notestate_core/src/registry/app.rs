//! Application service wiring.
//!
//! Declares every state repository the editor shell reads at startup and
//! the typed accessors over them.

use crate::registry::{RegistryResult, ServiceRegistry};
use crate::repo::collapsible_repo::CollapsibleRepository;
use crate::repo::favorites_repo::FavoritesRepository;
use crate::repo::settings_repo::SettingsRepository;
use crate::repo::sidebar_repo::SidebarRepository;
use crate::repo::workspace_repo::WorkspaceRepository;
use crate::store::KeyedStore;
use std::cell::RefCell;
use std::rc::Rc;

pub const SETTINGS_SERVICE: &str = "settings";
pub const WORKSPACE_SERVICE: &str = "workspace";
pub const FAVORITES_SERVICE: &str = "favorites";
pub const COLLAPSIBLE_SERVICE: &str = "collapsible";
pub const SIDEBAR_SERVICE: &str = "sidebar";

/// Builds the application registry over one shared store.
///
/// Workspace depends on settings: its restore policy reads `keep_tabs`.
pub fn app_registry(store: Rc<dyn KeyedStore>) -> RegistryResult<ServiceRegistry> {
    let mut registry = ServiceRegistry::new(store);

    registry.register_model(SETTINGS_SERVICE, &[], |ctx| {
        Ok(SettingsRepository::new(ctx.store()))
    })?;
    registry.register_model(WORKSPACE_SERVICE, &[SETTINGS_SERVICE], |ctx| {
        let keep_tabs = ctx
            .dependency::<SettingsRepository>(SETTINGS_SERVICE)?
            .borrow()
            .keep_tabs();
        Ok(WorkspaceRepository::new(ctx.store(), keep_tabs))
    })?;
    registry.register_model(FAVORITES_SERVICE, &[], |ctx| {
        Ok(FavoritesRepository::new(ctx.store()))
    })?;
    registry.register_model(COLLAPSIBLE_SERVICE, &[], |ctx| {
        Ok(CollapsibleRepository::new(ctx.store()))
    })?;
    registry.register_model(SIDEBAR_SERVICE, &[], |ctx| {
        Ok(SidebarRepository::new(ctx.store()))
    })?;

    Ok(registry)
}

/// Typed accessors for the services declared by [`app_registry`].
pub trait AppServices {
    fn settings(&self) -> RegistryResult<Rc<RefCell<SettingsRepository>>>;
    fn workspace(&self) -> RegistryResult<Rc<RefCell<WorkspaceRepository>>>;
    fn favorites(&self) -> RegistryResult<Rc<RefCell<FavoritesRepository>>>;
    fn collapsible(&self) -> RegistryResult<Rc<RefCell<CollapsibleRepository>>>;
    fn sidebar(&self) -> RegistryResult<Rc<RefCell<SidebarRepository>>>;
}

impl AppServices for ServiceRegistry {
    fn settings(&self) -> RegistryResult<Rc<RefCell<SettingsRepository>>> {
        self.get_model(SETTINGS_SERVICE)
    }

    fn workspace(&self) -> RegistryResult<Rc<RefCell<WorkspaceRepository>>> {
        self.get_model(WORKSPACE_SERVICE)
    }

    fn favorites(&self) -> RegistryResult<Rc<RefCell<FavoritesRepository>>> {
        self.get_model(FAVORITES_SERVICE)
    }

    fn collapsible(&self) -> RegistryResult<Rc<RefCell<CollapsibleRepository>>> {
        self.get_model(COLLAPSIBLE_SERVICE)
    }

    fn sidebar(&self) -> RegistryResult<Rc<RefCell<SidebarRepository>>> {
        self.get_model(SIDEBAR_SERVICE)
    }
}

#[cfg(test)]
mod tests {
    use super::{app_registry, AppServices, SETTINGS_SERVICE, WORKSPACE_SERVICE};
    use crate::store::MemoryKeyedStore;
    use std::rc::Rc;

    #[test]
    fn settings_builds_before_workspace() {
        let registry = app_registry(Rc::new(MemoryKeyedStore::new())).expect("wiring");
        let order = registry.construction_order().expect("acyclic");
        let settings_at = order.iter().position(|name| name == SETTINGS_SERVICE);
        let workspace_at = order.iter().position(|name| name == WORKSPACE_SERVICE);
        assert!(settings_at < workspace_at);
        assert_eq!(order.len(), 5);
    }

    #[test]
    fn first_lookup_builds_everything_and_returns_shared_instances() {
        let registry = app_registry(Rc::new(MemoryKeyedStore::new())).expect("wiring");
        assert!(!registry.is_ready());

        let first = registry.favorites().expect("favorites");
        assert!(registry.is_ready());
        let second = registry.favorites().expect("favorites again");
        assert!(Rc::ptr_eq(&first, &second));

        first.borrow_mut().add_to_favorites("note-1");
        assert!(second.borrow().is_favorite("note-1"));
    }
}
