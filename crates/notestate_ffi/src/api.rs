//! FFI controller API for Flutter-facing state calls.
//!
//! # Responsibility
//! - Expose UI-level state operations to Dart via FRB.
//! - Start the service registry lazily on the calling (UI) thread.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - Failures are reported through response envelopes, never thrown.
//! - The state DB path is fixed once the first service is built.

use notestate_core::config::MEMORY_STORAGE_VALUE;
use notestate_core::{
    core_version as core_version_inner, global, init_logging as init_logging_inner,
    ping as ping_inner, start_global, AppServices, CoreConfig, PersistentRepository,
    ServiceRegistry, StorageLocation, UiMode,
};
use log::error;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::OnceLock;

static STATE_DB_PATH: OnceLock<PathBuf> = OnceLock::new();

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir`.
/// - Returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err.to_string(),
    }
}

/// Generic action response envelope for state commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateActionResponse {
    /// Whether the command was applied.
    pub ok: bool,
    /// Human-readable response message for diagnostics/UI.
    pub message: String,
}

impl StateActionResponse {
    fn success(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
        }
    }

    fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
        }
    }
}

/// Response for commands that focus a tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TabActionResponse {
    pub ok: bool,
    /// Focused tab id on success.
    pub tab_id: Option<String>,
    pub message: String,
}

/// Flat copy of the persisted settings record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingsSnapshot {
    /// `light|dark|system`.
    pub ui_mode: String,
    pub show_editor_toolbar: bool,
    pub sidebar_is_locked: bool,
    pub show_metadata: bool,
    pub debug_level: i64,
    pub keep_tabs: bool,
}

/// Pins the state DB file used when services start.
///
/// `:memory:` selects a process-local, non-persistent store.
///
/// # FFI contract
/// - Must run before the first state call; once services start, their
///   storage is pinned and a different path is rejected.
/// - Repeating the already configured path is accepted.
#[flutter_rust_bridge::frb(sync)]
pub fn configure_state_db_path(path: String) -> StateActionResponse {
    pin_state_db_path(&STATE_DB_PATH, &path)
}

/// Whether the services on the calling thread finished building.
#[flutter_rust_bridge::frb(sync)]
pub fn services_ready() -> bool {
    global().is_some_and(|registry| registry.is_ready())
}

/// Returns current settings, or `None` when services cannot start.
#[flutter_rust_bridge::frb(sync)]
pub fn settings_snapshot() -> Option<SettingsSnapshot> {
    with_services(|services| {
        let settings = services.settings().map_err(|err| err.to_string())?;
        let data = settings.borrow().snapshot();
        Ok(SettingsSnapshot {
            ui_mode: data.ui_mode.as_str().to_string(),
            show_editor_toolbar: data.show_editor_toolbar,
            sidebar_is_locked: data.sidebar_is_locked,
            show_metadata: data.show_metadata,
            debug_level: data.debug_level,
            keep_tabs: data.keep_tabs,
        })
    })
    .ok()
}

#[flutter_rust_bridge::frb(sync)]
pub fn settings_set_ui_mode(mode: String) -> StateActionResponse {
    let Some(mode) = UiMode::parse(&mode) else {
        return StateActionResponse::failure(format!(
            "unsupported ui mode `{}`; expected light|dark|system",
            mode.trim()
        ));
    };
    action(|services| {
        services
            .settings()
            .map_err(|err| err.to_string())?
            .borrow_mut()
            .set_ui_mode(mode);
        Ok("UI mode updated.".to_string())
    })
}

/// Takes effect for tab restore on the next process start.
#[flutter_rust_bridge::frb(sync)]
pub fn settings_set_keep_tabs(keep_tabs: bool) -> StateActionResponse {
    action(|services| {
        services
            .settings()
            .map_err(|err| err.to_string())?
            .borrow_mut()
            .set_keep_tabs(keep_tabs);
        Ok("Keep-tabs preference updated.".to_string())
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn settings_reset() -> StateActionResponse {
    action(|services| {
        services
            .settings()
            .map_err(|err| err.to_string())?
            .borrow_mut()
            .reset_to_defaults();
        Ok("Settings reset.".to_string())
    })
}

/// Favorite note ids in insertion order; empty when services cannot start.
#[flutter_rust_bridge::frb(sync)]
pub fn favorites_list() -> Vec<String> {
    with_services(|services| {
        let favorites = services.favorites().map_err(|err| err.to_string())?;
        let ids = favorites.borrow().get_favorites().to_vec();
        Ok(ids)
    })
    .unwrap_or_default()
}

#[flutter_rust_bridge::frb(sync)]
pub fn favorites_toggle(note_id: String) -> StateActionResponse {
    let note_id = note_id.trim().to_string();
    if note_id.is_empty() {
        return StateActionResponse::failure("note_id cannot be empty");
    }
    action(|services| {
        let favorites = services.favorites().map_err(|err| err.to_string())?;
        let is_favorite = favorites.borrow_mut().toggle_favorite(&note_id);
        Ok(if is_favorite {
            "Added to favorites.".to_string()
        } else {
            "Removed from favorites.".to_string()
        })
    })
}

#[flutter_rust_bridge::frb(sync)]
pub fn favorites_remove_many(note_ids: Vec<String>) -> StateActionResponse {
    let note_ids = to_id_set(note_ids);
    action(|services| {
        let favorites = services.favorites().map_err(|err| err.to_string())?;
        let removed = favorites.borrow_mut().remove_many(&note_ids);
        Ok(format!("Removed {removed} favorite(s)."))
    })
}

/// Drops favorites whose note no longer exists.
#[flutter_rust_bridge::frb(sync)]
pub fn favorites_cleanup_invalid(valid_note_ids: Vec<String>) -> StateActionResponse {
    let valid_note_ids = to_id_set(valid_note_ids);
    action(|services| {
        let favorites = services.favorites().map_err(|err| err.to_string())?;
        let removed = favorites.borrow_mut().cleanup_invalid(&valid_note_ids);
        Ok(format!("Removed {removed} invalid favorite(s)."))
    })
}

/// Focuses the tab for `note_id`, opening one when needed.
#[flutter_rust_bridge::frb(sync)]
pub fn workspace_open_note(note_id: String) -> TabActionResponse {
    let note_id = note_id.trim().to_string();
    if note_id.is_empty() {
        return TabActionResponse {
            ok: false,
            tab_id: None,
            message: "note_id cannot be empty".to_string(),
        };
    }
    let result = with_services(|services| {
        let workspace = services.workspace().map_err(|err| err.to_string())?;
        let tab_id = workspace.borrow_mut().open_note(&note_id);
        Ok(tab_id)
    });
    match result {
        Ok(tab_id) => TabActionResponse {
            ok: true,
            tab_id: Some(tab_id),
            message: "Note opened.".to_string(),
        },
        Err(err) => TabActionResponse {
            ok: false,
            tab_id: None,
            message: format!("workspace_open_note failed: {err}"),
        },
    }
}

#[flutter_rust_bridge::frb(sync)]
pub fn workspace_close_tab(tab_id: String) -> StateActionResponse {
    action(|services| {
        let workspace = services.workspace().map_err(|err| err.to_string())?;
        if workspace.borrow_mut().close_tab(tab_id.trim()) {
            Ok("Tab closed.".to_string())
        } else {
            Err(format!("unknown tab `{}`", tab_id.trim()))
        }
    })
}

/// Note shown by the active tab, if any.
#[flutter_rust_bridge::frb(sync)]
pub fn workspace_active_note_id() -> Option<String> {
    with_services(|services| {
        let workspace = services.workspace().map_err(|err| err.to_string())?;
        let note_id = workspace
            .borrow()
            .get_active_tab()
            .and_then(|tab| tab.note_id().map(str::to_string));
        Ok(note_id)
    })
    .ok()
    .flatten()
}

/// Note-deletion workflow: unfavorites the notes and closes their tabs.
#[flutter_rust_bridge::frb(sync)]
pub fn notes_deleted(note_ids: Vec<String>) -> StateActionResponse {
    let note_ids = to_id_set(note_ids);
    if note_ids.is_empty() {
        return StateActionResponse::success("Nothing to clean up.");
    }
    action(|services| {
        let favorites = services.favorites().map_err(|err| err.to_string())?;
        let workspace = services.workspace().map_err(|err| err.to_string())?;
        let unfavorited = favorites.borrow_mut().remove_many(&note_ids);
        let closed = workspace.borrow_mut().close_tabs_for_notes(&note_ids);
        Ok(format!(
            "Removed {unfavorited} favorite(s) and closed {closed} tab(s)."
        ))
    })
}

/// Registers a collapsible section; returns its effective state.
///
/// Returns `default_collapsed` when services cannot start.
#[flutter_rust_bridge::frb(sync)]
pub fn collapsible_register(id: String, default_collapsed: bool) -> bool {
    with_services(|services| {
        let collapsible = services.collapsible().map_err(|err| err.to_string())?;
        let collapsed = collapsible
            .borrow_mut()
            .register(id.trim(), default_collapsed);
        Ok(collapsed)
    })
    .unwrap_or(default_collapsed)
}

/// Flips a registered section; `None` for unknown ids.
#[flutter_rust_bridge::frb(sync)]
pub fn collapsible_toggle(id: String) -> Option<bool> {
    with_services(|services| {
        let collapsible = services.collapsible().map_err(|err| err.to_string())?;
        let collapsed = collapsible.borrow_mut().toggle(id.trim());
        Ok(collapsed)
    })
    .ok()
    .flatten()
}

/// Flips sidebar visibility and returns whether it is now open.
#[flutter_rust_bridge::frb(sync)]
pub fn sidebar_toggle() -> Option<bool> {
    with_services(|services| {
        let sidebar = services.sidebar().map_err(|err| err.to_string())?;
        let is_open = sidebar.borrow_mut().toggle();
        Ok(is_open)
    })
    .ok()
}

fn action(f: impl FnOnce(&ServiceRegistry) -> Result<String, String>) -> StateActionResponse {
    match with_services(f) {
        Ok(message) => StateActionResponse::success(message),
        Err(err) => StateActionResponse::failure(err),
    }
}

fn with_services<T>(
    f: impl FnOnce(&ServiceRegistry) -> Result<T, String>,
) -> Result<T, String> {
    let services = resolve_services()?;
    f(&services)
}

fn resolve_services() -> Result<Rc<ServiceRegistry>, String> {
    if let Some(services) = global() {
        return Ok(services);
    }
    start_global(&resolve_config()).map_err(|err| {
        error!("event=services_start module=ffi status=error error={err}");
        format!("state services failed to start: {err}")
    })
}

fn resolve_config() -> CoreConfig {
    resolve_config_in(&STATE_DB_PATH, CoreConfig::from_env())
}

// Starting services pins whatever storage they open, so a later
// `configure_state_db_path` with another path is rejected.
fn resolve_config_in(slot: &OnceLock<PathBuf>, mut config: CoreConfig) -> CoreConfig {
    let pinned = slot.get_or_init(|| match &config.storage {
        StorageLocation::File(path) => path.clone(),
        StorageLocation::Memory => PathBuf::from(MEMORY_STORAGE_VALUE),
    });
    config.storage = if pinned.as_os_str() == MEMORY_STORAGE_VALUE {
        StorageLocation::Memory
    } else {
        StorageLocation::File(pinned.clone())
    };
    config.log_dir = None;
    config
}

fn pin_state_db_path(slot: &OnceLock<PathBuf>, path: &str) -> StateActionResponse {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return StateActionResponse::failure("state DB path cannot be empty");
    }
    let requested = PathBuf::from(trimmed);
    let active = slot.get_or_init(|| requested.clone());
    if *active != requested {
        return StateActionResponse::failure(format!(
            "state DB path already set to `{}`",
            active.display()
        ));
    }
    StateActionResponse::success("State DB path configured.")
}

fn to_id_set(ids: Vec<String>) -> BTreeSet<String> {
    ids.into_iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .collect()
}
