//! Application settings repository.
//!
//! # Invariants
//! - Stored under `"Settings"` with camelCase field names.
//! - `debug_level` stays within `0..=MAX_DEBUG_LEVEL`.

use crate::model::persistent::{ModelData, PersistentModel};
use crate::repo::{reject_call, PersistentRepository};
use crate::store::KeyedStore;
use serde::{Deserialize, Serialize};
use std::rc::Rc;

pub const SETTINGS_KEY: &str = "Settings";
pub const MAX_DEBUG_LEVEL: i64 = 5;

/// Color scheme preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UiMode {
    Light,
    Dark,
    /// Follow the operating system preference.
    System,
}

impl UiMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
            Self::System => "system",
        }
    }

    /// Parses the stored string form. Input is trimmed, case-sensitive.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "light" => Some(Self::Light),
            "dark" => Some(Self::Dark),
            "system" => Some(Self::System),
            _ => None,
        }
    }
}

/// Persisted settings record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsData {
    pub ui_mode: UiMode,
    pub show_editor_toolbar: bool,
    pub sidebar_is_locked: bool,
    pub show_metadata: bool,
    pub debug_level: i64,
    /// Whether open tabs survive a restart.
    pub keep_tabs: bool,
}

impl ModelData for SettingsData {
    const STORAGE_KEY: &'static str = SETTINGS_KEY;

    fn default_data() -> Self {
        Self {
            ui_mode: UiMode::System,
            show_editor_toolbar: true,
            sidebar_is_locked: false,
            show_metadata: true,
            debug_level: 0,
            keep_tabs: true,
        }
    }
}

/// Settings state owned by the service registry.
pub struct SettingsRepository {
    model: PersistentModel<SettingsData>,
}

impl SettingsRepository {
    /// Loads settings; an out-of-range stored `debugLevel` is clamped and
    /// written back.
    pub fn new(store: Rc<dyn KeyedStore>) -> Self {
        let mut settings = Self {
            model: PersistentModel::load(store),
        };
        let stored = settings.debug_level();
        if !(0..=MAX_DEBUG_LEVEL).contains(&stored) {
            settings.set_debug_level(stored);
        }
        settings
    }

    pub fn ui_mode(&self) -> UiMode {
        self.model.data().ui_mode
    }

    pub fn show_editor_toolbar(&self) -> bool {
        self.model.data().show_editor_toolbar
    }

    pub fn sidebar_is_locked(&self) -> bool {
        self.model.data().sidebar_is_locked
    }

    pub fn show_metadata(&self) -> bool {
        self.model.data().show_metadata
    }

    pub fn debug_level(&self) -> i64 {
        self.model.data().debug_level
    }

    pub fn keep_tabs(&self) -> bool {
        self.model.data().keep_tabs
    }

    pub fn set_ui_mode(&mut self, mode: UiMode) {
        self.model.update(|data| data.ui_mode = mode);
    }

    pub fn set_show_editor_toolbar(&mut self, value: bool) {
        self.model.update(|data| data.show_editor_toolbar = value);
    }

    pub fn set_sidebar_is_locked(&mut self, value: bool) {
        self.model.update(|data| data.sidebar_is_locked = value);
    }

    pub fn set_show_metadata(&mut self, value: bool) {
        self.model.update(|data| data.show_metadata = value);
    }

    /// Sets the diagnostics verbosity, clamped to `0..=MAX_DEBUG_LEVEL`.
    pub fn set_debug_level(&mut self, level: i64) {
        let clamped = level.clamp(0, MAX_DEBUG_LEVEL);
        if clamped != level {
            reject_call(
                "settings",
                "set_debug_level",
                &level.to_string(),
                "out_of_range_clamped",
            );
        }
        self.model.update(|data| data.debug_level = clamped);
    }

    pub fn set_keep_tabs(&mut self, value: bool) {
        self.model.update(|data| data.keep_tabs = value);
    }

    /// Resolves the effective dark-mode flag for the current `ui_mode`.
    pub fn resolve_dark(&self, system_prefers_dark: bool) -> bool {
        match self.ui_mode() {
            UiMode::Light => false,
            UiMode::Dark => true,
            UiMode::System => system_prefers_dark,
        }
    }
}

impl PersistentRepository for SettingsRepository {
    type Data = SettingsData;

    fn model(&self) -> &PersistentModel<SettingsData> {
        &self.model
    }

    fn model_mut(&mut self) -> &mut PersistentModel<SettingsData> {
        &mut self.model
    }
}

#[cfg(test)]
mod tests {
    use super::{SettingsRepository, UiMode, MAX_DEBUG_LEVEL};
    use crate::store::{KeyedStore, MemoryKeyedStore};
    use std::rc::Rc;

    #[test]
    fn ui_mode_parses_stored_strings() {
        assert_eq!(UiMode::parse(" dark "), Some(UiMode::Dark));
        assert_eq!(UiMode::parse("system"), Some(UiMode::System));
        assert_eq!(UiMode::parse("Dark"), None);
        assert_eq!(UiMode::Light.as_str(), "light");
    }

    #[test]
    fn debug_level_is_clamped() {
        let mut settings = SettingsRepository::new(Rc::new(MemoryKeyedStore::new()));
        settings.set_debug_level(42);
        assert_eq!(settings.debug_level(), MAX_DEBUG_LEVEL);
        settings.set_debug_level(-3);
        assert_eq!(settings.debug_level(), 0);
    }

    #[test]
    fn stored_debug_level_is_clamped_on_load() {
        let store = Rc::new(MemoryKeyedStore::new());
        store
            .write("Settings", br#"{"debugLevel":99,"uiMode":"dark"}"#)
            .expect("seed settings");

        let settings = SettingsRepository::new(store.clone());
        assert_eq!(settings.debug_level(), MAX_DEBUG_LEVEL);
        assert_eq!(settings.ui_mode(), UiMode::Dark);

        let reloaded = SettingsRepository::new(store);
        assert_eq!(reloaded.debug_level(), MAX_DEBUG_LEVEL);
    }

    #[test]
    fn resolve_dark_follows_mode() {
        let mut settings = SettingsRepository::new(Rc::new(MemoryKeyedStore::new()));
        assert!(settings.resolve_dark(true));
        assert!(!settings.resolve_dark(false));
        settings.set_ui_mode(UiMode::Light);
        assert!(!settings.resolve_dark(true));
        settings.set_ui_mode(UiMode::Dark);
        assert!(settings.resolve_dark(false));
    }
}
