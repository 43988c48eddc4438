//! Workspace tab repository.
//!
//! # Responsibility
//! - Persist open tabs and the active tab reference under `"Workspace"`.
//! - Answer tab lookups by tab id and by note id.
//!
//! # Invariants
//! - Tab ids are unique within `tabs`; duplicate inserts are rejected.
//! - `active_tab_id` is a soft reference: a dangling id reads as no active tab.
//! - Lookups are linear scans; tab counts are bounded by open documents.

use crate::model::persistent::{ModelData, PersistentModel};
use crate::repo::{reject_call, PersistentRepository};
use crate::store::KeyedStore;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::rc::Rc;
use uuid::Uuid;

pub const WORKSPACE_KEY: &str = "Workspace";

/// Note bound to a tab.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteReference {
    pub note_id: String,
}

/// One open document slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tab {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note_reference: Option<NoteReference>,
}

impl Tab {
    /// Creates an empty tab with a generated id.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            note_reference: None,
        }
    }

    /// Creates a tab bound to `note_id` with a generated id.
    pub fn for_note(note_id: impl Into<String>) -> Self {
        Self {
            note_reference: Some(NoteReference {
                note_id: note_id.into(),
            }),
            ..Self::new()
        }
    }

    pub fn note_id(&self) -> Option<&str> {
        self.note_reference
            .as_ref()
            .map(|reference| reference.note_id.as_str())
    }
}

impl Default for Tab {
    fn default() -> Self {
        Self::new()
    }
}

/// Persisted workspace record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceData {
    pub tabs: Vec<Tab>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_tab_id: Option<String>,
}

impl ModelData for WorkspaceData {
    const STORAGE_KEY: &'static str = WORKSPACE_KEY;

    fn default_data() -> Self {
        Self::default()
    }
}

/// Tab state owned by the service registry.
pub struct WorkspaceRepository {
    model: PersistentModel<WorkspaceData>,
}

impl WorkspaceRepository {
    /// Loads the workspace; when `keep_tabs` is false, previously persisted
    /// tabs are discarded and the empty workspace is persisted.
    pub fn new(store: Rc<dyn KeyedStore>, keep_tabs: bool) -> Self {
        let mut model = PersistentModel::<WorkspaceData>::load(store);
        if !keep_tabs {
            info!(
                "event=workspace_restore module=repo status=ok discarded_tabs={}",
                model.data().tabs.len()
            );
            model.reset_to_defaults();
        }
        Self { model }
    }

    pub fn tabs(&self) -> &[Tab] {
        &self.model.data().tabs
    }

    pub fn active_tab_id(&self) -> Option<&str> {
        self.model.data().active_tab_id.as_deref()
    }

    pub fn get_tab_by_tab_id(&self, tab_id: &str) -> Option<&Tab> {
        self.tabs().iter().find(|tab| tab.id == tab_id)
    }

    pub fn get_tab_by_note_id(&self, note_id: &str) -> Option<&Tab> {
        self.tabs().iter().find(|tab| tab.note_id() == Some(note_id))
    }

    /// Returns the active tab, or `None` when unset or dangling.
    pub fn get_active_tab(&self) -> Option<&Tab> {
        let active_id = self.active_tab_id()?;
        self.get_tab_by_tab_id(active_id)
    }

    pub fn is_note_open_in_tab(&self, note_id: &str) -> bool {
        self.get_tab_by_note_id(note_id).is_some()
    }

    pub fn find_tab_index_by_tab_id(&self, tab_id: &str) -> Option<usize> {
        self.tabs().iter().position(|tab| tab.id == tab_id)
    }

    pub fn find_tab_index_by_note_id(&self, note_id: &str) -> Option<usize> {
        self.tabs()
            .iter()
            .position(|tab| tab.note_id() == Some(note_id))
    }

    /// Appends `tab`. Blank or duplicate ids are rejected with a warning.
    pub fn add_tab(&mut self, tab: Tab) -> bool {
        if tab.id.trim().is_empty() {
            reject_call("workspace", "add_tab", &tab.id, "blank_tab_id");
            return false;
        }
        if self.get_tab_by_tab_id(&tab.id).is_some() {
            reject_call("workspace", "add_tab", &tab.id, "duplicate_tab_id");
            return false;
        }
        self.model.update(|data| data.tabs.push(tab));
        true
    }

    /// Focuses the tab showing `note_id`, opening a new one if needed.
    ///
    /// Returns the focused tab id.
    pub fn open_note(&mut self, note_id: &str) -> String {
        let tab_id = match self.get_tab_by_note_id(note_id) {
            Some(existing) => existing.id.clone(),
            None => {
                let tab = Tab::for_note(note_id);
                let tab_id = tab.id.clone();
                self.model.update(|data| data.tabs.push(tab));
                tab_id
            }
        };
        self.set_active_tab_id(Some(tab_id.clone()));
        tab_id
    }

    /// Sets the active tab reference without validating it.
    pub fn set_active_tab_id(&mut self, tab_id: Option<String>) {
        self.model.update(|data| data.active_tab_id = tab_id);
    }

    /// Removes one tab and leaves `active_tab_id` untouched.
    pub fn remove_tab(&mut self, tab_id: &str) -> Option<Tab> {
        let Some(index) = self.find_tab_index_by_tab_id(tab_id) else {
            reject_call("workspace", "remove_tab", tab_id, "unknown_tab_id");
            return None;
        };
        Some(self.model.update(|data| data.tabs.remove(index)))
    }

    /// Removes one tab; if it was active, activates the tab that took its
    /// slot, else the previous one, else none.
    pub fn close_tab(&mut self, tab_id: &str) -> bool {
        let Some(index) = self.find_tab_index_by_tab_id(tab_id) else {
            reject_call("workspace", "close_tab", tab_id, "unknown_tab_id");
            return false;
        };
        let was_active = self.active_tab_id() == Some(tab_id);
        self.model.update(|data| {
            data.tabs.remove(index);
            if was_active {
                let neighbour = data
                    .tabs
                    .get(index)
                    .or_else(|| index.checked_sub(1).and_then(|prev| data.tabs.get(prev)));
                data.active_tab_id = neighbour.map(|tab| tab.id.clone());
            }
        });
        true
    }

    /// Rebinds a tab to another note (or to none).
    pub fn set_tab_note(&mut self, tab_id: &str, note_id: Option<String>) -> bool {
        let Some(index) = self.find_tab_index_by_tab_id(tab_id) else {
            reject_call("workspace", "set_tab_note", tab_id, "unknown_tab_id");
            return false;
        };
        self.model.update(|data| {
            data.tabs[index].note_reference = note_id.map(|note_id| NoteReference { note_id });
        });
        true
    }

    /// Closes every tab bound to one of `note_ids`; used by the note-deletion
    /// workflow. Returns the number of tabs closed.
    pub fn close_tabs_for_notes(&mut self, note_ids: &BTreeSet<String>) -> usize {
        let doomed = self
            .tabs()
            .iter()
            .filter(|tab| tab.note_id().is_some_and(|id| note_ids.contains(id)))
            .count();
        if doomed == 0 {
            return 0;
        }

        self.model.update(|data| {
            data.tabs
                .retain(|tab| !tab.note_id().is_some_and(|id| note_ids.contains(id)));
            let active_survives = data
                .active_tab_id
                .as_deref()
                .is_some_and(|active| data.tabs.iter().any(|tab| tab.id == active));
            if !active_survives {
                data.active_tab_id = data.tabs.first().map(|tab| tab.id.clone());
            }
        });
        doomed
    }
}

impl PersistentRepository for WorkspaceRepository {
    type Data = WorkspaceData;

    fn model(&self) -> &PersistentModel<WorkspaceData> {
        &self.model
    }

    fn model_mut(&mut self) -> &mut PersistentModel<WorkspaceData> {
        &mut self.model
    }
}
