//! Collapsible section state repository.
//!
//! # Invariants
//! - Stored under `"collapsible-states"` as `{ id: collapsed }`.
//! - First registration wins: re-registering keeps the stored state.
//! - Mutating an unregistered id is a logged no-op (mount/unmount races).

use crate::model::persistent::{ModelData, PersistentModel};
use crate::repo::{reject_call, PersistentRepository};
use crate::store::KeyedStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::rc::Rc;

pub const COLLAPSIBLE_KEY: &str = "collapsible-states";

/// Collapsed flag per registered section id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollapsibleData(pub BTreeMap<String, bool>);

impl ModelData for CollapsibleData {
    const STORAGE_KEY: &'static str = COLLAPSIBLE_KEY;

    fn default_data() -> Self {
        Self::default()
    }
}

pub struct CollapsibleRepository {
    model: PersistentModel<CollapsibleData>,
}

impl CollapsibleRepository {
    pub fn new(store: Rc<dyn KeyedStore>) -> Self {
        Self {
            model: PersistentModel::load(store),
        }
    }

    /// Registers `id` with `default_collapsed` unless already registered.
    ///
    /// Returns the effective state.
    pub fn register(&mut self, id: &str, default_collapsed: bool) -> bool {
        if let Some(existing) = self.get_state(id) {
            return existing;
        }
        self.model
            .update(|data| data.0.insert(id.to_string(), default_collapsed));
        default_collapsed
    }

    /// `None` means the id was never registered.
    pub fn get_state(&self, id: &str) -> Option<bool> {
        self.model.data().0.get(id).copied()
    }

    pub fn is_registered(&self, id: &str) -> bool {
        self.model.data().0.contains_key(id)
    }

    /// Flips a registered state and returns the new value.
    pub fn toggle(&mut self, id: &str) -> Option<bool> {
        let Some(current) = self.get_state(id) else {
            reject_call("collapsible", "toggle", id, "unregistered_id");
            return None;
        };
        self.set_registered(id, !current);
        Some(!current)
    }

    /// Sets a registered state. Returns whether the id was registered.
    pub fn set_state(&mut self, id: &str, collapsed: bool) -> bool {
        if !self.is_registered(id) {
            reject_call("collapsible", "set_state", id, "unregistered_id");
            return false;
        }
        self.set_registered(id, collapsed);
        true
    }

    /// Forgets every registration.
    pub fn reset(&mut self) {
        self.model.update(|data| data.0.clear());
    }

    pub fn get_registered_ids(&self) -> Vec<String> {
        self.model.data().0.keys().cloned().collect()
    }

    pub fn collapse_all(&mut self) {
        self.set_all(true);
    }

    pub fn expand_all(&mut self) {
        self.set_all(false);
    }

    fn set_registered(&mut self, id: &str, collapsed: bool) {
        self.model.update(|data| {
            if let Some(state) = data.0.get_mut(id) {
                *state = collapsed;
            }
        });
    }

    fn set_all(&mut self, collapsed: bool) {
        self.model.update(|data| {
            data.0.values_mut().for_each(|state| *state = collapsed);
        });
    }
}

impl PersistentRepository for CollapsibleRepository {
    type Data = CollapsibleData;

    fn model(&self) -> &PersistentModel<CollapsibleData> {
        &self.model
    }

    fn model_mut(&mut self) -> &mut PersistentModel<CollapsibleData> {
        &mut self.model
    }
}
