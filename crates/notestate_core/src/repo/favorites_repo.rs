//! Favorite notes repository.
//!
//! # Invariants
//! - Stored under `"Favorites"` as `{ "favorites": [noteId, ...] }`.
//! - Insertion order is kept; a note id appears at most once.
//! - Note deletion is not observed here: the deletion workflow must call
//!   `remove_many` / `cleanup_invalid`.

use crate::model::persistent::{ModelData, PersistentModel};
use crate::repo::{reject_call, PersistentRepository};
use crate::store::KeyedStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::rc::Rc;

pub const FAVORITES_KEY: &str = "Favorites";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FavoritesData {
    pub favorites: Vec<String>,
}

impl ModelData for FavoritesData {
    const STORAGE_KEY: &'static str = FAVORITES_KEY;

    fn default_data() -> Self {
        Self::default()
    }
}

pub struct FavoritesRepository {
    model: PersistentModel<FavoritesData>,
}

impl FavoritesRepository {
    pub fn new(store: Rc<dyn KeyedStore>) -> Self {
        Self {
            model: PersistentModel::load(store),
        }
    }

    pub fn get_favorites(&self) -> &[String] {
        &self.model.data().favorites
    }

    pub fn is_favorite(&self, note_id: &str) -> bool {
        self.get_favorites().iter().any(|id| id == note_id)
    }

    /// Appends `note_id` unless already present. Returns whether it was added.
    pub fn add_to_favorites(&mut self, note_id: &str) -> bool {
        if note_id.trim().is_empty() {
            reject_call("favorites", "add", note_id, "blank_note_id");
            return false;
        }
        if self.is_favorite(note_id) {
            return false;
        }
        self.model
            .update(|data| data.favorites.push(note_id.to_string()));
        true
    }

    /// Returns whether `note_id` was present.
    pub fn remove_from_favorites(&mut self, note_id: &str) -> bool {
        if !self.is_favorite(note_id) {
            return false;
        }
        self.model
            .update(|data| data.favorites.retain(|id| id != note_id));
        true
    }

    /// Flips membership and returns the new state.
    pub fn toggle_favorite(&mut self, note_id: &str) -> bool {
        if self.is_favorite(note_id) {
            self.remove_from_favorites(note_id);
            false
        } else {
            self.add_to_favorites(note_id)
        }
    }

    /// Drops every id in `note_ids`. Returns the number removed.
    pub fn remove_many(&mut self, note_ids: &BTreeSet<String>) -> usize {
        self.retain_where(|id| !note_ids.contains(id))
    }

    /// Keeps only ids present in `valid_ids`. Returns the number removed.
    pub fn cleanup_invalid(&mut self, valid_ids: &BTreeSet<String>) -> usize {
        self.retain_where(|id| valid_ids.contains(id))
    }

    pub fn clear(&mut self) {
        if !self.get_favorites().is_empty() {
            self.model.update(|data| data.favorites.clear());
        }
    }

    fn retain_where(&mut self, keep: impl Fn(&str) -> bool) -> usize {
        let removed = self
            .get_favorites()
            .iter()
            .filter(|id| !keep(id.as_str()))
            .count();
        if removed > 0 {
            self.model
                .update(|data| data.favorites.retain(|id| keep(id.as_str())));
        }
        removed
    }
}

impl PersistentRepository for FavoritesRepository {
    type Data = FavoritesData;

    fn model(&self) -> &PersistentModel<FavoritesData> {
        &self.model
    }

    fn model_mut(&mut self) -> &mut PersistentModel<FavoritesData> {
        &mut self.model
    }
}
