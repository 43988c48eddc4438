//! Sidebar layout repository.
//!
//! # Invariants
//! - Stored under `"Sidebar"` as `{ isOpen, width? }`.
//! - `width`, when set, is finite and positive.

use crate::model::persistent::{ModelData, PersistentModel};
use crate::repo::{reject_call, PersistentRepository};
use crate::store::KeyedStore;
use serde::{Deserialize, Serialize};
use std::rc::Rc;

pub const SIDEBAR_KEY: &str = "Sidebar";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SidebarData {
    pub is_open: bool,
    /// Pixel width; `None` means the layout default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
}

impl ModelData for SidebarData {
    const STORAGE_KEY: &'static str = SIDEBAR_KEY;

    fn default_data() -> Self {
        Self {
            is_open: true,
            width: None,
        }
    }
}

pub struct SidebarRepository {
    model: PersistentModel<SidebarData>,
}

impl SidebarRepository {
    pub fn new(store: Rc<dyn KeyedStore>) -> Self {
        Self {
            model: PersistentModel::load(store),
        }
    }

    pub fn is_open(&self) -> bool {
        self.model.data().is_open
    }

    pub fn width(&self) -> Option<f64> {
        self.model.data().width
    }

    pub fn open(&mut self) {
        self.model.update(|data| data.is_open = true);
    }

    pub fn close(&mut self) {
        self.model.update(|data| data.is_open = false);
    }

    /// Flips visibility and returns the new state.
    pub fn toggle(&mut self) -> bool {
        self.model.update(|data| {
            data.is_open = !data.is_open;
            data.is_open
        })
    }

    /// Stores a user-dragged width. Non-finite or non-positive input is ignored.
    pub fn set_width(&mut self, width: f64) -> bool {
        if !width.is_finite() || width <= 0.0 {
            reject_call("sidebar", "set_width", &width.to_string(), "invalid_width");
            return false;
        }
        self.model.update(|data| data.width = Some(width));
        true
    }

    pub fn reset_width(&mut self) {
        self.model.update(|data| data.width = None);
    }
}

impl PersistentRepository for SidebarRepository {
    type Data = SidebarData;

    fn model(&self) -> &PersistentModel<SidebarData> {
        &self.model
    }

    fn model_mut(&mut self) -> &mut PersistentModel<SidebarData> {
        &mut self.model
    }
}

#[cfg(test)]
mod tests {
    use super::SidebarRepository;
    use crate::store::MemoryKeyedStore;
    use std::rc::Rc;

    #[test]
    fn rejects_invalid_widths() {
        let mut sidebar = SidebarRepository::new(Rc::new(MemoryKeyedStore::new()));
        assert!(!sidebar.set_width(f64::NAN));
        assert!(!sidebar.set_width(-10.0));
        assert!(!sidebar.set_width(0.0));
        assert_eq!(sidebar.width(), None);

        assert!(sidebar.set_width(280.0));
        assert_eq!(sidebar.width(), Some(280.0));
        sidebar.reset_width();
        assert_eq!(sidebar.width(), None);
    }

    #[test]
    fn toggle_returns_new_visibility() {
        let mut sidebar = SidebarRepository::new(Rc::new(MemoryKeyedStore::new()));
        assert!(sidebar.is_open());
        assert!(!sidebar.toggle());
        assert!(sidebar.toggle());
        sidebar.close();
        assert!(!sidebar.is_open());
    }
}
