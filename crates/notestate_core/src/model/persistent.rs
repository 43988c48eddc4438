//! Generic persisted model: one typed value mirrored to one store key.
//!
//! # Responsibility
//! - Load `data` once at construction, shallow-merged over defaults.
//! - Persist the full `data` snapshot after every applied mutation.
//! - Notify explicit subscribers after each mutation.
//!
//! # Invariants
//! - `data` is always a valid `T`; unreadable records fall back to defaults.
//! - Load and save failures are logged, never returned to mutation callers.
//! - Writes are issued synchronously in mutation order.

use crate::store::{KeyedStore, StoreError};
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::rc::Rc;

/// Shape contract for values owned by a [`PersistentModel`].
pub trait ModelData: Serialize + DeserializeOwned + Clone {
    /// Store key backing this entity type.
    const STORAGE_KEY: &'static str;

    /// Value used when no record exists or the stored record is unreadable.
    ///
    /// Must be pure.
    fn default_data() -> Self;
}

/// Errors raised while encoding, decoding or writing one model record.
#[derive(Debug)]
pub enum ModelError {
    Store(StoreError),
    Encode(serde_json::Error),
    Decode(serde_json::Error),
    /// Record parsed as JSON but does not have the expected top-level kind.
    Malformed(String),
}

impl Display for ModelError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(err) => write!(f, "{err}"),
            Self::Encode(err) => write!(f, "failed to encode record: {err}"),
            Self::Decode(err) => write!(f, "failed to decode record: {err}"),
            Self::Malformed(message) => write!(f, "malformed record: {message}"),
        }
    }
}

impl Error for ModelError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            Self::Encode(err) | Self::Decode(err) => Some(err),
            Self::Malformed(_) => None,
        }
    }
}

impl From<StoreError> for ModelError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// How the current `data` was obtained at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// A stored record was merged over defaults.
    Loaded,
    /// No record existed; defaults are in effect.
    Missing,
    /// Reading or decoding failed; defaults are in effect.
    Recovered { reason: String },
}

/// Handle returned by [`PersistentModel::subscribe`].
pub type SubscriptionId = u64;

type Listener<T> = Box<dyn Fn(&T)>;

/// Owns one `T` and keeps it synchronized to `store[key]`.
pub struct PersistentModel<T: ModelData> {
    key: String,
    store: Rc<dyn KeyedStore>,
    data: T,
    initialized: bool,
    load_outcome: LoadOutcome,
    last_save_error: Option<String>,
    listeners: Vec<(SubscriptionId, Listener<T>)>,
    next_subscription: SubscriptionId,
}

impl<T: ModelData> PersistentModel<T> {
    /// Loads the model from its entity key (`T::STORAGE_KEY`).
    pub fn load(store: Rc<dyn KeyedStore>) -> Self {
        Self::load_at(T::STORAGE_KEY, store)
    }

    /// Loads the model from an explicit key.
    ///
    /// Never fails: missing or unreadable records resolve to
    /// `T::default_data()` and are reported through [`Self::load_outcome`].
    pub fn load_at(key: impl Into<String>, store: Rc<dyn KeyedStore>) -> Self {
        let key = key.into();
        let (data, load_outcome) = match read_record::<T>(store.as_ref(), &key) {
            Ok(Some(data)) => {
                debug!("event=model_load module=model status=ok key={key} source=store");
                (data, LoadOutcome::Loaded)
            }
            Ok(None) => {
                debug!("event=model_load module=model status=ok key={key} source=defaults");
                (T::default_data(), LoadOutcome::Missing)
            }
            Err(err) => {
                warn!(
                    "event=model_load module=model status=warn key={key} source=defaults error={err}"
                );
                (
                    T::default_data(),
                    LoadOutcome::Recovered {
                        reason: err.to_string(),
                    },
                )
            }
        };

        Self {
            key,
            store,
            data,
            initialized: true,
            load_outcome,
            last_save_error: None,
            listeners: Vec::new(),
            next_subscription: 1,
        }
    }

    /// Borrows the live value.
    pub fn data(&self) -> &T {
        &self.data
    }

    /// Returns a detached copy of the current value.
    pub fn snapshot(&self) -> T {
        self.data.clone()
    }

    /// True once construction-time loading has resolved.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn load_outcome(&self) -> &LoadOutcome {
        &self.load_outcome
    }

    /// Message of the most recent failed save; cleared by the next success.
    pub fn last_save_error(&self) -> Option<&str> {
        self.last_save_error.as_deref()
    }

    /// Applies `mutate` to the live value, then persists and notifies.
    pub fn update<R>(&mut self, mutate: impl FnOnce(&mut T) -> R) -> R {
        let result = mutate(&mut self.data);
        self.commit();
        result
    }

    /// Replaces the whole value, then persists and notifies.
    pub fn replace(&mut self, data: T) {
        self.data = data;
        self.commit();
    }

    /// Restores `T::default_data()` and persists it immediately.
    pub fn reset_to_defaults(&mut self) {
        self.replace(T::default_data());
    }

    /// Writes the full current snapshot. Returns whether the write landed.
    ///
    /// Failures are logged and remembered in [`Self::last_save_error`]; the
    /// in-memory value stays authoritative.
    pub fn save(&mut self) -> bool {
        match self.try_save() {
            Ok(()) => {
                self.last_save_error = None;
                true
            }
            Err(err) => {
                warn!(
                    "event=model_save module=model status=error key={} error={}",
                    self.key, err
                );
                self.last_save_error = Some(err.to_string());
                false
            }
        }
    }

    /// Writes the full current snapshot and returns the failure, if any.
    pub fn try_save(&self) -> Result<(), ModelError> {
        let bytes = serde_json::to_vec(&self.data).map_err(ModelError::Encode)?;
        self.store.write(&self.key, &bytes)?;
        debug!(
            "event=model_save module=model status=ok key={} bytes={}",
            self.key,
            bytes.len()
        );
        Ok(())
    }

    /// Registers a listener called with the new value after each mutation.
    ///
    /// Listeners run after the write, while the owner is still mutably
    /// borrowed. They must only use the `&T` they are passed (or the store),
    /// never reach back into the owning repository.
    pub fn subscribe(&mut self, listener: impl Fn(&T) + 'static) -> SubscriptionId {
        let id = self.next_subscription;
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Removes a listener; returns whether it was registered.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(existing, _)| *existing != id);
        self.listeners.len() != before
    }

    fn commit(&mut self) {
        self.save();
        for (_, listener) in &self.listeners {
            listener(&self.data);
        }
    }
}

/// Decodes `stored` and shallow-merges it over `T::default_data()`.
///
/// Top-level fields present in `stored` win; absent fields keep defaults.
pub fn merge_record<T: ModelData>(stored: Value) -> Result<T, ModelError> {
    let defaults = serde_json::to_value(T::default_data()).map_err(ModelError::Encode)?;
    let merged = overlay(defaults, stored)?;
    serde_json::from_value(merged).map_err(ModelError::Decode)
}

fn read_record<T: ModelData>(store: &dyn KeyedStore, key: &str) -> Result<Option<T>, ModelError> {
    let Some(bytes) = store.read(key)? else {
        return Ok(None);
    };
    let stored: Value = serde_json::from_slice(&bytes).map_err(ModelError::Decode)?;
    merge_record(stored).map(Some)
}

fn overlay(defaults: Value, stored: Value) -> Result<Value, ModelError> {
    match (defaults, stored) {
        (Value::Object(mut base), Value::Object(fields)) => {
            base.extend(fields);
            Ok(Value::Object(base))
        }
        (Value::Object(_), other) => Err(ModelError::Malformed(format!(
            "expected an object record, found {}",
            json_kind(&other)
        ))),
        (_, other) => Ok(other),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::{merge_record, LoadOutcome, ModelData, PersistentModel};
    use crate::store::{KeyedStore, MemoryKeyedStore};
    use serde::{Deserialize, Serialize};
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Panel {
        title: String,
        pinned: bool,
        added_later: u32,
    }

    impl ModelData for Panel {
        const STORAGE_KEY: &'static str = "panel";

        fn default_data() -> Self {
            Self {
                title: "untitled".to_string(),
                pinned: false,
                added_later: 7,
            }
        }
    }

    fn store_with(key: &str, value: serde_json::Value) -> Rc<MemoryKeyedStore> {
        let store = Rc::new(MemoryKeyedStore::new());
        store
            .write(key, value.to_string().as_bytes())
            .expect("seed record");
        store
    }

    #[test]
    fn missing_record_uses_defaults() {
        let model = PersistentModel::<Panel>::load(Rc::new(MemoryKeyedStore::new()));
        assert!(model.is_initialized());
        assert_eq!(model.data(), &Panel::default_data());
        assert_eq!(model.load_outcome(), &LoadOutcome::Missing);
    }

    #[test]
    fn stored_fields_overlay_defaults() {
        let store = store_with("panel", json!({ "title": "Inbox", "pinned": true }));
        let model = PersistentModel::<Panel>::load(store);
        assert_eq!(model.load_outcome(), &LoadOutcome::Loaded);
        assert_eq!(model.data().title, "Inbox");
        assert!(model.data().pinned);
        assert_eq!(model.data().added_later, 7);
    }

    #[test]
    fn unparseable_record_recovers_to_defaults() {
        let store = Rc::new(MemoryKeyedStore::new());
        store.write("panel", b"{not json").expect("seed garbage");
        let model = PersistentModel::<Panel>::load(store);
        assert_eq!(model.data(), &Panel::default_data());
        assert!(matches!(
            model.load_outcome(),
            LoadOutcome::Recovered { .. }
        ));
    }

    #[test]
    fn non_object_record_is_malformed() {
        let err = merge_record::<Panel>(json!([1, 2, 3])).expect_err("array is not a panel");
        assert!(err.to_string().contains("array"));
    }

    #[test]
    fn mistyped_field_recovers_to_defaults() {
        let store = store_with("panel", json!({ "pinned": "yes" }));
        let model = PersistentModel::<Panel>::load(store);
        assert_eq!(model.data(), &Panel::default_data());
    }

    #[test]
    fn update_persists_full_snapshot() {
        let store = Rc::new(MemoryKeyedStore::new());
        let mut model = PersistentModel::<Panel>::load(store.clone());
        model.update(|panel| panel.pinned = true);

        let bytes = store.read("panel").expect("read").expect("record written");
        let stored: serde_json::Value = serde_json::from_slice(&bytes).expect("valid json");
        assert_eq!(
            stored,
            json!({ "title": "untitled", "pinned": true, "addedLater": 7 })
        );
    }

    #[test]
    fn failed_save_keeps_in_memory_value_and_recovers_on_next_write() {
        let store = Rc::new(MemoryKeyedStore::new());
        let mut model = PersistentModel::<Panel>::load(store.clone());

        store.set_reject_writes(true);
        model.update(|panel| panel.title = "draft".to_string());
        assert_eq!(model.data().title, "draft");
        assert!(model.last_save_error().is_some());
        assert!(!store.exists("panel"));

        store.set_reject_writes(false);
        model.update(|panel| panel.pinned = true);
        assert!(model.last_save_error().is_none());
        let reloaded = PersistentModel::<Panel>::load(store);
        assert_eq!(reloaded.data().title, "draft");
        assert!(reloaded.data().pinned);
    }

    #[test]
    fn subscribers_see_each_mutation_until_unsubscribed() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut model = PersistentModel::<Panel>::load(Rc::new(MemoryKeyedStore::new()));
        let sink = seen.clone();
        let id = model.subscribe(move |panel: &Panel| sink.borrow_mut().push(panel.pinned));

        model.update(|panel| panel.pinned = true);
        model.update(|panel| panel.pinned = false);
        assert!(model.unsubscribe(id));
        model.update(|panel| panel.pinned = true);

        assert_eq!(*seen.borrow(), vec![true, false]);
        assert!(!model.unsubscribe(id));
    }

    #[test]
    fn listeners_run_after_the_snapshot_is_written() {
        let store: Rc<dyn KeyedStore> = Rc::new(MemoryKeyedStore::new());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut model = PersistentModel::<Panel>::load(store.clone());
        let (sink, listener_store) = (seen.clone(), store.clone());
        model.subscribe(move |panel: &Panel| {
            let bytes = listener_store
                .read("panel")
                .expect("read")
                .expect("record written before notify");
            let stored: Panel = serde_json::from_slice(&bytes).expect("valid json");
            sink.borrow_mut().push(stored.pinned == panel.pinned);
        });

        model.update(|panel| panel.pinned = true);
        model.update(|panel| panel.pinned = false);

        assert_eq!(*seen.borrow(), vec![true, true]);
    }

    #[test]
    fn reset_to_defaults_is_idempotent() {
        let store = store_with("panel", json!({ "title": "Inbox" }));
        let mut model = PersistentModel::<Panel>::load(store);
        model.reset_to_defaults();
        let once = model.snapshot();
        model.reset_to_defaults();
        assert_eq!(model.snapshot(), once);
        assert_eq!(once, Panel::default_data());
    }
}
