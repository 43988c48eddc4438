//! State repositories: one persisted entity each, with entity-specific
//! queries and mutations on top of [`PersistentModel`].
//!
//! # Responsibility
//! - Define the shared repository contract over a persistent model.
//! - Keep call-site rejections (UI races) as logged no-ops.
//!
//! # Invariants
//! - Every mutator ends by persisting the full entity snapshot.
//! - Repositories never share `data` by value with other repositories.

use crate::model::persistent::{ModelData, PersistentModel, SubscriptionId};
use log::warn;

pub mod collapsible_repo;
pub mod favorites_repo;
pub mod settings_repo;
pub mod sidebar_repo;
pub mod workspace_repo;

/// Contract shared by every state repository.
pub trait PersistentRepository {
    type Data: ModelData;

    fn model(&self) -> &PersistentModel<Self::Data>;

    fn model_mut(&mut self) -> &mut PersistentModel<Self::Data>;

    /// Detached copy of the current entity value.
    fn snapshot(&self) -> Self::Data {
        self.model().snapshot()
    }

    /// Restores entity defaults and persists them.
    fn reset_to_defaults(&mut self) {
        self.model_mut().reset_to_defaults();
    }

    /// Registers a listener called after each applied mutation.
    ///
    /// The listener must not borrow this repository again; it runs inside
    /// the mutating call.
    fn subscribe(&mut self, listener: impl Fn(&Self::Data) + 'static) -> SubscriptionId {
        self.model_mut().subscribe(listener)
    }

    fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.model_mut().unsubscribe(id)
    }
}

/// Logs one rejected call-site request. Callers return without mutating.
pub(crate) fn reject_call(module: &str, op: &str, id: &str, reason: &str) {
    warn!("event=call_site_rejected module={module} op={op} id={id} reason={reason}");
}
