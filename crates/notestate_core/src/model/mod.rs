//! Persistence primitives shared by every state repository.
//!
//! # Responsibility
//! - Define the generic load/merge/save cycle for one keyed entity.
//!
//! # Invariants
//! - Every persisted entity type owns exactly one store key.
//! - Records are always whole snapshots, never patches.

pub mod persistent;
