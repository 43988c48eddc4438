//! Flutter-facing bindings over the state core.

pub mod api;
