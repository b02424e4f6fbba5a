//! Entity state tracking
//!
//! - Change tracker: identity, snapshot and dirty set per entity
//! - Entity: properties plus tracker, for vertices and edges alike
//! - Session: arena-backed identity map with lookup-or-insert semantics

pub mod entity;
pub mod identity_map;
pub mod tracker;

pub use entity::Entity;
pub use identity_map::{EntityKey, Session};
pub use tracker::{ChangeTracker, EntityState};
