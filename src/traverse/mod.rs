//! Graph traversal
//!
//! - Bounded-depth expansion with cycle-safe de-duplication
//! - Blocking and async lazy result sequences
//! - Lazily resolved relationship descriptors

pub mod expand;
pub mod relation;

pub use expand::{ExpandFilter, ExpandPair, ExpandPlan, Expansion, ExpansionStream, Traversal};
pub use relation::{Related, RelationshipDescriptor, ResolutionState};
