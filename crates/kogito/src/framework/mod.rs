//! Generic reconciliation of child objects: comparison and delta application.

pub mod comparator;
pub mod delta;
pub mod kind;

pub use comparator::{default_compare, CompareFn, ComparatorBuilder, ComparatorRegistry};
pub use delta::{compute_delta, is_owned_by, Delta, DeltaProcessor};
pub use kind::{ChildResource, ChildResources, ResourceKind, ResourceSet};
