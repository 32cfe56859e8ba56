//! Variable domains.
//!
//! The [`DomainStore`] is the only place bounds are mutated. Every change is
//! recorded on a trail, so switching between nodes undoes and replays only
//! the part of the path that differs.

mod change;
mod store;

pub use change::{BoundChange, BoundKind, DomainEvent, Reason, TightenResult};
pub use store::DomainStore;
