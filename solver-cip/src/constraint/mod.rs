//! Constraint handlers and the active constraint set.
//!
//! - [`ConstraintHandler`]: plugin contract (propagate, separate, check,
//!   locks, relaxation rows, branching candidates)
//! - [`ConstraintSet`]: problem-wide list with global and node-local scopes
//! - [`LinearHandler`], [`Sos1Handler`]: built-in handlers

mod handler;
mod linear;
mod locks;
mod set;
mod sos1;

pub use handler::{
    CheckResult, ConsBranching, ConstraintHandler, HandlerId, PropagationResult,
    SeparationContext, VarLock,
};
pub use linear::LinearHandler;
pub use locks::LockTable;
pub use set::{ActivationDelta, ConsId, ConstraintSet, Scope};
pub use sos1::Sos1Handler;
