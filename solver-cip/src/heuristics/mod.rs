//! Primal heuristics.
//!
//! Heuristics propose complete assignments; the solver checks every proposal
//! against bounds, integrality and all constraints before accepting it.

mod rounding;

pub use rounding::SimpleRounding;

use crate::constraint::LockTable;
use crate::domain::DomainStore;
use crate::error::CipResult;

/// Data available to heuristics after a relaxation solve.
#[derive(Debug, Clone, Copy)]
pub struct HeuristicContext<'a> {
    /// Relaxation solution.
    pub x: &'a [f64],

    /// Local domains at the focus node.
    pub domains: &'a DomainStore,

    /// Variable locks of all constraints.
    pub locks: &'a LockTable,

    /// Integrality tolerance.
    pub int_tol: f64,
}

/// Primal heuristic plugin.
pub trait Heuristic {
    /// Heuristic name.
    fn name(&self) -> &str;

    /// Propose a solution, or `None`.
    fn find(&mut self, ctx: &HeuristicContext<'_>) -> CipResult<Option<Vec<f64>>>;
}
