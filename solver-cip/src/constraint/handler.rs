//! Constraint handler plugin interface.

use std::fmt;

use crate::cuts::Cut;
use crate::domain::{BoundChange, DomainStore};
use crate::error::{CipError, CipResult};
use crate::model::VarId;
use crate::propagation::PropagationContext;
use crate::relaxation::Row;

/// Index of a handler in the solver's handler list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(pub usize);

impl HandlerId {
    /// Built-in linear constraint handler.
    pub const LINEAR: HandlerId = HandlerId(0);
    /// Built-in SOS1 constraint handler.
    pub const SOS1: HandlerId = HandlerId(1);
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "h{}", self.0)
    }
}

/// Outcome of a propagation callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropagationResult {
    /// The local domain admits no feasible point.
    Cutoff,
    /// At least one bound was tightened.
    ReducedDomain,
    /// Nothing was deduced.
    DidNotFind,
}

/// Outcome of a feasibility check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckResult {
    /// Whether all checked constraints are satisfied.
    pub feasible: bool,

    /// Handler-local indices of violated constraints.
    pub violated: Vec<usize>,
}

impl CheckResult {
    /// Build from the list of violated constraints.
    pub fn from_violated(violated: Vec<usize>) -> Self {
        Self {
            feasible: violated.is_empty(),
            violated,
        }
    }
}

/// Directions in which moving a variable may violate a constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VarLock {
    /// Locked variable.
    pub var: VarId,
    /// Decreasing the variable may violate the constraint.
    pub down: bool,
    /// Increasing the variable may violate the constraint.
    pub up: bool,
}

/// Branching proposed by a handler when variable branching does not apply.
///
/// The children must cover every feasible point of the current domain.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsBranching {
    /// Preference; the highest score is used.
    pub score: f64,

    /// Bound changes of each child.
    pub children: Vec<Vec<BoundChange>>,
}

/// Data available to separation callbacks.
#[derive(Debug, Clone, Copy)]
pub struct SeparationContext<'a> {
    /// Relaxation solution.
    pub x: &'a [f64],

    /// Local domains at the focus node.
    pub domains: &'a DomainStore,

    /// Depth of the focus node.
    pub depth: usize,

    /// Feasibility tolerance.
    pub feas_tol: f64,
}

/// A family of constraints sharing propagation, separation and checking
/// logic.
///
/// Handlers own their constraint data; the solver refers to a constraint by
/// its handler-local index. Callbacks receive the indices of the currently
/// active constraints and must give the same answer for unchanged inputs.
pub trait ConstraintHandler {
    /// Handler name.
    fn name(&self) -> &str;

    /// Propagation order: higher runs first.
    fn priority(&self) -> i32 {
        0
    }

    /// Number of constraints (including deleted ones).
    fn num_constraints(&self) -> usize;

    /// Tighten domains through `ctx`.
    fn propagate(
        &mut self,
        conss: &[usize],
        ctx: &mut PropagationContext<'_>,
    ) -> CipResult<PropagationResult>;

    /// Cuts violated by the relaxation solution.
    fn separate(&mut self, _conss: &[usize], _ctx: &SeparationContext<'_>) -> CipResult<Vec<Cut>> {
        Ok(Vec::new())
    }

    /// Check a complete assignment.
    fn check(&self, conss: &[usize], x: &[f64], feas_tol: f64) -> CheckResult;

    /// Variable locks of one constraint.
    fn lock_variables(&self, cons: usize) -> Vec<VarLock>;

    /// Rows the constraint contributes to the relaxation.
    fn initial_rows(&self, _cons: usize) -> Vec<Row> {
        Vec::new()
    }

    /// Branching on constraint structure for a solution that is integral
    /// but infeasible.
    fn branching_candidates(
        &self,
        _conss: &[usize],
        _x: &[f64],
        _domains: &DomainStore,
    ) -> Vec<ConsBranching> {
        Vec::new()
    }

    /// Take over a linear row as a new constraint. Handlers that cannot
    /// represent rows return `None`.
    fn add_row(&mut self, _name: &str, _row: Row, _lazy: bool) -> Option<usize> {
        None
    }

    /// Whether priced columns may enter the constraint. Bounds derived
    /// from the current variables of a modifiable constraint are invalid,
    /// so handlers must not propagate it.
    fn is_modifiable(&self, _cons: usize) -> bool {
        false
    }

    /// Add a coefficient of a priced column to a constraint.
    fn add_coefficient(&mut self, _cons: usize, _var: VarId, _coef: f64) -> CipResult<()> {
        Err(CipError::plugin(self.name(), "column generation is not supported"))
    }

    /// Release a deleted constraint.
    fn delete(&mut self, _cons: usize) {}
}
