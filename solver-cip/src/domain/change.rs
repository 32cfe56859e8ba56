//! Bound change records.

use crate::model::VarId;

/// Which bound of a variable a change affects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoundKind {
    /// Lower bound
    Lower,
    /// Upper bound
    Upper,
}

/// Why a bound changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    /// Branching decision of the node.
    Branching,
    /// Propagation callback of a constraint handler.
    Propagation {
        /// Handler index.
        handler: usize,
    },
    /// Implication or clique closure.
    Implication,
    /// Change made before the search (formulation or root presolve).
    Global,
}

/// A recorded bound change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundChange {
    /// Variable.
    pub var: VarId,

    /// Bound affected.
    pub kind: BoundKind,

    /// Bound before the change.
    pub old: f64,

    /// Bound after the change.
    pub new: f64,

    /// Inference reason.
    pub reason: Reason,
}

impl BoundChange {
    /// Create a "down" branch: x <= floor(value).
    pub fn down_branch(var: VarId, old_ub: f64, value: f64) -> Self {
        Self {
            var,
            kind: BoundKind::Upper,
            old: old_ub,
            new: value.floor(),
            reason: Reason::Branching,
        }
    }

    /// Create an "up" branch: x >= ceil(value).
    pub fn up_branch(var: VarId, old_lb: f64, value: f64) -> Self {
        Self {
            var,
            kind: BoundKind::Lower,
            old: old_lb,
            new: value.ceil(),
            reason: Reason::Branching,
        }
    }

    /// Branching change fixing an upper bound to `value`.
    pub fn upper(var: VarId, old: f64, value: f64) -> Self {
        Self {
            var,
            kind: BoundKind::Upper,
            old,
            new: value,
            reason: Reason::Branching,
        }
    }

    /// Branching change fixing a lower bound to `value`.
    pub fn lower(var: VarId, old: f64, value: f64) -> Self {
        Self {
            var,
            kind: BoundKind::Lower,
            old,
            new: value,
            reason: Reason::Branching,
        }
    }
}

/// Outcome of a tightening request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TightenResult {
    /// The bound was tightened and recorded.
    Applied,
    /// The value does not tighten the current bound; nothing changed.
    Redundant,
    /// The value crosses the opposite bound; nothing changed.
    Infeasible,
}

/// Pending notification about an applied tightening.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DomainEvent {
    /// Variable whose bound changed.
    pub var: VarId,
    /// Bound that changed.
    pub kind: BoundKind,
}
