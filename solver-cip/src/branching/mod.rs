//! Branching: candidate scoring and child generation.
//!
//! Children of a variable dichotomy partition the integer points of the
//! parent: the down child gets `x <= floor(v)` and the up child
//! `x >= ceil(v)`, so no integer assignment is lost and none is shared.

mod pseudocost;
mod selector;

pub use pseudocost::{BranchDir, PseudocostTable};
pub use selector::BranchingEngine;

use crate::domain::BoundChange;
use crate::model::VarId;

/// A fractional variable of the relaxation solution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BranchCandidate {
    /// Variable.
    pub var: VarId,
    /// Relaxation value.
    pub value: f64,
    /// Fractional part of the value.
    pub frac: f64,
}

/// One child to create.
#[derive(Debug, Clone, PartialEq)]
pub struct ChildSpec {
    /// Bound changes relative to the parent.
    pub changes: Vec<BoundChange>,
    /// Estimated objective of the best solution in the child.
    pub estimate: f64,
    /// Direction, for variable dichotomies.
    pub dir: Option<BranchDir>,
}

/// Result of branching at a node.
#[derive(Debug, Clone, PartialEq)]
pub struct BranchingDecision {
    /// Variable branched on, if this is a variable dichotomy.
    pub var: Option<BranchCandidate>,
    /// Children, at least two.
    pub children: Vec<ChildSpec>,
}

/// User branching rule.
///
/// Scores candidates; the highest score wins and ties go to the lowest
/// variable index. Returning a wrong number of scores, or a NaN, is a plugin
/// fault.
pub trait BranchingRulePlugin {
    /// Rule name.
    fn name(&self) -> &str;

    /// One score per candidate, in the given order.
    fn score(&mut self, candidates: &[BranchCandidate], pseudocosts: &PseudocostTable) -> Vec<f64>;
}
