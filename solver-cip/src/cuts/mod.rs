//! Cutting planes and the cut/pricing round controller.
//!
//! This module provides:
//! - [`Cut`]: a linear row proposed by a handler or separator
//! - [`CutPool`]: global cuts with duplicate detection and aging
//! - [`Separator`] plugins, including [`GomorySeparator`]
//! - [`run_rounds`]: the per-node solve/price/separate loop

mod gomory;
mod pool;
mod rounds;
mod separator;

pub use gomory::GomorySeparator;
pub use pool::{CutPool, CutPoolSettings, CutPoolStats, CutStatus, PooledCut};
pub use rounds::{run_rounds, RoundDriver, RoundLimits, RoundOutcome, RoundStats, PricingRound, SeparationRound};
pub use separator::Separator;

use crate::relaxation::Row;

/// A cutting plane.
#[derive(Debug, Clone, PartialEq)]
pub struct Cut {
    /// Name for logs.
    pub name: String,

    /// The inequality.
    pub row: Row,

    /// Only valid in the subtree of the node where it was found.
    pub local: bool,

    /// Producer (handler or separator name).
    pub source: String,
}

impl Cut {
    /// Create a cut.
    pub fn new(name: &str, row: Row, local: bool, source: &str) -> Self {
        Self {
            name: name.to_string(),
            row,
            local,
            source: source.to_string(),
        }
    }

    /// Violation divided by coefficient norm at `x`.
    pub fn efficacy(&self, x: &[f64]) -> f64 {
        self.row.efficacy(x)
    }
}
