//! Column generation.
//!
//! A [`Pricer`] is called after every optimal relaxation solve while pricing
//! is enabled. Returning no columns certifies that the relaxation is optimal
//! over all columns the pricer could generate, which makes its value a valid
//! node bound.

use std::collections::HashMap;

use crate::constraint::ConsId;
use crate::domain::DomainStore;
use crate::error::CipResult;
use crate::model::VarType;
use crate::relaxation::RowKey;

/// A column proposed by a pricer.
#[derive(Debug, Clone, PartialEq)]
pub struct PricedColumn {
    /// Variable name (must be unique).
    pub name: String,

    /// Variable type.
    pub var_type: VarType,

    /// Lower bound.
    pub lb: f64,

    /// Upper bound.
    pub ub: f64,

    /// Objective coefficient in the user's sense.
    pub obj: f64,

    /// Coefficients in existing constraints, which must be modifiable
    /// (see [`crate::Model::add_linear_modifiable`]).
    pub coefs: Vec<(ConsId, f64)>,
}

/// Output of [`Pricer::generate_columns`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PricingResult {
    /// New columns (empty when none has negative reduced cost).
    pub columns: Vec<PricedColumn>,

    /// Valid lower bound on the node's full relaxation in the internal
    /// minimization sense, if the pricer can provide one.
    pub lower_bound: Option<f64>,
}

/// Relaxation data handed to pricers.
///
/// Values are those of the internal minimization problem: the reduced cost
/// of a column with internal cost `c` and coefficients `a_i` is
/// `c - sum_i dual(i) a_i`, where the internal cost is `sign * obj`.
#[derive(Debug, Clone, Copy)]
pub struct PricingContext<'a> {
    /// Relaxation primal values.
    pub x: &'a [f64],

    /// Relaxation objective (internal sense, without offset).
    pub objective: f64,

    /// +1 when minimizing, -1 when maximizing.
    pub sign: f64,

    /// Local domains at the focus node.
    pub domains: &'a DomainStore,

    /// Depth of the focus node.
    pub depth: usize,

    duals: &'a HashMap<RowKey, f64>,
}

impl<'a> PricingContext<'a> {
    /// Create a context.
    pub fn new(
        x: &'a [f64],
        objective: f64,
        sign: f64,
        domains: &'a DomainStore,
        depth: usize,
        duals: &'a HashMap<RowKey, f64>,
    ) -> Self {
        Self {
            x,
            objective,
            sign,
            domains,
            depth,
            duals,
        }
    }

    /// Dual value of a constraint's row (0 if it has no row).
    pub fn dual(&self, cons: ConsId) -> f64 {
        self.duals.get(&RowKey::Constraint(cons, 0)).copied().unwrap_or(0.0)
    }
}

/// Column generation plugin.
pub trait Pricer {
    /// Pricer name.
    fn name(&self) -> &str;

    /// Columns with negative reduced cost for the current relaxation.
    fn generate_columns(&mut self, ctx: &PricingContext<'_>) -> CipResult<PricingResult>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constraint_duals() {
        let mut duals = HashMap::new();
        duals.insert(RowKey::Constraint(ConsId(2), 0), 1.5);
        duals.insert(RowKey::Cut(2), -4.0);
        let d = DomainStore::new(vec![], vec![], vec![], 1e-6);
        let ctx = PricingContext::new(&[], 0.0, 1.0, &d, 0, &duals);
        assert_eq!(ctx.dual(ConsId(2)), 1.5);
        assert_eq!(ctx.dual(ConsId(3)), 0.0);
    }
}
