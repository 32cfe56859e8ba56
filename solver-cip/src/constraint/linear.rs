//! Linear constraints `lhs <= a^T x <= rhs`.

use super::handler::{CheckResult, ConstraintHandler, PropagationResult, SeparationContext, VarLock};
use crate::cuts::Cut;
use crate::domain::TightenResult;
use crate::error::{CipError, CipResult};
use crate::model::VarId;
use crate::propagation::PropagationContext;
use crate::relaxation::Row;

/// Minimum relative improvement for tightening a continuous bound.
const MIN_IMPROVEMENT: f64 = 1e-3;

#[derive(Debug, Clone)]
struct LinearCons {
    name: String,
    row: Row,
    /// Kept out of the relaxation until violated.
    lazy: bool,
    /// Open to priced columns; never propagated.
    modifiable: bool,
    deleted: bool,
}

/// Activity bounds of a row over the current domain.
#[derive(Debug, Clone, Copy)]
struct Activity {
    /// Finite part of the minimal activity.
    min: f64,
    /// Number of infinite contributions to the minimal activity.
    min_inf: usize,
    max: f64,
    max_inf: usize,
}

/// Handler for linear constraints.
///
/// Propagation uses activity bounds: with the minimal activity `m` of the
/// other terms, `a_j x_j <= rhs - m`. Lazy constraints are enforced by
/// checking and separation only. Modifiable constraints take coefficients
/// of priced columns and are left to the relaxation.
#[derive(Debug, Clone, Default)]
pub struct LinearHandler {
    conss: Vec<LinearCons>,
}

impl LinearHandler {
    /// Create an empty handler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Row of a constraint.
    pub fn row(&self, cons: usize) -> &Row {
        &self.conss[cons].row
    }

    /// Name of a constraint.
    pub fn cons_name(&self, cons: usize) -> &str {
        &self.conss[cons].name
    }

    /// Open a constraint to priced columns.
    pub fn set_modifiable(&mut self, cons: usize) -> CipResult<()> {
        let target = self
            .conss
            .get_mut(cons)
            .ok_or_else(|| CipError::InternalError(format!("no linear constraint {}", cons)))?;
        if target.lazy {
            return Err(CipError::InvalidProblem(format!(
                "lazy constraint '{}' cannot be modifiable",
                target.name
            )));
        }
        target.modifiable = true;
        Ok(())
    }

    fn activity(row: &Row, ctx: &PropagationContext<'_>) -> Activity {
        let mut act = Activity {
            min: 0.0,
            min_inf: 0,
            max: 0.0,
            max_inf: 0,
        };
        for &(v, a) in &row.coefs {
            let (lo, hi) = if a > 0.0 {
                (a * ctx.lb(v), a * ctx.ub(v))
            } else {
                (a * ctx.ub(v), a * ctx.lb(v))
            };
            if lo.is_finite() {
                act.min += lo;
            } else {
                act.min_inf += 1;
            }
            if hi.is_finite() {
                act.max += hi;
            } else {
                act.max_inf += 1;
            }
        }
        act
    }

    /// Propagate one row. Returns `Ok(false)` on cutoff.
    fn propagate_row(row: &Row, ctx: &mut PropagationContext<'_>, tol: f64) -> CipResult<bool> {
        let act = Self::activity(row, ctx);
        if act.min_inf == 0 && act.min > row.rhs + tol * row.rhs.abs().max(1.0) {
            return Ok(false);
        }
        if act.max_inf == 0 && act.max < row.lhs - tol * row.lhs.abs().max(1.0) {
            return Ok(false);
        }

        for &(v, a) in &row.coefs {
            let (lo, hi) = if a > 0.0 {
                (a * ctx.lb(v), a * ctx.ub(v))
            } else {
                (a * ctx.ub(v), a * ctx.lb(v))
            };

            // Minimal activity of the other terms
            if row.rhs.is_finite() {
                let residual = if lo.is_finite() && act.min_inf == 0 {
                    Some(act.min - lo)
                } else if !lo.is_finite() && act.min_inf == 1 {
                    Some(act.min)
                } else {
                    None
                };
                if let Some(res) = residual {
                    let bound = (row.rhs - res) / a;
                    let result = if a > 0.0 {
                        Self::tighten_upper(ctx, v, bound)?
                    } else {
                        Self::tighten_lower(ctx, v, bound)?
                    };
                    if result == TightenResult::Infeasible {
                        return Ok(false);
                    }
                }
            }

            if row.lhs.is_finite() {
                let residual = if hi.is_finite() && act.max_inf == 0 {
                    Some(act.max - hi)
                } else if !hi.is_finite() && act.max_inf == 1 {
                    Some(act.max)
                } else {
                    None
                };
                if let Some(res) = residual {
                    let bound = (row.lhs - res) / a;
                    let result = if a > 0.0 {
                        Self::tighten_lower(ctx, v, bound)?
                    } else {
                        Self::tighten_upper(ctx, v, bound)?
                    };
                    if result == TightenResult::Infeasible {
                        return Ok(false);
                    }
                }
            }
        }
        Ok(true)
    }

    fn tighten_upper(ctx: &mut PropagationContext<'_>, v: VarId, bound: f64) -> CipResult<TightenResult> {
        let ub = ctx.ub(v);
        if !ctx.is_integral(v) && ub.is_finite() && ub - bound < MIN_IMPROVEMENT * ub.abs().max(1.0) {
            return Ok(TightenResult::Redundant);
        }
        ctx.tighten_ub(v, bound)
    }

    fn tighten_lower(ctx: &mut PropagationContext<'_>, v: VarId, bound: f64) -> CipResult<TightenResult> {
        let lb = ctx.lb(v);
        if !ctx.is_integral(v) && lb.is_finite() && bound - lb < MIN_IMPROVEMENT * lb.abs().max(1.0) {
            return Ok(TightenResult::Redundant);
        }
        ctx.tighten_lb(v, bound)
    }
}

impl ConstraintHandler for LinearHandler {
    fn name(&self) -> &str {
        "linear"
    }

    fn priority(&self) -> i32 {
        100
    }

    fn num_constraints(&self) -> usize {
        self.conss.len()
    }

    fn propagate(
        &mut self,
        conss: &[usize],
        ctx: &mut PropagationContext<'_>,
    ) -> CipResult<PropagationResult> {
        let before = ctx.reductions();
        for &c in conss {
            let cons = &self.conss[c];
            if cons.deleted || cons.modifiable {
                continue;
            }
            if !Self::propagate_row(&cons.row, ctx, 1e-9)? {
                return Ok(PropagationResult::Cutoff);
            }
        }
        Ok(if ctx.reductions() > before {
            PropagationResult::ReducedDomain
        } else {
            PropagationResult::DidNotFind
        })
    }

    fn separate(&mut self, conss: &[usize], ctx: &SeparationContext<'_>) -> CipResult<Vec<Cut>> {
        let mut cuts = Vec::new();
        for &c in conss {
            let cons = &self.conss[c];
            if cons.lazy && !cons.deleted && cons.row.violation(ctx.x) > ctx.feas_tol {
                cuts.push(Cut::new(&cons.name, cons.row.clone(), false, "linear"));
            }
        }
        Ok(cuts)
    }

    fn check(&self, conss: &[usize], x: &[f64], feas_tol: f64) -> CheckResult {
        let violated = conss
            .iter()
            .copied()
            .filter(|&c| {
                let cons = &self.conss[c];
                if cons.deleted {
                    return false;
                }
                let act = cons.row.activity(x);
                act > cons.row.rhs + feas_tol * cons.row.rhs.abs().max(1.0)
                    || act < cons.row.lhs - feas_tol * cons.row.lhs.abs().max(1.0)
            })
            .collect();
        CheckResult::from_violated(violated)
    }

    fn lock_variables(&self, cons: usize) -> Vec<VarLock> {
        let row = &self.conss[cons].row;
        row.coefs
            .iter()
            .map(|&(var, a)| {
                let (lhs, rhs) = (row.lhs.is_finite(), row.rhs.is_finite());
                VarLock {
                    var,
                    down: if a > 0.0 { lhs } else { rhs },
                    up: if a > 0.0 { rhs } else { lhs },
                }
            })
            .collect()
    }

    fn initial_rows(&self, cons: usize) -> Vec<Row> {
        let cons = &self.conss[cons];
        if cons.lazy || cons.deleted {
            Vec::new()
        } else {
            vec![cons.row.clone()]
        }
    }

    fn add_row(&mut self, name: &str, row: Row, lazy: bool) -> Option<usize> {
        self.conss.push(LinearCons {
            name: name.to_string(),
            row,
            lazy,
            modifiable: false,
            deleted: false,
        });
        Some(self.conss.len() - 1)
    }

    fn is_modifiable(&self, cons: usize) -> bool {
        self.conss.get(cons).is_some_and(|c| c.modifiable && !c.deleted)
    }

    fn add_coefficient(&mut self, cons: usize, var: VarId, coef: f64) -> CipResult<()> {
        let target = self
            .conss
            .get_mut(cons)
            .ok_or_else(|| CipError::plugin("linear", format!("no constraint {}", cons)))?;
        if !target.modifiable {
            return Err(CipError::plugin(
                "linear",
                format!("constraint '{}' is not modifiable", target.name),
            ));
        }
        target.row.add_coef(var, coef);
        Ok(())
    }

    fn delete(&mut self, cons: usize) {
        if let Some(c) = self.conss.get_mut(cons) {
            c.deleted = true;
            c.row.coefs = Vec::new();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DomainStore, Reason};
    use crate::propagation::ImplicationGraph;

    fn run(handler: &mut LinearHandler, d: &mut DomainStore) -> PropagationResult {
        let conss: Vec<usize> = (0..handler.num_constraints()).collect();
        let g = ImplicationGraph::new();
        let mut ctx = PropagationContext::new(d, &g, Reason::Propagation { handler: 0 });
        handler.propagate(&conss, &mut ctx).unwrap()
    }

    #[test]
    fn test_knapsack_propagation() {
        // 3 x0 + 2 x1 + x2 <= 4 with x0 >= 1 forces x1 = 0 (integers in [0, 2])
        let mut h = LinearHandler::new();
        h.add_row("k", Row::less_equal(&[(VarId(0), 3.0), (VarId(1), 2.0), (VarId(2), 1.0)], 4.0), false);
        let mut d = DomainStore::new(vec![1.0, 0.0, 0.0], vec![2.0; 3], vec![true; 3], 1e-6);

        assert_eq!(run(&mut h, &mut d), PropagationResult::ReducedDomain);
        assert_eq!(d.ub(VarId(0)), 1.0);
        assert_eq!(d.ub(VarId(1)), 0.0);
        assert_eq!(d.ub(VarId(2)), 1.0);
        assert_eq!(run(&mut h, &mut d), PropagationResult::DidNotFind);
    }

    #[test]
    fn test_single_infinite_contribution() {
        // x0 + x1 >= 2, x0 <= 0.5, x1 continuous unbounded above: x1 >= 1.5
        let mut h = LinearHandler::new();
        h.add_row("r", Row::greater_equal(&[(VarId(0), 1.0), (VarId(1), 1.0)], 2.0), false);
        let mut d = DomainStore::new(vec![0.0, 0.0], vec![0.5, f64::INFINITY], vec![false, false], 1e-6);

        assert_eq!(run(&mut h, &mut d), PropagationResult::ReducedDomain);
        assert!((d.lb(VarId(1)) - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_infeasible_row() {
        let mut h = LinearHandler::new();
        h.add_row("r", Row::new(&[(VarId(0), 1.0), (VarId(1), -1.0)], 3.0, 5.0), false);
        let mut d = DomainStore::new(vec![0.0; 2], vec![1.0; 2], vec![true; 2], 1e-6);
        assert_eq!(run(&mut h, &mut d), PropagationResult::Cutoff);
    }

    #[test]
    fn test_check_and_locks() {
        let mut h = LinearHandler::new();
        h.add_row("le", Row::less_equal(&[(VarId(0), 1.0), (VarId(1), -2.0)], 1.0), false);
        h.add_row("eq", Row::new(&[(VarId(0), 1.0)], 1.0, 1.0), false);

        assert!(h.check(&[0, 1], &[1.0, 0.0], 1e-6).feasible);
        let res = h.check(&[0, 1], &[2.0, 0.0], 1e-6);
        assert_eq!(res.violated, vec![0, 1]);

        let locks = h.lock_variables(0);
        assert_eq!(locks[0], VarLock { var: VarId(0), down: false, up: true });
        assert_eq!(locks[1], VarLock { var: VarId(1), down: true, up: false });
        let eq = h.lock_variables(1);
        assert!(eq[0].down && eq[0].up);
    }

    #[test]
    fn test_modifiable_rows_are_not_propagated() {
        // x >= 3 would fix the lower bound, but priced columns may still cover it
        let mut h = LinearHandler::new();
        let c = h.add_row("demand", Row::greater_equal(&[(VarId(0), 1.0)], 3.0), false).unwrap();
        let fixed = h.add_row("fixed", Row::greater_equal(&[(VarId(1), 1.0)], 2.0), false).unwrap();
        assert!(h.add_coefficient(fixed, VarId(2), 1.0).is_err());

        h.set_modifiable(c).unwrap();
        assert!(h.is_modifiable(c));
        assert!(!h.is_modifiable(fixed));
        h.add_coefficient(c, VarId(2), 1.0).unwrap();
        assert_eq!(h.row(c).coefs.len(), 2);

        let mut d = DomainStore::new(vec![0.0; 3], vec![10.0; 3], vec![true; 3], 1e-6);
        assert_eq!(run(&mut h, &mut d), PropagationResult::ReducedDomain);
        assert_eq!(d.lb(VarId(0)), 0.0);
        assert_eq!(d.lb(VarId(1)), 2.0);

        let lazy = h.add_row("lazy", Row::less_equal(&[(VarId(0), 1.0)], 1.0), true).unwrap();
        assert!(h.set_modifiable(lazy).is_err());
    }

    #[test]
    fn test_lazy_rows() {
        let mut h = LinearHandler::new();
        let c = h
            .add_row("lazy", Row::less_equal(&[(VarId(0), 1.0), (VarId(1), 1.0)], 1.0), true)
            .unwrap();
        assert!(h.initial_rows(c).is_empty());

        let d = DomainStore::new(vec![0.0; 2], vec![1.0; 2], vec![true; 2], 1e-6);
        let x = [1.0, 1.0];
        let ctx = SeparationContext {
            x: &x,
            domains: &d,
            depth: 0,
            feas_tol: 1e-6,
        };
        let cuts = h.separate(&[c], &ctx).unwrap();
        assert_eq!(cuts.len(), 1);
        assert!(!cuts[0].local);
        assert!(h.separate(&[c], &SeparationContext { x: &[0.0, 1.0], ..ctx }).unwrap().is_empty());
    }
}
