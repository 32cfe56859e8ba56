//! Domain access handed to propagation callbacks.

use super::implications::ImplicationGraph;
use crate::domain::{BoundKind, DomainStore, Reason, TightenResult};
use crate::error::CipResult;
use crate::model::VarId;

/// Mutable view of the domain store for one propagation callback.
///
/// Every applied tightening is closed under the implication graph before
/// the call returns, so a fixing and everything it implies land together.
pub struct PropagationContext<'a> {
    domains: &'a mut DomainStore,
    implications: &'a ImplicationGraph,
    reason: Reason,
    reductions: usize,
    infeasible: bool,
}

impl<'a> PropagationContext<'a> {
    /// Create a context recording changes with `reason`.
    pub fn new(domains: &'a mut DomainStore, implications: &'a ImplicationGraph, reason: Reason) -> Self {
        Self {
            domains,
            implications,
            reason,
            reductions: 0,
            infeasible: false,
        }
    }

    /// Read access to all domains.
    pub fn domains(&self) -> &DomainStore {
        self.domains
    }

    /// Local lower bound.
    #[inline]
    pub fn lb(&self, var: VarId) -> f64 {
        self.domains.lb(var)
    }

    /// Local upper bound.
    #[inline]
    pub fn ub(&self, var: VarId) -> f64 {
        self.domains.ub(var)
    }

    /// Whether the variable's bounds are integral.
    #[inline]
    pub fn is_integral(&self, var: VarId) -> bool {
        self.domains.is_integral(var)
    }

    /// Raise a lower bound.
    pub fn tighten_lb(&mut self, var: VarId, value: f64) -> CipResult<TightenResult> {
        self.tighten(var, BoundKind::Lower, value)
    }

    /// Lower an upper bound.
    pub fn tighten_ub(&mut self, var: VarId, value: f64) -> CipResult<TightenResult> {
        self.tighten(var, BoundKind::Upper, value)
    }

    /// Fix a variable to `value`.
    pub fn fix(&mut self, var: VarId, value: f64) -> CipResult<TightenResult> {
        let lo = self.tighten(var, BoundKind::Lower, value)?;
        if lo == TightenResult::Infeasible {
            return Ok(lo);
        }
        let hi = self.tighten(var, BoundKind::Upper, value)?;
        Ok(match (lo, hi) {
            (_, TightenResult::Infeasible) => TightenResult::Infeasible,
            (TightenResult::Applied, _) | (_, TightenResult::Applied) => TightenResult::Applied,
            _ => TightenResult::Redundant,
        })
    }

    /// Domain reductions applied through this context.
    pub fn reductions(&self) -> usize {
        self.reductions
    }

    /// Whether any tightening (direct or implied) hit an empty domain.
    pub fn is_infeasible(&self) -> bool {
        self.infeasible
    }

    /// Apply the implication closure of the current fixing of `var`.
    pub fn close_implications(&mut self, var: VarId) -> CipResult<bool> {
        if self.implications.is_empty() {
            return Ok(true);
        }
        let mut stack = Vec::new();
        if let Some(value) = self.binary_fixing(var) {
            stack.push((var, value));
        }
        while let Some((v, value)) = stack.pop() {
            for imp in self.implications.implied(v, value) {
                match self.domains.tighten(imp.var, imp.kind, imp.value, Reason::Implication)? {
                    TightenResult::Applied => {
                        self.reductions += 1;
                        if let Some(next) = self.binary_fixing(imp.var) {
                            stack.push((imp.var, next));
                        }
                    }
                    TightenResult::Redundant => {}
                    TightenResult::Infeasible => {
                        self.infeasible = true;
                        return Ok(false);
                    }
                }
            }
        }
        Ok(true)
    }

    fn tighten(&mut self, var: VarId, kind: BoundKind, value: f64) -> CipResult<TightenResult> {
        let result = self.domains.tighten(var, kind, value, self.reason)?;
        match result {
            TightenResult::Applied => {
                self.reductions += 1;
                if !self.close_implications(var)? {
                    return Ok(TightenResult::Infeasible);
                }
            }
            TightenResult::Infeasible => self.infeasible = true,
            TightenResult::Redundant => {}
        }
        Ok(result)
    }

    /// Value of a fixed binary variable.
    fn binary_fixing(&self, var: VarId) -> Option<bool> {
        let d = &*self.domains;
        if !d.is_integral(var) || d.global_lb(var) < 0.0 || d.global_ub(var) > 1.0 {
            return None;
        }
        if d.lb(var) > 0.5 {
            Some(true)
        } else if d.ub(var) < 0.5 {
            Some(false)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::propagation::Implication;

    #[test]
    fn test_transitive_closure() {
        // x0 = 1 => x1 = 0 (clique), x1 = 0 => x2 >= 1 => (clique) x3 = 0
        let mut g = ImplicationGraph::new();
        g.add_clique(&[VarId(0), VarId(1)]).unwrap();
        g.add_implication(
            VarId(1),
            false,
            Implication {
                var: VarId(2),
                kind: BoundKind::Lower,
                value: 1.0,
            },
        )
        .unwrap();
        g.add_clique(&[VarId(2), VarId(3)]).unwrap();

        let mut d = DomainStore::new(vec![0.0; 4], vec![1.0; 4], vec![true; 4], 1e-6);
        let mut ctx = PropagationContext::new(&mut d, &g, Reason::Global);
        assert_eq!(ctx.tighten_lb(VarId(0), 1.0).unwrap(), TightenResult::Applied);
        assert_eq!(ctx.reductions(), 4);
        assert!(!ctx.is_infeasible());
        assert_eq!(d.ub(VarId(1)), 0.0);
        assert_eq!(d.lb(VarId(2)), 1.0);
        assert_eq!(d.ub(VarId(3)), 0.0);
    }

    #[test]
    fn test_implied_conflict() {
        let mut g = ImplicationGraph::new();
        g.add_clique(&[VarId(0), VarId(1)]).unwrap();

        let mut d = DomainStore::new(vec![0.0, 1.0], vec![1.0, 1.0], vec![true, true], 1e-6);
        let mut ctx = PropagationContext::new(&mut d, &g, Reason::Global);
        assert_eq!(ctx.fix(VarId(0), 1.0).unwrap(), TightenResult::Infeasible);
        assert!(ctx.is_infeasible());
    }
}
