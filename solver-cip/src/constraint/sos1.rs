//! Special ordered sets of type 1: at most one variable of the set is
//! nonzero.

use super::handler::{
    CheckResult, ConsBranching, ConstraintHandler, PropagationResult, VarLock,
};
use crate::domain::{BoundChange, DomainStore, TightenResult};
use crate::error::{CipError, CipResult};
use crate::model::VarId;
use crate::propagation::PropagationContext;

#[derive(Debug, Clone)]
struct Sos1Cons {
    name: String,
    /// Members in set order.
    vars: Vec<VarId>,
}

/// Handler for SOS1 constraints over nonnegative variables.
///
/// Branching splits the set in two halves and forces one half to zero in
/// each child.
#[derive(Debug, Clone, Default)]
pub struct Sos1Handler {
    conss: Vec<Sos1Cons>,
}

impl Sos1Handler {
    /// Create an empty handler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a set. Members must be distinct.
    pub fn add_set(&mut self, name: &str, vars: &[VarId]) -> CipResult<usize> {
        let mut sorted = vars.to_vec();
        sorted.sort();
        sorted.dedup();
        if sorted.len() != vars.len() {
            return Err(CipError::InvalidProblem(format!("SOS1 '{}' contains a variable twice", name)));
        }
        self.conss.try_reserve(1)?;
        self.conss.push(Sos1Cons {
            name: name.to_string(),
            vars: vars.to_vec(),
        });
        Ok(self.conss.len() - 1)
    }

    /// Members of a set.
    pub fn set(&self, cons: usize) -> &[VarId] {
        &self.conss[cons].vars
    }

    /// Name of a set.
    pub fn cons_name(&self, cons: usize) -> &str {
        &self.conss[cons].name
    }
}

impl ConstraintHandler for Sos1Handler {
    fn name(&self) -> &str {
        "sos1"
    }

    fn priority(&self) -> i32 {
        50
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
            let vars = &self.conss[c].vars;
            let nonzero: Vec<VarId> = vars.iter().copied().filter(|&v| ctx.lb(v) > 0.0).collect();
            match nonzero.as_slice() {
                [] => {}
                [keep] => {
                    for &v in vars {
                        if v != *keep && ctx.tighten_ub(v, 0.0)? == TightenResult::Infeasible {
                            return Ok(PropagationResult::Cutoff);
                        }
                    }
                }
                _ => return Ok(PropagationResult::Cutoff),
            }
        }
        Ok(if ctx.reductions() > before {
            PropagationResult::ReducedDomain
        } else {
            PropagationResult::DidNotFind
        })
    }

    fn check(&self, conss: &[usize], x: &[f64], feas_tol: f64) -> CheckResult {
        let violated = conss
            .iter()
            .copied()
            .filter(|&c| self.conss[c].vars.iter().filter(|v| x[v.0].abs() > feas_tol).count() > 1)
            .collect();
        CheckResult::from_violated(violated)
    }

    fn lock_variables(&self, cons: usize) -> Vec<VarLock> {
        self.conss[cons]
            .vars
            .iter()
            .map(|&var| VarLock {
                var,
                down: false,
                up: true,
            })
            .collect()
    }

    fn branching_candidates(&self, conss: &[usize], x: &[f64], domains: &DomainStore) -> Vec<ConsBranching> {
        let tol = 1e-9;
        let mut out = Vec::new();
        for &c in conss {
            let vars = &self.conss[c].vars;
            let nonzero: Vec<usize> = (0..vars.len()).filter(|&k| x[vars[k].0].abs() > tol).collect();
            if nonzero.len() < 2 {
                continue;
            }
            // Each half keeps at least one of the nonzeros
            let split = nonzero[nonzero.len() / 2];
            let zero_all = |part: &[VarId]| -> Vec<BoundChange> {
                part.iter()
                    .filter(|&&v| domains.ub(v) > 0.0)
                    .map(|&v| BoundChange::upper(v, domains.ub(v), 0.0))
                    .collect()
            };
            let score = nonzero.iter().map(|&k| x[vars[k].0].abs()).sum::<f64>();
            out.push(ConsBranching {
                score,
                children: vec![zero_all(&vars[..split]), zero_all(&vars[split..])],
            });
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BoundKind, Reason};
    use crate::propagation::ImplicationGraph;

    fn domains(n: usize) -> DomainStore {
        DomainStore::new(vec![0.0; n], vec![4.0; n], vec![false; n], 1e-6)
    }

    #[test]
    fn test_propagation_fixes_others() {
        let mut h = Sos1Handler::new();
        h.add_set("s", &[VarId(0), VarId(1), VarId(2)]).unwrap();
        let mut d = domains(3);
        d.tighten(VarId(1), BoundKind::Lower, 0.5, Reason::Global).unwrap();

        let g = ImplicationGraph::new();
        let mut ctx = PropagationContext::new(&mut d, &g, Reason::Propagation { handler: 1 });
        assert_eq!(h.propagate(&[0], &mut ctx).unwrap(), PropagationResult::ReducedDomain);
        assert_eq!((d.ub(VarId(0)), d.ub(VarId(1)), d.ub(VarId(2))), (0.0, 4.0, 0.0));
    }

    #[test]
    fn test_two_nonzero_is_cutoff() {
        let mut h = Sos1Handler::new();
        h.add_set("s", &[VarId(0), VarId(1)]).unwrap();
        let mut d = domains(2);
        d.tighten(VarId(0), BoundKind::Lower, 1.0, Reason::Global).unwrap();
        d.tighten(VarId(1), BoundKind::Lower, 1.0, Reason::Global).unwrap();

        let g = ImplicationGraph::new();
        let mut ctx = PropagationContext::new(&mut d, &g, Reason::Propagation { handler: 1 });
        assert_eq!(h.propagate(&[0], &mut ctx).unwrap(), PropagationResult::Cutoff);
    }

    #[test]
    fn test_branching_covers_set() {
        let mut h = Sos1Handler::new();
        let vars = [VarId(0), VarId(1), VarId(2), VarId(3)];
        h.add_set("s", &vars).unwrap();
        let d = domains(4);
        let x = [0.5, 0.0, 0.25, 0.25];

        assert!(!h.check(&[0], &x, 1e-6).feasible);
        let cands = h.branching_candidates(&[0], &x, &d);
        assert_eq!(cands.len(), 1);
        let children = &cands[0].children;
        assert_eq!(children.len(), 2);

        // Every member is zeroed in exactly one child
        for v in vars {
            let n = children.iter().filter(|ch| ch.iter().any(|c| c.var == v)).count();
            assert_eq!(n, 1);
        }
        assert!(children.iter().all(|ch| !ch.is_empty()));
        assert!(h.add_set("dup", &[VarId(0), VarId(0)]).is_err());
    }
}
