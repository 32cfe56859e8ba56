//! Lock-based rounding of relaxation solutions.

use super::{Heuristic, HeuristicContext};
use crate::error::CipResult;
use crate::model::VarId;

/// Round fractional integer variables in a direction no constraint locks.
///
/// A variable without down-locks is rounded down, one without up-locks is
/// rounded up; if both directions are locked the heuristic gives up. The
/// result is feasible whenever the relaxation solution was, apart from
/// integrality.
#[derive(Debug, Clone, Default)]
pub struct SimpleRounding {
    calls: u64,
    found: u64,
}

impl SimpleRounding {
    /// Create the heuristic.
    pub fn new() -> Self {
        Self::default()
    }

    /// (calls, solutions proposed).
    pub fn stats(&self) -> (u64, u64) {
        (self.calls, self.found)
    }
}

impl Heuristic for SimpleRounding {
    fn name(&self) -> &str {
        "simple_rounding"
    }

    fn find(&mut self, ctx: &HeuristicContext<'_>) -> CipResult<Option<Vec<f64>>> {
        self.calls += 1;
        let mut sol = ctx.x.to_vec();
        let mut changed = false;

        for (i, value) in sol.iter_mut().enumerate() {
            let var = VarId(i);
            if !ctx.domains.is_integral(var) {
                continue;
            }
            let v = *value;
            if (v - v.round()).abs() <= ctx.int_tol {
                continue;
            }
            let down = v.floor();
            let up = v.ceil();
            if ctx.locks.may_round_down(var) && down >= ctx.domains.lb(var) {
                *value = down;
            } else if ctx.locks.may_round_up(var) && up <= ctx.domains.ub(var) {
                *value = up;
            } else {
                return Ok(None);
            }
            changed = true;
        }

        if changed {
            self.found += 1;
            Ok(Some(sol))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::{LockTable, VarLock};
    use crate::domain::DomainStore;

    #[test]
    fn test_rounds_in_unlocked_direction() {
        let domains = DomainStore::new(vec![0.0; 3], vec![1.0; 3], vec![true, true, false], 1e-6);
        let mut locks = LockTable::new(3);
        // x0 appears in a <= row (up-locked), x1 in a >= row (down-locked)
        locks
            .add(&[
                VarLock { var: VarId(0), down: false, up: true },
                VarLock { var: VarId(1), down: true, up: false },
            ])
            .unwrap();
        let x = [0.4, 0.6, 0.3];
        let ctx = HeuristicContext {
            x: &x,
            domains: &domains,
            locks: &locks,
            int_tol: 1e-6,
        };
        let mut h = SimpleRounding::new();
        let sol = h.find(&ctx).unwrap().unwrap();
        assert_eq!(sol, vec![0.0, 1.0, 0.3]);
        assert_eq!(h.stats(), (1, 1));
    }

    #[test]
    fn test_gives_up_when_both_locked() {
        let domains = DomainStore::new(vec![0.0], vec![1.0], vec![true], 1e-6);
        let mut locks = LockTable::new(1);
        locks.add(&[VarLock { var: VarId(0), down: true, up: true }]).unwrap();
        let x = [0.5];
        let ctx = HeuristicContext {
            x: &x,
            domains: &domains,
            locks: &locks,
            int_tol: 1e-6,
        };
        assert!(SimpleRounding::new().find(&ctx).unwrap().is_none());

        // Integral input: nothing to round
        let x = [1.0];
        let ctx = HeuristicContext { x: &x, ..ctx };
        assert!(SimpleRounding::new().find(&ctx).unwrap().is_none());
    }
}
