//! Fixpoint propagation over all constraint handlers.

use super::context::PropagationContext;
use super::implications::ImplicationGraph;
use crate::constraint::{ConstraintHandler, ConstraintSet, HandlerId, PropagationResult, VarLock};
use crate::domain::{DomainStore, Reason};
use crate::error::CipResult;

/// Result of [`PropagationEngine::propagate_to_fixpoint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PropagationOutcome {
    /// The node's domain is empty.
    pub cutoff: bool,

    /// Domain reductions applied.
    pub reductions: usize,

    /// Passes run.
    pub rounds: usize,
}

/// Drives handler propagation to a fixpoint.
///
/// Handlers run by decreasing priority. After the first pass of a call, a
/// handler only runs again if one of the variables it watches changed.
#[derive(Debug, Clone, Default)]
pub struct PropagationEngine {
    /// Handler order.
    order: Vec<HandlerId>,

    /// Handlers watching each variable.
    watchers: Vec<Vec<HandlerId>>,

    /// Pass limit (0 = until fixpoint).
    max_rounds: usize,
}

impl PropagationEngine {
    /// Create for the given handlers.
    pub fn new(handlers: &[Box<dyn ConstraintHandler>], num_vars: usize, max_rounds: usize) -> Self {
        let mut order: Vec<HandlerId> = (0..handlers.len()).map(HandlerId).collect();
        order.sort_by_key(|h| (std::cmp::Reverse(handlers[h.0].priority()), h.0));
        Self {
            order,
            watchers: vec![Vec::new(); num_vars],
            max_rounds,
        }
    }

    /// Handler order used by each pass.
    pub fn order(&self) -> &[HandlerId] {
        &self.order
    }

    /// Register the variables of a constraint as watched by `handler`.
    pub fn watch(&mut self, handler: HandlerId, locks: &[VarLock]) -> CipResult<()> {
        for lock in locks {
            let i = lock.var.0;
            if i >= self.watchers.len() {
                self.watchers.try_reserve(i + 1 - self.watchers.len())?;
                self.watchers.resize(i + 1, Vec::new());
            }
            if !self.watchers[i].contains(&handler) {
                self.watchers[i].push(handler);
            }
        }
        Ok(())
    }

    /// Propagate the focus node's domain to a fixpoint.
    ///
    /// Starts with the implication closure of the node's own bound changes,
    /// then runs handler passes until no handler is dirty, the pass limit is
    /// reached, or a cutoff is found (which ends the call immediately).
    pub fn propagate_to_fixpoint(
        &self,
        handlers: &mut [Box<dyn ConstraintHandler>],
        conss: &ConstraintSet,
        domains: &mut DomainStore,
        implications: &ImplicationGraph,
    ) -> CipResult<PropagationOutcome> {
        let mut outcome = PropagationOutcome::default();

        if !implications.is_empty() {
            let vars: Vec<_> = domains.focus_delta().iter().map(|c| c.var).collect();
            let mut ctx = PropagationContext::new(domains, implications, Reason::Implication);
            for var in vars {
                if !ctx.close_implications(var)? {
                    outcome.cutoff = true;
                    break;
                }
            }
            outcome.reductions += ctx.reductions();
            if outcome.cutoff {
                domains.clear_events();
                return Ok(outcome);
            }
        }
        domains.clear_events();

        let mut dirty = vec![true; handlers.len()];
        loop {
            if self.max_rounds > 0 && outcome.rounds >= self.max_rounds {
                break;
            }
            outcome.rounds += 1;

            for &h in &self.order {
                if !dirty[h.0] {
                    continue;
                }
                dirty[h.0] = false;
                let active = conss.active_locals(h);
                if active.is_empty() {
                    continue;
                }

                let handler = &mut handlers[h.0];
                let mut ctx =
                    PropagationContext::new(domains, implications, Reason::Propagation { handler: h.0 });
                let result = handler.propagate(active, &mut ctx)?;
                let (reductions, hit_empty) = (ctx.reductions(), ctx.is_infeasible());
                outcome.reductions += reductions;

                if result == PropagationResult::Cutoff {
                    outcome.cutoff = true;
                } else if hit_empty {
                    debug_assert!(
                        false,
                        "handler '{}' emptied a domain without reporting a cutoff",
                        handler.name()
                    );
                    log::warn!(
                        "handler '{}' emptied a domain without reporting a cutoff; cutting off node",
                        handler.name()
                    );
                    outcome.cutoff = true;
                }
                if outcome.cutoff {
                    domains.clear_events();
                    return Ok(outcome);
                }

                for event in domains.drain_events() {
                    for w in self.watchers.get(event.var.0).map(Vec::as_slice).unwrap_or(&[]) {
                        dirty[w.0] = true;
                    }
                }
            }

            if !dirty.iter().any(|&d| d) {
                break;
            }
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::{CheckResult, LinearHandler, Scope};
    use crate::model::VarId;
    use crate::relaxation::Row;

    fn setup(rows: Vec<Row>, lb: Vec<f64>, ub: Vec<f64>) -> (Vec<Box<dyn ConstraintHandler>>, ConstraintSet, DomainStore, PropagationEngine) {
        let n = lb.len();
        let mut linear = LinearHandler::new();
        let mut conss = ConstraintSet::new(1);
        let mut locks = Vec::new();
        for (i, row) in rows.into_iter().enumerate() {
            let local = linear.add_row(&format!("r{}", i), row, false).unwrap();
            conss.add(HandlerId::LINEAR, local, Scope::Global).unwrap();
            locks.extend(linear.lock_variables(local));
        }
        let handlers: Vec<Box<dyn ConstraintHandler>> = vec![Box::new(linear)];
        let mut engine = PropagationEngine::new(&handlers, n, 0);
        engine.watch(HandlerId::LINEAR, &locks).unwrap();
        let domains = DomainStore::new(lb, ub, vec![true; n], 1e-6);
        (handlers, conss, domains, engine)
    }

    #[test]
    fn test_chain_reaches_fixpoint() {
        // x0 >= 3, x1 >= x0 + 1, x2 >= x1 + 1 on [0, 10]
        let rows = vec![
            Row::greater_equal(&[(VarId(0), 1.0)], 3.0),
            Row::greater_equal(&[(VarId(1), 1.0), (VarId(0), -1.0)], 1.0),
            Row::greater_equal(&[(VarId(2), 1.0), (VarId(1), -1.0)], 1.0),
        ];
        let (mut handlers, conss, mut d, engine) = setup(rows, vec![0.0; 3], vec![10.0; 3]);
        let out = engine
            .propagate_to_fixpoint(&mut handlers, &conss, &mut d, &ImplicationGraph::new())
            .unwrap();
        assert!(!out.cutoff);
        assert_eq!((d.lb(VarId(0)), d.lb(VarId(1)), d.lb(VarId(2))), (3.0, 4.0, 5.0));
        // Upper bounds move as well: x1 <= 9, x0 <= 8
        assert_eq!((d.ub(VarId(0)), d.ub(VarId(1))), (8.0, 9.0));
    }

    #[test]
    fn test_cutoff_detected() {
        // x0 + x1 >= 3 with binaries
        let rows = vec![Row::greater_equal(&[(VarId(0), 1.0), (VarId(1), 1.0)], 3.0)];
        let (mut handlers, conss, mut d, engine) = setup(rows, vec![0.0; 2], vec![1.0; 2]);
        let out = engine
            .propagate_to_fixpoint(&mut handlers, &conss, &mut d, &ImplicationGraph::new())
            .unwrap();
        assert!(out.cutoff);
    }

    #[test]
    fn test_priority_order() {
        struct Dummy(i32);
        impl ConstraintHandler for Dummy {
            fn name(&self) -> &str {
                "dummy"
            }
            fn priority(&self) -> i32 {
                self.0
            }
            fn num_constraints(&self) -> usize {
                0
            }
            fn propagate(&mut self, _: &[usize], _: &mut PropagationContext<'_>) -> CipResult<PropagationResult> {
                Ok(PropagationResult::DidNotFind)
            }
            fn check(&self, _: &[usize], _: &[f64], _: f64) -> CheckResult {
                CheckResult::from_violated(Vec::new())
            }
            fn lock_variables(&self, _: usize) -> Vec<VarLock> {
                Vec::new()
            }
        }
        let handlers: Vec<Box<dyn ConstraintHandler>> =
            vec![Box::new(Dummy(0)), Box::new(Dummy(5)), Box::new(Dummy(0)), Box::new(Dummy(-1))];
        let engine = PropagationEngine::new(&handlers, 0, 0);
        assert_eq!(engine.order(), &[HandlerId(1), HandlerId(0), HandlerId(2), HandlerId(3)]);
    }
}
