//! Global and node-local variable bounds with a trail for undo.

use super::change::{BoundChange, BoundKind, DomainEvent, Reason, TightenResult};
use crate::error::CipResult;
use crate::model::VarId;
use crate::search::NodeId;

/// A node on the active path together with the first trail entry it owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PathEntry {
    node: NodeId,
    trail_start: usize,
}

/// Domain store.
///
/// Local bounds are only mutated through [`DomainStore::tighten`] and undone
/// through the trail, so the bounds of any node are reproduced by replaying
/// the deltas of its root path.
#[derive(Debug, Clone)]
pub struct DomainStore {
    /// Global lower bounds (valid in the whole tree).
    glb: Vec<f64>,

    /// Global upper bounds.
    gub: Vec<f64>,

    /// Local lower bounds of the active node.
    lb: Vec<f64>,

    /// Local upper bounds of the active node.
    ub: Vec<f64>,

    /// Integrality flags (bounds are rounded).
    integral: Vec<bool>,

    /// Applied changes, in order.
    trail: Vec<BoundChange>,

    /// Active path from the root.
    path: Vec<PathEntry>,

    /// Tightenings not yet consumed by propagation.
    events: Vec<DomainEvent>,

    /// Variables created with lb > ub.
    empty_domains: usize,

    /// Bound comparison tolerance.
    feas_tol: f64,
}

impl DomainStore {
    /// Create from initial bounds.
    pub fn new(lb: Vec<f64>, ub: Vec<f64>, integral: Vec<bool>, feas_tol: f64) -> Self {
        let empty_domains = lb.iter().zip(&ub).filter(|&(&l, &u)| l > u + feas_tol).count();
        Self {
            glb: lb.clone(),
            gub: ub.clone(),
            lb,
            ub,
            integral,
            trail: Vec::new(),
            path: Vec::new(),
            events: Vec::new(),
            empty_domains,
            feas_tol,
        }
    }

    /// Append a variable (column generation). Local bounds start at the
    /// global bounds.
    pub fn add_variable(&mut self, lb: f64, ub: f64, integral: bool) -> CipResult<VarId> {
        self.glb.try_reserve(1)?;
        self.gub.try_reserve(1)?;
        self.lb.try_reserve(1)?;
        self.ub.try_reserve(1)?;
        self.integral.try_reserve(1)?;
        if lb > ub + self.feas_tol {
            self.empty_domains += 1;
        }
        let id = VarId(self.lb.len());
        self.glb.push(lb);
        self.gub.push(ub);
        self.lb.push(lb);
        self.ub.push(ub);
        self.integral.push(integral);
        Ok(id)
    }

    /// Number of variables.
    pub fn num_vars(&self) -> usize {
        self.lb.len()
    }

    /// Local lower bound.
    #[inline]
    pub fn lb(&self, var: VarId) -> f64 {
        self.lb[var.0]
    }

    /// Local upper bound.
    #[inline]
    pub fn ub(&self, var: VarId) -> f64 {
        self.ub[var.0]
    }

    /// Global lower bound.
    #[inline]
    pub fn global_lb(&self, var: VarId) -> f64 {
        self.glb[var.0]
    }

    /// Global upper bound.
    #[inline]
    pub fn global_ub(&self, var: VarId) -> f64 {
        self.gub[var.0]
    }

    /// All local lower bounds.
    pub fn lbs(&self) -> &[f64] {
        &self.lb
    }

    /// All local upper bounds.
    pub fn ubs(&self) -> &[f64] {
        &self.ub
    }

    /// Whether a variable's local bounds are rounded to integers.
    #[inline]
    pub fn is_integral(&self, var: VarId) -> bool {
        self.integral[var.0]
    }

    /// Whether the local domain is a single point.
    #[inline]
    pub fn is_fixed(&self, var: VarId) -> bool {
        self.ub[var.0] - self.lb[var.0] <= self.feas_tol
    }

    /// Whether the global domain is a single point.
    pub fn is_globally_fixed(&self, var: VarId) -> bool {
        self.gub[var.0] - self.glb[var.0] <= self.feas_tol
    }

    /// Whether any variable was created with an empty domain.
    pub fn has_empty_domain(&self) -> bool {
        self.empty_domains > 0
    }

    /// Depth of the active node (None before the first focus).
    pub fn depth(&self) -> Option<usize> {
        self.path.len().checked_sub(1)
    }

    /// Active node.
    pub fn focus(&self) -> Option<NodeId> {
        self.path.last().map(|e| e.node)
    }

    /// Whether changes are currently global (no focus yet, or the root).
    pub fn at_root(&self) -> bool {
        self.path.len() <= 1
    }

    /// Tighten one bound.
    ///
    /// Integral variables are rounded inward first. A value that does not
    /// tighten is [`TightenResult::Redundant`]; a value crossing the
    /// opposite bound by more than the tolerance is
    /// [`TightenResult::Infeasible`]. Neither changes any state.
    pub fn tighten(
        &mut self,
        var: VarId,
        kind: BoundKind,
        value: f64,
        reason: Reason,
    ) -> CipResult<TightenResult> {
        let i = var.0;
        let tol = self.feas_tol;
        let mut value = value;
        if value.is_nan() {
            return Ok(TightenResult::Redundant);
        }

        match kind {
            BoundKind::Lower => {
                if self.integral[i] {
                    value = (value - tol).ceil();
                }
                if value <= self.lb[i] + bound_eps(self.lb[i]) {
                    return Ok(TightenResult::Redundant);
                }
                if value > self.ub[i] + tol {
                    return Ok(TightenResult::Infeasible);
                }
                value = value.min(self.ub[i]);
            }
            BoundKind::Upper => {
                if self.integral[i] {
                    value = (value + tol).floor();
                }
                if value >= self.ub[i] - bound_eps(self.ub[i]) {
                    return Ok(TightenResult::Redundant);
                }
                if value < self.lb[i] - tol {
                    return Ok(TightenResult::Infeasible);
                }
                value = value.max(self.lb[i]);
            }
        }

        self.trail.try_reserve(1)?;
        self.events.try_reserve(1)?;
        let old = match kind {
            BoundKind::Lower => std::mem::replace(&mut self.lb[i], value),
            BoundKind::Upper => std::mem::replace(&mut self.ub[i], value),
        };
        if self.at_root() {
            match kind {
                BoundKind::Lower => self.glb[i] = self.glb[i].max(value),
                BoundKind::Upper => self.gub[i] = self.gub[i].min(value),
            }
        }
        self.trail.push(BoundChange {
            var,
            kind,
            old,
            new: value,
            reason,
        });
        self.events.push(DomainEvent { var, kind });
        Ok(TightenResult::Applied)
    }

    /// Take pending tightening events.
    pub fn drain_events(&mut self) -> std::vec::Drain<'_, DomainEvent> {
        self.events.drain(..)
    }

    /// Discard pending events.
    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    /// Changes recorded at the active node.
    pub fn focus_delta(&self) -> &[BoundChange] {
        match self.path.last() {
            Some(entry) => &self.trail[entry.trail_start..],
            None => &[],
        }
    }

    /// Make `target` (root first) the active path.
    ///
    /// Only the suffix of the current path that differs from `target` is
    /// undone, and only the differing suffix of `target` is replayed through
    /// `delta_of`. Returns `false` if a replayed change crosses bounds; the
    /// store then holds the partial replay and the target must be discarded.
    pub fn restore_to_node<'d, F>(&mut self, target: &[NodeId], mut delta_of: F) -> CipResult<bool>
    where
        F: FnMut(NodeId) -> &'d [BoundChange],
    {
        let common = self
            .path
            .iter()
            .zip(target)
            .take_while(|(entry, node)| entry.node == **node)
            .count();

        self.undo_to(common);
        self.path.try_reserve(target.len().saturating_sub(common))?;

        let mut feasible = true;
        for &node in &target[common..] {
            self.path.push(PathEntry {
                node,
                trail_start: self.trail.len(),
            });
            if !feasible {
                continue;
            }
            for change in delta_of(node) {
                if self.tighten(change.var, change.kind, change.new, change.reason)?
                    == TightenResult::Infeasible
                {
                    feasible = false;
                    break;
                }
            }
        }
        self.events.clear();
        Ok(feasible)
    }

    /// Leave all nodes, keeping global bounds.
    pub fn reset_to_root(&mut self) {
        self.undo_to(0);
        self.events.clear();
    }

    fn undo_to(&mut self, keep: usize) {
        while self.path.len() > keep {
            let Some(entry) = self.path.pop() else {
                break;
            };
            while self.trail.len() > entry.trail_start {
                let Some(change) = self.trail.pop() else {
                    break;
                };
                match change.kind {
                    BoundKind::Lower => self.lb[change.var.0] = change.old,
                    BoundKind::Upper => self.ub[change.var.0] = change.old,
                }
            }
        }
        if self.path.is_empty() {
            // Root changes are global; local bounds fall back to them.
            self.trail.clear();
            self.lb.copy_from_slice(&self.glb);
            self.ub.copy_from_slice(&self.gub);
        }
    }
}

/// Smallest bound movement that counts as a tightening.
#[inline]
fn bound_eps(bound: f64) -> f64 {
    1e-9 * bound.abs().max(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> DomainStore {
        DomainStore::new(
            vec![0.0, 0.0, -5.0],
            vec![1.0, 10.0, 5.0],
            vec![true, true, false],
            1e-6,
        )
    }

    fn bc(var: usize, kind: BoundKind, old: f64, new: f64) -> BoundChange {
        BoundChange {
            var: VarId(var),
            kind,
            old,
            new,
            reason: Reason::Branching,
        }
    }

    #[test]
    fn test_tighten_rules() {
        let mut d = store();
        let x = VarId(1);

        assert_eq!(d.tighten(x, BoundKind::Upper, 20.0, Reason::Global).unwrap(), TightenResult::Redundant);
        assert_eq!(d.tighten(x, BoundKind::Upper, 7.5, Reason::Global).unwrap(), TightenResult::Applied);
        assert_eq!(d.ub(x), 7.0);
        assert_eq!(d.tighten(x, BoundKind::Lower, 7.2, Reason::Global).unwrap(), TightenResult::Infeasible);
        assert_eq!(d.lb(x), 0.0);

        // Continuous, no rounding
        let y = VarId(2);
        assert_eq!(d.tighten(y, BoundKind::Lower, -1.25, Reason::Global).unwrap(), TightenResult::Applied);
        assert_eq!(d.lb(y), -1.25);

        let events: Vec<_> = d.drain_events().collect();
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_root_changes_are_global() {
        let mut d = store();
        let root = NodeId(0);
        assert!(d.restore_to_node(&[root], |_| &[]).unwrap());
        d.tighten(VarId(1), BoundKind::Upper, 4.0, Reason::Global).unwrap();
        assert_eq!(d.global_ub(VarId(1)), 4.0);

        let child = NodeId(1);
        let delta = [bc(1, BoundKind::Lower, 0.0, 2.0)];
        assert!(d.restore_to_node(&[root, child], |n| if n == child { &delta } else { &[] }).unwrap());
        assert_eq!(d.lb(VarId(1)), 2.0);
        assert_eq!(d.global_lb(VarId(1)), 0.0);
    }

    #[test]
    fn test_switch_between_siblings() {
        let mut d = store();
        let (root, a, b, a1) = (NodeId(0), NodeId(1), NodeId(2), NodeId(3));
        let da = [bc(1, BoundKind::Upper, 10.0, 3.0)];
        let db = [bc(1, BoundKind::Lower, 0.0, 4.0)];
        let da1 = [bc(0, BoundKind::Lower, 0.0, 1.0)];
        let delta = |n: NodeId| -> &[BoundChange] {
            match n.0 {
                1 => &da,
                2 => &db,
                3 => &da1,
                _ => &[],
            }
        };

        assert!(d.restore_to_node(&[root, a, a1], delta).unwrap());
        assert_eq!((d.lb(VarId(0)), d.ub(VarId(1))), (1.0, 3.0));
        assert_eq!(d.depth(), Some(2));

        assert!(d.restore_to_node(&[root, b], delta).unwrap());
        assert_eq!(d.lb(VarId(0)), 0.0);
        assert_eq!((d.lb(VarId(1)), d.ub(VarId(1))), (4.0, 10.0));
        assert_eq!(d.focus(), Some(b));
    }

    #[test]
    fn test_restore_is_idempotent() {
        let mut d = store();
        let (root, a) = (NodeId(0), NodeId(1));
        let da = [bc(2, BoundKind::Upper, 5.0, 0.5)];
        let delta = |n: NodeId| -> &[BoundChange] { if n == a { &da } else { &[] } };

        d.restore_to_node(&[root, a], delta).unwrap();
        let once = (d.lbs().to_vec(), d.ubs().to_vec());
        d.restore_to_node(&[root, a], delta).unwrap();
        assert_eq!((d.lbs().to_vec(), d.ubs().to_vec()), once);
        assert_eq!(d.focus_delta().len(), 1);
    }

    #[test]
    fn test_replay_detects_crossing() {
        let mut d = store();
        let (root, a) = (NodeId(0), NodeId(1));
        d.restore_to_node(&[root], |_| &[]).unwrap();
        d.tighten(VarId(1), BoundKind::Upper, 2.0, Reason::Global).unwrap();

        // Recorded when the upper bound was still 10
        let da = [bc(1, BoundKind::Lower, 0.0, 5.0)];
        assert!(!d.restore_to_node(&[root, a], |n| if n == a { &da } else { &[] }).unwrap());
    }

    #[test]
    fn test_empty_domain_detected() {
        let d = DomainStore::new(vec![2.0], vec![1.0], vec![false], 1e-6);
        assert!(d.has_empty_domain());
        assert!(!store().has_empty_domain());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        /// Random tree: node `i + 1` hangs below `parent[i] % (i + 1)` and
        /// tightens one bound. Lower bounds stay below 0 and upper bounds
        /// above 0, so no path empties a domain.
        fn tree() -> impl Strategy<Value = Vec<(usize, usize, bool, f64)>> {
            proptest::collection::vec((0usize..64, 0usize..3, any::<bool>(), 0.1f64..9.9), 1..24)
        }

        fn path_to(parents: &[usize], node: usize) -> Vec<NodeId> {
            let mut path = vec![NodeId(node as u64)];
            let mut n = node;
            while n > 0 {
                n = parents[n - 1];
                path.push(NodeId(n as u64));
            }
            path.reverse();
            path
        }

        proptest! {
            /// Bounds at a node do not depend on where the store came from.
            #[test]
            fn prop_restore_is_path_independent(
                spec in tree(),
                visits in proptest::collection::vec(0usize..64, 1..12),
            ) {
                let parents: Vec<usize> = spec.iter().enumerate().map(|(i, s)| s.0 % (i + 1)).collect();
                let deltas: Vec<Vec<BoundChange>> = std::iter::once(Vec::new())
                    .chain(spec.iter().map(|&(_, var, lower, mag)| {
                        if lower {
                            vec![bc(var, BoundKind::Lower, -10.0, -mag)]
                        } else {
                            vec![bc(var, BoundKind::Upper, 10.0, mag)]
                        }
                    }))
                    .collect();
                let delta_of = |n: NodeId| -> &[BoundChange] { &deltas[n.0 as usize] };
                let fresh = || DomainStore::new(vec![-10.0; 3], vec![10.0; 3], vec![false; 3], 1e-6);

                let mut walker = fresh();
                for &v in &visits {
                    let target = path_to(&parents, v % deltas.len());
                    prop_assert!(walker.restore_to_node(&target, delta_of).unwrap());

                    let mut direct = fresh();
                    prop_assert!(direct.restore_to_node(&target, delta_of).unwrap());
                    prop_assert_eq!(walker.lbs(), direct.lbs());
                    prop_assert_eq!(walker.ubs(), direct.ubs());
                    prop_assert_eq!(walker.depth(), Some(target.len() - 1));
                }

                walker.reset_to_root();
                prop_assert_eq!(walker.lbs(), &[-10.0; 3][..]);
                prop_assert_eq!(walker.ubs(), &[10.0; 3][..]);
            }
        }
    }
}
