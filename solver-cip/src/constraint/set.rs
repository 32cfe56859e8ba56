//! Problem-wide constraint list with node-scoped activation.

use std::collections::HashMap;
use std::fmt;

use super::handler::HandlerId;
use crate::error::{CipError, CipResult};
use crate::search::NodeId;

/// Stable index of a constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConsId(pub usize);

impl fmt::Display for ConsId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// Where a constraint is valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Valid in the whole tree.
    Global,
    /// Valid in the subtree of a node.
    Local(NodeId),
}

#[derive(Debug, Clone)]
struct ConsRecord {
    handler: HandlerId,
    local: usize,
    scope: Scope,
    deleted: bool,
}

/// Constraints activated and deactivated by a path switch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivationDelta {
    /// Constraints that became active, in activation order.
    pub activated: Vec<ConsId>,
    /// Constraints that became inactive, in deactivation order.
    pub deactivated: Vec<ConsId>,
}

/// Constraint set.
///
/// Global constraints are always active. Local constraints are active
/// exactly while their node is on the active path: switching the path
/// deactivates the constraints of the nodes left (deepest first) and
/// activates those of the nodes entered (shallowest first).
#[derive(Debug, Clone, Default)]
pub struct ConstraintSet {
    records: Vec<ConsRecord>,

    /// Active constraints per handler.
    active: Vec<Vec<ConsId>>,

    /// Handler-local indices parallel to `active`.
    active_local: Vec<Vec<usize>>,

    /// Position in `active`, per constraint.
    active_pos: Vec<Option<usize>>,

    /// Active path and the local constraints each node activated.
    path: Vec<(NodeId, Vec<ConsId>)>,

    /// Local constraints per node.
    by_node: HashMap<NodeId, Vec<ConsId>>,
}

impl ConstraintSet {
    /// Create for `num_handlers` handlers.
    pub fn new(num_handlers: usize) -> Self {
        Self {
            active: vec![Vec::new(); num_handlers],
            active_local: vec![Vec::new(); num_handlers],
            ..Default::default()
        }
    }

    /// Make room for a newly included handler.
    pub fn add_handler(&mut self) -> HandlerId {
        self.active.push(Vec::new());
        self.active_local.push(Vec::new());
        HandlerId(self.active.len() - 1)
    }

    /// Number of handlers.
    pub fn num_handlers(&self) -> usize {
        self.active.len()
    }

    /// Number of constraints ever added.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no constraint was added.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Add a constraint.
    ///
    /// Global constraints are activated immediately. A local constraint of a
    /// node on the active path is activated immediately as well; otherwise
    /// it waits until its node is entered.
    pub fn add(&mut self, handler: HandlerId, local: usize, scope: Scope) -> CipResult<ConsId> {
        if handler.0 >= self.active.len() {
            return Err(CipError::InternalError(format!("unknown constraint handler {}", handler)));
        }
        self.records.try_reserve(1)?;
        self.active_pos.try_reserve(1)?;
        let id = ConsId(self.records.len());
        self.records.push(ConsRecord {
            handler,
            local,
            scope,
            deleted: false,
        });
        self.active_pos.push(None);

        match scope {
            Scope::Global => self.activate(id),
            Scope::Local(node) => {
                let list = self.by_node.entry(node).or_default();
                list.try_reserve(1)?;
                list.push(id);
                if let Some((_, entered)) = self.path.iter_mut().find(|(n, _)| *n == node) {
                    entered.push(id);
                    self.activate(id);
                }
            }
        }
        Ok(id)
    }

    /// Handler of a constraint.
    pub fn handler(&self, id: ConsId) -> HandlerId {
        self.records[id.0].handler
    }

    /// Handler-local index of a constraint.
    pub fn local_index(&self, id: ConsId) -> usize {
        self.records[id.0].local
    }

    /// Scope of a constraint.
    pub fn scope(&self, id: ConsId) -> Scope {
        self.records[id.0].scope
    }

    /// Whether a constraint is active.
    pub fn is_active(&self, id: ConsId) -> bool {
        self.active_pos[id.0].is_some()
    }

    /// Whether a constraint was deleted.
    pub fn is_deleted(&self, id: ConsId) -> bool {
        self.records[id.0].deleted
    }

    /// Active constraints of a handler.
    pub fn active(&self, handler: HandlerId) -> &[ConsId] {
        &self.active[handler.0]
    }

    /// Handler-local indices of the active constraints of a handler.
    pub fn active_locals(&self, handler: HandlerId) -> &[usize] {
        &self.active_local[handler.0]
    }

    /// All active constraints.
    pub fn all_active(&self) -> impl Iterator<Item = ConsId> + '_ {
        self.active.iter().flatten().copied()
    }

    /// Delete a constraint; it never becomes active again.
    pub fn delete(&mut self, id: ConsId) {
        self.deactivate(id);
        self.records[id.0].deleted = true;
    }

    /// Delete all local constraints of a node that is removed from the tree.
    pub fn release_node(&mut self, node: NodeId) -> Vec<ConsId> {
        let released = self.by_node.remove(&node).unwrap_or_default();
        for &id in &released {
            self.delete(id);
        }
        released
    }

    /// Local constraints added at a node.
    pub fn node_constraints(&self, node: NodeId) -> &[ConsId] {
        self.by_node.get(&node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Make `target` (root first) the active path.
    pub fn switch_path(&mut self, target: &[NodeId]) -> CipResult<ActivationDelta> {
        let common = self
            .path
            .iter()
            .zip(target)
            .take_while(|((n, _), t)| n == *t)
            .count();

        let mut delta = ActivationDelta::default();
        while self.path.len() > common {
            let Some((_, entered)) = self.path.pop() else {
                break;
            };
            for &id in entered.iter().rev() {
                if self.deactivate(id) {
                    delta.deactivated.push(id);
                }
            }
        }

        self.path.try_reserve(target.len() - common)?;
        for &node in &target[common..] {
            let mut entered = Vec::new();
            for &id in self.by_node.get(&node).map(Vec::as_slice).unwrap_or(&[]) {
                if !self.records[id.0].deleted && !self.is_active(id) {
                    entered.push(id);
                }
            }
            for &id in &entered {
                self.activate(id);
                delta.activated.push(id);
            }
            self.path.push((node, entered));
        }
        Ok(delta)
    }

    fn activate(&mut self, id: ConsId) {
        if self.active_pos[id.0].is_some() {
            return;
        }
        let rec = &self.records[id.0];
        let h = rec.handler.0;
        self.active_pos[id.0] = Some(self.active[h].len());
        self.active[h].push(id);
        self.active_local[h].push(rec.local);
    }

    /// Swap-remove from the active list. Returns whether it was active.
    fn deactivate(&mut self, id: ConsId) -> bool {
        let Some(pos) = self.active_pos[id.0].take() else {
            return false;
        };
        let h = self.records[id.0].handler.0;
        self.active[h].swap_remove(pos);
        self.active_local[h].swap_remove(pos);
        if let Some(&moved) = self.active[h].get(pos) {
            self.active_pos[moved.0] = Some(pos);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted(mut v: Vec<ConsId>) -> Vec<ConsId> {
        v.sort();
        v
    }

    #[test]
    fn test_global_always_active() {
        let mut set = ConstraintSet::new(2);
        let a = set.add(HandlerId(0), 0, Scope::Global).unwrap();
        let b = set.add(HandlerId(1), 0, Scope::Global).unwrap();
        let c = set.add(HandlerId(0), 1, Scope::Global).unwrap();
        assert_eq!(set.active(HandlerId(0)), &[a, c]);
        assert_eq!(set.active_locals(HandlerId(0)), &[0, 1]);

        set.delete(a);
        assert_eq!(set.active(HandlerId(0)), &[c]);
        assert_eq!(set.active_locals(HandlerId(0)), &[1]);
        assert!(set.is_active(b));
        assert!(set.add(HandlerId(5), 0, Scope::Global).is_err());
    }

    #[test]
    fn test_local_activation_follows_path() {
        let mut set = ConstraintSet::new(1);
        let (root, a, b) = (NodeId(0), NodeId(1), NodeId(2));
        set.switch_path(&[root, a]).unwrap();
        let la = set.add(HandlerId(0), 0, Scope::Local(a)).unwrap();
        let lb = set.add(HandlerId(0), 1, Scope::Local(b)).unwrap();
        assert!(set.is_active(la));
        assert!(!set.is_active(lb));

        let delta = set.switch_path(&[root, b]).unwrap();
        assert_eq!(delta.deactivated, vec![la]);
        assert_eq!(delta.activated, vec![lb]);

        let back = set.switch_path(&[root, a]).unwrap();
        assert_eq!(back.deactivated, vec![lb]);
        assert_eq!(back.activated, vec![la]);
    }

    #[test]
    fn test_activation_is_symmetric() {
        let mut set = ConstraintSet::new(1);
        let path = [NodeId(0), NodeId(1), NodeId(3), NodeId(7)];
        for (i, &n) in path.iter().enumerate().skip(1) {
            set.add(HandlerId(0), i, Scope::Local(n)).unwrap();
            set.add(HandlerId(0), i + 10, Scope::Local(n)).unwrap();
        }
        let down = set.switch_path(&path).unwrap();
        let up = set.switch_path(&path[..1]).unwrap();
        assert_eq!(sorted(down.activated), sorted(up.deactivated));
        assert!(down.deactivated.is_empty() && up.activated.is_empty());
        assert!(set.active(HandlerId(0)).is_empty());
    }

    #[test]
    fn test_release_node() {
        let mut set = ConstraintSet::new(1);
        let n = NodeId(4);
        set.switch_path(&[NodeId(0), n]).unwrap();
        let id = set.add(HandlerId(0), 0, Scope::Local(n)).unwrap();
        set.switch_path(&[NodeId(0)]).unwrap();
        assert_eq!(set.release_node(n), vec![id]);
        assert!(set.is_deleted(id));
        let delta = set.switch_path(&[NodeId(0), n]).unwrap();
        assert!(delta.activated.is_empty());
    }
}
