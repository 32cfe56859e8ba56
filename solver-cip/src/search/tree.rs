//! Search tree: node storage, child creation, pruning and node removal.

use std::collections::HashMap;

use super::node::{BranchInfo, Node, NodeStatus, PruneReason};
use super::{NodeId, NodeQueue};
use crate::branching::BranchingDecision;
use crate::domain::BoundChange;
use crate::error::{CipError, CipResult};
use crate::relaxation::SavedBasis;
use crate::settings::NodeSelection;

/// Search tree.
///
/// Holds every node that is open, being processed, unresolved, or closed
/// with children still in the tree. A closed node is removed as soon as its
/// last child is removed; removed ids are collected for
/// [`SearchTree::drain_released`] so their local constraints can be freed.
pub struct SearchTree {
    /// Live nodes.
    nodes: HashMap<NodeId, Node>,

    /// Open nodes by selection policy.
    queue: NodeQueue,

    /// Next node ID to assign.
    next_id: u64,

    /// Nodes removed since the last drain.
    released: Vec<NodeId>,

    /// Unresolved nodes (kept for the dual bound).
    unresolved: Vec<NodeId>,

    /// Nodes pruned by bound (eagerly or at pop).
    pruned_by_bound: u64,

    /// Deepest node created.
    max_depth: usize,
}

impl SearchTree {
    /// Create an empty tree.
    pub fn new(selection: NodeSelection) -> Self {
        Self {
            nodes: HashMap::new(),
            queue: NodeQueue::new(selection),
            next_id: 0,
            released: Vec::new(),
            unresolved: Vec::new(),
            pruned_by_bound: 0,
            max_depth: 0,
        }
    }

    fn next_node_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Create the root node and queue it.
    pub fn create_root(&mut self, bound: f64) -> CipResult<NodeId> {
        if !self.nodes.is_empty() {
            return Err(CipError::InternalError("root created twice".into()));
        }
        let id = self.next_node_id();
        self.nodes.try_reserve(1)?;
        self.nodes.insert(id, Node::root(id, bound));
        self.queue.push(id, bound, bound, 0)?;
        Ok(id)
    }

    /// A live node.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    /// A live node, mutably.
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    fn get(&self, id: NodeId) -> CipResult<&Node> {
        self.nodes
            .get(&id)
            .ok_or_else(|| CipError::InternalError(format!("node {} is not in the tree", id)))
    }

    fn get_mut(&mut self, id: NodeId) -> CipResult<&mut Node> {
        self.nodes
            .get_mut(&id)
            .ok_or_else(|| CipError::InternalError(format!("node {} is not in the tree", id)))
    }

    /// Path from the root to `id`, root first.
    pub fn path_to(&self, id: NodeId) -> CipResult<Vec<NodeId>> {
        let mut path = Vec::with_capacity(self.get(id)?.depth + 1);
        let mut cur = Some(id);
        while let Some(n) = cur {
            path.push(n);
            cur = self.get(n)?.parent;
        }
        path.reverse();
        Ok(path)
    }

    /// Bound changes introduced at a node (empty for unknown nodes).
    pub fn delta(&self, id: NodeId) -> &[BoundChange] {
        self.nodes.get(&id).map_or(&[], |n| n.bound_changes.as_slice())
    }

    /// Append changes found by propagation to the focus node's delta, so
    /// replaying the path reproduces them without propagating again.
    pub fn record_changes(&mut self, id: NodeId, changes: &[BoundChange]) -> CipResult<()> {
        let node = self.get_mut(id)?;
        node.bound_changes.try_reserve(changes.len())?;
        node.bound_changes.extend_from_slice(changes);
        Ok(())
    }

    /// Pop the next node to process, discarding nodes that became
    /// prunable since they were queued.
    pub fn pop_next(&mut self, prunable: impl Fn(f64) -> bool) -> CipResult<Option<NodeId>> {
        while let Some(id) = self.queue.pop() {
            let bound = self.get(id)?.dual_bound;
            if prunable(bound) {
                self.pruned_by_bound += 1;
                self.close(id, NodeStatus::Pruned(PruneReason::BoundExceeded))?;
                continue;
            }
            self.get_mut(id)?.status = NodeStatus::Solving;
            return Ok(Some(id));
        }
        Ok(None)
    }

    /// Create the children of a branched node and queue them.
    ///
    /// The parent is marked branched and keeps `basis` for the children's
    /// warm start.
    pub fn push_children(
        &mut self,
        parent: NodeId,
        decision: BranchingDecision,
        parent_lp: f64,
        basis: Option<SavedBasis>,
    ) -> CipResult<Vec<NodeId>> {
        if decision.children.len() < 2 {
            return Err(CipError::InternalError(format!(
                "branching at node {} produced {} children",
                parent,
                decision.children.len()
            )));
        }
        let var = decision.var;
        let first = self.next_id;
        self.next_id += decision.children.len() as u64;

        let parent_node = self.get(parent)?;
        let children: Vec<Node> = decision
            .children
            .into_iter()
            .enumerate()
            .map(|(k, spec)| {
                let mut child = parent_node.child(NodeId(first + k as u64), spec.changes, spec.estimate);
                if let (Some(cand), Some(dir)) = (var, spec.dir) {
                    child.branch = Some(BranchInfo { cand, dir, parent_lp });
                }
                child
            })
            .collect();

        self.nodes.try_reserve(children.len())?;
        let mut ids = Vec::with_capacity(children.len());
        for child in children {
            let id = child.id;
            self.max_depth = self.max_depth.max(child.depth);
            self.queue.push(id, child.dual_bound, child.estimate, child.depth)?;
            self.nodes.insert(id, child);
            ids.push(id);
        }

        let node = self.get_mut(parent)?;
        node.status = NodeStatus::Branched;
        node.live_children = ids.len();
        node.basis = basis;
        self.queue.set_last_children(&ids);
        Ok(ids)
    }

    /// Close a node without children and remove it (and any ancestors left
    /// without children).
    pub fn prune(&mut self, id: NodeId, reason: PruneReason) -> CipResult<()> {
        self.close(id, NodeStatus::Pruned(reason))
    }

    fn close(&mut self, id: NodeId, status: NodeStatus) -> CipResult<()> {
        self.get_mut(id)?.status = status;
        let mut cur = id;
        loop {
            let node = self.get(cur)?;
            if !node.status.is_closed() || node.live_children > 0 {
                return Ok(());
            }
            let parent = node.parent;
            self.nodes.remove(&cur);
            self.released.push(cur);
            match parent {
                Some(p) => {
                    let pn = self.get_mut(p)?;
                    pn.live_children = pn.live_children.saturating_sub(1);
                    cur = p;
                }
                None => return Ok(()),
            }
        }
    }

    /// Keep a node whose relaxation could not be solved; its bound stays in
    /// the dual bound and the search reports numerical trouble.
    pub fn mark_unresolved(&mut self, id: NodeId) -> CipResult<()> {
        self.get_mut(id)?.status = NodeStatus::Unresolved;
        self.unresolved.push(id);
        Ok(())
    }

    /// Eagerly prune open nodes whose bound satisfies `prunable`. Returns
    /// the number removed.
    pub fn prune_dominated(&mut self, prunable: impl Fn(f64) -> bool) -> CipResult<usize> {
        let removed = self.queue.prune(prunable);
        for &id in &removed {
            self.close(id, NodeStatus::Pruned(PruneReason::BoundExceeded))?;
        }
        self.pruned_by_bound += removed.len() as u64;
        Ok(removed.len())
    }

    /// Drop all open nodes (search stopped).
    pub fn abandon_open(&mut self) -> CipResult<()> {
        for id in self.queue.drain() {
            self.close(id, NodeStatus::Pruned(PruneReason::Abandoned))?;
        }
        Ok(())
    }

    /// Lowest dual bound among open and unresolved nodes (+inf if none).
    pub fn lowest_bound(&mut self) -> f64 {
        let unresolved = self
            .unresolved
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .map(|n| n.dual_bound)
            .fold(f64::INFINITY, f64::min);
        self.queue.best_bound().min(unresolved)
    }

    /// Inform the selection policy that an incumbent exists.
    pub fn set_has_incumbent(&mut self, has: bool) {
        self.queue.set_has_incumbent(has);
    }

    /// Removed node ids since the last call.
    pub fn drain_released(&mut self) -> std::vec::Drain<'_, NodeId> {
        self.released.drain(..)
    }

    /// Number of open nodes.
    pub fn num_open(&self) -> usize {
        self.queue.len()
    }

    /// Number of unresolved nodes.
    pub fn num_unresolved(&self) -> usize {
        self.unresolved.len()
    }

    /// Number of live nodes.
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Nodes pruned by bound.
    pub fn pruned_by_bound(&self) -> u64 {
        self.pruned_by_bound
    }

    /// Deepest node created.
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Total nodes created.
    pub fn nodes_created(&self) -> u64 {
        self.next_id
    }
}
