//! Search node representation.

use super::NodeId;
use crate::branching::{BranchCandidate, BranchDir};
use crate::domain::BoundChange;
use crate::relaxation::SavedBasis;

/// Why a node was closed without children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PruneReason {
    /// Propagation or the relaxation proved the node infeasible.
    Infeasible,

    /// The node bound cannot beat the incumbent.
    BoundExceeded,

    /// The relaxation solution was feasible; nothing better is below.
    Solved,

    /// The node is discarded because the search stopped.
    Abandoned,
}

/// Status of a search node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    /// Waiting in the queue.
    Open,

    /// Being processed.
    Solving,

    /// Children were created.
    Branched,

    /// Closed without children.
    Pruned(PruneReason),

    /// The relaxation failed twice and no branching was possible; the node
    /// stays in the tree and its bound stays in the dual bound.
    Unresolved,
}

impl NodeStatus {
    /// Whether the node is closed (branched or pruned).
    pub fn is_closed(self) -> bool {
        matches!(self, NodeStatus::Branched | NodeStatus::Pruned(_))
    }
}

/// How a node was created from its parent by a variable dichotomy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BranchInfo {
    /// Candidate branched on.
    pub cand: BranchCandidate,

    /// Direction of this child.
    pub dir: BranchDir,

    /// Relaxation value of the parent.
    pub parent_lp: f64,
}

/// A node in the search tree.
#[derive(Debug, Clone)]
pub struct Node {
    /// Unique node identifier.
    pub id: NodeId,

    /// Parent node (None for root).
    pub parent: Option<NodeId>,

    /// Depth in the tree (0 for root).
    pub depth: usize,

    /// Bound changes from parent to this node.
    pub bound_changes: Vec<BoundChange>,

    /// Lower bound on the objective in this subtree (internal sense).
    pub dual_bound: f64,

    /// Estimate of the best solution in this subtree.
    pub estimate: f64,

    /// Processing status.
    pub status: NodeStatus,

    /// Branching provenance for pseudocost updates.
    pub branch: Option<BranchInfo>,

    /// Relaxation basis at branching time, used to warm start children.
    pub basis: Option<SavedBasis>,

    /// Children not yet removed from the tree.
    pub(crate) live_children: usize,
}

impl Node {
    /// Create the root node.
    pub fn root(id: NodeId, dual_bound: f64) -> Self {
        Self {
            id,
            parent: None,
            depth: 0,
            bound_changes: Vec::new(),
            dual_bound,
            estimate: dual_bound,
            status: NodeStatus::Open,
            branch: None,
            basis: None,
            live_children: 0,
        }
    }

    /// Create a child node.
    ///
    /// The child inherits the parent's dual bound.
    pub fn child(&self, id: NodeId, bound_changes: Vec<BoundChange>, estimate: f64) -> Self {
        Self {
            id,
            parent: Some(self.id),
            depth: self.depth + 1,
            bound_changes,
            dual_bound: self.dual_bound,
            estimate: estimate.max(self.dual_bound),
            status: NodeStatus::Open,
            branch: None,
            basis: None,
            live_children: 0,
        }
    }

    /// Raise the dual bound. Bounds never decrease along a path, so a lower
    /// value (e.g. from numerical noise) is ignored.
    pub fn raise_bound(&mut self, bound: f64) {
        if bound > self.dual_bound {
            self.dual_bound = bound;
            self.estimate = self.estimate.max(bound);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::VarId;

    #[test]
    fn test_root_node() {
        let root = Node::root(NodeId(0), -5.0);
        assert!(root.parent.is_none());
        assert_eq!(root.depth, 0);
        assert!(root.bound_changes.is_empty());
        assert_eq!(root.status, NodeStatus::Open);
    }

    #[test]
    fn test_child_node() {
        let root = Node::root(NodeId(0), 1.0);
        let bc = BoundChange::down_branch(VarId(0), 1.0, 0.5);
        let child = root.child(NodeId(1), vec![bc], 0.5);

        assert_eq!(child.parent, Some(NodeId(0)));
        assert_eq!(child.depth, 1);
        assert_eq!(child.bound_changes.len(), 1);
        assert_eq!(child.dual_bound, 1.0);
        // Estimate never below the inherited bound
        assert_eq!(child.estimate, 1.0);
    }

    #[test]
    fn test_bound_is_monotone() {
        let mut node = Node::root(NodeId(0), 10.0);
        node.raise_bound(9.999);
        assert_eq!(node.dual_bound, 10.0);
        node.raise_bound(12.0);
        assert_eq!(node.dual_bound, 12.0);
        assert!(!node.status.is_closed());
        node.status = NodeStatus::Pruned(PruneReason::Infeasible);
        assert!(node.status.is_closed());
    }
}
