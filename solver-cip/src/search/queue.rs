//! Node priority queue for tree exploration.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap};

use super::NodeId;
use crate::error::CipResult;
use crate::settings::NodeSelection;

/// Heap key ordered by `(primary, secondary, id)`, smallest first after
/// wrapping in [`Reverse`].
#[derive(Debug, Clone, Copy)]
struct Key {
    primary: f64,
    secondary: f64,
    id: NodeId,
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Key {}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        self.primary
            .total_cmp(&other.primary)
            .then(self.secondary.total_cmp(&other.secondary))
            .then(self.id.cmp(&other.id))
    }
}

/// Queue data of an open node.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Entry {
    bound: f64,
    estimate: f64,
    depth: usize,
}

type MinHeap = BinaryHeap<Reverse<Key>>;

/// Priority queue for open nodes.
///
/// One heap per ordering (bound, depth, estimate) with lazy deletion:
/// entries of nodes no longer in the queue are skipped when they surface.
pub struct NodeQueue {
    /// Node selection strategy.
    strategy: NodeSelection,

    /// Open nodes.
    members: HashMap<NodeId, Entry>,

    /// Lowest bound first.
    by_bound: MinHeap,

    /// Deepest first, ties by bound.
    by_depth: MinHeap,

    /// Lowest estimate first, ties by bound.
    by_estimate: MinHeap,

    /// Children of the last popped node (plunging candidates).
    last_children: Vec<NodeId>,

    /// Consecutive plunging picks.
    plunge_depth: usize,

    /// Whether an incumbent exists (two-phase selection).
    has_incumbent: bool,

    /// Count of nodes added.
    nodes_added: u64,

    /// Count of nodes popped.
    nodes_popped: u64,
}

impl NodeQueue {
    /// Create a new node queue with the given strategy.
    pub fn new(strategy: NodeSelection) -> Self {
        Self {
            strategy,
            members: HashMap::new(),
            by_bound: BinaryHeap::new(),
            by_depth: BinaryHeap::new(),
            by_estimate: BinaryHeap::new(),
            last_children: Vec::new(),
            plunge_depth: 0,
            has_incumbent: false,
            nodes_added: 0,
            nodes_popped: 0,
        }
    }

    /// Add a node to the queue.
    pub fn push(&mut self, id: NodeId, bound: f64, estimate: f64, depth: usize) -> CipResult<()> {
        self.members.try_reserve(1)?;
        self.by_bound.try_reserve(1)?;
        self.by_depth.try_reserve(1)?;
        self.by_estimate.try_reserve(1)?;

        self.members.insert(id, Entry { bound, estimate, depth });
        self.by_bound.push(Reverse(Key {
            primary: bound,
            secondary: 0.0,
            id,
        }));
        self.by_depth.push(Reverse(Key {
            primary: -(depth as f64),
            secondary: bound,
            id,
        }));
        self.by_estimate.push(Reverse(Key {
            primary: estimate,
            secondary: bound,
            id,
        }));
        self.nodes_added += 1;
        Ok(())
    }

    /// Remember the children just created, for plunging.
    pub fn set_last_children(&mut self, children: &[NodeId]) {
        self.last_children.clear();
        self.last_children.extend_from_slice(children);
    }

    /// Record that an incumbent exists.
    pub fn set_has_incumbent(&mut self, has: bool) {
        self.has_incumbent = has;
    }

    /// Get the next node to process.
    pub fn pop(&mut self) -> Option<NodeId> {
        if self.members.is_empty() {
            return None;
        }

        let id = match self.strategy {
            NodeSelection::BestBound => Self::pop_heap(&mut self.by_bound, &self.members),
            NodeSelection::DepthFirst => Self::pop_heap(&mut self.by_depth, &self.members),
            NodeSelection::BestEstimate => Self::pop_heap(&mut self.by_estimate, &self.members),
            NodeSelection::Hybrid { dive_freq } => {
                if self.nodes_popped % dive_freq.max(1) as u64 == 0 {
                    Self::pop_heap(&mut self.by_depth, &self.members)
                } else {
                    Self::pop_heap(&mut self.by_bound, &self.members)
                }
            }
            NodeSelection::TwoPhase => {
                if self.has_incumbent {
                    Self::pop_heap(&mut self.by_bound, &self.members)
                } else {
                    Self::pop_heap(&mut self.by_depth, &self.members)
                }
            }
            NodeSelection::Plunging { max_plunge_depth } => {
                match self.plunge_child() {
                    Some(id) if self.plunge_depth < max_plunge_depth => {
                        self.plunge_depth += 1;
                        Some(id)
                    }
                    _ => {
                        self.plunge_depth = 0;
                        Self::pop_heap(&mut self.by_bound, &self.members)
                    }
                }
            }
        }?;

        self.members.remove(&id);
        self.last_children.clear();
        self.nodes_popped += 1;
        self.maybe_rebuild();
        Some(id)
    }

    /// Best-bound child of the last popped node still in the queue.
    fn plunge_child(&self) -> Option<NodeId> {
        self.last_children
            .iter()
            .filter_map(|id| self.members.get(id).map(|e| (*id, e.bound)))
            .min_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)))
            .map(|(id, _)| id)
    }

    fn pop_heap(heap: &mut MinHeap, members: &HashMap<NodeId, Entry>) -> Option<NodeId> {
        while let Some(Reverse(key)) = heap.pop() {
            if members.contains_key(&key.id) {
                return Some(key.id);
            }
        }
        None
    }

    /// Lowest bound among open nodes (+inf if empty).
    pub fn best_bound(&mut self) -> f64 {
        while let Some(Reverse(key)) = self.by_bound.peek() {
            if self.members.contains_key(&key.id) {
                return key.primary;
            }
            self.by_bound.pop();
        }
        f64::INFINITY
    }

    /// Remove nodes whose bound satisfies `prunable`; returns their ids.
    pub fn prune(&mut self, prunable: impl Fn(f64) -> bool) -> Vec<NodeId> {
        let mut removed: Vec<NodeId> = self
            .members
            .iter()
            .filter(|(_, e)| prunable(e.bound))
            .map(|(id, _)| *id)
            .collect();
        removed.sort();
        for id in &removed {
            self.members.remove(id);
        }
        self.maybe_rebuild();
        removed
    }

    /// Remove all nodes; returns their ids in increasing order.
    pub fn drain(&mut self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.members.drain().map(|(id, _)| id).collect();
        ids.sort();
        self.by_bound.clear();
        self.by_depth.clear();
        self.by_estimate.clear();
        self.last_children.clear();
        ids
    }

    /// Drop stale heap entries once they dominate the heaps.
    fn maybe_rebuild(&mut self) {
        let live = self.members.len();
        if self.by_bound.len() <= 2 * live + 64 {
            return;
        }
        let members = &self.members;
        for heap in [&mut self.by_bound, &mut self.by_depth, &mut self.by_estimate] {
            heap.retain(|Reverse(k)| members.contains_key(&k.id));
        }
    }

    /// Whether a node is in the queue.
    pub fn contains(&self, id: NodeId) -> bool {
        self.members.contains_key(&id)
    }

    /// Check if the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Get the number of nodes in the queue.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Get the total number of nodes added.
    pub fn total_added(&self) -> u64 {
        self.nodes_added
    }

    /// Get the total number of nodes popped.
    pub fn total_popped(&self) -> u64 {
        self.nodes_popped
    }
}
