//! Search tree, node selection and bound management.

mod bounds;
mod node;
mod queue;
mod tree;

use std::fmt;

pub use bounds::BoundManager;
pub use node::{BranchInfo, Node, NodeStatus, PruneReason};
pub use queue::NodeQueue;
pub use tree::SearchTree;

/// Unique identifier of a search node. Ids are assigned in creation order
/// and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
