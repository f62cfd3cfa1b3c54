//! Diagnostic snapshots attached to verification failures.

use crate::node::NodeState;
use crate::pool::PoolState;

/// The last state observed before a wait ended.
///
/// A snapshot is captured from a single polling iteration, so all of its parts were read
/// together. It is never persisted.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Snapshot {
    /// The pool as last read, if it was read.
    pub pool: Option<PoolState>,
    /// The member nodes as last read.
    pub nodes: Vec<NodeState>,
    /// The order in which nodes were expected to update.
    pub expected_order: Vec<String>,
    /// The order in which nodes were seen to start updating.
    pub observed_order: Vec<String>,
    /// The number of nodes updating at the moment of capture.
    pub in_flight: usize,
}

impl Snapshot {
    /// A snapshot holding only the given pool state.
    pub fn of_pool(pool: PoolState) -> Self {
        Self {
            pool: Some(pool),
            ..Default::default()
        }
    }

    /// Attach the given node states to this snapshot.
    pub fn with_nodes(mut self, nodes: Vec<NodeState>) -> Self {
        self.in_flight = nodes.iter().filter(|node| node.is_updating()).count();
        self.nodes = nodes;
        self
    }
}

impl std::fmt::Display for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "last observed state:")?;
        match &self.pool {
            Some(pool) => write!(f, "\n  {}", pool)?,
            None => write!(f, "\n  pool not read")?,
        }
        for node in self.nodes.iter() {
            write!(f, "\n  node {}", node)?;
        }
        if !self.expected_order.is_empty() {
            write!(f, "\n  expected order: [{}]", self.expected_order.join(", "))?;
        }
        if !self.expected_order.is_empty() || !self.observed_order.is_empty() {
            write!(f, "\n  observed order: [{}]", self.observed_order.join(", "))?;
        }
        write!(f, "\n  in flight: {}", self.in_flight)
    }
}
