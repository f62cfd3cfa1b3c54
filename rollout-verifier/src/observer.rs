//! Rollout observation.
//!
//! `RolloutObserver` consumes one consistent read of a pool and its members per polling
//! iteration and records the order in which nodes are seen to start updating. It performs no I/O
//! itself, so that every safety check can be driven from scripted frames.

use std::collections::HashMap;

use rollout_core::{NodeRef, NodeState, PoolState, Snapshot, VerifyError, VerifyResult};

/// Whether the observed rollout has seen every expected node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Progress {
    Pending,
    Complete,
}

/// Tracks a single rollout across polling iterations.
#[derive(Debug)]
pub struct RolloutObserver {
    pool: String,
    max_unavailable: usize,
    expected: Vec<NodeRef>,
    /// Expected nodes not yet seen updating, in expected order.
    pending: Vec<NodeRef>,
    /// Nodes in the order they were first seen updating.
    observed: Vec<NodeRef>,
    /// The current config of each pending node at its first sighting.
    baseline: HashMap<String, String>,
    last: Snapshot,
}

impl RolloutObserver {
    /// Create a new instance expecting the given nodes to update at most `max_unavailable` at a time.
    pub fn new(pool: impl Into<String>, expected: Vec<NodeRef>, max_unavailable: usize) -> Self {
        let last = Snapshot {
            expected_order: expected.iter().map(|node| node.name.clone()).collect(),
            ..Default::default()
        };
        Self {
            pool: pool.into(),
            max_unavailable,
            pending: expected.clone(),
            expected,
            observed: Vec::new(),
            baseline: HashMap::new(),
            last,
        }
    }

    /// Fold one polling iteration into the observation.
    ///
    /// `nodes` must all come from the same read as `pool`. Nodes discovered during the same
    /// iteration are recorded in expected order, those which already finished their update
    /// ahead of those still working.
    pub fn step(&mut self, pool: PoolState, nodes: Vec<NodeState>) -> VerifyResult<Progress> {
        let degraded = pool.degraded_machine_count;
        self.last = Snapshot {
            expected_order: self.last.expected_order.clone(),
            observed_order: self.observed.iter().map(|node| node.name.clone()).collect(),
            ..Snapshot::of_pool(pool).with_nodes(nodes)
        };
        if degraded > 0 {
            return Err(VerifyError::DegradedInvariantViolated {
                pool: self.pool.clone(),
                detail: format!("{} machines degraded during rollout", degraded),
                snapshot: Box::new(self.last.clone()),
            });
        }
        let in_flight = self.last.in_flight;
        if in_flight > self.max_unavailable {
            return Err(VerifyError::ConcurrencyBoundViolated {
                pool: self.pool.clone(),
                in_flight,
                max_unavailable: self.max_unavailable,
                snapshot: Box::new(self.last.clone()),
            });
        }

        // Pending nodes are visited in expected order. A node found to have finished its whole
        // update since the previous poll started before any node which is working now.
        let mut finished = Vec::new();
        let mut working = Vec::new();
        for pending in self.pending.iter() {
            let node = match self.last.nodes.iter().find(|node| node.name == pending.name) {
                Some(node) => node,
                None => continue,
            };
            if node.is_updating() {
                working.push(pending.name.clone());
                continue;
            }
            match self.baseline.get(&node.name) {
                Some(first) if *first != node.current_config => {
                    tracing::warn!(
                        node = %node.name,
                        from = %first,
                        to = %node.current_config,
                        "node finished updating between polls, recording it now",
                    );
                    finished.push(pending.name.clone());
                }
                Some(_) => (),
                None => {
                    self.baseline.insert(node.name.clone(), node.current_config.clone());
                }
            }
        }
        for name in finished.into_iter().chain(working) {
            if let Some(pos) = self.pending.iter().position(|pending| pending.name == name) {
                let node_ref = self.pending.remove(pos);
                tracing::info!(pool = %self.pool, node = %node_ref.name, position = self.observed.len(), "node started updating");
                self.observed.push(node_ref);
            }
        }
        self.last.observed_order = self.observed.iter().map(|node| node.name.clone()).collect();

        if self.pending.is_empty() {
            Ok(Progress::Complete)
        } else {
            Ok(Progress::Pending)
        }
    }

    /// The nodes this observer expects, in expected order.
    pub fn expected(&self) -> &[NodeRef] {
        &self.expected
    }

    /// The nodes seen updating so far, in observed order.
    pub fn observed(&self) -> &[NodeRef] {
        &self.observed
    }

    /// The snapshot of the latest iteration.
    pub fn snapshot(&self) -> &Snapshot {
        &self.last
    }

    /// Consume this observer, returning the observed order.
    pub fn into_observed(self) -> Vec<NodeRef> {
        self.observed
    }
}
