//! Drift validation.
//!
//! A drift scenario changes state on a node behind the operator's back, waits for the operator
//! to report exactly that cause, undoes the change and waits for the pool to recover. The
//! validator walks `DriftState` strictly forward; calling a step out of turn is an error.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::poll::{poll, Probe};
use crate::pool::Pool;
use rollout_core::{
    check_degraded_condition, check_node_reason, ConditionType, DriftReason, DriftState, NodeState, PoolState, Snapshot, VerifyError, VerifyResult,
};

/// An out-of-band action executed against a node.
#[async_trait]
pub trait NodeAction: Send + Sync {
    /// A short description of the action, used in logs.
    fn describe(&self) -> String;

    /// Execute the action against the named node.
    async fn execute(&self, node: &str) -> Result<()>;
}

/// Drives a single drift scenario against one node of a pool.
pub struct DriftValidator<'a> {
    pool: &'a Pool,
    node: String,
    state: DriftState,
    /// The budget of each individual wait.
    timeout: Duration,
}

impl<'a> DriftValidator<'a> {
    /// Create a new instance in the `Baseline` state.
    pub fn new(pool: &'a Pool, node: impl Into<String>, timeout: Duration) -> Self {
        Self {
            pool,
            node: node.into(),
            state: DriftState::Baseline,
            timeout,
        }
    }

    /// The current state of the scenario.
    pub fn state(&self) -> DriftState {
        self.state
    }

    /// Run the full scenario: perturb, wait for the expected degradation, restore.
    #[tracing::instrument(level = "debug", skip(self, mutate, restore), fields(pool = %self.pool.name(), node = %self.node))]
    pub async fn run(&mut self, mutate: &dyn NodeAction, restore: &dyn NodeAction, expected: &DriftReason) -> VerifyResult<()> {
        self.perturb(mutate).await?;
        self.await_degraded(expected).await?;
        self.restore(restore).await
    }

    /// Apply the out-of-band mutation.
    pub async fn perturb(&mut self, mutate: &dyn NodeAction) -> VerifyResult<()> {
        let next = self.state.transition(DriftState::Perturbed)?;
        tracing::info!(node = %self.node, action = %mutate.describe(), "perturbing node");
        mutate.execute(&self.node).await.map_err(VerifyError::Remote)?;
        self.state = next;
        Ok(())
    }

    /// Wait until the pool reports exactly one degraded machine and the node reports `expected`.
    pub async fn await_degraded(&mut self, expected: &DriftReason) -> VerifyResult<()> {
        let next = self.state.transition(DriftState::DetectedDegraded)?;
        let what = format!("node {} to report {:?}", self.node, expected.message());
        let this = &*self;
        poll(&what, this.pool.config().poll_interval(), this.timeout, move || this.probe_degraded(expected)).await?;
        tracing::info!(node = %self.node, reason = %expected, "drift detected");
        self.state = next;
        Ok(())
    }

    /// Undo the mutation and wait until the pool has recovered.
    pub async fn restore(&mut self, restore: &dyn NodeAction) -> VerifyResult<()> {
        let next = self.state.transition(DriftState::Restored)?;
        tracing::info!(node = %self.node, action = %restore.describe(), "restoring node");
        restore.execute(&self.node).await.map_err(VerifyError::Remote)?;
        let what = format!("pool {} to recover from drift on node {}", self.pool.name(), self.node);
        let this = &*self;
        poll(&what, this.pool.config().poll_interval(), this.timeout, move || this.probe_restored()).await?;
        tracing::info!(node = %self.node, "drift resolved");
        self.state = next;
        Ok(())
    }

    async fn read(&self) -> VerifyResult<(PoolState, NodeState)> {
        let pool = self.pool.state().await?;
        let node = self.pool.node(self.node.as_str()).state().await?;
        Ok((pool, node))
    }

    async fn probe_degraded(&self, expected: &DriftReason) -> VerifyResult<Probe> {
        let (pool, node) = self.read().await?;
        degraded_probe(&self.node, pool, node, expected)
    }

    async fn probe_restored(&self) -> VerifyResult<Probe> {
        let (pool, node) = self.read().await?;
        restored_probe(pool, node)
    }
}

/// Evaluate one read of a perturbed pool.
///
/// Ready once the perturbed node is the pool's only degraded machine, the pool reports
/// `Degraded=True` and `Updated=False` with a `NodeDegraded` message naming the expected reason,
/// and the node reports exactly that reason. Any
/// other degraded machine fails the scenario, as does a pool claiming to be updated while
/// degraded.
pub fn degraded_probe(perturbed: &str, pool: PoolState, node: NodeState, expected: &DriftReason) -> VerifyResult<Probe> {
    let degraded = pool.degraded_machine_count;
    if pool.violates_degraded_invariant() || degraded > 1 {
        let detail = if degraded > 1 {
            format!("{} machines degraded, only node {} was perturbed", degraded, perturbed)
        } else {
            format!("pool reports {}=True with {} degraded machines", ConditionType::Updated, degraded)
        };
        return Err(VerifyError::DegradedInvariantViolated {
            pool: pool.name.clone(),
            detail,
            snapshot: Box::new(Snapshot::of_pool(pool).with_nodes(vec![node])),
        });
    }
    let (reason_matches, reason_detail) = check_node_reason(&node, expected);
    let (condition_matches, condition_detail) = check_degraded_condition(&pool, &expected.message());
    let ready = degraded == 1
        && condition_matches
        && pool.condition_is(ConditionType::Updated, false)
        && node.is_degraded()
        && reason_matches;
    if !ready {
        tracing::debug!(node = %node.name, reason = %reason_detail, condition = %condition_detail, "drift not detected yet");
    }
    Ok(if ready {
        Probe::Ready
    } else {
        Probe::Pending(Snapshot::of_pool(pool).with_nodes(vec![node]))
    })
}

/// Evaluate one read of a restored pool.
///
/// Ready once the pool reports no degraded machines with `Degraded=False` and `Updated=True`, and
/// the node is updated with its reason cleared.
pub fn restored_probe(pool: PoolState, node: NodeState) -> VerifyResult<Probe> {
    if pool.violates_degraded_invariant() {
        return Err(VerifyError::DegradedInvariantViolated {
            pool: pool.name.clone(),
            detail: format!("pool reports {}=True with {} degraded machines", ConditionType::Updated, pool.degraded_machine_count),
            snapshot: Box::new(Snapshot::of_pool(pool).with_nodes(vec![node])),
        });
    }
    let ready = pool.degraded_machine_count == 0
        && pool.condition_is(ConditionType::Degraded, false)
        && pool.is_updated()
        && node.is_updated()
        && node.reason.is_empty();
    Ok(if ready {
        Probe::Ready
    } else {
        Probe::Pending(Snapshot::of_pool(pool).with_nodes(vec![node]))
    })
}
