//! Pool rollout tracking.
//!
//! A `Pool` is a handle to a named machine config pool. It reads the pool and its members
//! through an `ObjectAccessor` and offers the waits a rollout verification is built from:
//! computing the expected update order, observing a rollout against it, and waiting for the pool
//! to converge.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use crate::accessor::ObjectAccessor;
use crate::config::Config;
use crate::observer::{Progress, RolloutObserver};
use crate::poll::{poll, Poller, Probe};
use rollout_core::crd::MaxUnavailable;
use rollout_core::{
    sort_nodes, verify_event_sequence, LifecycleEvent, NodeRef, NodeState, PoolState, SequenceMismatch, Snapshot, VerifyError, VerifyResult,
    CONTROL_PLANE_POOL,
};

/// A handle to a named machine config pool.
#[derive(Clone)]
pub struct Pool {
    name: String,
    accessor: Arc<dyn ObjectAccessor>,
    config: Arc<Config>,
}

impl Pool {
    /// Create a new instance.
    pub fn new(name: impl Into<String>, accessor: Arc<dyn ObjectAccessor>, config: Arc<Config>) -> Self {
        Self {
            name: name.into(),
            accessor,
            config,
        }
    }

    /// The name of this pool.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The runtime config used by this pool's waits.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get a handle to one of the cluster's nodes.
    pub fn node(&self, name: impl Into<String>) -> NodeHandle {
        NodeHandle::new(name, self.accessor.clone(), self.config.clone())
    }

    /// Read the pool's current state.
    #[tracing::instrument(level = "debug", skip(self), fields(pool = %self.name))]
    pub async fn state(&self) -> VerifyResult<PoolState> {
        let pool = self.accessor.get_pool(&self.name).await.map_err(VerifyError::transient)?;
        PoolState::from_pool(&pool)
    }

    /// Read the pool and the lifecycle state of each of its members in one iteration.
    ///
    /// Members are returned ordered by name.
    #[tracing::instrument(level = "debug", skip(self), fields(pool = %self.name))]
    pub async fn capture(&self) -> VerifyResult<(PoolState, Vec<NodeState>)> {
        let pool = self.state().await?;
        let nodes = self
            .accessor
            .list_nodes(&pool.label_selector())
            .await
            .map_err(VerifyError::transient)?;
        let mut states = nodes.iter().map(NodeState::from_node).collect::<VerifyResult<Vec<_>>>()?;
        states.sort_by(|a, b| a.name.cmp(&b.name));
        Ok((pool, states))
    }

    /// The identities of the pool's current members, unordered.
    async fn members(&self, pool: &PoolState) -> VerifyResult<Vec<NodeRef>> {
        let nodes = self
            .accessor
            .list_nodes(&pool.label_selector())
            .await
            .map_err(VerifyError::transient)?;
        nodes.iter().map(NodeRef::from_node).collect()
    }

    /// The name of the node hosting the machine config controller, for the control plane pool only.
    ///
    /// The controller is not a member of any worker pool, so for any other pool this is `None`.
    #[tracing::instrument(level = "debug", skip(self), fields(pool = %self.name))]
    pub async fn controller_host(&self) -> VerifyResult<Option<String>> {
        if self.name != CONTROL_PLANE_POOL {
            return Ok(None);
        }
        let pods = self
            .accessor
            .list_pods(&self.config.mco_namespace, &self.config.controller_pod_selector)
            .await
            .map_err(VerifyError::transient)?;
        let host = pods.into_iter().find_map(|pod| pod.spec.and_then(|spec| spec.node_name));
        if host.is_none() {
            tracing::warn!(pool = %self.name, "no scheduled machine config controller pod found, sorting without it");
        }
        Ok(host)
    }

    /// Compute the order in which the operator is expected to update this pool's members.
    #[tracing::instrument(level = "debug", skip(self), fields(pool = %self.name))]
    pub async fn compute_sorted_nodes(&self) -> VerifyResult<Vec<NodeRef>> {
        let pool = self.state().await?;
        let members = self.members(&pool).await?;
        let host = self.controller_host().await?;
        Ok(sort_nodes(members, host.as_deref()))
    }

    /// The pool's disruption budget resolved against its current membership.
    pub async fn max_unavailable(&self) -> VerifyResult<usize> {
        let pool = self.state().await?;
        let members = self.members(&pool).await?;
        pool.resolved_max_unavailable(members.len())
    }

    /// The time a full rollout of this pool is given: the node budget once per member.
    pub async fn rollout_budget(&self) -> VerifyResult<Duration> {
        let pool = self.state().await?;
        let members = self.members(&pool).await?.len().max(1);
        Ok(self.config.node_budget() * u32::try_from(members).unwrap_or(u32::MAX))
    }

    /// Observe a rollout of this pool, returning the order in which nodes started updating.
    ///
    /// The expected order is computed once, up front. Every polling iteration then reads the pool
    /// and its members together and fails fast if the pool reports degraded machines or if more
    /// than `max_unavailable` nodes are updating at once. The observation completes once every
    /// expected node has been seen updating.
    #[tracing::instrument(level = "debug", skip(self), fields(pool = %self.name))]
    pub async fn observe_rollout(&self, max_unavailable: usize, timeout: Duration) -> VerifyResult<Vec<NodeRef>> {
        let expected = self.compute_sorted_nodes().await?;
        tracing::info!(
            pool = %self.name,
            max_unavailable,
            expected = ?expected.iter().map(|node| node.name.as_str()).collect::<Vec<_>>(),
            "observing rollout",
        );
        let mut observer = RolloutObserver::new(&self.name, expected, max_unavailable);
        let mut poller = Poller::new(format!("pool {} rollout", self.name), self.config.poll_interval(), timeout);
        loop {
            poller.tick().await?;
            let (pool, nodes) = match self.capture().await {
                Ok(read) => read,
                Err(err) => {
                    poller.absorb(err)?;
                    continue;
                }
            };
            match observer.step(pool, nodes)? {
                Progress::Complete => {
                    tracing::info!(pool = %self.name, elapsed = ?poller.elapsed(), "every node has started updating");
                    return Ok(observer.into_observed());
                }
                Progress::Pending => poller.record(observer.snapshot().clone()),
            }
        }
    }

    /// Wait until the pool reports `Updated=True` with no degraded machines.
    ///
    /// Any degraded machine ends the wait immediately rather than being waited out.
    #[tracing::instrument(level = "debug", skip(self), fields(pool = %self.name))]
    pub async fn wait_for_convergence(&self, timeout: Duration) -> VerifyResult<()> {
        let what = format!("pool {} to converge", self.name);
        poll(&what, self.config.poll_interval(), timeout, move || self.probe_convergence()).await
    }

    async fn probe_convergence(&self) -> VerifyResult<Probe> {
        let pool = self.state().await?;
        if pool.degraded_machine_count > 0 {
            return Err(VerifyError::DegradedInvariantViolated {
                pool: self.name.clone(),
                detail: format!("{} machines degraded while waiting for convergence", pool.degraded_machine_count),
                snapshot: Box::new(Snapshot::of_pool(pool)),
            });
        }
        Ok(if pool.is_converged() { Probe::Ready } else { Probe::Pending(Snapshot::of_pool(pool)) })
    }

    /// Wait until the pool reports `Updating=True`.
    #[tracing::instrument(level = "debug", skip(self), fields(pool = %self.name))]
    pub async fn wait_for_updating(&self, timeout: Duration) -> VerifyResult<()> {
        let what = format!("pool {} to start updating", self.name);
        poll(&what, self.config.poll_interval(), timeout, move || self.probe_updating()).await
    }

    async fn probe_updating(&self) -> VerifyResult<Probe> {
        let pool = self.state().await?;
        Ok(if pool.is_updating() { Probe::Ready } else { Probe::Pending(Snapshot::of_pool(pool)) })
    }

    /// Set the pool's disruption budget.
    #[tracing::instrument(level = "debug", skip(self), fields(pool = %self.name))]
    pub async fn set_max_unavailable(&self, budget: MaxUnavailable) -> VerifyResult<()> {
        self.patch(json!({ "spec": { "maxUnavailable": budget } })).await?;
        tracing::info!(pool = %self.name, max_unavailable = %budget, "updated pool disruption budget");
        Ok(())
    }

    /// Pause or resume config rollout for the pool.
    #[tracing::instrument(level = "debug", skip(self), fields(pool = %self.name))]
    pub async fn set_paused(&self, paused: bool) -> VerifyResult<()> {
        self.patch(json!({ "spec": { "paused": paused } })).await?;
        tracing::info!(pool = %self.name, paused, "updated pool pause state");
        Ok(())
    }

    async fn patch(&self, patch: serde_json::Value) -> VerifyResult<()> {
        self.accessor.patch_pool(&self.name, &patch).await.map_err(VerifyError::Remote)
    }
}

/// A handle to a single node.
#[derive(Clone)]
pub struct NodeHandle {
    name: String,
    accessor: Arc<dyn ObjectAccessor>,
    config: Arc<Config>,
}

impl NodeHandle {
    /// Create a handle to the named node, independent of any pool.
    pub fn new(name: impl Into<String>, accessor: Arc<dyn ObjectAccessor>, config: Arc<Config>) -> Self {
        Self {
            name: name.into(),
            accessor,
            config,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Read the node's lifecycle state.
    #[tracing::instrument(level = "debug", skip(self), fields(node = %self.name))]
    pub async fn state(&self) -> VerifyResult<NodeState> {
        let node = self.accessor.get_node(&self.name).await.map_err(VerifyError::transient)?;
        NodeState::from_node(&node)
    }

    /// Read the node's identity.
    pub async fn identity(&self) -> VerifyResult<NodeRef> {
        let node = self.accessor.get_node(&self.name).await.map_err(VerifyError::transient)?;
        NodeRef::from_node(&node)
    }

    /// List the lifecycle events recorded about this node.
    ///
    /// Events with no reason are skipped.
    #[tracing::instrument(level = "debug", skip(self), fields(node = %self.name))]
    pub async fn events(&self) -> VerifyResult<Vec<LifecycleEvent>> {
        let events = self
            .accessor
            .list_events(&self.config.events_namespace, &self.name)
            .await
            .map_err(VerifyError::transient)?;
        let mut out = Vec::with_capacity(events.len());
        for event in events.iter() {
            match LifecycleEvent::from_event(event) {
                Ok(event) => out.push(event),
                Err(err) => tracing::debug!(error = %err, node = %self.name, "skipping event"),
            }
        }
        Ok(out)
    }

    /// Check that the node's recorded events contain the required reasons in order.
    pub async fn verify_events<R: AsRef<str>>(&self, required: &[R]) -> VerifyResult<Result<(), SequenceMismatch>> {
        let events = self.events().await?;
        Ok(verify_event_sequence(&events, required))
    }

    /// Wait until the node's lifecycle state satisfies the given predicate.
    #[tracing::instrument(level = "debug", skip(self, predicate), fields(node = %self.name))]
    pub async fn wait_for_state<F>(&self, what: &str, timeout: Duration, predicate: F) -> VerifyResult<()>
    where
        F: Fn(&NodeState) -> bool,
    {
        let what = format!("node {} {}", self.name, what);
        let predicate = &predicate;
        poll(&what, self.config.poll_interval(), timeout, move || self.probe_state(predicate)).await
    }

    async fn probe_state<F>(&self, predicate: &F) -> VerifyResult<Probe>
    where
        F: Fn(&NodeState) -> bool,
    {
        let node = self.state().await?;
        Ok(if predicate(&node) {
            Probe::Ready
        } else {
            Probe::Pending(Snapshot::default().with_nodes(vec![node]))
        })
    }
}
