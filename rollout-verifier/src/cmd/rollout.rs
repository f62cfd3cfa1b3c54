//! Rollout observation.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use structopt::StructOpt;

use crate::Verifier;
use rollout_core::verify_order;
use rollout_verifier::{Config, Pool};

/// Print the order in which the pool's nodes are expected to update.
#[derive(StructOpt)]
pub struct SortedNodes {
    /// The name of the machine config pool.
    #[structopt(short, long)]
    pool: String,
}

impl SortedNodes {
    pub async fn run(&self, base: &Verifier, config: Arc<Config>) -> Result<()> {
        let pool = base.get_pool(&self.pool, config).await?;
        for (idx, node) in pool.compute_sorted_nodes().await?.iter().enumerate() {
            println!("{}\t{}\t{}", idx, node.name, node.zone.as_deref().unwrap_or("-"));
        }
        Ok(())
    }
}

/// Observe a rollout, verify its order and wait for the pool to converge.
#[derive(StructOpt)]
pub struct Observe {
    /// The name of the machine config pool.
    #[structopt(short, long)]
    pool: String,
    /// The overall budget of the rollout; defaults to the node budget once per member.
    #[structopt(long)]
    timeout_seconds: Option<u64>,
}

impl Observe {
    pub async fn run(&self, base: &Verifier, config: Arc<Config>) -> Result<()> {
        let pool = base.get_pool(&self.pool, config).await?;
        let timeout = budget(&pool, self.timeout_seconds).await?;
        let max_unavailable = pool.max_unavailable().await?;
        let expected = pool.compute_sorted_nodes().await?;

        let observed = pool.observe_rollout(max_unavailable, timeout).await?;
        if let Err(mismatch) = verify_order(&expected, &observed, max_unavailable) {
            bail!("pool {} did not update in the expected order: {}", self.pool, mismatch);
        }
        tracing::info!(pool = %self.pool, "rollout order verified");

        pool.wait_for_convergence(timeout).await?;
        tracing::info!(pool = %self.pool, "pool converged");
        Ok(())
    }
}

/// Wait for the pool to converge.
#[derive(StructOpt)]
pub struct Converge {
    /// The name of the machine config pool.
    #[structopt(short, long)]
    pool: String,
    /// The budget of the wait; defaults to the node budget once per member.
    #[structopt(long)]
    timeout_seconds: Option<u64>,
}

impl Converge {
    pub async fn run(&self, base: &Verifier, config: Arc<Config>) -> Result<()> {
        let pool = base.get_pool(&self.pool, config).await?;
        let timeout = budget(&pool, self.timeout_seconds).await?;
        pool.wait_for_convergence(timeout).await?;
        tracing::info!(pool = %self.pool, "pool converged");
        Ok(())
    }
}

async fn budget(pool: &Pool, timeout_seconds: Option<u64>) -> Result<Duration> {
    match timeout_seconds {
        Some(secs) => Ok(Duration::from_secs(secs)),
        None => Ok(pool.rollout_budget().await?),
    }
}
