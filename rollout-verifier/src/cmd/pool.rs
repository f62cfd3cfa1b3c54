//! Pool mutations.

use std::sync::Arc;

use anyhow::Result;
use structopt::StructOpt;

use crate::Verifier;
use rollout_core::crd::MaxUnavailable as Budget;
use rollout_verifier::Config;

/// Select a pool by name.
#[derive(StructOpt)]
pub struct PoolArg {
    /// The name of the machine config pool.
    #[structopt(short, long)]
    pool: String,
}

impl PoolArg {
    pub async fn run(&self, base: &Verifier, config: Arc<Config>, paused: bool) -> Result<()> {
        let pool = base.get_pool(&self.pool, config).await?;
        pool.set_paused(paused).await?;
        Ok(())
    }
}

/// Set the pool's disruption budget.
#[derive(StructOpt)]
pub struct MaxUnavailable {
    /// The name of the machine config pool.
    #[structopt(short, long)]
    pool: String,
    /// The new budget, either a node count like `2` or a percentage like `25%`.
    #[structopt(long, parse(try_from_str = parse_budget))]
    value: Budget,
}

impl MaxUnavailable {
    pub async fn run(&self, base: &Verifier, config: Arc<Config>) -> Result<()> {
        let pool = base.get_pool(&self.pool, config).await?;
        pool.set_max_unavailable(self.value.clone()).await?;
        Ok(())
    }
}

/// Parse a disruption budget from the given str.
fn parse_budget(s: &str) -> Result<Budget, String> {
    if s.ends_with('%') {
        return Ok(Budget::Percent(s.to_string()));
    }
    s.parse::<i32>()
        .map(Budget::Int)
        .map_err(|err| format!("invalid budget {:?}, expected an integer or a percentage: {}", s, err))
}
