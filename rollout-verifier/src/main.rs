//! The rollout verifier CLI.

mod cmd;

use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use structopt::StructOpt;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use rollout_verifier::{Config, KubeAccessor, NodeHandle, Pool};

/// Observe machine config pool rollouts and verify their safety invariants.
#[derive(StructOpt)]
#[structopt(name = "rollout-verifier")]
pub struct Verifier {
    #[structopt(subcommand)]
    action: VerifierSubcommands,
    /// Enable debug logging.
    #[structopt(short)]
    verbose: bool,
}

impl Verifier {
    pub async fn run(self) -> Result<()> {
        // Initialize logging based on CLI config.
        let fmt_layer = fmt::layer().with_target(true);
        let filter_layer;
        let level_filter;
        if self.verbose {
            filter_layer = EnvFilter::new("debug");
            level_filter = LevelFilter::DEBUG;
        } else {
            filter_layer = EnvFilter::new("info");
            level_filter = LevelFilter::INFO;
        }
        tracing_subscriber::registry()
            .with(filter_layer)
            .with(fmt_layer)
            .with(level_filter)
            .init();

        let config = Arc::new(Config::new()?);
        match &self.action {
            VerifierSubcommands::SortedNodes(inner) => inner.run(&self, config).await,
            VerifierSubcommands::Observe(inner) => inner.run(&self, config).await,
            VerifierSubcommands::Converge(inner) => inner.run(&self, config).await,
            VerifierSubcommands::Events(inner) => inner.run(&self, config).await,
            VerifierSubcommands::MaxUnavailable(inner) => inner.run(&self, config).await,
            VerifierSubcommands::Pause(inner) => inner.run(&self, config, true).await,
            VerifierSubcommands::Unpause(inner) => inner.run(&self, config, false).await,
        }
    }

    /// Get a handle to the named pool, backed by the K8s API.
    pub async fn get_pool(&self, name: &str, config: Arc<Config>) -> Result<Pool> {
        let accessor = KubeAccessor::new(&config).await?;
        Ok(Pool::new(name, Arc::new(accessor), config))
    }

    /// Get a handle to the named node, backed by the K8s API.
    pub async fn get_node(&self, name: &str, config: Arc<Config>) -> Result<NodeHandle> {
        let accessor = KubeAccessor::new(&config).await?;
        Ok(NodeHandle::new(name, Arc::new(accessor), config))
    }
}

#[derive(StructOpt)]
pub enum VerifierSubcommands {
    /// Print the order in which the pool's nodes are expected to update.
    #[structopt(name = "sorted-nodes")]
    SortedNodes(cmd::rollout::SortedNodes),
    /// Observe a rollout, verify its order and wait for the pool to converge.
    Observe(cmd::rollout::Observe),
    /// Wait for the pool to converge.
    Converge(cmd::rollout::Converge),
    /// Verify the lifecycle events recorded about a node.
    Events(cmd::events::Events),
    /// Set the pool's disruption budget.
    #[structopt(name = "max-unavailable")]
    MaxUnavailable(cmd::pool::MaxUnavailable),
    /// Pause config rollout for the pool.
    Pause(cmd::pool::PoolArg),
    /// Resume config rollout for the pool.
    Unpause(cmd::pool::PoolArg),
}

#[tokio::main]
async fn main() -> Result<()> {
    let res = Verifier::from_args().run().await;
    if let Err(err) = &res {
        tracing::error!(error = ?err);
    }

    // Ensure any pending output is flushed.
    let _ = std::io::stdout().flush();
    let _ = std::io::stderr().flush();

    res
}
