//! Node lifecycle event verification.

use std::sync::Arc;

use anyhow::{bail, Result};
use structopt::StructOpt;

use crate::Verifier;
use rollout_verifier::Config;

/// Verify that a node's recorded events contain the given reasons in order.
#[derive(StructOpt)]
pub struct Events {
    /// The name of the node.
    #[structopt(short, long)]
    node: String,
    /// The required reasons, in order.
    #[structopt(long, use_delimiter = true, default_value = "Cordon,Drain,Reboot,Uncordon")]
    sequence: Vec<String>,
}

impl Events {
    pub async fn run(&self, base: &Verifier, config: Arc<Config>) -> Result<()> {
        let node = base.get_node(&self.node, config).await?;
        let events = node.events().await?;
        tracing::debug!(node = %self.node, count = events.len(), "listed node events");
        if let Err(mismatch) = rollout_core::verify_event_sequence(&events, &self.sequence) {
            bail!("event sequence of node {} does not match: {}", self.node, mismatch);
        }
        tracing::info!(node = %self.node, sequence = ?self.sequence, "event sequence matched");
        Ok(())
    }
}
