//! Runtime configuration.

use std::time::Duration;

use anyhow::{ensure, Context, Result};
use serde::Deserialize;

/// Runtime configuration data.
#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    /// The namespace in which the machine config operator runs.
    #[serde(default = "Config::default_mco_namespace")]
    pub mco_namespace: String,
    /// The label selector matching the machine-config-controller pod.
    #[serde(default = "Config::default_controller_pod_selector")]
    pub controller_pod_selector: String,
    /// The namespace in which node lifecycle events are recorded.
    #[serde(default = "Config::default_events_namespace")]
    pub events_namespace: String,

    /// The delay in seconds between two polls of remote state.
    #[serde(default = "Config::default_poll_interval_seconds")]
    pub poll_interval_seconds: u64,
    /// The time in seconds a single node is given to update.
    ///
    /// Waits which span a whole pool are budgeted as this value times the pool's member count.
    #[serde(default = "Config::default_node_budget_seconds")]
    pub node_budget_seconds: u64,
    /// The timeout in seconds of a single K8s API call.
    #[serde(default = "Config::default_api_timeout_seconds")]
    pub api_timeout_seconds: u64,
}

impl Config {
    /// Create a new config instance.
    ///
    /// Currently this routing just parses the runtime environment and builds the application
    /// config from that.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Result<Self> {
        let config: Config = envy::from_env().context("error building config from env")?;
        config.validate()?;
        Ok(config)
    }

    /// Ensure the configured durations are usable.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.poll_interval_seconds >= 1, "POLL_INTERVAL_SECONDS must be at least 1 second");
        ensure!(self.node_budget_seconds >= self.poll_interval_seconds, "NODE_BUDGET_SECONDS must not be less than POLL_INTERVAL_SECONDS");
        ensure!(self.api_timeout_seconds >= 1, "API_TIMEOUT_SECONDS must be at least 1 second");
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    pub fn node_budget(&self) -> Duration {
        Duration::from_secs(self.node_budget_seconds)
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_seconds)
    }

    fn default_mco_namespace() -> String {
        "openshift-machine-config-operator".into()
    }

    fn default_controller_pod_selector() -> String {
        "k8s-app=machine-config-controller".into()
    }

    fn default_events_namespace() -> String {
        "default".into()
    }

    fn default_poll_interval_seconds() -> u64 {
        10
    }

    fn default_node_budget_seconds() -> u64 {
        600
    }

    fn default_api_timeout_seconds() -> u64 {
        10
    }
}

#[cfg(test)]
impl Config {
    /// Create a new config instance for testing, with a short poll interval and node budget.
    pub fn new_test() -> std::sync::Arc<Self> {
        std::sync::Arc::new(Self {
            mco_namespace: Self::default_mco_namespace(),
            controller_pod_selector: Self::default_controller_pod_selector(),
            events_namespace: Self::default_events_namespace(),
            poll_interval_seconds: 1,
            node_budget_seconds: 60,
            api_timeout_seconds: 1,
        })
    }
}
