//! Remote object access.
//!
//! Every read and mutation the engine performs against the cluster goes through
//! `ObjectAccessor`. The engine itself never holds a K8s client, which keeps the waiting logic
//! testable against scripted object streams.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Event, Node, Pod};
use kube::api::{Api, ListParams, Patch, PatchParams};
use kube::client::Client;
use tokio::time::timeout;

use crate::config::Config;
use rollout_core::crd::MachineConfigPool;

/// Typed reads and mutations of the cluster objects which the engine observes.
///
/// Implementations must be safe to call from concurrent tasks. Each call is a single,
/// independent request: nothing is cached between calls.
#[async_trait]
pub trait ObjectAccessor: Send + Sync {
    /// Fetch a node by name.
    async fn get_node(&self, name: &str) -> Result<Node>;

    /// List nodes matching the given label selector.
    async fn list_nodes(&self, label_selector: &str) -> Result<Vec<Node>>;

    /// Fetch a machine config pool by name.
    async fn get_pool(&self, name: &str) -> Result<MachineConfigPool>;

    /// Apply a JSON merge patch to the named pool.
    async fn patch_pool(&self, name: &str, patch: &serde_json::Value) -> Result<()>;

    /// List the events in the given namespace which involve the named object.
    async fn list_events(&self, namespace: &str, involved_object: &str) -> Result<Vec<Event>>;

    /// List pods in the given namespace matching the given label selector.
    async fn list_pods(&self, namespace: &str, label_selector: &str) -> Result<Vec<Pod>>;
}

/// An object accessor backed by the K8s API.
#[derive(Clone)]
pub struct KubeAccessor {
    client: Client,
    /// The timeout applied to each individual API call.
    timeout: Duration,
}

impl KubeAccessor {
    /// Create a new instance from the ambient kubeconfig or in-cluster environment.
    pub async fn new(config: &Config) -> Result<Self> {
        let client = Client::try_default().await.context("error initializing K8s client")?;
        Ok(Self::from_client(client, config))
    }

    /// Create a new instance using the given client.
    pub fn from_client(client: Client, config: &Config) -> Self {
        Self {
            client,
            timeout: config.api_timeout(),
        }
    }
}

#[async_trait]
impl ObjectAccessor for KubeAccessor {
    #[tracing::instrument(level = "debug", skip(self))]
    async fn get_node(&self, name: &str) -> Result<Node> {
        let api: Api<Node> = Api::all(self.client.clone());
        timeout(self.timeout, api.get(name))
            .await
            .context("timeout fetching node")?
            .with_context(|| format!("error fetching node {}", name))
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn list_nodes(&self, label_selector: &str) -> Result<Vec<Node>> {
        let api: Api<Node> = Api::all(self.client.clone());
        let params = ListParams::default().labels(label_selector);
        let list = timeout(self.timeout, api.list(&params))
            .await
            .context("timeout listing nodes")?
            .context("error listing nodes")?;
        Ok(list.items)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn get_pool(&self, name: &str) -> Result<MachineConfigPool> {
        let api: Api<MachineConfigPool> = Api::all(self.client.clone());
        timeout(self.timeout, api.get(name))
            .await
            .context("timeout fetching machine config pool")?
            .with_context(|| format!("error fetching machine config pool {}", name))
    }

    #[tracing::instrument(level = "debug", skip(self, patch))]
    async fn patch_pool(&self, name: &str, patch: &serde_json::Value) -> Result<()> {
        let api: Api<MachineConfigPool> = Api::all(self.client.clone());
        let _pool = timeout(self.timeout, api.patch(name, &PatchParams::default(), &Patch::Merge(patch)))
            .await
            .context("timeout patching machine config pool")?
            .with_context(|| format!("error patching machine config pool {}", name))?;
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn list_events(&self, namespace: &str, involved_object: &str) -> Result<Vec<Event>> {
        let api: Api<Event> = Api::namespaced(self.client.clone(), namespace);
        let params = ListParams::default().fields(&format!("involvedObject.name={}", involved_object));
        let list = timeout(self.timeout, api.list(&params))
            .await
            .context("timeout listing events")?
            .context("error listing events")?;
        Ok(list.items)
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn list_pods(&self, namespace: &str, label_selector: &str) -> Result<Vec<Pod>> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let params = ListParams::default().labels(label_selector);
        let list = timeout(self.timeout, api.list(&params))
            .await
            .context("timeout listing pods")?
            .context("error listing pods")?;
        Ok(list.items)
    }
}
