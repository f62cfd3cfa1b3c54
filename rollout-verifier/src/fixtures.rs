//! A scripted object accessor for engine tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Event, Node, Pod, PodSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use crate::accessor::ObjectAccessor;
use rollout_core::crd::{MachineConfigPool, RequiredMetadata};

/// One consistent view of the cluster.
#[derive(Clone)]
pub struct Frame {
    pub pool: MachineConfigPool,
    pub nodes: Vec<Node>,
}

impl Frame {
    pub fn new(pool: MachineConfigPool, nodes: Vec<Node>) -> Self {
        Self { pool, nodes }
    }
}

#[derive(Default)]
struct Script {
    current: Option<Frame>,
    upcoming: VecDeque<Frame>,
    failing_reads: u32,
    patches: Vec<(String, serde_json::Value)>,
    pool_reads: u32,
}

/// Replays a fixed sequence of frames.
///
/// Every `get_pool` call moves to the next frame, if any is left, and the last frame repeats
/// forever. Node reads serve the frame selected by the latest pool read, so one polling
/// iteration sees one frame.
#[derive(Default)]
pub struct ScriptedAccessor {
    script: Mutex<Script>,
    events: Vec<Event>,
    pods: Vec<Pod>,
}

impl ScriptedAccessor {
    /// Create a new instance replaying the given frames.
    pub fn new(frames: Vec<Frame>) -> Self {
        Self {
            script: Mutex::new(Script {
                upcoming: frames.into(),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// Serve the given events for every event listing.
    pub fn with_events(mut self, events: Vec<Event>) -> Self {
        self.events = events;
        self
    }

    /// Report a controller pod scheduled on the given node.
    pub fn with_controller_on(mut self, node: &str) -> Self {
        self.pods.push(Pod {
            metadata: ObjectMeta {
                name: Some("machine-config-controller-abc12".into()),
                ..Default::default()
            },
            spec: Some(PodSpec {
                node_name: Some(node.into()),
                ..Default::default()
            }),
            status: None,
        });
        self
    }

    /// Fail the next `count` pool reads with a transport error.
    pub fn fail_next_reads(&self, count: u32) {
        if let Ok(mut script) = self.script.lock() {
            script.failing_reads = count;
        }
    }

    /// Queue further frames after the ones already scripted.
    pub fn push_frames(&self, frames: Vec<Frame>) {
        if let Ok(mut script) = self.script.lock() {
            script.upcoming.extend(frames);
        }
    }

    /// The merge patches applied so far, by pool name.
    pub fn patches(&self) -> Vec<(String, serde_json::Value)> {
        self.script.lock().map(|script| script.patches.clone()).unwrap_or_default()
    }

    /// The number of successful pool reads so far.
    pub fn pool_reads(&self) -> u32 {
        self.script.lock().map(|script| script.pool_reads).unwrap_or_default()
    }

    fn current(&self) -> Result<Frame> {
        let script = self.script.lock().map_err(|_| anyhow!("script lock poisoned"))?;
        match (&script.current, script.upcoming.front()) {
            (Some(frame), _) | (None, Some(frame)) => Ok(frame.clone()),
            (None, None) => bail!("no frames scripted"),
        }
    }
}

#[async_trait]
impl ObjectAccessor for ScriptedAccessor {
    async fn get_node(&self, name: &str) -> Result<Node> {
        let frame = self.current()?;
        frame
            .nodes
            .into_iter()
            .find(|node| node.name() == name)
            .ok_or_else(|| anyhow!("node {} not found", name))
    }

    async fn list_nodes(&self, _label_selector: &str) -> Result<Vec<Node>> {
        Ok(self.current()?.nodes)
    }

    async fn get_pool(&self, name: &str) -> Result<MachineConfigPool> {
        let mut script = self.script.lock().map_err(|_| anyhow!("script lock poisoned"))?;
        if script.failing_reads > 0 {
            script.failing_reads -= 1;
            bail!("connection reset by peer");
        }
        if let Some(next) = script.upcoming.pop_front() {
            script.current = Some(next);
        }
        script.pool_reads += 1;
        match &script.current {
            Some(frame) if frame.pool.name() == name => Ok(frame.pool.clone()),
            _ => bail!("machine config pool {} not found", name),
        }
    }

    async fn patch_pool(&self, name: &str, patch: &serde_json::Value) -> Result<()> {
        let mut script = self.script.lock().map_err(|_| anyhow!("script lock poisoned"))?;
        script.patches.push((name.to_string(), patch.clone()));
        Ok(())
    }

    async fn list_events(&self, _namespace: &str, involved_object: &str) -> Result<Vec<Event>> {
        Ok(self
            .events
            .iter()
            .filter(|event| event.involved_object.name.as_deref() == Some(involved_object))
            .cloned()
            .collect())
    }

    async fn list_pods(&self, _namespace: &str, _label_selector: &str) -> Result<Vec<Pod>> {
        Ok(self.pods.clone())
    }
}
