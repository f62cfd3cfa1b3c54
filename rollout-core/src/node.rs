//! Node state model.
//!
//! A node is observed only through its metadata. The machine config daemon running on each node
//! publishes its lifecycle through a fixed set of annotations, and the verifier derives all of
//! its node level booleans from a single read of those annotations.

use std::cmp::Ordering;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::Node;

use crate::crd::RequiredMetadata;
use crate::error::{VerifyError, VerifyResult};

/// The annotation holding the configuration currently applied to the node.
pub const ANNOTATION_CURRENT_CONFIG: &str = "machineconfiguration.openshift.io/currentConfig";
/// The annotation holding the configuration the node has been asked to apply.
pub const ANNOTATION_DESIRED_CONFIG: &str = "machineconfiguration.openshift.io/desiredConfig";
/// The annotation holding the daemon's lifecycle state.
pub const ANNOTATION_STATE: &str = "machineconfiguration.openshift.io/state";
/// The annotation holding the most recent drain request token.
pub const ANNOTATION_DESIRED_DRAIN: &str = "machineconfiguration.openshift.io/desiredDrain";
/// The annotation holding the most recently completed drain token.
pub const ANNOTATION_LAST_APPLIED_DRAIN: &str = "machineconfiguration.openshift.io/lastAppliedDrain";
/// The annotation holding the reason for a degraded state. Empty when healthy.
pub const ANNOTATION_REASON: &str = "machineconfiguration.openshift.io/reason";
/// The canonical K8s label identifying a node's topology zone.
pub const LABEL_ZONE: &str = "topology.kubernetes.io/zone";

/// The lifecycle state published by a node's config daemon.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleState {
    /// The node has applied its desired configuration.
    Done,
    /// The node is applying a new configuration.
    Working,
    /// The node failed to apply its desired configuration.
    Degraded,
    /// The desired configuration can never be applied to this node.
    Unreconcilable,
}

impl FromStr for LifecycleState {
    type Err = String;

    fn from_str(val: &str) -> Result<Self, Self::Err> {
        match val {
            "Done" => Ok(Self::Done),
            "Working" => Ok(Self::Working),
            "Degraded" => Ok(Self::Degraded),
            "Unreconcilable" => Ok(Self::Unreconcilable),
            other => Err(format!("unknown lifecycle state {:?}", other)),
        }
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Done => "Done",
                Self::Working => "Working",
                Self::Degraded => "Degraded",
                Self::Unreconcilable => "Unreconcilable",
            }
        )
    }
}

/// The identity of a node, which is all that is needed for computing update order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeRef {
    /// The node's name, unique within the cluster.
    pub name: String,
    /// The node's topology zone, if labelled.
    pub zone: Option<String>,
    /// The node's creation timestamp.
    pub created: DateTime<Utc>,
}

impl NodeRef {
    /// Create a new instance.
    pub fn new(name: impl Into<String>, zone: Option<&str>, created: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            zone: zone.map(String::from),
            created,
        }
    }

    /// Extract the identity of the given node object.
    pub fn from_node(node: &Node) -> VerifyResult<Self> {
        let name = node.name().to_string();
        let created = node
            .metadata
            .creation_timestamp
            .as_ref()
            .map(|ts| ts.0)
            .ok_or_else(|| VerifyError::InvalidField {
                object: format!("node/{}", name),
                field: "metadata.creationTimestamp".into(),
                reason: "field is not set".into(),
            })?;
        // An empty zone label carries no topology information.
        let zone = node
            .metadata
            .labels
            .as_ref()
            .and_then(|labels| labels.get(LABEL_ZONE))
            .filter(|zone| !zone.is_empty())
            .cloned();
        Ok(Self { name, zone, created })
    }
}

impl AsRef<str> for NodeRef {
    fn as_ref(&self) -> &str {
        &self.name
    }
}

/// A point-in-time view of a node's lifecycle annotations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeState {
    pub name: String,
    pub current_config: String,
    pub desired_config: String,
    pub state: LifecycleState,
    pub desired_drain: String,
    pub last_applied_drain: String,
    /// The degraded reason reported by the daemon, empty when there is none.
    pub reason: String,
    /// True if the node has been cordoned.
    pub unschedulable: bool,
    /// The effects of all taints on the node which repel workloads.
    pub taint_effects: Vec<String>,
}

impl NodeState {
    /// Parse the lifecycle view of the given node object.
    ///
    /// Every lifecycle annotation must be present. A missing annotation is reported as an error
    /// rather than defaulted, as a partially annotated node is itself a defect of the daemon.
    pub fn from_node(node: &Node) -> VerifyResult<Self> {
        let name = node.name().to_string();
        let annotation = |key: &str| -> VerifyResult<String> {
            node.metadata
                .annotations
                .as_ref()
                .and_then(|annotations| annotations.get(key))
                .cloned()
                .ok_or_else(|| VerifyError::AnnotationMissing {
                    node: name.clone(),
                    annotation: key.into(),
                })
        };
        let state_raw = annotation(ANNOTATION_STATE)?;
        let state = state_raw.parse().map_err(|reason| VerifyError::InvalidField {
            object: format!("node/{}", name),
            field: ANNOTATION_STATE.into(),
            reason,
        })?;
        let reason = node
            .metadata
            .annotations
            .as_ref()
            .and_then(|annotations| annotations.get(ANNOTATION_REASON))
            .cloned()
            .unwrap_or_default();
        let spec = node.spec.as_ref();
        let taint_effects = spec
            .and_then(|spec| spec.taints.as_ref())
            .map(|taints| {
                taints
                    .iter()
                    .filter(|taint| taint.effect == "NoSchedule" || taint.effect == "NoExecute")
                    .map(|taint| taint.effect.clone())
                    .collect()
            })
            .unwrap_or_default();
        Ok(Self {
            current_config: annotation(ANNOTATION_CURRENT_CONFIG)?,
            desired_config: annotation(ANNOTATION_DESIRED_CONFIG)?,
            desired_drain: annotation(ANNOTATION_DESIRED_DRAIN)?,
            last_applied_drain: annotation(ANNOTATION_LAST_APPLIED_DRAIN)?,
            state,
            reason,
            unschedulable: spec.and_then(|spec| spec.unschedulable).unwrap_or(false),
            taint_effects,
            name,
        })
    }

    /// True while the node's daemon is applying a configuration.
    pub fn is_updating(&self) -> bool {
        self.state == LifecycleState::Working
    }

    /// True once the node runs its desired configuration and the daemon is idle.
    pub fn is_updated(&self) -> bool {
        self.current_config == self.desired_config && self.state == LifecycleState::Done
    }

    /// True when the most recent drain request has been completed.
    pub fn has_been_drained(&self) -> bool {
        self.desired_drain == self.last_applied_drain
    }

    /// True when the node is cordoned or carries a taint which repels workloads.
    pub fn is_tainted(&self) -> bool {
        self.unschedulable || !self.taint_effects.is_empty()
    }

    /// True when the daemon reports that it can not reconcile the node.
    pub fn is_degraded(&self) -> bool {
        matches!(self.state, LifecycleState::Degraded | LifecycleState::Unreconcilable)
    }
}

impl std::fmt::Display for NodeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} state={} current={} desired={}", self.name, self.state, self.current_config, self.desired_config)?;
        if !self.has_been_drained() {
            write!(f, " drain={}->{}", self.last_applied_drain, self.desired_drain)?;
        }
        if !self.reason.is_empty() {
            write!(f, " reason={:?}", self.reason)?;
        }
        Ok(())
    }
}

/// Compute the order in which the operator is expected to update the given nodes.
///
/// Nodes carrying a zone sort first, by zone, and zoneless nodes sort last. Within a zone, older
/// nodes come first. Names break any remaining tie so that the order is total.
///
/// If `controller_host` names one of the nodes, that node is moved to the very end. The
/// controller driving the rollout runs there and must not be disrupted before it has scheduled
/// every other node.
pub fn sort_nodes(mut nodes: Vec<NodeRef>, controller_host: Option<&str>) -> Vec<NodeRef> {
    nodes.sort_by(|a, b| {
        let by_zone = match (&a.zone, &b.zone) {
            (Some(za), Some(zb)) => za.cmp(zb),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_zone.then_with(|| a.created.cmp(&b.created)).then_with(|| a.name.cmp(&b.name))
    });
    if let Some(host) = controller_host {
        if let Some(pos) = nodes.iter().position(|node| node.name == host) {
            let node = nodes.remove(pos);
            nodes.push(node);
        }
    }
    nodes
}
