//! Object builders used by tests across the workspace.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone, Utc};
use k8s_openapi::api::core::v1::{Event, Node, NodeSpec, ObjectReference, Taint};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
use maplit::btreemap;

use crate::crd::{MachineConfigPool, MachineConfigPoolSpec, MachineConfigPoolStatus, MaxUnavailable, PoolCondition, PoolConfiguration, PoolNodeSelector};
use crate::node::{
    ANNOTATION_CURRENT_CONFIG, ANNOTATION_DESIRED_CONFIG, ANNOTATION_DESIRED_DRAIN, ANNOTATION_LAST_APPLIED_DRAIN, ANNOTATION_REASON, ANNOTATION_STATE,
    LABEL_ZONE,
};

/// The label used to select worker pool members.
pub const LABEL_WORKER_ROLE: &str = "node-role.kubernetes.io/worker";

/// A fixed timestamp offset by the given number of seconds.
pub fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp(1_700_000_000 + secs, 0)
}

/// The lifecycle annotations of a node's daemon.
pub fn lifecycle(current: &str, desired: &str, state: &str) -> BTreeMap<String, String> {
    btreemap! {
        ANNOTATION_CURRENT_CONFIG.into() => current.into(),
        ANNOTATION_DESIRED_CONFIG.into() => desired.into(),
        ANNOTATION_STATE.into() => state.into(),
        ANNOTATION_DESIRED_DRAIN.into() => format!("uncordon-{}", current),
        ANNOTATION_LAST_APPLIED_DRAIN.into() => format!("uncordon-{}", current),
        ANNOTATION_REASON.into() => "".into(),
    }
}

/// A worker node created `created` seconds after the fixture epoch.
pub fn node(name: &str, zone: Option<&str>, created: i64, annotations: BTreeMap<String, String>) -> Node {
    let mut labels = btreemap! { LABEL_WORKER_ROLE.to_string() => "".to_string() };
    if let Some(zone) = zone {
        labels.insert(LABEL_ZONE.into(), zone.into());
    }
    Node {
        metadata: ObjectMeta {
            name: Some(name.into()),
            labels: Some(labels),
            annotations: Some(annotations),
            creation_timestamp: Some(Time(ts(created))),
            ..Default::default()
        },
        spec: Some(NodeSpec::default()),
        status: None,
    }
}

/// Mark the given node as cordoned with the canonical unschedulable taint.
pub fn cordoned(mut node: Node) -> Node {
    let spec = node.spec.get_or_insert_with(Default::default);
    spec.unschedulable = Some(true);
    spec.taints = Some(vec![Taint {
        effect: "NoSchedule".into(),
        key: "node.kubernetes.io/unschedulable".into(),
        ..Default::default()
    }]);
    node
}

/// A worker pool with the given status counts and `(type, status)` conditions.
pub fn pool(name: &str, machines: i64, degraded: i64, conditions: &[(&str, &str)]) -> MachineConfigPool {
    let mut pool = MachineConfigPool::new(
        name,
        MachineConfigPoolSpec {
            configuration: Some(PoolConfiguration {
                name: Some(format!("rendered-{}-2", name)),
            }),
            node_selector: Some(PoolNodeSelector {
                match_labels: btreemap! { LABEL_WORKER_ROLE.to_string() => "".to_string() },
            }),
            max_unavailable: None,
            paused: false,
        },
    );
    pool.status = Some(MachineConfigPoolStatus {
        configuration: Some(PoolConfiguration {
            name: Some(format!("rendered-{}-1", name)),
        }),
        machine_count: machines,
        updated_machine_count: machines - degraded,
        ready_machine_count: machines - degraded,
        degraded_machine_count: degraded,
        conditions: conditions
            .iter()
            .map(|(type_, status)| PoolCondition {
                type_: type_.to_string(),
                status: status.to_string(),
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    });
    pool
}

/// Set the pool's disruption budget.
pub fn with_max_unavailable(mut pool: MachineConfigPool, budget: MaxUnavailable) -> MachineConfigPool {
    pool.spec.max_unavailable = Some(budget);
    pool
}

/// Set the message of one of the pool's conditions.
pub fn with_condition_message(mut pool: MachineConfigPool, type_: &str, message: &str) -> MachineConfigPool {
    if let Some(status) = pool.status.as_mut() {
        for cond in status.conditions.iter_mut().filter(|cond| cond.type_ == type_) {
            cond.message = Some(message.into());
        }
    }
    pool
}

/// A K8s event about the given node.
pub fn event(node: &str, reason: &str, secs: i64) -> Event {
    Event {
        metadata: ObjectMeta {
            name: Some(format!("{}.{}.{}", node, reason.to_lowercase(), secs)),
            creation_timestamp: Some(Time(ts(secs))),
            ..Default::default()
        },
        involved_object: ObjectReference {
            kind: Some("Node".into()),
            name: Some(node.into()),
            ..Default::default()
        },
        reason: Some(reason.into()),
        ..Default::default()
    }
}
