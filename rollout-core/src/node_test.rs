use anyhow::Result;
use k8s_openapi::api::core::v1::Node;

use crate::error::VerifyError;
use crate::fixtures::{self, lifecycle, ts};
use crate::node::{sort_nodes, LifecycleState, NodeRef, NodeState, ANNOTATION_DESIRED_DRAIN, ANNOTATION_REASON, ANNOTATION_STATE};

const NODE_YAML: &str = r#"
apiVersion: v1
kind: Node
metadata:
  name: worker-0
  creationTimestamp: "2023-11-14T22:13:20Z"
  labels:
    node-role.kubernetes.io/worker: ""
    topology.kubernetes.io/zone: us-east-1a
  annotations:
    machineconfiguration.openshift.io/currentConfig: rendered-worker-1
    machineconfiguration.openshift.io/desiredConfig: rendered-worker-2
    machineconfiguration.openshift.io/state: Working
    machineconfiguration.openshift.io/desiredDrain: drain-rendered-worker-2
    machineconfiguration.openshift.io/lastAppliedDrain: uncordon-rendered-worker-1
    machineconfiguration.openshift.io/reason: ""
spec:
  unschedulable: true
  taints:
  - effect: NoSchedule
    key: node.kubernetes.io/unschedulable
"#;

#[test]
fn node_state_parses_from_api_object() -> Result<()> {
    let node: Node = serde_yaml::from_str(NODE_YAML)?;

    let state = NodeState::from_node(&node)?;
    let identity = NodeRef::from_node(&node)?;

    assert!(state.state == LifecycleState::Working, "expected state Working, got {}", state.state);
    assert!(state.is_updating(), "expected node to be updating");
    assert!(!state.is_updated(), "expected node to not be updated while working");
    assert!(!state.has_been_drained(), "expected drain to be pending, got {} -> {}", state.last_applied_drain, state.desired_drain);
    assert!(state.is_tainted(), "expected cordoned node to be tainted");
    assert_eq!(identity.zone.as_deref(), Some("us-east-1a"), "unexpected zone parsed");
    assert_eq!(identity.created, ts(0), "unexpected creation timestamp parsed, got {}", identity.created);

    Ok(())
}

#[test]
fn node_state_updated_and_updating_are_exclusive() -> Result<()> {
    for state in ["Done", "Working", "Degraded", "Unreconcilable"] {
        for (current, desired) in [("rendered-1", "rendered-1"), ("rendered-1", "rendered-2")] {
            let node = fixtures::node("worker-0", None, 0, lifecycle(current, desired, state));
            let parsed = NodeState::from_node(&node)?;
            assert!(
                !(parsed.is_updating() && parsed.is_updated()),
                "node with state {} current {} desired {} is both updating and updated",
                state,
                current,
                desired
            );
        }
    }

    let done = NodeState::from_node(&fixtures::node("worker-0", None, 0, lifecycle("rendered-2", "rendered-2", "Done")))?;
    assert!(done.is_updated(), "expected node running its desired config to be updated");
    assert!(done.has_been_drained(), "expected drain tokens to match");
    assert!(!done.is_tainted(), "expected schedulable node to not be tainted");

    Ok(())
}

#[test]
fn node_state_missing_annotation_is_an_error() {
    let mut annotations = lifecycle("rendered-1", "rendered-1", "Done");
    annotations.remove(ANNOTATION_DESIRED_DRAIN);
    let node = fixtures::node("worker-0", None, 0, annotations);

    let res = NodeState::from_node(&node);

    match res {
        Err(VerifyError::AnnotationMissing { node, annotation }) => {
            assert_eq!(node, "worker-0", "unexpected node in error");
            assert_eq!(annotation, ANNOTATION_DESIRED_DRAIN, "unexpected annotation in error");
        }
        other => panic!("expected AnnotationMissing error, got {:?}", other),
    }
}

#[test]
fn node_state_unknown_state_is_an_error() {
    let mut annotations = lifecycle("rendered-1", "rendered-1", "Done");
    annotations.insert(ANNOTATION_STATE.into(), "Rebooting".into());
    let node = fixtures::node("worker-0", None, 0, annotations);

    let res = NodeState::from_node(&node);

    assert!(matches!(res, Err(VerifyError::InvalidField { .. })), "expected InvalidField error, got {:?}", res);
}

#[test]
fn node_state_missing_reason_reads_as_empty() -> Result<()> {
    let mut annotations = lifecycle("rendered-1", "rendered-1", "Done");
    annotations.remove(ANNOTATION_REASON);
    let node = fixtures::node("worker-0", None, 0, annotations);

    let state = NodeState::from_node(&node)?;

    assert!(state.reason.is_empty(), "expected empty reason, got {:?}", state.reason);
    Ok(())
}

#[test]
fn sort_nodes_orders_by_zone_then_age() {
    let nodes = vec![
        NodeRef::new("zoneless-old", None, ts(0)),
        NodeRef::new("b-young", Some("zone-b"), ts(30)),
        NodeRef::new("a-young", Some("zone-a"), ts(20)),
        NodeRef::new("b-old", Some("zone-b"), ts(10)),
        NodeRef::new("a-old", Some("zone-a"), ts(5)),
        NodeRef::new("zoneless-young", None, ts(50)),
    ];

    let sorted: Vec<String> = sort_nodes(nodes, None).into_iter().map(|node| node.name).collect();

    let expected = vec!["a-old", "a-young", "b-old", "b-young", "zoneless-old", "zoneless-young"];
    assert_eq!(sorted, expected, "unexpected node order");
}

#[test]
fn sort_nodes_moves_controller_host_last() {
    let nodes = vec![
        NodeRef::new("master-0", Some("zone-a"), ts(0)),
        NodeRef::new("master-1", Some("zone-b"), ts(0)),
        NodeRef::new("master-2", Some("zone-c"), ts(0)),
    ];

    let sorted: Vec<String> = sort_nodes(nodes.clone(), Some("master-0")).into_iter().map(|node| node.name).collect();
    let unknown_host: Vec<String> = sort_nodes(nodes, Some("master-9")).into_iter().map(|node| node.name).collect();

    assert_eq!(sorted, vec!["master-1", "master-2", "master-0"], "expected controller host to be moved last");
    assert_eq!(unknown_host, vec!["master-0", "master-1", "master-2"], "expected unknown controller host to leave order unchanged");
}

#[test]
fn sort_nodes_is_deterministic() {
    let nodes = vec![
        NodeRef::new("worker-c", None, ts(0)),
        NodeRef::new("worker-a", None, ts(0)),
        NodeRef::new("worker-b", Some("zone-a"), ts(0)),
        NodeRef::new("worker-d", Some("zone-a"), ts(0)),
    ];
    let mut reversed = nodes.clone();
    reversed.reverse();

    let first = sort_nodes(nodes.clone(), Some("worker-b"));
    let second = sort_nodes(nodes, Some("worker-b"));
    let from_reversed = sort_nodes(reversed, Some("worker-b"));

    assert_eq!(first, second, "expected identical order for identical input");
    assert_eq!(first, from_reversed, "expected order to not depend on input order");
}
