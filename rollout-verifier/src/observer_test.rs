use anyhow::Result;

use crate::observer::{Progress, RolloutObserver};
use rollout_core::fixtures;
use rollout_core::{check_order, NodeRef, NodeState, PoolState, VerifyError};

const OLD: &str = "rendered-worker-1";
const NEW: &str = "rendered-worker-2";

fn expected() -> Vec<NodeRef> {
    ["a", "b", "c"].iter().enumerate().map(|(idx, name)| NodeRef::new(*name, Some("z1"), fixtures::ts(idx as i64))).collect()
}

fn node(name: &str, current: &str, state: &str) -> NodeState {
    let desired = if state == "Done" { current } else { NEW };
    let obj = fixtures::node(name, Some("z1"), 0, fixtures::lifecycle(current, desired, state));
    NodeState::from_node(&obj).expect("fixture node must parse")
}

fn pool(degraded: i64) -> PoolState {
    PoolState::from_pool(&fixtures::pool("worker", 3, degraded, &[("Updated", "False"), ("Updating", "True")])).expect("fixture pool must parse")
}

fn names(nodes: &[NodeRef]) -> Vec<&str> {
    nodes.iter().map(|node| node.name.as_str()).collect()
}

#[test]
fn records_nodes_in_order_they_start_working() -> Result<()> {
    let mut observer = RolloutObserver::new("worker", expected(), 1);

    let frames = vec![
        vec![node("a", OLD, "Done"), node("b", OLD, "Done"), node("c", OLD, "Done")],
        vec![node("a", OLD, "Working"), node("b", OLD, "Done"), node("c", OLD, "Done")],
        vec![node("a", NEW, "Done"), node("b", OLD, "Working"), node("c", OLD, "Done")],
        vec![node("a", NEW, "Done"), node("b", NEW, "Done"), node("c", OLD, "Working")],
    ];
    let mut progress = Progress::Pending;
    for frame in frames {
        progress = observer.step(pool(0), frame)?;
    }

    assert_eq!(progress, Progress::Complete, "expected observation to complete");
    assert_eq!(names(observer.observed()), vec!["a", "b", "c"], "unexpected observed order");
    Ok(())
}

#[test]
fn node_updating_between_polls_is_recorded_from_config_change() -> Result<()> {
    let mut observer = RolloutObserver::new("worker", expected(), 1);

    observer.step(pool(0), vec![node("a", OLD, "Done"), node("b", OLD, "Done"), node("c", OLD, "Done")])?;
    // Node a went through its whole update without ever being seen Working.
    let progress = observer.step(pool(0), vec![node("a", NEW, "Done"), node("b", OLD, "Done"), node("c", OLD, "Done")])?;

    assert_eq!(progress, Progress::Pending, "expected observation to still be pending");
    assert_eq!(names(observer.observed()), vec!["a"], "expected node a to be recorded");
    Ok(())
}

#[test]
fn node_finished_between_polls_is_recorded_before_node_now_working() -> Result<()> {
    let expected = vec![NodeRef::new("b", Some("z1"), fixtures::ts(0)), NodeRef::new("a", Some("z1"), fixtures::ts(1))];
    let mut observer = RolloutObserver::new("worker", expected.clone(), 1);

    observer.step(pool(0), vec![node("a", OLD, "Done"), node("b", OLD, "Done")])?;
    // Node b updated completely between polls, then node a started.
    let progress = observer.step(pool(0), vec![node("a", OLD, "Working"), node("b", NEW, "Done")])?;

    assert_eq!(progress, Progress::Complete, "expected observation to complete");
    let observed = names(observer.observed());
    assert_eq!(observed, vec!["b", "a"], "expected the finished node to be recorded first");
    assert!(check_order(&names(&expected), &observed, 1), "expected observed order {:?} to match", observed);
    Ok(())
}

#[test]
fn too_many_nodes_in_flight_violates_concurrency_bound() -> Result<()> {
    let mut observer = RolloutObserver::new("worker", expected(), 1);

    let res = observer.step(pool(0), vec![node("a", OLD, "Working"), node("b", OLD, "Working"), node("c", OLD, "Done")]);

    match res {
        Err(VerifyError::ConcurrencyBoundViolated {
            in_flight,
            max_unavailable,
            snapshot,
            ..
        }) => {
            assert_eq!(in_flight, 2, "unexpected in-flight count");
            assert_eq!(max_unavailable, 1, "unexpected bound");
            assert_eq!(snapshot.nodes.len(), 3, "expected snapshot to carry every member");
            assert_eq!(snapshot.expected_order, vec!["a", "b", "c"], "expected snapshot to carry the expected order");
        }
        other => anyhow::bail!("expected concurrency bound violation, got {:?}", other),
    }
    Ok(())
}

#[test]
fn batch_within_bound_is_accepted() -> Result<()> {
    let mut observer = RolloutObserver::new("worker", expected(), 2);

    let progress = observer.step(pool(0), vec![node("a", OLD, "Working"), node("b", OLD, "Working"), node("c", OLD, "Done")])?;

    assert_eq!(progress, Progress::Pending, "expected observation to still be pending");
    assert_eq!(names(observer.observed()), vec!["a", "b"], "expected both batch members to be recorded");
    Ok(())
}

#[test]
fn degraded_machine_ends_observation() -> Result<()> {
    let mut observer = RolloutObserver::new("worker", expected(), 1);
    observer.step(pool(0), vec![node("a", OLD, "Working"), node("b", OLD, "Done"), node("c", OLD, "Done")])?;

    let res = observer.step(pool(1), vec![node("a", OLD, "Degraded"), node("b", OLD, "Done"), node("c", OLD, "Done")]);

    match res {
        Err(VerifyError::DegradedInvariantViolated { pool, snapshot, .. }) => {
            assert_eq!(pool, "worker", "unexpected pool in error");
            assert_eq!(snapshot.observed_order, vec!["a"], "expected snapshot to carry the order observed so far");
        }
        other => anyhow::bail!("expected degraded invariant violation, got {:?}", other),
    }
    Ok(())
}

#[test]
fn nodes_outside_expected_set_are_ignored() -> Result<()> {
    let mut observer = RolloutObserver::new("worker", expected(), 1);

    let progress = observer.step(pool(0), vec![node("a", OLD, "Done"), node("x", OLD, "Working")])?;

    assert_eq!(progress, Progress::Pending, "expected observation to still be pending");
    assert!(observer.observed().is_empty(), "expected unknown node to be ignored, got {:?}", names(observer.observed()));
    Ok(())
}
