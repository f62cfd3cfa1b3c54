use anyhow::Result;

use crate::drift::{check_degraded_condition, check_node_reason, file_mode_string, DriftReason, DriftState};
use crate::error::VerifyError;
use crate::fixtures::{self, lifecycle};
use crate::node::{NodeState, ANNOTATION_REASON};
use crate::pool::PoolState;

#[test]
fn drift_reason_content_mismatch_template() {
    let reason = DriftReason::ContentMismatch { path: "/etc/example".into() };

    assert_eq!(reason.message(), r#"content mismatch for file "/etc/example""#, "unexpected content mismatch message");
}

#[test]
fn drift_reason_mode_mismatch_template() {
    let reason = DriftReason::ModeMismatch {
        path: "/etc/example".into(),
        expected: 0o644,
        received: 0o777,
    };

    assert_eq!(
        reason.message(),
        r#"mode mismatch for file: "/etc/example"; expected: -rw-r--r--/420/0644; received: -rwxrwxrwx/511/0777"#,
        "unexpected mode mismatch message"
    );
}

#[test]
fn file_mode_string_renders_permission_bits() {
    assert_eq!(file_mode_string(0o755), "-rwxr-xr-x");
    assert_eq!(file_mode_string(0o600), "-rw-------");
    assert_eq!(file_mode_string(0), "----------");
}

#[test]
fn drift_state_transitions_in_order() -> Result<()> {
    let state = DriftState::Baseline.transition(DriftState::Perturbed)?;
    let state = state.transition(DriftState::DetectedDegraded)?;
    let state = state.transition(DriftState::Restored)?;

    assert_eq!(state, DriftState::Restored, "expected to end in Restored");
    assert!(state.next().is_none(), "expected Restored to be terminal");
    Ok(())
}

#[test]
fn drift_state_rejects_skipped_states() {
    let res = DriftState::Baseline.transition(DriftState::Restored);
    assert!(
        matches!(&res, Err(VerifyError::InvalidTransition { from, to }) if from == "Baseline" && to == "Restored"),
        "expected InvalidTransition, got {:?}",
        res
    );
    let res = DriftState::DetectedDegraded.transition(DriftState::Perturbed);
    assert!(res.is_err(), "expected backwards transition to be rejected, got {:?}", res);
}

#[test]
fn check_node_reason_requires_exact_match() -> Result<()> {
    let expected = DriftReason::ContentMismatch { path: "/etc/example".into() };
    let mut annotations = lifecycle("rendered-1", "rendered-1", "Degraded");
    annotations.insert(ANNOTATION_REASON.into(), expected.message());
    let exact = NodeState::from_node(&fixtures::node("worker-0", None, 0, annotations.clone()))?;
    annotations.insert(ANNOTATION_REASON.into(), format!("unexpected on-disk state: {}", expected.message()));
    let prefixed = NodeState::from_node(&fixtures::node("worker-0", None, 0, annotations))?;

    assert!(check_node_reason(&exact, &expected).0, "expected exact reason to match");
    let (matched, diagnostic) = check_node_reason(&prefixed, &expected);
    assert!(!matched, "expected reason with a different prefix to be rejected");
    assert!(diagnostic.contains("worker-0"), "expected diagnostic to name the node, got {}", diagnostic);

    Ok(())
}

#[test]
fn check_degraded_condition_reads_node_degraded_message() -> Result<()> {
    let message = r#"Node worker-0 is reporting: "content mismatch for file \"/etc/example\"""#;
    let degraded = fixtures::with_condition_message(
        fixtures::pool("worker", 3, 1, &[("Degraded", "True"), ("NodeDegraded", "True")]),
        "NodeDegraded",
        message,
    );
    let healthy = fixtures::pool("worker", 3, 0, &[("Degraded", "False")]);

    let (matched, diagnostic) = check_degraded_condition(&PoolState::from_pool(&degraded)?, r#"content mismatch for file \"/etc/example\""#);
    assert!(matched, "expected degraded condition to match: {}", diagnostic);
    let reason = DriftReason::ContentMismatch { path: "/etc/example".into() };
    let (matched, diagnostic) = check_degraded_condition(&PoolState::from_pool(&degraded)?, &reason.message());
    assert!(matched, "expected quoted reason to match: {}", diagnostic);
    let (matched, _) = check_degraded_condition(&PoolState::from_pool(&healthy)?, "content mismatch");
    assert!(!matched, "expected healthy pool to not match");

    Ok(())
}
