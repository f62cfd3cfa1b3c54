//! Drift detection model.
//!
//! A drift scenario perturbs state the operator declaratively owns, without going through the
//! operator's configuration channel, and expects the operator to report the exact cause. The
//! reason the daemon reports follows fixed templates, and those templates are reproduced here
//! byte for byte: a looser comparison would accept a node which is degraded for a different
//! cause than the one injected.

use crate::error::{VerifyError, VerifyResult};
use crate::node::NodeState;
use crate::pool::{ConditionType, PoolState};

/// The states of a drift scenario.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DriftState {
    /// Nothing has been perturbed yet.
    Baseline,
    /// Owned state has been changed out of band.
    Perturbed,
    /// The pool reported the injected cause.
    DetectedDegraded,
    /// The pool recovered and the reason was cleared.
    Restored,
}

impl DriftState {
    /// The state which follows this one, if any.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Baseline => Some(Self::Perturbed),
            Self::Perturbed => Some(Self::DetectedDegraded),
            Self::DetectedDegraded => Some(Self::Restored),
            Self::Restored => None,
        }
    }

    /// Transition to the given state, which must directly follow this one.
    pub fn transition(self, to: Self) -> VerifyResult<Self> {
        if self.next() == Some(to) {
            Ok(to)
        } else {
            Err(VerifyError::InvalidTransition {
                from: self.to_string(),
                to: to.to_string(),
            })
        }
    }
}

impl std::fmt::Display for DriftState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Baseline => "Baseline",
                Self::Perturbed => "Perturbed",
                Self::DetectedDegraded => "DetectedDegraded",
                Self::Restored => "Restored",
            }
        )
    }
}

/// The degraded reason a drift is expected to produce.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DriftReason {
    /// The content of a file differs from its declared content.
    ContentMismatch { path: String },
    /// The permission bits of a file differ from its declared mode.
    ModeMismatch { path: String, expected: u32, received: u32 },
    /// Any other exact reason.
    Custom(String),
}

impl DriftReason {
    /// The exact reason message the node is expected to report.
    pub fn message(&self) -> String {
        match self {
            Self::ContentMismatch { path } => format!("content mismatch for file {:?}", path),
            Self::ModeMismatch { path, expected, received } => format!(
                "mode mismatch for file: {:?}; expected: {}; received: {}",
                path,
                describe_mode(*expected),
                describe_mode(*received)
            ),
            Self::Custom(msg) => msg.clone(),
        }
    }
}

impl std::fmt::Display for DriftReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

/// Render permission bits as the daemon does: symbolic, decimal and octal, like `-rw-r--r--/420/0644`.
fn describe_mode(mode: u32) -> String {
    let octal = if mode == 0 { "0".to_string() } else { format!("0{:o}", mode) };
    format!("{}/{}/{}", file_mode_string(mode), mode, octal)
}

/// Render the permission bits of a regular file symbolically, like `-rwxr-xr-x`.
pub fn file_mode_string(mode: u32) -> String {
    const RWX: &[u8; 9] = b"rwxrwxrwx";
    let mut out = String::with_capacity(10);
    out.push('-');
    for (idx, ch) in RWX.iter().enumerate() {
        let bit = 1 << (8 - idx);
        out.push(if mode & bit != 0 { *ch as char } else { '-' });
    }
    out
}

/// Check that the node reports exactly the expected reason.
pub fn check_node_reason(node: &NodeState, expected: &DriftReason) -> (bool, String) {
    let expected = expected.message();
    if node.reason == expected {
        (true, format!("node {} reports {:?}", node.name, expected))
    } else {
        (false, format!("node {} reports {:?}, expected {:?}", node.name, node.reason, expected))
    }
}

/// Check that the pool is degraded and that its `NodeDegraded` condition mentions the message.
///
/// The operator quotes the node's reason inside the condition message, so the message matches
/// either verbatim or in its quoted and escaped form.
pub fn check_degraded_condition(pool: &PoolState, expected_message: &str) -> (bool, String) {
    if !pool.is_degraded() {
        return (false, format!("pool {} does not report {}=True", pool.name, ConditionType::Degraded));
    }
    let message = pool
        .condition(ConditionType::NodeDegraded)
        .and_then(|cond| cond.message.as_deref())
        .unwrap_or_default();
    let quoted = format!("{:?}", expected_message);
    if message.contains(expected_message) || message.contains(quoted.as_str()) {
        (true, format!("pool {} is degraded with {:?}", pool.name, message))
    } else {
        (
            false,
            format!("pool {} {} message is {:?}, expected it to contain {:?}", pool.name, ConditionType::NodeDegraded, message, expected_message),
        )
    }
}
