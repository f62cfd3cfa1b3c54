//! Data model and pure verification logic for machine config pool rollouts.
//!
//! Everything in this crate operates on point-in-time values which have already been read from
//! the cluster. Polling, remote access and timing live in `rollout-verifier`.

pub mod crd;
pub mod drift;
#[cfg(test)]
mod drift_test;
pub mod error;
pub mod events;
#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;
pub mod node;
#[cfg(test)]
mod node_test;
pub mod order;
pub mod pool;
pub mod snapshot;

pub use drift::{check_degraded_condition, check_node_reason, file_mode_string, DriftReason, DriftState};
pub use error::{VerifyError, VerifyResult};
pub use events::{match_event_sequence, verify_event_sequence, LifecycleEvent, SequenceMismatch};
pub use node::{sort_nodes, LifecycleState, NodeRef, NodeState};
pub use order::{check_order, verify_order, OrderingMismatch};
pub use pool::{ConditionType, PoolState};
pub use snapshot::Snapshot;

/// The annotation & label prefix used by the machine config operator.
pub const MCO_PREFIX: &str = "machineconfiguration.openshift.io";
/// The name of the pool whose controller runs on one of its own members.
pub const CONTROL_PLANE_POOL: &str = "master";
