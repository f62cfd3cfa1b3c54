//! Rollout verification error abstractions.

use std::time::Duration;

use thiserror::Error;

use crate::snapshot::Snapshot;

/// A result type where the error is a `VerifyError`.
pub type VerifyResult<T> = ::std::result::Result<T, VerifyError>;

/// Verification error variants.
///
/// `TransientRead` is absorbed by the poll primitive and retried. Every other variant ends the
/// enclosing wait immediately. The fatal variants carry the last observed snapshot so that the
/// caller can see which invariant broke.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// A read against the remote API failed, the condition is treated as not yet true.
    #[error("transient read failure: {0}")]
    TransientRead(String),
    /// A lifecycle annotation was not present on a node.
    #[error("annotation {annotation} is missing on node {node}")]
    AnnotationMissing { node: String, annotation: String },
    /// A field of a remote object is missing or could not be parsed.
    #[error("invalid field {field} on {object}: {reason}")]
    InvalidField { object: String, field: String, reason: String },
    /// The pool reported degraded machines while waiting for a non-degraded outcome.
    #[error("degraded invariant violated on pool {pool}: {detail}\n{snapshot}")]
    DegradedInvariantViolated { pool: String, detail: String, snapshot: Box<Snapshot> },
    /// More nodes were updating at once than the pool's disruption budget permits.
    #[error("concurrency bound violated on pool {pool}: {in_flight} nodes updating, maxUnavailable is {max_unavailable}\n{snapshot}")]
    ConcurrencyBoundViolated {
        pool: String,
        in_flight: usize,
        max_unavailable: usize,
        snapshot: Box<Snapshot>,
    },
    /// The wait budget elapsed before the awaited condition held.
    #[error("timed out after {waited:?} waiting for {what}\n{}", render_last_snapshot(.snapshot))]
    TimeoutExceeded {
        what: String,
        waited: Duration,
        snapshot: Option<Box<Snapshot>>,
    },
    /// A validator was asked to move between two states which are not adjacent.
    #[error("invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },
    /// A mutation requested by the engine failed.
    #[error("remote mutation failed: {0:#}")]
    Remote(anyhow::Error),
}

impl VerifyError {
    /// Wrap the given error as a transient read failure.
    pub fn transient(err: impl std::fmt::Display) -> Self {
        Self::TransientRead(err.to_string())
    }

    /// Check if this error is fatal, which is every error other than a transient read failure.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::TransientRead(_))
    }

    /// The snapshot attached to this error, if any.
    pub fn snapshot(&self) -> Option<&Snapshot> {
        match self {
            Self::DegradedInvariantViolated { snapshot, .. } | Self::ConcurrencyBoundViolated { snapshot, .. } => Some(&**snapshot),
            Self::TimeoutExceeded { snapshot, .. } => snapshot.as_deref(),
            _ => None,
        }
    }
}

fn render_last_snapshot(snapshot: &Option<Box<Snapshot>>) -> String {
    match snapshot {
        Some(snapshot) => snapshot.to_string(),
        None => "no state was observed before the deadline".into(),
    }
}
