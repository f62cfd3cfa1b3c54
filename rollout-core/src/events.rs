//! Lifecycle event sequence matching.
//!
//! Event timestamps have second granularity, so a daemon which cordons and drains a node within
//! the same second produces two events which are indistinguishable in time. The matcher lets
//! consecutive requirements be satisfied by events of the same second.

use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::Event;

use crate::error::{VerifyError, VerifyResult};

/// An immutable lifecycle fact emitted by the operator about an object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LifecycleEvent {
    /// A short causal tag, like `Cordon`, `Drain`, `Reboot` or `Uncordon`.
    pub reason: String,
    pub timestamp: DateTime<Utc>,
    /// The name of the object the event is about.
    pub involved_object: String,
}

impl LifecycleEvent {
    /// Create a new instance.
    pub fn new(reason: impl Into<String>, timestamp: DateTime<Utc>, involved_object: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            timestamp,
            involved_object: involved_object.into(),
        }
    }

    /// Convert a K8s event object.
    ///
    /// The event's creation timestamp is used. Older event sources which do not set it fall back
    /// to `firstTimestamp` and then `eventTime`.
    pub fn from_event(event: &Event) -> VerifyResult<Self> {
        let object = || format!("event/{}", event.metadata.name.as_deref().unwrap_or_default());
        let timestamp = event
            .metadata
            .creation_timestamp
            .as_ref()
            .map(|ts| ts.0)
            .or_else(|| event.first_timestamp.as_ref().map(|ts| ts.0))
            .or_else(|| event.event_time.as_ref().map(|ts| ts.0))
            .ok_or_else(|| VerifyError::InvalidField {
                object: object(),
                field: "metadata.creationTimestamp".into(),
                reason: "event carries no timestamp".into(),
            })?;
        let reason = event.reason.clone().ok_or_else(|| VerifyError::InvalidField {
            object: object(),
            field: "reason".into(),
            reason: "field is not set".into(),
        })?;
        Ok(Self {
            reason,
            timestamp,
            involved_object: event.involved_object.name.clone().unwrap_or_default(),
        })
    }
}

/// The first requirement of a sequence which no event satisfied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SequenceMismatch {
    /// The position of the unmatched reason in the required sequence.
    pub position: usize,
    /// The unmatched reason.
    pub reason: String,
    /// The timestamp of the previous match, if any, which the missing event must not precede.
    pub not_before: Option<DateTime<Utc>>,
}

impl std::fmt::Display for SequenceMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.not_before {
            Some(ts) => write!(f, "no {:?} event (requirement #{}) at or after {}", self.reason, self.position, ts.to_rfc3339()),
            None => write!(f, "no {:?} event (requirement #{})", self.reason, self.position),
        }
    }
}

/// Verify that the required reasons occurred in non-decreasing timestamp order.
///
/// Each requirement is matched by the earliest event with that reason which sorts after the
/// previous match. Because the sort is stable, events sharing a timestamp keep the order in which
/// they were given, and consecutive requirements may be satisfied within the same second.
pub fn verify_event_sequence<R: AsRef<str>>(events: &[LifecycleEvent], required: &[R]) -> Result<(), SequenceMismatch> {
    let mut sorted: Vec<&LifecycleEvent> = events.iter().collect();
    sorted.sort_by_key(|event| event.timestamp);

    let (mut next, mut cursor): (usize, Option<DateTime<Utc>>) = (0, None);
    for (position, reason) in required.iter().enumerate() {
        let reason: &str = reason.as_ref();
        let found = sorted[next..]
            .iter()
            .position(|event| event.reason == reason && cursor.map(|ts| event.timestamp >= ts).unwrap_or(true));
        match found {
            Some(offset) => {
                cursor = Some(sorted[next + offset].timestamp);
                next += offset + 1;
            }
            None => {
                return Err(SequenceMismatch {
                    position,
                    reason: reason.to_string(),
                    not_before: cursor,
                })
            }
        }
    }
    Ok(())
}

/// Check that the required reasons occurred in non-decreasing timestamp order.
pub fn match_event_sequence<R: AsRef<str>>(events: &[LifecycleEvent], required: &[R]) -> bool {
    verify_event_sequence(events, required).is_ok()
}
