//! Observation and verification of machine config pool rollouts.
//!
//! The engine polls a cluster through an `ObjectAccessor` and checks the safety invariants of an
//! in-progress rollout: nodes update in the expected order, no more than `maxUnavailable` at a
//! time, the pool never reports degraded machines while it is expected to be healthy, and drift
//! introduced behind the operator's back is detected with the exact cause.

pub mod accessor;
pub mod config;
#[cfg(test)]
mod config_test;
pub mod drift;
#[cfg(test)]
mod fixtures;
pub mod observer;
#[cfg(test)]
mod observer_test;
pub mod poll;
pub mod pool;

pub use accessor::{KubeAccessor, ObjectAccessor};
pub use config::Config;
pub use drift::{DriftValidator, NodeAction};
pub use observer::{Progress, RolloutObserver};
pub use poll::{poll, Poller, Probe};
pub use pool::{NodeHandle, Pool};
