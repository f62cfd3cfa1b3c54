//! The poll primitive.
//!
//! All waiting in the engine is bounded polling: a probe is evaluated once immediately and then
//! once per interval until it reports ready, fails fatally, or the budget runs out. Transient
//! read failures are logged and count as "not yet". There is no watch stream and no backoff.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use rollout_core::{Snapshot, VerifyError, VerifyResult};

/// The outcome of a single probe evaluation.
#[derive(Clone, Debug)]
pub enum Probe {
    /// The awaited condition holds.
    Ready,
    /// The awaited condition does not hold yet; the state which was observed.
    Pending(Snapshot),
}

/// Pacing and bookkeeping for a single bounded wait.
///
/// The first call to `tick` returns immediately. Each further call sleeps for one interval, cut
/// short at the deadline so that a final attempt runs exactly when the budget ends. Once an
/// attempt has run at or past the deadline, `tick` fails with `TimeoutExceeded`, carrying the
/// last snapshot recorded via `record`.
#[derive(Debug)]
pub struct Poller {
    what: String,
    interval: Duration,
    timeout: Duration,
    started: Instant,
    attempts: u64,
    last: Option<Snapshot>,
}

impl Poller {
    /// Create a new instance. The budget starts counting immediately.
    pub fn new(what: impl Into<String>, interval: Duration, timeout: Duration) -> Self {
        Self {
            what: what.into(),
            interval,
            timeout,
            started: Instant::now(),
            attempts: 0,
            last: None,
        }
    }

    /// Wait until the next attempt may run.
    pub async fn tick(&mut self) -> VerifyResult<()> {
        if self.attempts > 0 {
            let remaining = self.timeout.saturating_sub(self.started.elapsed());
            if remaining.is_zero() {
                return Err(self.timeout_error());
            }
            tokio::time::sleep(remaining.min(self.interval)).await;
        }
        self.attempts += 1;
        Ok(())
    }

    /// Record the state observed by the latest attempt.
    pub fn record(&mut self, snapshot: Snapshot) {
        self.last = Some(snapshot);
    }

    /// Absorb the given error if it is transient, otherwise hand it back.
    pub fn absorb(&self, err: VerifyError) -> VerifyResult<()> {
        if err.is_fatal() {
            return Err(err);
        }
        tracing::warn!(error = %err, what = %self.what, attempt = self.attempts, "transient failure while polling, will retry");
        Ok(())
    }

    /// The number of attempts made so far.
    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    /// The time elapsed since this wait began.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// The error describing this wait running out of budget.
    pub fn timeout_error(&self) -> VerifyError {
        VerifyError::TimeoutExceeded {
            what: self.what.clone(),
            waited: self.started.elapsed(),
            snapshot: self.last.clone().map(Box::new),
        }
    }
}

/// Evaluate `probe` every `interval` until it is ready, fails fatally, or `timeout` elapses.
///
/// The probe runs once before any sleep, so a condition which already holds returns without
/// waiting. Transient read failures never surface from here.
pub async fn poll<F, Fut>(what: &str, interval: Duration, timeout: Duration, mut probe: F) -> VerifyResult<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = VerifyResult<Probe>>,
{
    let mut poller = Poller::new(what, interval, timeout);
    loop {
        poller.tick().await?;
        match probe().await {
            Ok(Probe::Ready) => {
                tracing::debug!(what, attempts = poller.attempts(), elapsed = ?poller.elapsed(), "condition met");
                return Ok(());
            }
            Ok(Probe::Pending(snapshot)) => poller.record(snapshot),
            Err(err) => poller.absorb(err)?,
        }
    }
}
