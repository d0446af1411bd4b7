//! Jittered, cancellable timer for the decision loop.
//!
//! The ticker is owned by the supervisor. It is either disarmed (waiting
//! never completes) or armed with a single deadline. Every [`JitterTicker::arm`]
//! draws a fresh delay, so agents started together drift apart.

use rand::Rng;
use std::time::Duration;
use tokio::time::Instant;

/// A random duration in `min..=max`. Swapped bounds are tolerated.
pub fn jitter(min: Duration, max: Duration) -> Duration {
    let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
    if lo == hi {
        return lo;
    }
    let lo_ms = u64::try_from(lo.as_millis()).unwrap_or(u64::MAX);
    let hi_ms = u64::try_from(hi.as_millis()).unwrap_or(u64::MAX);
    Duration::from_millis(rand::rng().random_range(lo_ms..=hi_ms))
}

#[derive(Debug)]
pub struct JitterTicker {
    min: Duration,
    max: Duration,
    deadline: Option<Instant>,
}

impl JitterTicker {
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min,
            max,
            deadline: None,
        }
    }

    /// A fresh delay within the window.
    pub fn next_delay(&self) -> Duration {
        jitter(self.min, self.max)
    }

    /// Arm with a freshly randomized delay.
    pub fn arm(&mut self) -> Duration {
        let delay = self.next_delay();
        self.arm_after(delay);
        delay
    }

    /// Arm with an explicit delay, replacing any pending deadline.
    pub fn arm_after(&mut self, delay: Duration) {
        self.deadline = Some(Instant::now() + delay);
    }

    /// Cancel the pending deadline, if any.
    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Resolve when the deadline passes. Pending forever while disarmed.
    ///
    /// Cancel-safe: dropping the future keeps the deadline.
    pub async fn wait(&mut self) {
        match self.deadline {
            Some(deadline) => {
                tokio::time::sleep_until(deadline).await;
                self.deadline = None;
            }
            None => std::future::pending::<()>().await,
        }
    }
}
