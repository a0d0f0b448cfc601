//! Debounce scheduler
//!
//! Owns the single outstanding timer. Arming replaces any previous deadline
//! with a fresh full delay, so the timer fires only after a quiet period
//! following the *last* change. The superseded deadline is dropped, never
//! polled again, so a stale fire cannot happen.

use std::future::pending;
use std::pin::Pin;
use std::time::Duration;

use tokio::time::{sleep, Instant, Sleep};
use tracing::trace;

pub struct DebounceTimer {
    delay: Duration,
    sleep: Option<Pin<Box<Sleep>>>,
    generation: u64,
}

impl DebounceTimer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            sleep: None,
            generation: 0,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Number of times the timer has been armed
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_armed(&self) -> bool {
        self.sleep.is_some()
    }

    /// Deadline of the live timer, if any
    pub fn deadline(&self) -> Option<Instant> {
        self.sleep.as_ref().map(|s| s.deadline())
    }

    /// Cancel any pending deadline and start a new full delay.
    pub fn arm(&mut self) -> u64 {
        self.generation += 1;
        self.sleep = Some(Box::pin(sleep(self.delay)));
        trace!(generation = self.generation, delay_ms = self.delay.as_millis() as u64, "Debounce armed");
        self.generation
    }

    /// Drop the pending deadline. Returns whether one was live.
    pub fn cancel(&mut self) -> bool {
        let was_armed = self.sleep.take().is_some();
        if was_armed {
            trace!(generation = self.generation, "Debounce cancelled");
        }
        was_armed
    }

    /// Resolves when the live deadline passes; pends forever while disarmed.
    ///
    /// Cancellation safe: dropping the future before it resolves leaves the
    /// deadline in place.
    pub async fn fired(&mut self) {
        match self.sleep.as_mut() {
            Some(sleep) => {
                sleep.as_mut().await;
                self.sleep = None;
            }
            None => pending::<()>().await,
        }
    }
}
