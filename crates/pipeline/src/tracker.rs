//! Change tracker
//!
//! Turns each observation (region identity + full text) into a decision:
//! reset to a new stream, record changed text, or do nothing.

use speech_relay_core::RegionId;
use tracing::{debug, info};

use crate::relay::TimerAction;
use crate::stream::Stream;

/// What an observation means for the debounce scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerDecision {
    /// Text differs from the last recorded text; the timer must re-arm
    Changed,
    /// Same text as last time; no timer action
    NoChange,
    /// Region already finalized; further changes are ignored
    Sealed,
}

/// Result of one observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    /// A new stream was started for this region
    pub reset: bool,
    pub decision: TrackerDecision,
    /// Timer instruction for the scheduler (filled in by `RelayCore`)
    pub timer: TimerAction,
}

/// Tracks the single active stream
#[derive(Default)]
pub struct ChangeTracker {
    stream: Option<Stream>,
    next_epoch: u64,
}

impl ChangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stream(&self) -> Option<&Stream> {
        self.stream.as_ref()
    }

    pub fn stream_mut(&mut self) -> Option<&mut Stream> {
        self.stream.as_mut()
    }

    /// Record the latest text for `region`.
    ///
    /// Any region identity change is an authoritative reset, however
    /// similar the texts are. A region seen before starts over from an
    /// empty baseline under a new epoch.
    pub fn observe(&mut self, region: &RegionId, text: &str) -> Observation {
        let (stream, reset) = match self.stream.take() {
            Some(current) if current.region() == region => (self.stream.insert(current), false),
            previous => {
                if let Some(previous) = previous {
                    info!(
                        from = %previous.region(),
                        to = %region,
                        "New answer region, resetting stream"
                    );
                } else {
                    info!(region = %region, "First answer region observed");
                }
                self.next_epoch += 1;
                (
                    self.stream.insert(Stream::new(region.clone(), self.next_epoch)),
                    true,
                )
            }
        };

        if stream.is_finalized() {
            return Observation {
                reset,
                decision: TrackerDecision::Sealed,
                timer: TimerAction::Keep,
            };
        }

        let text = text.trim();
        if stream.observed() == text {
            return Observation {
                reset,
                decision: TrackerDecision::NoChange,
                timer: TimerAction::Keep,
            };
        }

        debug!(
            region = %region,
            bytes = text.len(),
            "Observed text changed"
        );
        stream.record(text.to_string());

        Observation {
            reset,
            decision: TrackerDecision::Changed,
            timer: TimerAction::Keep,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(id: &str) -> RegionId {
        RegionId::new(id)
    }

    #[test]
    fn test_first_observation_resets() {
        let mut tracker = ChangeTracker::new();
        let obs = tracker.observe(&region("a"), "Hello");
        assert!(obs.reset);
        assert_eq!(obs.decision, TrackerDecision::Changed);
        assert_eq!(tracker.stream().unwrap().epoch(), 1);
    }

    #[test]
    fn test_unchanged_text_is_no_change() {
        let mut tracker = ChangeTracker::new();
        tracker.observe(&region("a"), "Hello");

        for _ in 0..5 {
            let obs = tracker.observe(&region("a"), "Hello");
            assert!(!obs.reset);
            assert_eq!(obs.decision, TrackerDecision::NoChange);
        }
    }

    #[test]
    fn test_surrounding_whitespace_ignored() {
        let mut tracker = ChangeTracker::new();
        tracker.observe(&region("a"), "Hello");
        let obs = tracker.observe(&region("a"), "  Hello\n");
        assert_eq!(obs.decision, TrackerDecision::NoChange);
    }

    #[test]
    fn test_new_region_starts_from_empty() {
        let mut tracker = ChangeTracker::new();
        tracker.observe(&region("a"), "Hello world");

        // same text, different identity: still a reset
        let obs = tracker.observe(&region("b"), "Hello world");
        assert!(obs.reset);
        assert_eq!(obs.decision, TrackerDecision::Changed);

        let stream = tracker.stream().unwrap();
        assert_eq!(stream.region(), &region("b"));
        assert_eq!(stream.epoch(), 2);
        assert_eq!(stream.watermark(), 0);
        assert_eq!(stream.observed(), "Hello world");
    }

    #[test]
    fn test_new_empty_region_is_reset_without_change() {
        let mut tracker = ChangeTracker::new();
        tracker.observe(&region("a"), "Hello");
        let obs = tracker.observe(&region("b"), "   ");
        assert!(obs.reset);
        assert_eq!(obs.decision, TrackerDecision::NoChange);
    }

    #[test]
    fn test_returning_region_resets() {
        let mut tracker = ChangeTracker::new();
        tracker.observe(&region("a"), "first");
        tracker.observe(&region("b"), "second");

        // newest turn removed: "a" is the latest again
        let obs = tracker.observe(&region("a"), "first, more");
        assert!(obs.reset);
        assert_eq!(obs.decision, TrackerDecision::Changed);

        let stream = tracker.stream().unwrap();
        assert_eq!(stream.region(), &region("a"));
        assert_eq!(stream.epoch(), 3);
        assert_eq!(stream.watermark(), 0);
        assert_eq!(stream.observed(), "first, more");
    }

    #[test]
    fn test_finalized_region_is_sealed() {
        let mut tracker = ChangeTracker::new();
        tracker.observe(&region("a"), "Done.");
        let stream = tracker.stream_mut().unwrap();
        stream.transition(crate::StreamPhase::Debouncing);
        stream.transition(crate::StreamPhase::Finalized);

        let obs = tracker.observe(&region("a"), "Done. And more");
        assert_eq!(obs.decision, TrackerDecision::Sealed);
        assert_eq!(tracker.stream().unwrap().observed(), "Done.");
    }
}
