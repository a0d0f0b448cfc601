//! Stream record and phase machine
//!
//! One `Stream` exists per observed answer region. It is superseded, never
//! mutated back, when a new region identity appears.

use serde::Serialize;
use speech_relay_core::{RegionId, Ticket};
use tracing::warn;

/// Lifecycle phase of a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamPhase {
    /// Text observed, no timer pending
    Collecting,
    /// Waiting for the quiet period to elapse
    Debouncing,
    /// A segment is with the transport (incremental only)
    Dispatching,
    /// Payload claimed; no further sends (finalize-once only)
    Finalized,
}

impl StreamPhase {
    /// Transition table. Every phase change goes through here.
    pub fn can_transition_to(self, next: StreamPhase) -> bool {
        use StreamPhase::*;

        matches!(
            (self, next),
            (Collecting, Debouncing)
                | (Debouncing, Debouncing)
                | (Debouncing, Collecting)
                | (Debouncing, Dispatching)
                | (Debouncing, Finalized)
                | (Dispatching, Collecting)
                | (Dispatching, Debouncing)
        )
    }
}

/// A dispatch that has not reported back yet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InFlight {
    pub ticket: Ticket,
    /// Length of the observed text when the segment was cut
    pub captured_len: usize,
}

/// State of the one active answer region
#[derive(Debug, Clone)]
pub struct Stream {
    region: RegionId,
    epoch: u64,
    /// Full, trimmed text currently visible for the region
    observed: String,
    /// Byte length of the prefix confirmed delivered; always a char boundary
    watermark: usize,
    phase: StreamPhase,
    in_flight: Option<InFlight>,
    /// A fire was swallowed while a dispatch was in flight
    refire_pending: bool,
    next_seq: u64,
}

impl Stream {
    pub fn new(region: RegionId, epoch: u64) -> Self {
        Self {
            region,
            epoch,
            observed: String::new(),
            watermark: 0,
            phase: StreamPhase::Collecting,
            in_flight: None,
            refire_pending: false,
            next_seq: 0,
        }
    }

    pub fn region(&self) -> &RegionId {
        &self.region
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn observed(&self) -> &str {
        &self.observed
    }

    pub fn watermark(&self) -> usize {
        self.watermark
    }

    pub fn phase(&self) -> StreamPhase {
        self.phase
    }

    pub fn in_flight(&self) -> Option<InFlight> {
        self.in_flight
    }

    pub fn is_finalized(&self) -> bool {
        self.phase == StreamPhase::Finalized
    }

    /// Text after the confirmed watermark
    pub fn pending_segment(&self) -> &str {
        &self.observed[self.watermark..]
    }

    /// Replace the observed text.
    ///
    /// If the new text no longer extends the confirmed prefix the watermark
    /// is pulled back to the longest common prefix, so the rewritten part is
    /// sent again rather than skipped.
    pub fn record(&mut self, text: String) {
        let confirmed = &self.observed[..self.watermark];
        if !text.starts_with(confirmed) {
            let common = common_prefix_len(confirmed, &text);
            warn!(
                region = %self.region,
                watermark = self.watermark,
                common,
                "Observed text diverged from confirmed prefix, rewinding watermark"
            );
            self.watermark = common;
        }

        if let Some(flight) = self.in_flight.as_mut() {
            if !text.starts_with(&self.observed[..flight.captured_len]) {
                flight.captured_len =
                    common_prefix_len(&self.observed[..flight.captured_len], &text);
            }
        }

        self.observed = text;
    }

    /// Move to `next` if the transition table allows it.
    pub fn transition(&mut self, next: StreamPhase) -> bool {
        if !self.phase.can_transition_to(next) {
            warn!(
                region = %self.region,
                from = ?self.phase,
                to = ?next,
                "Rejected illegal stream transition"
            );
            return false;
        }
        self.phase = next;
        true
    }

    /// Claim the current text for a dispatch and hand out its ticket.
    pub fn begin_dispatch(&mut self) -> Ticket {
        self.next_seq += 1;
        let ticket = Ticket {
            epoch: self.epoch,
            seq: self.next_seq,
        };
        self.in_flight = Some(InFlight {
            ticket,
            captured_len: self.observed.len(),
        });
        ticket
    }

    /// Close the in-flight dispatch named by `ticket`.
    ///
    /// On delivery the watermark moves to the length captured at dispatch
    /// time; growth since then stays pending. Returns `None` if `ticket`
    /// is not the one in flight.
    pub fn settle(&mut self, ticket: Ticket, delivered: bool) -> Option<InFlight> {
        match self.in_flight {
            Some(flight) if flight.ticket == ticket => {
                self.in_flight = None;
                if delivered {
                    self.watermark = self.watermark.max(flight.captured_len);
                }
                Some(flight)
            }
            _ => None,
        }
    }

    pub fn mark_refire(&mut self) {
        self.refire_pending = true;
    }

    pub fn take_refire(&mut self) -> bool {
        std::mem::take(&mut self.refire_pending)
    }
}

/// Longest common prefix of `a` and `b`, in bytes, on a char boundary.
fn common_prefix_len(a: &str, b: &str) -> usize {
    a.char_indices()
        .zip(b.chars())
        .find(|((_, ca), cb)| ca != cb)
        .map(|((idx, _), _)| idx)
        .unwrap_or_else(|| a.len().min(b.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream() -> Stream {
        Stream::new(RegionId::new("turn-1"), 1)
    }

    #[test]
    fn test_transition_table() {
        use StreamPhase::*;

        assert!(Collecting.can_transition_to(Debouncing));
        assert!(Debouncing.can_transition_to(Dispatching));
        assert!(Dispatching.can_transition_to(Collecting));
        assert!(Debouncing.can_transition_to(Finalized));

        assert!(!Collecting.can_transition_to(Dispatching));
        assert!(!Finalized.can_transition_to(Debouncing));
        assert!(!Finalized.can_transition_to(Collecting));
        assert!(!Dispatching.can_transition_to(Finalized));
    }

    #[test]
    fn test_illegal_transition_keeps_phase() {
        let mut s = stream();
        assert!(!s.transition(StreamPhase::Dispatching));
        assert_eq!(s.phase(), StreamPhase::Collecting);
    }

    #[test]
    fn test_watermark_uses_captured_length() {
        let mut s = stream();
        s.record("Hello".to_string());
        let ticket = s.begin_dispatch();

        // growth while the dispatch is in flight
        s.record("Hello world".to_string());

        let flight = s.settle(ticket, true).unwrap();
        assert_eq!(flight.captured_len, 5);
        assert_eq!(s.watermark(), 5);
        assert_eq!(s.pending_segment(), " world");
    }

    #[test]
    fn test_failed_settle_keeps_watermark() {
        let mut s = stream();
        s.record("Hello".to_string());
        let ticket = s.begin_dispatch();
        assert!(s.settle(ticket, false).is_some());
        assert_eq!(s.watermark(), 0);
        assert_eq!(s.pending_segment(), "Hello");
    }

    #[test]
    fn test_unknown_ticket_ignored() {
        let mut s = stream();
        s.record("Hello".to_string());
        let _ticket = s.begin_dispatch();
        let bogus = Ticket { epoch: 1, seq: 99 };
        assert!(s.settle(bogus, true).is_none());
        assert!(s.in_flight().is_some());
    }

    #[test]
    fn test_divergence_rewinds_to_char_boundary() {
        let mut s = stream();
        s.record("Grüße aus Köln".to_string());
        let ticket = s.begin_dispatch();
        s.settle(ticket, true);
        assert_eq!(s.watermark(), "Grüße aus Köln".len());

        // re-rendered in place: shares "Grüße aus K" only
        s.record("Grüße aus Kiel".to_string());
        assert_eq!(s.watermark(), "Grüße aus K".len());
        assert_eq!(s.pending_segment(), "iel");
    }

    #[test]
    fn test_common_prefix_multibyte() {
        assert_eq!(common_prefix_len("äb", "äc"), "ä".len());
        assert_eq!(common_prefix_len("ä", "ö"), 0);
        assert_eq!(common_prefix_len("abc", "ab"), 2);
        assert_eq!(common_prefix_len("", "abc"), 0);
    }

    #[test]
    fn test_refire_flag_is_taken_once() {
        let mut s = stream();
        s.mark_refire();
        assert!(s.take_refire());
        assert!(!s.take_refire());
    }
}
