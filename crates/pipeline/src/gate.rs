//! Dispatch gate
//!
//! Runs when the debounce timer fires. Everything is re-checked against
//! the stream as it is now, never as it was when the timer was armed.

use serde::Serialize;
use speech_relay_core::{DispatchPolicy, RegionId, Ticket};
use tracing::{debug, info, warn};

use crate::stream::{Stream, StreamPhase};

/// Why a fire did not produce a dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// No region has been observed yet
    NoStream,
    /// Observing context not visible; state left untouched for the next fire
    Hidden,
    /// Region already finalized
    Finalized,
    /// Previous segment still with the transport; re-armed when it settles
    InFlight,
    /// Text at fire time still differs from the last observation
    Unsettled,
    /// Everything observed has already been confirmed
    NothingNew,
    /// New text is whitespace only
    EmptyPayload,
}

/// A claimed segment, ready for the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub ticket: Ticket,
    pub region: RegionId,
    /// Exact text cut from the stream, used for watermark accounting
    pub segment: String,
    /// Observed length at dispatch time
    pub captured_len: usize,
}

impl Dispatch {
    /// What goes on the wire
    pub fn payload(&self) -> &str {
        self.segment.trim()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Skip(SkipReason),
    Send(Dispatch),
}

/// Applies the dispatch policy at fire time
#[derive(Debug, Clone, Copy)]
pub struct DispatchGate {
    policy: DispatchPolicy,
}

impl DispatchGate {
    pub fn new(policy: DispatchPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> DispatchPolicy {
        self.policy
    }

    /// Decide whether `stream` is sent now, claiming the segment if so.
    ///
    /// Under finalize-once the finalized mark is set here, before the
    /// transport is called, so a notification arriving during the request
    /// can never cause a second send.
    pub fn attempt(&self, stream: &mut Stream, visible: bool) -> GateDecision {
        if stream.is_finalized() {
            return GateDecision::Skip(SkipReason::Finalized);
        }

        if stream.in_flight().is_some() {
            debug!(region = %stream.region(), "Fire while dispatch in flight, deferring");
            stream.mark_refire();
            return GateDecision::Skip(SkipReason::InFlight);
        }

        if !visible {
            warn!(region = %stream.region(), "Context not visible, send suppressed");
            return Self::skip(stream, SkipReason::Hidden);
        }

        match self.policy {
            DispatchPolicy::Incremental => self.attempt_incremental(stream),
            DispatchPolicy::FinalizeOnce => self.attempt_finalize(stream),
        }
    }

    fn attempt_incremental(&self, stream: &mut Stream) -> GateDecision {
        let segment = stream.pending_segment();
        if segment.is_empty() {
            debug!(region = %stream.region(), "Observed text identical to confirmed text");
            return Self::skip(stream, SkipReason::NothingNew);
        }
        if segment.trim().is_empty() {
            debug!(region = %stream.region(), "Whitespace-only segment ignored");
            return Self::skip(stream, SkipReason::EmptyPayload);
        }

        let segment = segment.to_string();
        if !stream.transition(StreamPhase::Dispatching) {
            return GateDecision::Skip(SkipReason::NothingNew);
        }
        let ticket = stream.begin_dispatch();

        GateDecision::Send(Dispatch {
            ticket,
            region: stream.region().clone(),
            segment,
            captured_len: stream.observed().len(),
        })
    }

    fn attempt_finalize(&self, stream: &mut Stream) -> GateDecision {
        if stream.observed().trim().is_empty() {
            return Self::skip(stream, SkipReason::EmptyPayload);
        }

        if !stream.transition(StreamPhase::Finalized) {
            return GateDecision::Skip(SkipReason::Finalized);
        }
        info!(region = %stream.region(), "Stream finalized");
        let ticket = stream.begin_dispatch();

        GateDecision::Send(Dispatch {
            ticket,
            region: stream.region().clone(),
            segment: stream.observed().to_string(),
            captured_len: stream.observed().len(),
        })
    }

    fn skip(stream: &mut Stream, reason: SkipReason) -> GateDecision {
        stream.transition(StreamPhase::Collecting);
        GateDecision::Skip(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn debouncing(text: &str) -> Stream {
        let mut stream = Stream::new(RegionId::new("turn"), 1);
        stream.record(text.to_string());
        stream.transition(StreamPhase::Debouncing);
        stream
    }

    #[test]
    fn test_incremental_sends_pending_segment() {
        let gate = DispatchGate::new(DispatchPolicy::Incremental);
        let mut stream = debouncing("Hello");

        match gate.attempt(&mut stream, true) {
            GateDecision::Send(dispatch) => {
                assert_eq!(dispatch.segment, "Hello");
                assert_eq!(dispatch.captured_len, 5);
                assert_eq!(dispatch.ticket, Ticket { epoch: 1, seq: 1 });
            }
            other => panic!("expected send, got {:?}", other),
        }
        assert_eq!(stream.phase(), StreamPhase::Dispatching);
    }

    #[test]
    fn test_payload_is_trimmed_segment() {
        let dispatch = Dispatch {
            ticket: Ticket { epoch: 1, seq: 2 },
            region: RegionId::new("turn"),
            segment: " world!".to_string(),
            captured_len: 12,
        };
        assert_eq!(dispatch.payload(), "world!");
    }

    #[test]
    fn test_hidden_leaves_state_untouched() {
        let gate = DispatchGate::new(DispatchPolicy::Incremental);
        let mut stream = debouncing("Hello");

        assert_eq!(
            gate.attempt(&mut stream, false),
            GateDecision::Skip(SkipReason::Hidden)
        );
        assert_eq!(stream.watermark(), 0);
        assert!(stream.in_flight().is_none());
        assert_eq!(stream.phase(), StreamPhase::Collecting);
    }

    #[test]
    fn test_whitespace_segment_skipped() {
        let gate = DispatchGate::new(DispatchPolicy::Incremental);
        let mut stream = debouncing("Hello");
        let ticket = stream.begin_dispatch();
        stream.settle(ticket, true);

        // trimmed observations never end in whitespace, so force one in
        stream.record("Hello \n".to_string());
        stream.transition(StreamPhase::Collecting);
        stream.transition(StreamPhase::Debouncing);

        assert_eq!(
            gate.attempt(&mut stream, true),
            GateDecision::Skip(SkipReason::EmptyPayload)
        );
        assert!(stream.in_flight().is_none());
    }

    #[test]
    fn test_fire_during_flight_defers() {
        let gate = DispatchGate::new(DispatchPolicy::Incremental);
        let mut stream = debouncing("Hello");
        assert!(matches!(gate.attempt(&mut stream, true), GateDecision::Send(_)));

        assert_eq!(
            gate.attempt(&mut stream, true),
            GateDecision::Skip(SkipReason::InFlight)
        );
        assert!(stream.take_refire());
    }

    #[test]
    fn test_finalize_marks_before_send() {
        let gate = DispatchGate::new(DispatchPolicy::FinalizeOnce);
        let mut stream = debouncing("Done.");

        match gate.attempt(&mut stream, true) {
            GateDecision::Send(dispatch) => assert_eq!(dispatch.payload(), "Done."),
            other => panic!("expected send, got {:?}", other),
        }
        assert!(stream.is_finalized());
    }

    #[test]
    fn test_finalize_empty_text_not_claimed() {
        let gate = DispatchGate::new(DispatchPolicy::FinalizeOnce);
        let mut stream = debouncing("");

        assert_eq!(
            gate.attempt(&mut stream, true),
            GateDecision::Skip(SkipReason::EmptyPayload)
        );
        assert!(!stream.is_finalized());
    }
}
