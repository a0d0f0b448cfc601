//! Relay state machine
//!
//! `RelayCore` is the single dispatcher for every transition: observations,
//! timer fires, visibility changes and transport outcomes all enter here.
//! It has no clock and performs no I/O; it tells the caller what to do with
//! the debounce timer and what to send.

use serde::Serialize;
use speech_relay_core::{DispatchPolicy, RegionId, Ticket, TransportOutcome};
use tracing::{debug, info, warn};

use crate::gate::{DispatchGate, GateDecision, SkipReason};
use crate::stream::StreamPhase;
use crate::tracker::{ChangeTracker, Observation, TrackerDecision};

/// Instruction for the debounce scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerAction {
    /// Cancel any pending deadline and start a fresh one
    Arm,
    /// Drop the pending deadline
    Cancel,
    /// Leave the timer as it is
    Keep,
}

/// How a transport outcome was applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Settlement {
    /// Outcome belongs to a superseded stream or an unknown dispatch
    Stale,
    /// Delivery confirmed; watermark moved
    Advanced { watermark: usize },
    /// Delivery failed; watermark unchanged so the segment is resent later
    Retained,
    /// Finalize-once outcome; the region is done either way
    Terminal,
}

/// Read-only view of the active stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamSnapshot {
    pub region: RegionId,
    pub epoch: u64,
    pub policy: DispatchPolicy,
    pub phase: StreamPhase,
    pub observed_len: usize,
    pub watermark: usize,
    pub in_flight: Option<Ticket>,
    pub timer_armed: bool,
}

pub struct RelayCore {
    tracker: ChangeTracker,
    gate: DispatchGate,
    timer_armed: bool,
}

impl RelayCore {
    pub fn new(policy: DispatchPolicy) -> Self {
        Self {
            tracker: ChangeTracker::new(),
            gate: DispatchGate::new(policy),
            timer_armed: false,
        }
    }

    pub fn policy(&self) -> DispatchPolicy {
        self.gate.policy()
    }

    pub fn timer_armed(&self) -> bool {
        self.timer_armed
    }

    pub fn tracker(&self) -> &ChangeTracker {
        &self.tracker
    }

    /// Handle one observation from the text source.
    pub fn observe(&mut self, region: &RegionId, text: &str) -> Observation {
        let mut observation = self.tracker.observe(region, text);

        if observation.reset && self.timer_armed {
            self.timer_armed = false;
            observation.timer = TimerAction::Cancel;
        }

        if observation.decision == TrackerDecision::Changed {
            if let Some(stream) = self.tracker.stream_mut() {
                if matches!(
                    stream.phase(),
                    StreamPhase::Collecting | StreamPhase::Debouncing
                ) {
                    stream.transition(StreamPhase::Debouncing);
                }
            }
            self.timer_armed = true;
            observation.timer = TimerAction::Arm;
        }

        observation
    }

    /// The debounce timer fired.
    pub fn on_fire(&mut self, visible: bool) -> GateDecision {
        self.timer_armed = false;

        match self.tracker.stream_mut() {
            Some(stream) => self.gate.attempt(stream, visible),
            None => GateDecision::Skip(SkipReason::NoStream),
        }
    }

    /// Visibility of the observing context changed.
    ///
    /// Regaining visibility re-arms the timer when text is waiting, so a
    /// send suppressed while hidden is not lost if the text stops changing.
    pub fn visibility_changed(&mut self, visible: bool) -> TimerAction {
        if !visible || self.timer_armed {
            return TimerAction::Keep;
        }

        let policy = self.policy();
        let Some(stream) = self.tracker.stream_mut() else {
            return TimerAction::Keep;
        };
        if stream.phase() != StreamPhase::Collecting {
            return TimerAction::Keep;
        }

        let waiting = match policy {
            DispatchPolicy::Incremental => !stream.pending_segment().trim().is_empty(),
            DispatchPolicy::FinalizeOnce => !stream.observed().is_empty(),
        };
        if !waiting {
            return TimerAction::Keep;
        }

        debug!(region = %stream.region(), "Visible again with unsent text, re-arming");
        stream.transition(StreamPhase::Debouncing);
        self.timer_armed = true;
        TimerAction::Arm
    }

    /// Apply the outcome of the dispatch named by `ticket`.
    pub fn on_outcome(
        &mut self,
        ticket: Ticket,
        outcome: &TransportOutcome,
    ) -> (Settlement, TimerAction) {
        let policy = self.policy();
        let Some(stream) = self.tracker.stream_mut() else {
            return (Settlement::Stale, TimerAction::Keep);
        };

        if stream.epoch() != ticket.epoch {
            debug!(ticket = %ticket, epoch = stream.epoch(), "Outcome for superseded stream ignored");
            return (Settlement::Stale, TimerAction::Keep);
        }

        let delivered = outcome.is_delivered();
        if stream.settle(ticket, delivered).is_none() {
            warn!(ticket = %ticket, "Outcome for unknown dispatch ignored");
            return (Settlement::Stale, TimerAction::Keep);
        }

        if policy == DispatchPolicy::FinalizeOnce {
            if !delivered {
                warn!(
                    region = %stream.region(),
                    outcome = %outcome,
                    "Final payload not delivered; region stays finalized"
                );
            }
            return (Settlement::Terminal, TimerAction::Keep);
        }

        let settlement = if delivered {
            info!(
                region = %stream.region(),
                watermark = stream.watermark(),
                "Watermark advanced"
            );
            Settlement::Advanced {
                watermark: stream.watermark(),
            }
        } else {
            Settlement::Retained
        };

        let refire = stream.take_refire();
        let timer = if self.timer_armed {
            stream.transition(StreamPhase::Debouncing);
            TimerAction::Keep
        } else if refire {
            stream.transition(StreamPhase::Debouncing);
            self.timer_armed = true;
            TimerAction::Arm
        } else {
            stream.transition(StreamPhase::Collecting);
            TimerAction::Keep
        };

        (settlement, timer)
    }

    pub fn snapshot(&self) -> Option<StreamSnapshot> {
        self.tracker.stream().map(|stream| StreamSnapshot {
            region: stream.region().clone(),
            epoch: stream.epoch(),
            policy: self.policy(),
            phase: stream.phase(),
            observed_len: stream.observed().len(),
            watermark: stream.watermark(),
            in_flight: stream.in_flight().map(|f| f.ticket),
            timer_armed: self.timer_armed,
        })
    }
}
