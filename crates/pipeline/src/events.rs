//! Relay events
//!
//! Published on a broadcast channel by `RelaySession` so callers and tests
//! can follow what the relay decided without reading its internals.

use serde::Serialize;
use speech_relay_core::{RegionId, Ticket, TransportOutcome};

use crate::gate::SkipReason;
use crate::relay::Settlement;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayEvent {
    /// A new region superseded the previous stream
    Reset { region: RegionId, epoch: u64 },
    /// Debounce timer (re-)armed
    Armed { generation: u64, delay_ms: u64 },
    /// Debounce deadline elapsed
    Fired,
    /// Fire produced no dispatch
    Skipped { reason: SkipReason },
    /// Payload handed to the transport
    Sent {
        ticket: Ticket,
        region: RegionId,
        payload: String,
    },
    /// Transport reported back
    Outcome {
        ticket: Ticket,
        outcome: TransportOutcome,
        settlement: Settlement,
    },
    /// Notification named a region whose text could not be read
    Stale { region: RegionId },
}

impl RelayEvent {
    pub fn is_sent(&self) -> bool {
        matches!(self, RelayEvent::Sent { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use speech_relay_core::StatusInfo;

    #[test]
    fn test_event_serialization() {
        let event = RelayEvent::Skipped {
            reason: SkipReason::Hidden,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "skipped");
        assert_eq!(json["reason"], "hidden");

        let event = RelayEvent::Outcome {
            ticket: Ticket { epoch: 1, seq: 2 },
            outcome: TransportOutcome::Delivered(StatusInfo::new(200)),
            settlement: Settlement::Advanced { watermark: 5 },
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "outcome");
        assert_eq!(json["outcome"]["kind"], "delivered");
        assert_eq!(json["settlement"]["watermark"], 5);
    }
}
