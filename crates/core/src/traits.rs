//! External collaborator interfaces
//!
//! The relay core never touches a document or a socket directly. It pulls
//! state from a `TextSource` when notified and pushes payloads through a
//! `SpeechTransport`.

use async_trait::async_trait;

use crate::{RegionId, TransportOutcome};

/// Pull side of the text source adapter.
///
/// Notifications carry no payload; on each one the relay asks for the
/// latest region and then for that region's text.
pub trait TextSource: Send + Sync {
    /// Identity of the region rendering the latest answer, if any
    fn latest_region(&self) -> Option<RegionId>;

    /// Full text of `region`, or `None` if it is no longer the latest
    fn region_text(&self, region: &RegionId) -> Option<String>;

    /// Whether the observing context is currently visible to the user
    fn is_visible(&self) -> bool;
}

/// Delivery side: hands one payload to the speech service.
#[async_trait]
pub trait SpeechTransport: Send + Sync {
    /// Deliver `text`. Must not panic; failures are reported as outcomes.
    async fn send(&self, text: &str) -> TransportOutcome;
}
