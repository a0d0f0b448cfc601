//! Error types for the speech relay

use thiserror::Error;

use crate::{RegionId, TransportOutcome};

/// Relay error taxonomy.
///
/// None of these is fatal to the observation loop. The first four are
/// carried as values and logged; only `Config` is returned from
/// constructors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    #[error("No answer region found")]
    NoRegionFound,

    #[error("Stale notification for region {region}")]
    StaleNotification { region: RegionId },

    #[error("Nothing to send after trimming")]
    EmptyPayload,

    #[error("Transport failure: {0}")]
    TransportFailure(TransportOutcome),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl RelayError {
    /// Whether the error is retried on a later cycle under the incremental policy
    pub fn is_transient(&self) -> bool {
        !matches!(self, RelayError::Config(_))
    }
}
