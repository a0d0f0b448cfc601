//! Transport outcome classification

use serde::{Deserialize, Serialize};
use std::fmt;

/// HTTP-level details reported by the speech service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusInfo {
    /// Response status code
    pub code: u16,
    /// Response body, if one was read
    pub body: Option<String>,
}

impl StatusInfo {
    pub fn new(code: u16) -> Self {
        Self { code, body: None }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// Result of handing one payload to the speech service.
///
/// Sending never raises: every failure mode is one of these values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum TransportOutcome {
    /// 2xx response
    Delivered(StatusInfo),
    /// Service answered with a non-2xx status
    Rejected(StatusInfo),
    /// Connection could not be established or broke off
    Unreachable(String),
    /// Transport-side timeout elapsed
    TimedOut,
}

impl TransportOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, TransportOutcome::Delivered(_))
    }

    /// Status code, when the service answered at all
    pub fn status_code(&self) -> Option<u16> {
        match self {
            TransportOutcome::Delivered(info) | TransportOutcome::Rejected(info) => {
                Some(info.code)
            }
            _ => None,
        }
    }
}

impl fmt::Display for TransportOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportOutcome::Delivered(info) => write!(f, "delivered ({})", info.code),
            TransportOutcome::Rejected(info) => write!(f, "rejected ({})", info.code),
            TransportOutcome::Unreachable(reason) => write!(f, "unreachable: {}", reason),
            TransportOutcome::TimedOut => f.write_str("timed out"),
        }
    }
}
