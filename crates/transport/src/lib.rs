//! Speech service transport
//!
//! Delivers relay payloads to the speech service over HTTP and checks at
//! startup which scheme the service actually answers on.

pub mod http;
pub mod probe;

pub use http::HttpSpeechTransport;
pub use probe::{probe, speak_test_phrase, TEST_PHRASE};

use thiserror::Error;

/// Construction and probe failures. Sending never produces one of these;
/// delivery failures are `TransportOutcome` values.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Invalid endpoint '{endpoint}': {message}")]
    InvalidEndpoint { endpoint: String, message: String },

    #[error("Failed to build HTTP client: {0}")]
    Client(String),

    #[error("Speech service unreachable at {0}")]
    Unreachable(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        TransportError::Client(err.to_string())
    }
}

impl From<TransportError> for speech_relay_core::RelayError {
    fn from(err: TransportError) -> Self {
        speech_relay_core::RelayError::Config(err.to_string())
    }
}

/// Parse and check a speech endpoint URL
pub fn parse_endpoint(endpoint: &str) -> Result<url::Url, TransportError> {
    let url = url::Url::parse(endpoint.trim()).map_err(|e| TransportError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        message: e.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(TransportError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            message: format!("unsupported scheme '{}'", other),
        }),
    }
}
