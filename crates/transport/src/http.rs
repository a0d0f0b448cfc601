//! HTTP speech transport
//!
//! `POST {"text": ...}` to the speech service. Every failure is classified
//! into a `TransportOutcome`; nothing here returns an error to the relay.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use speech_relay_config::constants::limits;
use speech_relay_config::TransportConfig;
use speech_relay_core::{SpeechTransport, StatusInfo, TransportOutcome};
use tracing::{debug, warn};
use url::Url;

use crate::TransportError;

#[derive(Debug, Serialize)]
struct SpeakRequest<'a> {
    text: &'a str,
}

/// Sends payloads to one speech endpoint
#[derive(Debug, Clone)]
pub struct HttpSpeechTransport {
    client: Client,
    endpoint: Url,
}

impl HttpSpeechTransport {
    pub fn new(endpoint: Url, config: &TransportConfig) -> Result<Self, TransportError> {
        let client = build_client(config, config.request_timeout())?;
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

pub(crate) fn build_client(
    config: &TransportConfig,
    timeout: std::time::Duration,
) -> Result<Client, TransportError> {
    Client::builder()
        .timeout(timeout)
        .danger_accept_invalid_certs(config.accept_invalid_certs)
        .build()
        .map_err(TransportError::from)
}

#[async_trait]
impl SpeechTransport for HttpSpeechTransport {
    async fn send(&self, text: &str) -> TransportOutcome {
        debug!(endpoint = %self.endpoint, chars = text.chars().count(), "POST speak request");

        let response = match self
            .client
            .post(self.endpoint.clone())
            .json(&SpeakRequest { text })
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                warn!(endpoint = %self.endpoint, "Speak request timed out");
                return TransportOutcome::TimedOut;
            }
            Err(e) => {
                warn!(endpoint = %self.endpoint, error = %e, "Speak request failed");
                return TransportOutcome::Unreachable(e.to_string());
            }
        };

        let status = response.status();
        let mut info = StatusInfo::new(status.as_u16());
        if let Ok(body) = response.text().await {
            let body = truncate(body.trim(), limits::STATUS_BODY_BYTES);
            if !body.is_empty() {
                info = info.with_body(body);
            }
        }

        if status.is_success() {
            TransportOutcome::Delivered(info)
        } else {
            warn!(
                endpoint = %self.endpoint,
                status = status.as_u16(),
                body = info.body.as_deref().unwrap_or(""),
                "Speech service rejected payload"
            );
            TransportOutcome::Rejected(info)
        }
    }
}

/// Cut `s` to at most `max` bytes on a char boundary.
fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
