//! Startup reachability probe and connection test

use std::time::Duration;

use speech_relay_config::constants::timing;
use speech_relay_config::TransportConfig;
use speech_relay_core::{SpeechTransport, TransportOutcome};
use tracing::{debug, info, warn};
use url::Url;

use crate::http::build_client;
use crate::TransportError;

/// Phrase spoken by the connection test
pub const TEST_PHRASE: &str = "Test: the speech server is reachable.";

/// Find the URL the speech service answers on.
///
/// Any HTTP status counts as reachable. An `https` endpoint that cannot be
/// reached is retried over plain `http` when `config.http_fallback` is set,
/// since the local service may run without its certificate.
pub async fn probe(endpoint: &Url, config: &TransportConfig) -> Result<Url, TransportError> {
    let client = build_client(config, Duration::from_millis(timing::PROBE_TIMEOUT_MS))?;

    let mut candidates = vec![endpoint.clone()];
    if endpoint.scheme() == "https" && config.http_fallback {
        let mut plain = endpoint.clone();
        if plain.set_scheme("http").is_ok() {
            candidates.push(plain);
        }
    }

    for candidate in candidates {
        match client.head(candidate.clone()).send().await {
            Ok(response) => {
                info!(
                    endpoint = %candidate,
                    status = response.status().as_u16(),
                    "Speech service reachable"
                );
                return Ok(candidate);
            }
            Err(e) => {
                debug!(endpoint = %candidate, error = %e, "Probe failed");
            }
        }
    }

    warn!(endpoint = %endpoint, "Speech service not reachable");
    Err(TransportError::Unreachable(endpoint.to_string()))
}

/// Send the fixed test phrase once and report what happened
pub async fn speak_test_phrase(transport: &dyn SpeechTransport) -> TransportOutcome {
    let outcome = transport.send(TEST_PHRASE).await;
    if outcome.is_delivered() {
        info!(outcome = %outcome, "Test phrase delivered");
    } else {
        warn!(outcome = %outcome, "Test phrase not delivered");
    }
    outcome
}
