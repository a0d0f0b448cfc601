//! Centralized defaults for the speech relay
//!
//! Single source of truth for default values used by settings, the CLI and
//! tests.

/// Speech service endpoints
pub mod endpoints {
    /// Local speech server, served over HTTPS with a self-signed certificate
    pub const SPEAK_DEFAULT: &str = "https://localhost:5002/speak";

    /// Where the HTTP text source listens for observations
    pub const SOURCE_BIND_DEFAULT: &str = "127.0.0.1:5003";
}

/// Timing (milliseconds)
pub mod timing {
    /// Quiet period after the last change before a stream counts as stable
    pub const DEBOUNCE_DELAY_MS: u64 = 1500;

    /// Transport-side request timeout
    pub const REQUEST_TIMEOUT_MS: u64 = 15_000;

    /// Timeout for the startup reachability probe
    pub const PROBE_TIMEOUT_MS: u64 = 1_000;
}

/// Relay bookkeeping limits
pub mod limits {
    /// Pending notifications buffered before further ones coalesce
    pub const NOTIFY_QUEUE: usize = 64;

    /// Relay events buffered per subscriber
    pub const EVENT_QUEUE: usize = 256;

    /// Longest response body kept in a rejected outcome (bytes)
    pub const STATUS_BODY_BYTES: usize = 512;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timing_positive() {
        assert!(timing::DEBOUNCE_DELAY_MS > 0);
        assert!(timing::PROBE_TIMEOUT_MS < timing::REQUEST_TIMEOUT_MS);
    }

    #[test]
    fn test_endpoints_parse() {
        assert!(url::Url::parse(endpoints::SPEAK_DEFAULT).is_ok());
        assert!(endpoints::SOURCE_BIND_DEFAULT
            .parse::<std::net::SocketAddr>()
            .is_ok());
    }
}
