//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use speech_relay_core::DispatchPolicy;

use crate::constants::{endpoints, timing};
use crate::ConfigError;

/// Environment variable prefix, e.g. `SPEECH_RELAY__RELAY__POLICY=finalize-once`
pub const ENV_PREFIX: &str = "SPEECH_RELAY";

/// Main application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Core relay behaviour
    #[serde(default)]
    pub relay: RelayConfig,

    /// HTTP transport to the speech service
    #[serde(default)]
    pub transport: TransportConfig,

    /// Where observations come from
    #[serde(default)]
    pub source: SourceConfig,

    /// Logging
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Settings {
    /// Create default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        let endpoint = self.relay.server_endpoint.trim();
        if endpoint.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "relay.server_endpoint".to_string(),
                message: "endpoint must not be empty".to_string(),
            });
        }

        let parsed = url::Url::parse(endpoint).map_err(|e| ConfigError::InvalidValue {
            field: "relay.server_endpoint".to_string(),
            message: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidValue {
                field: "relay.server_endpoint".to_string(),
                message: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }

        if self.relay.debounce_delay_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "relay.debounce_delay_ms".to_string(),
                message: "debounce delay must be a positive number of milliseconds".to_string(),
            });
        }

        if self.transport.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "transport.request_timeout_ms".to_string(),
                message: "request timeout must be positive".to_string(),
            });
        }

        if self.source.kind == SourceKind::Http && self.source.bind.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::InvalidValue {
                field: "source.bind".to_string(),
                message: format!("'{}' is not a socket address", self.source.bind),
            });
        }

        Ok(())
    }
}

/// Relay core configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Speech service URL receiving `POST {"text": ...}`
    #[serde(default = "default_server_endpoint")]
    pub server_endpoint: String,

    /// Quiet period after the last change before dispatching
    #[serde(default = "default_debounce_delay_ms")]
    pub debounce_delay_ms: u64,

    /// Dispatch policy
    #[serde(default)]
    pub policy: DispatchPolicy,
}

impl RelayConfig {
    pub fn debounce_delay(&self) -> Duration {
        Duration::from_millis(self.debounce_delay_ms)
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            server_endpoint: default_server_endpoint(),
            debounce_delay_ms: default_debounce_delay_ms(),
            policy: DispatchPolicy::default(),
        }
    }
}

/// Transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Per-request timeout, enforced by the transport only
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Accept self-signed certificates from the local speech server
    #[serde(default = "default_true")]
    pub accept_invalid_certs: bool,

    /// Fall back from https:// to http:// when the startup probe fails
    #[serde(default = "default_true")]
    pub http_fallback: bool,
}

impl TransportConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout_ms(),
            accept_invalid_certs: true,
            http_fallback: true,
        }
    }
}

/// Text source adapter selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Observations posted over HTTP by a browser userscript
    #[default]
    Http,
    /// One JSON object per line on stdin
    Stdin,
}

/// Text source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub kind: SourceKind,

    /// Listen address for the HTTP source
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Visibility assumed before the source reports any
    #[serde(default = "default_true")]
    pub start_visible: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::default(),
            bind: default_bind(),
            start_visible: true,
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit JSON log lines
    #[serde(default)]
    pub log_json: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
        }
    }
}

fn default_server_endpoint() -> String {
    endpoints::SPEAK_DEFAULT.to_string()
}

fn default_debounce_delay_ms() -> u64 {
    timing::DEBOUNCE_DELAY_MS
}

fn default_request_timeout_ms() -> u64 {
    timing::REQUEST_TIMEOUT_MS
}

fn default_bind() -> String {
    endpoints::SOURCE_BIND_DEFAULT.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

/// Load settings from files and environment
///
/// Sources, lowest precedence first:
/// 1. `config/default.{toml,yaml}` (optional)
/// 2. `config/{env}` (optional)
/// 3. `path` (required when given)
/// 4. `SPEECH_RELAY__*` environment variables
pub fn load_settings(env: Option<&str>, path: Option<&Path>) -> Result<Settings, ConfigError> {
    build_settings(env, path, None)
}

fn build_settings(
    env: Option<&str>,
    path: Option<&Path>,
    env_source: Option<HashMap<String, String>>,
) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    builder = builder.add_source(File::with_name("config/default").required(false));

    if let Some(env_name) = env {
        builder = builder.add_source(File::with_name(&format!("config/{}", env_name)).required(false));
    }

    if let Some(path) = path {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }
        builder = builder.add_source(File::from(path).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true)
            .source(env_source),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    tracing::debug!(
        endpoint = %settings.relay.server_endpoint,
        debounce_ms = settings.relay.debounce_delay_ms,
        policy = %settings.relay.policy,
        "Settings loaded"
    );

    Ok(settings)
}
