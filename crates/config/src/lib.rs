//! Configuration management for the speech relay
//!
//! Supports loading configuration from:
//! - TOML/YAML files (`config/default`, `config/{env}`, or an explicit path)
//! - Environment variables (`SPEECH_RELAY__` prefix, `__` separator)
//!
//! Everything is fixed at startup; there is no runtime reconfiguration.

pub mod constants;
pub mod settings;

pub use settings::{
    load_settings, ObservabilityConfig, RelayConfig, Settings, SourceConfig, SourceKind,
    TransportConfig,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

impl From<ConfigError> for speech_relay_core::RelayError {
    fn from(err: ConfigError) -> Self {
        speech_relay_core::RelayError::Config(err.to_string())
    }
}
