//! Command line arguments

use std::path::PathBuf;

use clap::Parser;
use speech_relay_config::{ConfigError, Settings, SourceKind};
use speech_relay_core::DispatchPolicy;

#[derive(Parser, Debug, Clone, Default)]
#[command(
    name = "speech-relay",
    version,
    about = "Relay streamed answer text to a local speech service"
)]
pub struct CliArgs {
    /// Configuration file, layered over `config/default`
    #[arg(long, short)]
    pub config: Option<PathBuf>,

    /// Environment profile, loads `config/<env>`
    #[arg(long, env = "SPEECH_RELAY_ENV")]
    pub env: Option<String>,

    /// Dispatch policy: `incremental` or `finalize-once`
    #[arg(long)]
    pub policy: Option<DispatchPolicy>,

    /// Speech service URL
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Quiet period before a stream counts as stable, in milliseconds
    #[arg(long)]
    pub debounce_ms: Option<u64>,

    /// Read observations from stdin instead of serving HTTP
    #[arg(long)]
    pub stdin: bool,

    /// Speak a fixed test phrase and exit
    #[arg(long)]
    pub probe: bool,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    pub print_config: bool,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

impl CliArgs {
    /// Apply command line overrides on top of loaded settings
    pub fn apply(&self, settings: &mut Settings) -> Result<(), ConfigError> {
        if let Some(policy) = self.policy {
            settings.relay.policy = policy;
        }
        if let Some(endpoint) = &self.endpoint {
            settings.relay.server_endpoint = endpoint.clone();
        }
        if let Some(delay) = self.debounce_ms {
            settings.relay.debounce_delay_ms = delay;
        }
        if self.stdin {
            settings.source.kind = SourceKind::Stdin;
        }
        if self.debug {
            settings.observability.log_level = "debug".to_string();
        }
        settings.validate()
    }
}
