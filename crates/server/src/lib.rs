//! Speech relay server
//!
//! Hosts the text source adapters (HTTP and stdin) that feed a relay
//! session, plus the command line surface of the `speech-relay` binary.

pub mod cli;
pub mod http;
pub mod state;
pub mod stdin;

pub use cli::CliArgs;
pub use http::create_router;
pub use state::{AppState, DocumentState};
pub use stdin::{run_stdin_source, LineStats};

use speech_relay_config::ConfigError;
use speech_relay_transport::TransportError;
use thiserror::Error;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Relay session has stopped")]
    SessionStopped,

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ServerError> for axum::http::StatusCode {
    fn from(err: ServerError) -> Self {
        match err {
            ServerError::InvalidRequest(_) => axum::http::StatusCode::BAD_REQUEST,
            ServerError::SessionStopped => axum::http::StatusCode::SERVICE_UNAVAILABLE,
            ServerError::Config(_) | ServerError::Transport(_) | ServerError::Io(_) => {
                axum::http::StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}
