//! Speech relay entry point

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::io::BufReader;
use tokio::sync::oneshot;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use speech_relay_config::{load_settings, ObservabilityConfig, SourceKind};
use speech_relay_pipeline::{RelaySession, SessionConfig};
use speech_relay_server::{create_router, run_stdin_source, AppState, CliArgs, DocumentState};
use speech_relay_transport::{parse_endpoint, probe, speak_test_phrase, HttpSpeechTransport};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    let mut settings = load_settings(args.env.as_deref(), args.config.as_deref())
        .context("loading configuration")?;
    args.apply(&mut settings).context("applying command line overrides")?;

    if args.print_config {
        print!("{}", toml::to_string_pretty(&settings)?);
        return Ok(());
    }

    init_tracing(&settings.observability);
    tracing::info!("Starting speech relay v{}", env!("CARGO_PKG_VERSION"));

    let configured = parse_endpoint(&settings.relay.server_endpoint)?;
    let endpoint = match probe(&configured, &settings.transport).await {
        Ok(endpoint) => endpoint,
        Err(e) => {
            tracing::warn!(error = %e, "Keeping configured endpoint");
            configured
        }
    };
    let transport = Arc::new(HttpSpeechTransport::new(endpoint, &settings.transport)?);

    if args.probe {
        let outcome = speak_test_phrase(transport.as_ref()).await;
        anyhow::ensure!(outcome.is_delivered(), "test phrase not delivered: {}", outcome);
        return Ok(());
    }

    let document = Arc::new(DocumentState::new(settings.source.start_visible));
    let (session, notifier) = RelaySession::new(
        SessionConfig::from_settings(&settings),
        document.clone(),
        transport,
    );
    let status = session.status_handle();
    let policy = session.policy();

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let session_task = tokio::spawn(session.run_until(async move {
        let _ = shutdown_rx.await;
    }));

    match settings.source.kind {
        SourceKind::Http => {
            let addr: SocketAddr = settings
                .source
                .bind
                .parse()
                .context("parsing source bind address")?;
            let app = create_router(AppState::new(document, notifier, status, policy));

            let listener = tokio::net::TcpListener::bind(addr).await?;
            tracing::info!("Listening on {}", addr);

            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal())
                .await?;
            let _ = shutdown_tx.send(());
        }
        SourceKind::Stdin => {
            tracing::info!("Reading observations from stdin");
            let reader = BufReader::new(tokio::io::stdin());

            tokio::select! {
                result = run_stdin_source(reader, &document, notifier) => {
                    result?;
                    tracing::info!("Waiting for pending segments");
                }
                _ = shutdown_signal() => {
                    let _ = shutdown_tx.send(());
                }
            }
        }
    }

    session_task.await?;
    tracing::info!("Speech relay stopped");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down");
        }
    }
}

fn init_tracing(config: &ObservabilityConfig) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("speech_relay={},tower_http=info", config.log_level).into()
    });

    let fmt_layer = if config.log_json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}
