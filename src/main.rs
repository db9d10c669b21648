//! Console Relay - Entry Point
//!
//! Checks the viewer bundle, binds the relay port and serves until Ctrl+C or
//! SIGTERM, then closes every link before exiting.

use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use console_relay::api::{AppState, RelayServer};
use console_relay::assets::{ensure_viewer_bundle, DiskAssets};
use console_relay::config::{Config, LogConfig};
use console_relay::error;
use console_relay::template::HostTemplate;
use console_relay::RelayChannel;

#[tokio::main(flavor = "current_thread")]
async fn main() -> error::Result<()> {
    let config = Config::from_env()?;
    init_tracing(&config.log);

    info!("Starting Console Relay");

    // The bundle must exist before traffic is accepted
    if let Err(e) = ensure_viewer_bundle(&config.viewer).await {
        error!("Viewer bundle check failed: {}", e);
        return Err(e);
    }

    let template =
        HostTemplate::load(&config.viewer.template_path, &config.viewer.host_placeholder).await?;
    if config.viewer.logger_host.is_empty() {
        warn!("LOGGER_HOST is not set; viewer pages will not know where to connect");
    }

    let relay = Arc::new(RelayChannel::new(config.relay.viewer_buffer_size));
    let state = AppState::new(
        Arc::clone(&relay),
        template,
        Arc::new(DiskAssets::new(config.viewer.asset_dir.clone())),
        config.viewer.logger_host.as_str(),
    );

    let server = RelayServer::new(config.server.clone(), state);
    let listener = match server.bind().await {
        Ok(listener) => listener,
        Err(e) => {
            error!("{}", e);
            return Err(e);
        }
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut server_task = tokio::spawn(server.serve(listener, shutdown_rx));

    info!(
        "Relay started on {} (viewer host: {:?}, assets: {})",
        config.bind_addr(),
        config.viewer.logger_host,
        config.viewer.asset_dir.display()
    );

    tokio::select! {
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
        result = &mut server_task => {
            relay.close();
            return match result {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => {
                    error!("Relay server error: {}", e);
                    Err(e)
                }
                Err(e) => Err(error::RelayError::Internal(e.to_string())),
            };
        }
    }

    // Close links first so the server has no open sessions left to wait on
    relay.close();
    let grace = Duration::from_secs(config.relay.shutdown_grace_secs);
    if tokio::time::timeout(grace, relay.wait_idle()).await.is_err() {
        warn!("Links still open after {:?}, stopping anyway", grace);
    }

    let _ = shutdown_tx.send(true);
    match server_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("Relay server error: {}", e),
        Err(e) => error!("Relay server task failed: {}", e),
    }

    info!("Console Relay stopped");
    Ok(())
}

fn init_tracing(log: &LogConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("console_relay={},tower_http=info", log.level).into());
    let registry = tracing_subscriber::registry().with(filter);

    if log.format.eq_ignore_ascii_case("json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
