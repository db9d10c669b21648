//! Relay HTTP server using Axum

use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument};

use crate::assets::AssetSource;
use crate::config::ServerConfig;
use crate::error::{RelayError, Result};
use crate::relay::RelayChannel;
use crate::template::HostTemplate;

use super::middleware::cors_layer;
use super::routes;

/// Shared state for handlers
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<RelayChannel>,
    pub template: Arc<HostTemplate>,
    pub assets: Arc<dyn AssetSource>,
    /// Relay address substituted into the viewer page, fixed at startup
    pub logger_host: Arc<str>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        relay: Arc<RelayChannel>,
        template: HostTemplate,
        assets: Arc<dyn AssetSource>,
        logger_host: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            relay,
            template: Arc::new(template),
            assets,
            logger_host: logger_host.into(),
            started_at: Instant::now(),
        }
    }
}

/// Relay HTTP server
pub struct RelayServer {
    config: ServerConfig,
    state: AppState,
}

impl RelayServer {
    pub fn new(config: ServerConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// Build the router
    pub fn build_router(&self) -> Router {
        let cors = cors_layer(&self.config.cors_origins);

        routes::create_router(self.state.clone())
            .layer(cors)
            .layer(TraceLayer::new_for_http())
    }

    /// Bind the listening socket. Failure here is fatal for the process.
    pub async fn bind(&self) -> Result<TcpListener> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| RelayError::Bind { addr, source })?;

        info!("Relay listening on {}", listener.local_addr()?);
        Ok(listener)
    }

    /// Serve on a bound listener until `shutdown` flips
    #[instrument(skip_all)]
    pub async fn serve(self, listener: TcpListener, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let router = self.build_router();

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.changed().await;
            })
            .await?;

        info!("Relay server shut down");
        Ok(())
    }
}
