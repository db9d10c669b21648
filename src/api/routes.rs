//! Route definitions

use axum::routing::get;
use axum::Router;

use super::handlers;
use super::server::AppState;
use super::websocket;

/// Path of the templated viewer page
pub const VIEWER_PAGE_PATH: &str = "/logger-viewer.html";

/// Create the router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/api/status", get(handlers::health::status))
        .route(VIEWER_PAGE_PATH, get(handlers::viewer::viewer_page))
        // Event transport
        .route("/ws/producer", get(websocket::producer::producer_ws))
        .route("/ws/viewer", get(websocket::viewer::viewer_ws))
        // Everything else is a bundle asset
        .fallback(handlers::assets::serve_asset)
        .with_state(state)
}
