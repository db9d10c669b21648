//! HTTP surface of the relay
//!
//! Serves the viewer page, static assets, and the WebSocket endpoints for
//! producer and viewer links.

pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod websocket;

pub use server::{AppState, RelayServer};
