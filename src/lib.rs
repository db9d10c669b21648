//! Console Relay - live browser console output for remote viewers
//!
//! Instrumented pages stream their `console.*` calls to the relay over a
//! WebSocket; every open viewer page receives them in arrival order.
//!
//! ## Features
//!
//! - Server-assigned, gap-free sequence numbers giving viewers a total order
//! - Any number of producers and viewers on one relay
//! - Lagging viewers are dropped instead of stalling the stream
//! - Viewer page templated with the relay address per deployment
//! - Static serving of the built viewer bundle

pub mod api;
pub mod assets;
pub mod config;
pub mod error;
pub mod models;
pub mod relay;
pub mod template;

pub use config::Config;
pub use error::{RelayError, Result};
pub use relay::RelayChannel;
