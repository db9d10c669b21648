//! WebSocket sessions
//!
//! Each upgraded connection owns exactly one link; dropping the link at the
//! end of the session deregisters it from the relay.

pub mod producer;
pub mod viewer;
