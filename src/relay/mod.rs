//! Relay between producer pages and viewer pages
//!
//! Producers push events into a [`RelayChannel`], which stamps each one with
//! the next sequence number and fans it out to every subscribed viewer.

mod channel;
mod link;

pub use channel::{RelayChannel, RelayStats};
pub use link::{LinkId, LinkKind, LinkState, ProducerLink, ViewerLink};
