//! Per-connection link handles
//!
//! A link is created by [`RelayChannel`] and deregisters itself when dropped,
//! so a session that ends on any path leaves no reference behind.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use super::RelayChannel;
use crate::models::{EventSource, IncomingEvent, LogEvent};

/// Identity of one connection, never reused within a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkId(pub(super) u64);

impl std::fmt::Display for LinkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "link-{}", self.0)
    }
}

/// `Connecting -> Active -> Closed`; `Closed` is terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Connecting,
    Active,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Producer,
    Viewer,
}

/// One instrumented page sending events
pub struct ProducerLink {
    id: LinkId,
    source: EventSource,
    channel: Arc<RelayChannel>,
}

impl ProducerLink {
    pub(super) fn new(id: LinkId, source: EventSource, channel: Arc<RelayChannel>) -> Self {
        Self {
            id,
            source,
            channel,
        }
    }

    pub fn id(&self) -> LinkId {
        self.id
    }

    pub fn source(&self) -> &EventSource {
        &self.source
    }

    pub fn state(&self) -> LinkState {
        self.channel.link_state(self.id)
    }

    /// Ingest and broadcast one event from this page
    pub fn submit(&self, incoming: IncomingEvent) -> Arc<LogEvent> {
        self.channel.publish(&self.source, incoming)
    }

    /// Flips to `true` when the relay shuts down
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.channel.shutdown_signal()
    }
}

impl Drop for ProducerLink {
    fn drop(&mut self) {
        self.channel.detach(self.id);
    }
}

/// One open viewer page receiving events
pub struct ViewerLink {
    id: LinkId,
    channel: Arc<RelayChannel>,
    events: mpsc::Receiver<Arc<LogEvent>>,
}

impl ViewerLink {
    pub(super) fn new(
        id: LinkId,
        channel: Arc<RelayChannel>,
        events: mpsc::Receiver<Arc<LogEvent>>,
    ) -> Self {
        Self {
            id,
            channel,
            events,
        }
    }

    pub fn id(&self) -> LinkId {
        self.id
    }

    pub fn state(&self) -> LinkState {
        self.channel.link_state(self.id)
    }

    /// Start receiving events ingested from now on. Returns false when the
    /// link was already subscribed or is closed.
    pub fn subscribe(&self) -> bool {
        self.channel.subscribe(self.id)
    }

    pub fn unsubscribe(&self) {
        self.channel.unsubscribe(self.id);
    }

    /// Next event in ingest order. `None` once the relay dropped this link
    /// and everything queued before that has been drained.
    pub async fn recv(&mut self) -> Option<Arc<LogEvent>> {
        self.events.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Arc<LogEvent>> {
        self.events.try_recv().ok()
    }
}

impl Drop for ViewerLink {
    fn drop(&mut self) {
        self.channel.detach(self.id);
    }
}
