//! Event bus shared by all links
//!
//! Viewer delivery uses a bounded queue per viewer with `try_send`. A viewer
//! whose queue is full is dropped instead of stalling the stream.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch, Notify};
use tracing::{debug, info, trace, warn};

use super::link::{LinkId, LinkKind, LinkState, ProducerLink, ViewerLink};
use crate::error::{RelayError, Result};
use crate::models::{EventSource, IncomingEvent, LogEvent};

/// Snapshot of relay activity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayStats {
    pub producers: usize,
    pub viewers: usize,
    pub last_sequence: Option<u64>,
}

struct LinkEntry {
    kind: LinkKind,
    state: LinkState,
    /// Viewer queue parked here until the viewer subscribes
    pending: Option<mpsc::Sender<Arc<LogEvent>>>,
}

struct Inner {
    next_link_id: u64,
    last_sequence: Option<u64>,
    links: HashMap<LinkId, LinkEntry>,
    viewers: HashMap<LinkId, mpsc::Sender<Arc<LogEvent>>>,
    closed: bool,
}

/// Fans events from producers out to subscribed viewers
pub struct RelayChannel {
    inner: Mutex<Inner>,
    viewer_buffer_size: usize,
    shutdown: watch::Sender<bool>,
    idle: Notify,
}

impl RelayChannel {
    /// Create a channel; each viewer may queue up to `viewer_buffer_size` events
    pub fn new(viewer_buffer_size: usize) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Mutex::new(Inner {
                next_link_id: 1,
                last_sequence: None,
                links: HashMap::new(),
                viewers: HashMap::new(),
                closed: false,
            }),
            viewer_buffer_size: viewer_buffer_size.max(1),
            shutdown,
            idle: Notify::new(),
        }
    }

    /// Register a producer page. Its link is active immediately.
    pub fn connect_producer(self: &Arc<Self>, label: Option<String>) -> Result<ProducerLink> {
        let id = self.register(LinkKind::Producer, LinkState::Active, None)?;
        let source = EventSource::new(label);
        debug!(link = %id, source_id = %source.id, "Producer link registered");
        Ok(ProducerLink::new(id, source, Arc::clone(self)))
    }

    /// Register a viewer page. It receives nothing until it subscribes.
    pub fn connect_viewer(self: &Arc<Self>) -> Result<ViewerLink> {
        let (tx, rx) = mpsc::channel(self.viewer_buffer_size);
        let id = self.register(LinkKind::Viewer, LinkState::Connecting, Some(tx))?;
        debug!(link = %id, "Viewer link registered");
        Ok(ViewerLink::new(id, Arc::clone(self), rx))
    }

    fn register(
        &self,
        kind: LinkKind,
        state: LinkState,
        pending: Option<mpsc::Sender<Arc<LogEvent>>>,
    ) -> Result<LinkId> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(RelayError::RelayClosed);
        }

        let id = LinkId(inner.next_link_id);
        inner.next_link_id += 1;
        inner.links.insert(
            id,
            LinkEntry {
                kind,
                state,
                pending,
            },
        );
        Ok(id)
    }

    /// Assign the next sequence number and finalize the event
    pub fn ingest(&self, source: &EventSource, incoming: IncomingEvent) -> LogEvent {
        Self::ingest_locked(&mut self.inner.lock(), source, incoming)
    }

    /// Deliver an event to every current subscriber; returns how many accepted it
    pub fn broadcast(&self, event: Arc<LogEvent>) -> usize {
        Self::broadcast_locked(&mut self.inner.lock(), &event)
    }

    /// Ingest and broadcast under one lock, so delivery order equals ingest
    /// order for every viewer regardless of how many producers are active.
    pub fn publish(&self, source: &EventSource, incoming: IncomingEvent) -> Arc<LogEvent> {
        let mut inner = self.inner.lock();
        let event = Arc::new(Self::ingest_locked(&mut inner, source, incoming));
        Self::broadcast_locked(&mut inner, &event);
        event
    }

    fn ingest_locked(inner: &mut Inner, source: &EventSource, incoming: IncomingEvent) -> LogEvent {
        let sequence = inner.last_sequence.map_or(1, |s| s + 1);
        inner.last_sequence = Some(sequence);

        LogEvent {
            sequence,
            timestamp: incoming.timestamp.unwrap_or_else(Utc::now),
            level: incoming.level,
            source_id: source.id,
            source_label: source.label.clone(),
            payload: incoming.payload,
        }
    }

    fn broadcast_locked(inner: &mut Inner, event: &Arc<LogEvent>) -> usize {
        let mut delivered = 0;
        let mut dropped = Vec::new();

        for (id, tx) in &inner.viewers {
            match tx.try_send(Arc::clone(event)) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(link = %id, sequence = event.sequence, "Viewer lagging, dropping it");
                    dropped.push(*id);
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(link = %id, "Viewer queue closed");
                    dropped.push(*id);
                }
            }
        }

        for id in dropped {
            inner.viewers.remove(&id);
            if let Some(entry) = inner.links.get_mut(&id) {
                entry.state = LinkState::Closed;
            }
        }

        trace!(sequence = event.sequence, delivered, "Event broadcast");
        delivered
    }

    /// Start delivering events to a viewer link. Idempotent; a closed link
    /// stays closed.
    pub fn subscribe(&self, id: LinkId) -> bool {
        let mut inner = self.inner.lock();
        if inner.closed {
            return false;
        }

        let Some(entry) = inner.links.get_mut(&id) else {
            return false;
        };
        if entry.state == LinkState::Closed {
            return false;
        }
        let Some(tx) = entry.pending.take() else {
            return false;
        };

        entry.state = LinkState::Active;
        inner.viewers.insert(id, tx);
        debug!(link = %id, "Viewer subscribed");
        true
    }

    /// Stop delivering to a viewer link. Safe to repeat.
    pub fn unsubscribe(&self, id: LinkId) {
        let mut inner = self.inner.lock();
        inner.viewers.remove(&id);
        if let Some(entry) = inner.links.get_mut(&id) {
            entry.state = LinkState::Closed;
            entry.pending = None;
        }
    }

    /// Forget a link entirely. Called when its handle is dropped.
    pub(super) fn detach(&self, id: LinkId) {
        let removed = {
            let mut inner = self.inner.lock();
            inner.viewers.remove(&id);
            inner.links.remove(&id)
        };

        if let Some(entry) = removed {
            debug!(link = %id, kind = ?entry.kind, "Link detached");
            self.idle.notify_waiters();
        }
    }

    pub fn link_state(&self, id: LinkId) -> LinkState {
        self.inner
            .lock()
            .links
            .get(&id)
            .map_or(LinkState::Closed, |entry| entry.state)
    }

    /// Close every link and refuse new ones
    pub fn close(&self) {
        {
            let mut inner = self.inner.lock();
            if inner.closed {
                return;
            }
            inner.closed = true;
            inner.viewers.clear();
            for entry in inner.links.values_mut() {
                entry.state = LinkState::Closed;
                entry.pending = None;
            }
            info!(links = inner.links.len(), "Relay channel closing");
        }

        self.shutdown.send_replace(true);
        self.idle.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Resolve once no link handle remains alive
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.inner.lock().links.is_empty() {
                return;
            }
            notified.await;
        }
    }

    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }

    pub fn stats(&self) -> RelayStats {
        let inner = self.inner.lock();
        let producers = inner
            .links
            .values()
            .filter(|e| e.kind == LinkKind::Producer && e.state != LinkState::Closed)
            .count();

        RelayStats {
            producers,
            viewers: inner.viewers.len(),
            last_sequence: inner.last_sequence,
        }
    }
}
