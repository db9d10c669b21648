//! Producer WebSocket session
//!
//! Every text or binary frame from an instrumented page is decoded into one
//! or more events and published through the relay in arrival order.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{debug, info, trace};

use crate::api::server::AppState;
use crate::error::RelayError;
use crate::models::IncomingEvent;
use crate::relay::ProducerLink;

/// Query parameters for producer connections
#[derive(Debug, Deserialize, Default)]
pub struct ProducerQuery {
    /// Label shown to viewers next to this page's events
    pub name: Option<String>,
}

/// GET /ws/producer
pub async fn producer_ws(
    State(state): State<AppState>,
    Query(query): Query<ProducerQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, RelayError> {
    let link = state.relay.connect_producer(query.name)?;
    Ok(ws.on_upgrade(move |socket| handle_producer_ws(socket, link)))
}

/// Handle WebSocket connection for one producer
async fn handle_producer_ws(socket: WebSocket, link: ProducerLink) {
    let (mut sender, mut receiver) = socket.split();
    let mut shutdown = link.shutdown_signal();
    let mut received: u64 = 0;

    info!(
        link = %link.id(),
        source_id = %link.source().id,
        label = ?link.source().label,
        "Producer connected"
    );

    // The relay may have closed between registration and upgrade
    if *shutdown.borrow_and_update() {
        let _ = sender.send(Message::Close(None)).await;
        return;
    }

    loop {
        tokio::select! {
            msg = receiver.next() => {
                let events = match msg {
                    Some(Ok(Message::Text(text))) => IncomingEvent::decode_text(&text),
                    Some(Ok(Message::Binary(data))) => IncomingEvent::decode_binary(&data),
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(link = %link.id(), "Producer closed connection");
                        break;
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        debug!(link = %link.id(), "Producer WebSocket error: {}", e);
                        break;
                    }
                };

                for incoming in events {
                    let event = link.submit(incoming);
                    trace!(link = %link.id(), sequence = event.sequence, "Producer event relayed");
                    received += 1;
                }
            }
            _ = shutdown.changed() => {
                let _ = sender.send(Message::Close(None)).await;
                break;
            }
        }
    }

    info!(link = %link.id(), events = received, "Producer disconnected");
}
