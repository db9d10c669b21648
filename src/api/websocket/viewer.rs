//! Viewer WebSocket session

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use tracing::{debug, error, info};

use crate::api::server::AppState;
use crate::error::RelayError;
use crate::relay::ViewerLink;

/// GET /ws/viewer
pub async fn viewer_ws(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> Result<Response, RelayError> {
    let link = state.relay.connect_viewer()?;
    Ok(ws.on_upgrade(move |socket| handle_viewer_ws(socket, link)))
}

/// Handle WebSocket connection for one viewer
async fn handle_viewer_ws(socket: WebSocket, mut link: ViewerLink) {
    let (mut sender, mut receiver) = socket.split();
    let id = link.id();

    if !link.subscribe() {
        debug!(link = %id, "Viewer closed before subscribing");
        let _ = sender.send(Message::Close(None)).await;
        return;
    }
    info!(link = %id, "Viewer connected");

    // The link lives in this task; it ends when the relay drops the viewer.
    let mut send_task = tokio::spawn(async move {
        while let Some(event) = link.recv().await {
            match serde_json::to_string(&*event) {
                Ok(json) => {
                    if sender.send(Message::Text(json)).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    error!("Failed to serialize log event: {}", e);
                }
            }
        }
        let _ = sender.send(Message::Close(None)).await;
    });

    // Viewers send nothing but control frames
    let mut receive_task = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Close(_)) => {
                    debug!("Viewer WebSocket received close");
                    break;
                }
                Err(e) => {
                    debug!("Viewer WebSocket error: {}", e);
                    break;
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => {
            debug!(link = %id, "Viewer send task ended");
        }
        _ = &mut receive_task => {
            debug!(link = %id, "Viewer receive task ended");
        }
    }

    // Joining both tasks drops the link, which deregisters it.
    send_task.abort();
    receive_task.abort();
    let _ = tokio::join!(send_task, receive_task);

    info!(link = %id, "Viewer disconnected");
}
