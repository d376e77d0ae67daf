use crate::extractors::upgrade_identity::UpgradeIdentity;
use crate::AppState;
use axum::extract::ws::{Message, Utf8Bytes, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use domain::auth::Identity;
use futures::{SinkExt, StreamExt};
use log::*;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Upgrades an authenticated request to a WebSocket that receives broadcasts.
///
/// The credential is verified by [`UpgradeIdentity`] before the upgrade is
/// accepted; a refused credential gets a 401 and no transport is opened.
pub(crate) async fn ws_handler(
    UpgradeIdentity(identity): UpgradeIdentity,
    State(app_state): State<AppState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    debug!("Upgrading WebSocket connection for {}", identity.subject_id);

    let manager = app_state.ws_manager.clone();
    let buffer_size = app_state.config.connection_buffer_size.max(1);

    ws.on_failed_upgrade(move |e| warn!("WebSocket upgrade for {} failed: {e}", identity.subject_id))
        .on_upgrade(move |socket| serve_connection(socket, identity, manager, buffer_size))
}

/// Owns one connection from registration until its transport closes.
///
/// A writer task drains the connection's queue into the socket and a reader
/// task consumes client frames. Whichever finishes first stops the other, then
/// the registry entry is removed.
async fn serve_connection(
    socket: WebSocket,
    identity: Identity,
    manager: Arc<ws::Manager>,
    buffer_size: usize,
) {
    let subject_id = identity.subject_id;
    let (tx, mut rx) = mpsc::channel::<Utf8Bytes>(buffer_size);
    let connection_id = manager.register_connection(subject_id, tx);
    let (mut sink, mut stream) = socket.split();

    let mut writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if let Err(e) = sink.send(Message::Text(frame)).await {
                debug!("Writing to connection {connection_id} failed: {e}");
                return;
            }
        }
        // Queue closed: the registry dropped this connection (shutdown).
        let _ = sink.send(Message::Close(None)).await;
    });

    let mut reader = tokio::spawn(async move {
        while let Some(received) = stream.next().await {
            match received {
                Ok(Message::Text(text)) => {
                    match serde_json::from_str::<serde_json::Value>(text.as_str()) {
                        Ok(value) => debug!("Ignoring client message from {subject_id}: {value}"),
                        Err(e) => debug!("Discarding invalid JSON from {subject_id}: {e}"),
                    }
                }
                Ok(Message::Binary(_)) => {
                    debug!("Discarding binary frame from {subject_id}");
                }
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                    // Handled automatically by axum
                }
                Ok(Message::Close(_)) => break,
                Err(e) => {
                    debug!("WebSocket error on connection {connection_id}: {e}");
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut writer => reader.abort(),
        _ = &mut reader => writer.abort(),
    }

    manager.unregister_connection(&connection_id);
}
