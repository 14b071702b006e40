//! WebSocket upgrade and per-connection loop.

use crate::AppState;
use crate::relay::{self, Disposition};
use axum::{
    extract::{
        Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use inkroom_core::ServerMessage;
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Frames queued per connection before broadcasts to it are dropped.
const OUTBOUND_BUFFER: usize = 256;

#[derive(Debug, Deserialize)]
pub struct ConnectParams {
    token: Option<String>,
}

/// Authenticate, then upgrade. A rejected credential never reaches the
/// registry.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let Some(user_id) = params
        .token
        .as_deref()
        .and_then(|token| state.sessions.authenticate(token))
    else {
        warn!("rejecting websocket upgrade: missing or invalid credential");
        return (StatusCode::UNAUTHORIZED, "invalid credential").into_response();
    };

    ws.on_upgrade(move |socket| run_connection(socket, state, user_id))
}

async fn run_connection(socket: WebSocket, state: Arc<AppState>, user_id: String) {
    let (tx, mut rx) = mpsc::channel::<String>(OUTBOUND_BUFFER);
    let conn_id = state.registry.register(user_id.clone(), tx);
    info!(%conn_id, user_id = %user_id, "connection opened");

    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match relay::handle_text(&state, conn_id, &user_id, text.as_str()).await {
                            Disposition::Continue => {}
                            Disposition::Reply(reply) => {
                                if send_message(&mut sender, &reply).await.is_err() {
                                    break;
                                }
                            }
                            Disposition::Disconnect(reason) => {
                                warn!(%conn_id, reason = %reason, "closing connection");
                                let _ = send_message(&mut sender, &ServerMessage::Error { message: reason }).await;
                                let _ = sender.send(Message::Close(None)).await;
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(%conn_id, error = %e, "websocket error");
                        break;
                    }
                }
            }

            Some(text) = rx.recv() => {
                if sender.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
        }
    }

    state.registry.unregister(conn_id);
    info!(%conn_id, "connection closed");
}

async fn send_message(
    sender: &mut SplitSink<WebSocket, Message>,
    message: &ServerMessage,
) -> Result<(), axum::Error> {
    match serde_json::to_string(message) {
        Ok(json) => sender.send(Message::Text(json.into())).await,
        Err(e) => {
            error!(error = %e, "failed to encode server message");
            Ok(())
        }
    }
}
