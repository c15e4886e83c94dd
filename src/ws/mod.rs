pub mod handlers;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt, Sink};
use std::sync::Arc;

use crate::protocol::{ClientFrame, ServerMessage};
use crate::state::AppState;
use crate::types::ConnectionId;

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Serialize and send one frame. Returns false once the socket is gone.
async fn send_json<S>(sender: &mut S, msg: &ServerMessage) -> bool
where
    S: Sink<Message> + Unpin,
{
    match serde_json::to_string(msg) {
        Ok(json) => sender.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            tracing::error!("Failed to serialize message: {}", e);
            true
        }
    }
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    let connection: ConnectionId = ulid::Ulid::new().to_string();
    let mut outbound = state.connections.register(&connection).await;

    tracing::info!(connection = %connection, "WebSocket connected");

    loop {
        tokio::select! {
            // Pushes from room operations on other connections
            pushed = outbound.recv() => {
                match pushed {
                    Some(msg) => {
                        if !send_json(&mut sender, &msg).await {
                            break;
                        }
                    }
                    None => break,
                }
            }

            // Handle client messages
            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!(connection = %connection, "Received message: {}", text.as_str());

                        if let Some((code, msg)) = state.abuse.screen(&connection, text.len()).await {
                            tracing::warn!(connection = %connection, code, "Dropping inbound message");
                            if !send_json(&mut sender, &ServerMessage::error(code, msg)).await {
                                break;
                            }
                            continue;
                        }

                        let response = match serde_json::from_str::<ClientFrame>(&text) {
                            Ok(frame) => {
                                let reply = handlers::handle_message(frame.msg, &connection, &state)
                                    .await
                                    .with_req(frame.req);
                                ServerMessage::Reply(reply)
                            }
                            Err(e) => {
                                tracing::warn!(connection = %connection, "Failed to parse client message: {}", e);
                                ServerMessage::error("PARSE_ERROR", format!("Invalid message format: {}", e))
                            }
                        };
                        if !send_json(&mut sender, &response).await {
                            tracing::error!(connection = %connection, "Failed to send response");
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!(connection = %connection, "WebSocket closed");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!(connection = %connection, "WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    state.disconnect(&connection).await;
    tracing::info!(connection = %connection, "WebSocket connection closed");
}
