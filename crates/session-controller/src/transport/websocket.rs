//! WebSocket transport: one socket per participant.
//!
//! `GET /ws?name=<display name>` upgrades, joins the participant through the
//! gateway and then forwards every queued [`OutboundEvent`] as a JSON text
//! frame `{"event": ..., "data": ...}`. The participant leaves when the
//! socket closes.

use crate::errors::ScError;
use crate::gateway::SessionGateway;
use crate::models::{ConnectionHandle, OutboundEvent};

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

/// Per-connection outbound queue size.
const OUTBOUND_BUFFER: usize = 64;

/// Longest accepted display name, in characters.
const MAX_DISPLAY_NAME_CHARS: usize = 64;

#[derive(Debug, Deserialize)]
pub struct JoinParams {
    pub name: String,
}

/// Router serving `/ws`.
pub fn websocket_router(gateway: SessionGateway) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .with_state(gateway)
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<JoinParams>,
    State(gateway): State<SessionGateway>,
) -> Response {
    let display_name = params.name.trim().to_string();
    if display_name.is_empty() || display_name.chars().count() > MAX_DISPLAY_NAME_CHARS {
        return (StatusCode::BAD_REQUEST, "invalid display name").into_response();
    }

    ws.on_upgrade(move |socket| handle_socket(socket, gateway, display_name))
}

/// Serialize an event as a text frame.
pub fn encode_frame(event: &OutboundEvent) -> Result<String, ScError> {
    serde_json::to_string(event)
        .map_err(|e| ScError::Internal(format!("failed to encode event: {e}")))
}

/// Frame sent when a join fails.
fn error_frame(error: &ScError) -> String {
    json!({
        "event": "error",
        "data": {
            "code": error.error_code(),
            "message": error.client_message(),
        }
    })
    .to_string()
}

async fn handle_socket(socket: WebSocket, gateway: SessionGateway, display_name: String) {
    let connection_id = uuid::Uuid::new_v4().to_string();
    let (connection, mut outbound) = ConnectionHandle::new(connection_id.clone(), OUTBOUND_BUFFER);
    let (mut ws_tx, mut ws_rx) = socket.split();

    let session = match gateway.join(&display_name, connection).await {
        Ok(session) => session,
        Err(e) => {
            warn!(
                target: "sc.transport.ws",
                connection_id = %connection_id,
                error = %e,
                "Join failed"
            );
            let _ = ws_tx.send(Message::Text(error_frame(&e))).await;
            let _ = ws_tx.close().await;
            return;
        }
    };

    info!(
        target: "sc.transport.ws",
        connection_id = %connection_id,
        session = %session,
        "WebSocket connected"
    );

    let joined = OutboundEvent {
        event: "joined".to_string(),
        data: json!({ "session": session }),
    };

    let mut open = match encode_frame(&joined) {
        Ok(frame) => ws_tx.send(Message::Text(frame)).await.is_ok(),
        Err(_) => false,
    };

    while open {
        tokio::select! {
            event = outbound.recv() => {
                let Some(event) = event else { break };
                open = match encode_frame(&event) {
                    Ok(frame) => ws_tx.send(Message::Text(frame)).await.is_ok(),
                    Err(e) => {
                        warn!(target: "sc.transport.ws", error = %e, "Dropping unencodable event");
                        true
                    }
                };
            }

            frame = ws_rx.next() => {
                match frame {
                    Some(Ok(Message::Close(_)) | Err(_)) | None => open = false,
                    // Clients do not send commands on this socket.
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    if let Err(e) = gateway.leave(&session, &connection_id).await {
        warn!(
            target: "sc.transport.ws",
            connection_id = %connection_id,
            error = %e,
            "Leave failed"
        );
    }

    debug!(
        target: "sc.transport.ws",
        connection_id = %connection_id,
        session = %session,
        "WebSocket closed"
    );
}
