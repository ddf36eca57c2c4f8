use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use realtime::{validate_channel, LocalHub};
use serde::Deserialize;
use shared::error::{ApiError, ErrorCode};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::{api::reject, app_state::AppState};

#[derive(Debug, Deserialize)]
pub(crate) struct WsQuery {
    channel: String,
}

/// Streams every relayed event for one channel as a JSON text frame.
pub(crate) async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(q): Query<WsQuery>,
) -> Response {
    let Some(hub) = state.hub.clone() else {
        return reject(ApiError::new(
            ErrorCode::Unavailable,
            "Local realtime hub is disabled",
        ))
        .into_response();
    };
    if validate_channel(&q.channel).is_err() {
        return reject(ApiError::new(ErrorCode::Validation, "Invalid channel"))
            .into_response();
    }
    ws.on_upgrade(move |socket| ws_connection(hub, socket, q.channel))
}

async fn ws_connection(hub: LocalHub, socket: WebSocket, channel: String) {
    let (mut sender, mut receiver) = socket.split();
    let mut events_rx = hub.subscribe();
    debug!(%channel, "subscriber connected");

    let send_channel = channel.clone();
    let mut send_task = tokio::spawn(async move {
        loop {
            let event = match events_rx.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(channel = %send_channel, skipped, "subscriber lagged; events dropped");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            if event.channel != send_channel {
                continue;
            }
            let text = match serde_json::to_string(&event) {
                Ok(v) => v,
                Err(_) => continue,
            };
            if sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            _ = &mut send_task => break,
            msg = receiver.next() => match msg {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    send_task.abort();
    debug!(%channel, "subscriber disconnected");
}
