//! WebSocket handlers for the listen session and the heartbeat

use std::sync::Arc;

use axum::{
    Router,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
    routing::get,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use super::ApiState;
use crate::voice::{ListenSession, SessionEvent};

/// Build WebSocket router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/listen", get(listen_upgrade))
        .route("/heartbeat", get(heartbeat_upgrade))
        .with_state(state)
}

async fn listen_upgrade(
    State(state): State<Arc<ApiState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_listen(socket, state))
}

/// Bridge a socket to a listen session
///
/// Client text frames become control messages; session events are sent back
/// as JSON. The session stops when either side goes away.
async fn handle_listen(socket: WebSocket, state: Arc<ApiState>) {
    let (mut sender, mut receiver) = socket.split();

    let (control_tx, control_rx) = mpsc::channel::<String>(16);
    let (events_tx, mut events_rx) = mpsc::channel::<SessionEvent>(32);

    let capabilities = state.assistant.capabilities();
    let session = ListenSession::new(
        Arc::clone(&state.profile),
        Arc::clone(&state.frame_source),
        capabilities.transcriber.clone(),
        capabilities.embedder.clone(),
    )
    .with_config(state.session_config);

    tracing::info!("listen WebSocket connected");

    let mut session_task = tokio::spawn(session.run(control_rx, events_tx));

    // Spawn task to forward session events to the WebSocket
    let mut send_task = tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            match serde_json::to_string(&event) {
                Ok(text) => {
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Err(e) => tracing::warn!(error = %e, "failed to encode session event"),
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    if control_tx.send(text.to_string()).await.is_err() {
                        break;
                    }
                }
                Message::Close(_) => {
                    tracing::info!("listen WebSocket closed by client");
                    break;
                }
                _ => {}
            }
        }
    });

    // Wait for any side to finish, then stop the rest
    tokio::select! {
        _ = &mut send_task => {}
        _ = &mut recv_task => {}
        _ = &mut session_task => {}
    }
    send_task.abort();
    recv_task.abort();
    session_task.abort();

    tracing::info!("listen WebSocket disconnected");
}

async fn heartbeat_upgrade(
    State(state): State<Arc<ApiState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let interval = state.heartbeat_interval;
    ws.on_upgrade(move |socket| handle_heartbeat(socket, interval))
}

/// Send a heartbeat every `interval` and echo client text
async fn handle_heartbeat(mut socket: WebSocket, interval: std::time::Duration) {
    let heartbeat = match serde_json::to_string(&SessionEvent::log("heartbeat")) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(error = %e, "failed to encode heartbeat");
            return;
        }
    };

    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    tracing::debug!("heartbeat WebSocket connected");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if socket.send(Message::Text(heartbeat.clone().into())).await.is_err() {
                    break;
                }
            }
            msg = socket.recv() => match msg {
                Some(Ok(Message::Text(text))) => {
                    if socket.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    tracing::debug!("heartbeat WebSocket disconnected");
}
