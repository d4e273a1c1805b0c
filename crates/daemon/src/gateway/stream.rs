// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-job push channel over WebSocket.
//!
//! Each subscriber owns its receiver half of a bounded broadcaster
//! buffer; the engine drops laggards, which surfaces here as the stream
//! ending.

use super::ApiError;
use crate::engine::EngineHandle;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;

pub(crate) async fn stream_job(
    State(engine): State<EngineHandle>,
    Path(id): Path<String>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, ApiError> {
    if engine.job(&id).is_none() {
        return Err(ApiError::NotFound(format!("job {} not found", id)));
    }

    let rx = engine.subscribe(&id);
    Ok(ws.on_upgrade(move |socket| forward_stream(socket, id, rx)))
}

/// Pump broadcaster messages to the socket until either side closes.
async fn forward_stream(
    mut socket: WebSocket,
    job_id: String,
    mut rx: tokio::sync::mpsc::Receiver<crate::engine::StreamMessage>,
) {
    loop {
        tokio::select! {
            message = rx.recv() => match message {
                Some(message) => {
                    let payload = match serde_json::to_string(&message) {
                        Ok(payload) => payload,
                        Err(e) => {
                            tracing::error!(job_id = %job_id, error = %e, "stream message serialization failed");
                            continue;
                        }
                    };
                    if socket.send(Message::Text(payload.into())).await.is_err() {
                        break;
                    }
                }
                // Channel closed: terminal grace elapsed or laggard drop.
                None => {
                    let _ = socket.send(Message::Close(None)).await;
                    break;
                }
            },

            incoming = socket.recv() => match incoming {
                // Subscribers don't speak; drain pings and ignore text.
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }
    tracing::debug!(job_id = %job_id, "stream subscriber disconnected");
}
