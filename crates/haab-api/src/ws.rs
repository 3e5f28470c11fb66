//! WebSocket handler for the live log stream.
//!
//! One subscriber per connection. Lines are relayed as text messages in
//! emission order; a runtime failure mid-stream is sent as a final error
//! message before the close frame, so a passive subscriber cannot miss
//! it. Client disconnect drops the stream, which releases the underlying
//! log-follow request.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};

use haab_orchestrator::LogsError;
use haab_runtime::LogStream;

use crate::ApiState;
use crate::handlers::error_response;

/// Query parameters for the log stream.
#[derive(serde::Deserialize)]
pub struct LogsQuery {
    /// Backlog lines to replay before following; server default if absent.
    pub tail: Option<u32>,
}

/// GET /api/v1/apps/{id}/logs
///
/// The record is resolved before the upgrade so a missing application is
/// an ordinary 404 rather than an immediately-closed socket.
pub async fn logs_handler(
    ws: WebSocketUpgrade,
    State(state): State<ApiState>,
    Path(id): Path<u64>,
    Query(params): Query<LogsQuery>,
) -> impl IntoResponse {
    match state.orchestrator.stream_logs(id, params.tail).await {
        Ok(stream) => ws
            .on_upgrade(move |socket| relay_logs(socket, stream, id))
            .into_response(),
        Err(LogsError::NotFound(_)) => {
            error_response(&format!("no application with id {id}"), StatusCode::NOT_FOUND)
                .into_response()
        }
        Err(e) => error_response(&e.to_string(), StatusCode::BAD_GATEWAY).into_response(),
    }
}

/// Pump log lines into the socket until either side ends.
async fn relay_logs(socket: WebSocket, mut stream: LogStream, id: u64) {
    tracing::debug!(id, "log subscriber connected");
    let (mut ws_sender, mut ws_receiver) = socket.split();

    loop {
        tokio::select! {
            // Client-side traffic: only close matters, but the receiver
            // must be polled for the close to be noticed promptly.
            msg = ws_receiver.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::debug!(id, "log subscriber disconnected");
                        break;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::debug!(id, error = %e, "log socket error");
                        break;
                    }
                }
            }

            item = stream.next() => {
                match item {
                    Some(Ok(line)) => {
                        if ws_sender.send(Message::Text(line.into())).await.is_err() {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        // Terminal notice, then close — never a silent drop.
                        tracing::warn!(id, error = %e, "log stream failed");
                        let notice = format!("log stream terminated: {e}");
                        let _ = ws_sender.send(Message::Text(notice.into())).await;
                        let _ = ws_sender.send(Message::Close(None)).await;
                        break;
                    }
                    None => {
                        let _ = ws_sender.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
        }
    }
    // Dropping `stream` here cancels the runtime's log follow.
}
