use std::sync::Arc;

use aidj_core::job_events::PING_FRAME;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};

use crate::state::AppState;
use crate::ws::hub::JobHub;

/// GET /ws/{job_id} -- upgrade and follow one job's events.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(job_id): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, job_id, state.hub))
}

/// Drive one subscriber connection.
///
/// A spawned task forwards hub frames to the socket while this task
/// reads inbound frames. Clients only ever send the `"ping"` keepalive,
/// which needs no reply.
async fn handle_socket(socket: WebSocket, job_id: String, hub: Arc<JobHub>) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(job_id = %job_id, conn_id = %conn_id, "WebSocket connected");

    let mut rx = hub.subscribe(&job_id, conn_id.clone()).await;
    let (mut sink, mut stream) = socket.split();

    let sender_conn_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let closing = matches!(msg, Message::Close(_));
            if sink.send(msg).await.is_err() {
                tracing::debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                break;
            }
            if closing {
                break;
            }
        }
    });

    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(Message::Text(text)) if text.as_str() == PING_FRAME => {
                tracing::trace!(conn_id = %conn_id, "Keepalive received");
            }
            Ok(Message::Text(text)) => {
                tracing::debug!(
                    conn_id = %conn_id,
                    len = text.as_str().len(),
                    "Ignoring client text frame",
                );
            }
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    hub.unsubscribe(&job_id, &conn_id).await;
    send_task.abort();
    tracing::info!(job_id = %job_id, conn_id = %conn_id, "WebSocket disconnected");
}
