//! Session socket: one WebSocket connection is one chat session

use crate::services::RoundObserver;
use crate::state::AppState;
use crate::types::{ClientEvent, ServerEvent, StreamBreak};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio_stream::wrappers::UnboundedReceiverStream;
use uuid::Uuid;

/// Forwards round events to the connection's outbound queue
struct SocketObserver {
    events: UnboundedSender<ServerEvent>,
}

impl RoundObserver for SocketObserver {
    fn on_start(&self) {
        let _ = self.events.send(ServerEvent::Start);
    }

    fn on_token(&self, fragment: &str) -> Result<(), StreamBreak> {
        self.events
            .send(ServerEvent::token(fragment))
            .map_err(|_| StreamBreak)
    }

    fn on_image_done(&self) {
        let _ = self.events.send(ServerEvent::Image);
    }

    fn on_end(&self, aborted: bool) {
        let _ = self.events.send(ServerEvent::End { aborted });
    }

    fn on_error(&self, message: &str) {
        let _ = self.events.send(ServerEvent::error(message));
    }
}

pub async fn session_socket(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let session_id = Uuid::now_v7().to_string();
    if let Err(e) = state.chat.connect(&session_id).await {
        tracing::error!("[SOCKET {}] failed to open session: {}", session_id, e);
        return;
    }

    let (mut outbound, mut inbound) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<ServerEvent>();

    let writer = tokio::spawn(async move {
        let mut events = UnboundedReceiverStream::new(rx);
        while let Some(event) = events.next().await {
            tracing::trace!("Sending {} event", event.event_type());
            if outbound.send(Message::Text(event.to_json().into())).await.is_err() {
                break;
            }
        }
    });

    let observer: Arc<dyn RoundObserver> = Arc::new(SocketObserver { events: tx.clone() });

    while let Some(message) = inbound.next().await {
        let text = match message {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => continue,
        };

        match serde_json::from_str::<ClientEvent>(text.as_str()) {
            Ok(ClientEvent::Ask { question, image }) => {
                // Failures are already reported through the observer
                let _ = state
                    .chat
                    .ask(&session_id, &question, image.as_deref(), observer.clone())
                    .await;
            }
            Ok(ClientEvent::Abort) => {
                state.chat.abort(&session_id).await;
            }
            Ok(ClientEvent::Reset) => {
                if let Err(e) = state.chat.reset(&session_id).await {
                    tracing::error!("[SOCKET {}] reset failed: {}", session_id, e);
                    let _ = tx.send(ServerEvent::error("Failed to reset the session."));
                }
            }
            Err(e) => {
                tracing::warn!("[SOCKET {}] unreadable client event: {}", session_id, e);
                let _ = tx.send(ServerEvent::error("invalid JSON or unknown event type"));
            }
        }
    }

    if let Err(e) = state.chat.disconnect(&session_id).await {
        tracing::error!("[SOCKET {}] cleanup failed: {}", session_id, e);
    }
    drop(observer);
    drop(tx);
    let _ = writer.await;
}
