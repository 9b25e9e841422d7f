//! Client-facing operations of a chat session
//!
//! Maps the socket protocol (connect, ask, abort, reset, disconnect) onto the
//! session manager and the streaming coordinator.

use crate::inference::GenerationEngine;
use crate::services::session::SessionManager;
use crate::services::streaming::{RoundObserver, StreamingCoordinator};
use crate::types::SessionError;
use std::sync::Arc;
use uuid::Uuid;

pub const MISSING_QUESTION: &str = r#"Invalid request. "question" is required."#;
pub const ASK_FAILED: &str = "Failed to process the ask request.";

pub struct ChatService<E: GenerationEngine> {
    sessions: SessionManager<E>,
    coordinator: StreamingCoordinator<E>,
}

impl<E: GenerationEngine> ChatService<E> {
    pub fn new(sessions: SessionManager<E>, coordinator: StreamingCoordinator<E>) -> Self {
        Self {
            sessions,
            coordinator,
        }
    }

    pub fn sessions(&self) -> &SessionManager<E> {
        &self.sessions
    }

    pub async fn connect(&self, session_id: &str) -> Result<(), SessionError> {
        tracing::info!("[CHAT {}] session connected", session_id);
        self.sessions.get_or_create(session_id).await?;
        Ok(())
    }

    pub async fn disconnect(&self, session_id: &str) -> Result<(), SessionError> {
        self.sessions.destroy(session_id).await?;
        tracing::info!("[CHAT {}] session disconnected", session_id);
        Ok(())
    }

    /// Validates the request, stores the optional image and starts a round.
    ///
    /// Errors are reported to `observer` before being returned; a busy
    /// session is only logged.
    pub async fn ask(
        &self,
        session_id: &str,
        question: &str,
        image: Option<&str>,
        observer: Arc<dyn RoundObserver>,
    ) -> Result<Uuid, SessionError> {
        if question.is_empty() {
            tracing::warn!("[CHAT {}] invalid request, missing question", session_id);
            observer.on_error(MISSING_QUESTION);
            return Err(SessionError::Validation("question is required".to_string()));
        }
        tracing::info!("[CHAT {}] received ask request", session_id);

        let session = match self.sessions.get_or_create(session_id).await {
            Ok(session) => session,
            Err(e) => {
                tracing::error!("[CHAT {}] error during ask: {}", session_id, e);
                observer.on_error(ASK_FAILED);
                return Err(e);
            }
        };

        let image_path = match image.filter(|data| !data.is_empty()) {
            Some(data) => match self.sessions.history().store_image(session_id, data).await {
                Ok(path) => Some(path),
                Err(e) => {
                    tracing::error!("[CHAT {}] error during ask: {}", session_id, e);
                    observer.on_error(ASK_FAILED);
                    return Err(e.into());
                }
            },
            None => None,
        };

        let image_ref = image_path.as_ref().map(|p| p.to_string_lossy().into_owned());
        let result = self
            .coordinator
            .run_round(&session, question.to_string(), image_ref, observer)
            .await;

        if result.is_err() {
            if let Some(path) = image_path {
                self.sessions.history().discard(&path).await;
            }
        }
        result
    }

    pub async fn abort(&self, session_id: &str) -> bool {
        self.sessions.abort_round(session_id).await
    }

    /// Aborts and awaits the running round before resetting.
    pub async fn reset(&self, session_id: &str) -> Result<(), SessionError> {
        self.sessions.abort_round(session_id).await;
        self.sessions.wait_idle(session_id).await;
        self.sessions.reset(session_id).await
    }
}
