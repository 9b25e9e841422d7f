//! One generation round: a blocking producer driving the engine and an async
//! forwarder draining the sink towards the client.

use super::sink::{token_sink, TokenStream, TokenWriter, StreamItem};
use crate::inference::{CachePolicy, FeaturesHook, GenerationEngine, GenerationRequest, GenerationStop};
use crate::services::session::{RoundHandle, Session};
use crate::types::{SessionError, StreamBreak, Turn};
use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Receives the client-facing events of a round.
///
/// `on_token` and `on_end` are called from the forwarding task,
/// `on_image_done` from the engine thread. `on_end` runs while the session
/// is locked and must not block.
pub trait RoundObserver: Send + Sync + 'static {
    fn on_start(&self) {}

    /// A failure here breaks the stream and aborts the round.
    fn on_token(&self, fragment: &str) -> Result<(), StreamBreak>;

    fn on_image_done(&self) {}

    fn on_end(&self, aborted: bool);

    fn on_error(&self, _message: &str) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProducerOutcome {
    Completed,
    Interrupted,
    Faulted,
}

struct ProducerExit<C> {
    cache: C,
    outcome: ProducerOutcome,
}

pub struct StreamingCoordinator<E: GenerationEngine> {
    engine: Arc<E>,
    policy: CachePolicy,
    max_new_tokens: usize,
}

impl<E: GenerationEngine> StreamingCoordinator<E> {
    pub fn new(engine: Arc<E>, policy: CachePolicy, max_new_tokens: usize) -> Self {
        Self {
            engine,
            policy,
            max_new_tokens,
        }
    }

    /// Starts a round and returns its id once both actors are running.
    ///
    /// Fails with [`SessionError::Busy`] without touching the session when a
    /// round is already active.
    pub async fn run_round(
        &self,
        session: &Arc<Session<E::Cache>>,
        text: String,
        image: Option<String>,
        observer: Arc<dyn RoundObserver>,
    ) -> Result<Uuid, SessionError> {
        let mut state = session.state.lock().await;
        let Some(round) = state.begin_round() else {
            tracing::warn!("[ROUND {}] generation is already in progress", session.id);
            return Err(SessionError::Busy(session.id.clone()));
        };
        tracing::info!("[ROUND {}] starting round {}", session.id, round.id);
        observer.on_start();

        let has_image = image.is_some();
        state.conversation.push(Turn::user(text, image));

        let mut cache = match state.cache.take() {
            Some(cache) => cache,
            None => self.engine.new_cache(),
        };
        self.policy.enforce(&session.id, &mut cache);

        let (writer, stream) = token_sink(round.abort.clone());
        let hook = if has_image {
            let observer = observer.clone();
            let session_id = session.id.clone();
            FeaturesHook::new(move || {
                tracing::info!("[ROUND {}] image processing finished", session_id);
                observer.on_image_done();
            })
        } else {
            FeaturesHook::none()
        };

        let producer = self.spawn_producer(
            session.id.clone(),
            state.conversation.clone(),
            cache,
            writer,
            hook,
        );
        let consumer = tokio::spawn(forward(
            self.engine.clone(),
            session.clone(),
            round.clone(),
            stream,
            producer,
            observer,
        ));
        state.attach_consumer(round.id, consumer);

        Ok(round.id)
    }

    fn spawn_producer(
        &self,
        session_id: String,
        conversation: Vec<Turn>,
        mut cache: E::Cache,
        mut writer: TokenWriter,
        hook: FeaturesHook,
    ) -> JoinHandle<ProducerExit<E::Cache>> {
        let engine = self.engine.clone();
        let max_new_tokens = self.max_new_tokens;

        tokio::task::spawn_blocking(move || {
            let result = engine.generate(GenerationRequest {
                session_id: &session_id,
                conversation: &conversation,
                cache: &mut cache,
                sink: &mut writer,
                on_features_ready: hook,
                max_new_tokens,
            });
            writer.end();
            tracing::debug!(
                "[ROUND {}] producer finished after {} fragments",
                session_id,
                writer.delivered()
            );

            let outcome = match result {
                Ok(GenerationStop::Completed) => ProducerOutcome::Completed,
                Ok(GenerationStop::Interrupted) => {
                    tracing::info!("[ROUND {}] generation aborted", session_id);
                    ProducerOutcome::Interrupted
                }
                Err(e) => {
                    tracing::error!("[ROUND {}] engine fault: {:?}", session_id, e);
                    ProducerOutcome::Faulted
                }
            };
            ProducerExit { cache, outcome }
        })
    }
}

/// Drains the sink to the client, joins the producer and commits or discards
/// the answer.
async fn forward<E: GenerationEngine>(
    engine: Arc<E>,
    session: Arc<Session<E::Cache>>,
    round: RoundHandle,
    mut stream: TokenStream,
    producer: JoinHandle<ProducerExit<E::Cache>>,
    observer: Arc<dyn RoundObserver>,
) {
    let mut answer = String::new();
    let mut aborted = false;

    loop {
        match stream.next_or_done().await {
            StreamItem::Fragment(fragment) => {
                if let Err(e) = observer.on_token(&fragment) {
                    tracing::warn!("[ROUND {}] streamer loop interrupted: {}", session.id, e);
                    round.abort.trigger();
                    aborted = true;
                    break;
                }
                answer.push_str(&fragment);
            }
            StreamItem::EndOfStream => break,
            StreamItem::Aborted => {
                aborted = true;
                break;
            }
        }
    }
    stream.close();
    drop(stream);

    let cache = match producer.await {
        Ok(exit) => {
            if exit.outcome != ProducerOutcome::Completed {
                aborted = true;
            }
            Some(exit.cache)
        }
        Err(e) => {
            tracing::error!("[ROUND {}] producer task failed: {}", session.id, e);
            aborted = true;
            None
        }
    };

    // The slot stays claimed until `on_end` has gone out.
    let mut state = session.state.lock().await;
    if state.epoch == round.epoch {
        state.cache = Some(cache.unwrap_or_else(|| engine.new_cache()));
        if !aborted {
            state.conversation.push(Turn::assistant(answer));
        }
    } else {
        tracing::debug!("[ROUND {}] session was reset, discarding round {}", session.id, round.id);
        aborted = true;
    }

    tracing::info!("[ROUND {}] stream ended, aborted: {}", session.id, aborted);
    observer.on_end(aborted);
    state.finish_round(round.id);
}
