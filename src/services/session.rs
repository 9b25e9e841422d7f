use crate::inference::{ContextCache, GenerationEngine};
use crate::services::history::HistoryStore;
use crate::services::streaming::AbortSwitch;
use crate::types::{SessionError, Turn};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Join handle of a round's forwarding task, awaitable from several places.
pub(crate) type RoundJoin = Shared<BoxFuture<'static, ()>>;

pub struct SessionManager<E: GenerationEngine> {
    engine: Arc<E>,
    history: HistoryStore,
    system_prompt: Arc<str>,
    sessions: RwLock<HashMap<String, Arc<Session<E::Cache>>>>,
}

pub struct Session<C> {
    pub id: String,
    pub(crate) state: Mutex<SessionState<C>>,
}

pub(crate) struct SessionState<C> {
    pub conversation: Vec<Turn>,
    /// `None` while lent to a round's producer
    pub cache: Option<C>,
    pub active: Option<ActiveRound>,
    /// Bumped on every reset; a round only writes back into the epoch it
    /// started in.
    pub epoch: u64,
}

pub(crate) struct ActiveRound {
    pub id: Uuid,
    pub abort: AbortSwitch,
    pub consumer: Option<RoundJoin>,
}

/// Identity of a round handed to its actors
#[derive(Debug, Clone)]
pub struct RoundHandle {
    pub id: Uuid,
    pub abort: AbortSwitch,
    pub epoch: u64,
}

/// Point-in-time view of a session, for status reporting and tests
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub conversation: Vec<Turn>,
    pub cache_len: usize,
    pub round_active: bool,
}

impl<C: ContextCache> SessionState<C> {
    fn fresh(system_prompt: &str, cache: C, epoch: u64) -> Self {
        Self {
            conversation: vec![Turn::system(system_prompt)],
            cache: Some(cache),
            active: None,
            epoch,
        }
    }

    /// Check-and-set of the active round slot.
    pub fn begin_round(&mut self) -> Option<RoundHandle> {
        if self.active.is_some() {
            return None;
        }
        let handle = RoundHandle {
            id: Uuid::now_v7(),
            abort: AbortSwitch::new(),
            epoch: self.epoch,
        };
        self.active = Some(ActiveRound {
            id: handle.id,
            abort: handle.abort.clone(),
            consumer: None,
        });
        Some(handle)
    }

    pub fn attach_consumer(&mut self, round_id: Uuid, consumer: JoinHandle<()>) {
        let join = consumer.map(|_| ()).boxed().shared();
        match self.active.as_mut() {
            Some(active) if active.id == round_id => active.consumer = Some(join),
            _ => {}
        }
    }

    /// Clears the slot if it still belongs to `round_id`.
    pub fn finish_round(&mut self, round_id: Uuid) {
        if self.active.as_ref().map(|a| a.id) == Some(round_id) {
            self.active = None;
        }
    }

    fn cache_len(&self) -> usize {
        self.cache.as_ref().map(|c| c.seq_len()).unwrap_or(0)
    }
}

impl<C> Session<C> {
    /// Join handle of the running round, if any
    pub(crate) async fn round_join(&self) -> Option<RoundJoin> {
        let state = self.state.lock().await;
        state.active.as_ref().and_then(|a| a.consumer.clone())
    }
}

impl<E: GenerationEngine> SessionManager<E> {
    pub fn new(engine: Arc<E>, history: HistoryStore, system_prompt: impl Into<Arc<str>>) -> Self {
        Self {
            engine,
            history,
            system_prompt: system_prompt.into(),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub async fn get(&self, id: &str) -> Option<Arc<Session<E::Cache>>> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Returns the session, creating it with a fresh conversation and a clean
    /// history area if it does not exist yet.
    pub async fn get_or_create(&self, id: &str) -> Result<Arc<Session<E::Cache>>, SessionError> {
        if let Some(session) = self.get(id).await {
            return Ok(session);
        }

        let (session, created) = {
            let mut sessions = self.sessions.write().await;
            match sessions.get(id) {
                Some(existing) => (existing.clone(), false),
                None => {
                    let session = Arc::new(Session {
                        id: id.to_string(),
                        state: Mutex::new(SessionState::fresh(
                            &self.system_prompt,
                            self.engine.new_cache(),
                            0,
                        )),
                    });
                    sessions.insert(id.to_string(), session.clone());
                    (session, true)
                }
            }
        };

        if created {
            self.history.prepare(id).await?;
            tracing::info!("[SESSION {}] created", id);
        }
        Ok(session)
    }

    /// Reinitializes conversation and cache and wipes the history area.
    ///
    /// Callers abort and await any running round first; a round that still
    /// finishes afterwards is discarded instead of written back.
    pub async fn reset(&self, id: &str) -> Result<(), SessionError> {
        let session = self.get_or_create(id).await?;
        {
            let mut state = session.state.lock().await;
            if state.active.is_some() {
                tracing::warn!("[SESSION {}] reset while a round is still active", id);
            }
            let epoch = state.epoch + 1;
            let active = state.active.take();
            *state = SessionState::fresh(&self.system_prompt, self.engine.new_cache(), epoch);
            state.active = active;
        }
        self.history.prepare(id).await?;
        tracing::info!("[SESSION {}] cache and history have been reset", id);
        Ok(())
    }

    /// Aborts any running round, waits for it, and drops the session and its
    /// history area. Idempotent.
    pub async fn destroy(&self, id: &str) -> Result<(), SessionError> {
        let removed = self.sessions.write().await.remove(id);
        if let Some(session) = removed {
            self.abort_session_round(&session).await;
            if let Some(join) = session.round_join().await {
                join.await;
            }
        }
        self.history.remove(id).await?;
        tracing::info!("[SESSION {}] destroyed", id);
        Ok(())
    }

    /// Sets the abort switch of the active round. Returns whether a round was
    /// running.
    pub async fn abort_round(&self, id: &str) -> bool {
        match self.get(id).await {
            Some(session) => self.abort_session_round(&session).await,
            None => {
                tracing::warn!("[SESSION {}] no active generation to abort", id);
                false
            }
        }
    }

    async fn abort_session_round(&self, session: &Session<E::Cache>) -> bool {
        let state = session.state.lock().await;
        match state.active.as_ref() {
            Some(active) => {
                if active.abort.trigger() {
                    tracing::info!("[SESSION {}] aborting round {}", session.id, active.id);
                }
                true
            }
            None => {
                tracing::warn!("[SESSION {}] no active generation to abort", session.id);
                false
            }
        }
    }

    /// Resolves once the session has no running round.
    pub async fn wait_idle(&self, id: &str) {
        if let Some(session) = self.get(id).await {
            if let Some(join) = session.round_join().await {
                join.await;
            }
        }
    }

    pub async fn snapshot(&self, id: &str) -> Option<SessionSnapshot> {
        let session = self.get(id).await?;
        let state = session.state.lock().await;
        Some(SessionSnapshot {
            conversation: state.conversation.clone(),
            cache_len: state.cache_len(),
            round_active: state.active.is_some(),
        })
    }

    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
