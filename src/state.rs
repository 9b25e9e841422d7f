use crate::config::Config;
use crate::inference::{CachePolicy, StubEngine};
use crate::services::{ChatService, HistoryStore, SessionManager, StreamingCoordinator};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Engine served by the binary
pub type Engine = StubEngine;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub chat: Arc<ChatService<Engine>>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        tracing::info!("[STATE] Initializing AppState...");
        tracing::info!("[STATE]   History dir: {}", config.history_dir.display());
        tracing::info!("[STATE]   Cache threshold: {}", config.cache_threshold);

        let engine = Arc::new(StubEngine::new(Duration::from_millis(config.stub_token_delay_ms)));
        let sessions = SessionManager::new(
            engine.clone(),
            HistoryStore::new(&config.history_dir),
            config.load_system_prompt(),
        );
        let coordinator = StreamingCoordinator::new(
            engine,
            CachePolicy::new(config.cache_threshold),
            config.max_new_tokens,
        );

        Self {
            config: Arc::new(config),
            chat: Arc::new(ChatService::new(sessions, coordinator)),
            started_at: Instant::now(),
        }
    }
}
