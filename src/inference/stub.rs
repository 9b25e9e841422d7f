//! Stub engine for running the server without a model
//!
//! Answers with a canned response streamed word by word. The cache only
//! tracks how many words have been ingested or emitted, which is enough to
//! exercise the context-window policy end to end.

use super::engine::{ContextCache, GenerationEngine, GenerationRequest, GenerationStop};
use crate::services::streaming::Delivery;
use crate::types::{EngineError, Role, Turn};
use std::time::Duration;

#[derive(Debug, Default, Clone)]
pub struct StubCache {
    seq_len: usize,
    turns_seen: usize,
}

impl ContextCache for StubCache {
    fn seq_len(&self) -> usize {
        self.seq_len
    }

    fn reset(&mut self) {
        self.seq_len = 0;
        self.turns_seen = 0;
    }
}

pub struct StubEngine {
    token_delay: Duration,
    image_delay: Duration,
}

impl StubEngine {
    pub fn new(token_delay: Duration) -> Self {
        tracing::info!("📦 Creating stub engine (no model loaded)");
        Self {
            token_delay,
            image_delay: token_delay * 5,
        }
    }

    fn mock_response(prompt: &str, has_image: bool) -> String {
        let subject = if has_image { "your image and question" } else { "your input" };
        format!(
            "This is a mock response to {}: '{}'. \
             The server is running in stub mode. \
             Once a model is attached, you'll see real generated responses here.",
            subject,
            prompt.chars().take(50).collect::<String>()
        )
    }
}

fn word_count(turn: &Turn) -> usize {
    turn.text().split_whitespace().count() + usize::from(turn.image().is_some())
}

impl GenerationEngine for StubEngine {
    type Cache = StubCache;

    fn new_cache(&self) -> StubCache {
        StubCache::default()
    }

    fn generate(&self, mut request: GenerationRequest<'_, StubCache>) -> Result<GenerationStop, EngineError> {
        let last = request
            .conversation
            .last()
            .filter(|turn| turn.role == Role::User)
            .ok_or_else(|| EngineError::InvalidInput("conversation must end with a user turn".into()))?;

        // Prefill whatever the cache has not seen yet
        let cache = &mut *request.cache;
        for turn in &request.conversation[cache.turns_seen.min(request.conversation.len())..] {
            cache.seq_len += word_count(turn);
        }
        cache.turns_seen = request.conversation.len();

        if last.image().is_some() {
            std::thread::sleep(self.image_delay);
            request.on_features_ready.fire();
        }

        let response = Self::mock_response(&last.text(), last.image().is_some());
        for word in response.split_whitespace().take(request.max_new_tokens) {
            std::thread::sleep(self.token_delay);
            match request.sink.put(format!("{} ", word)) {
                Delivery::Delivered => request.cache.seq_len += 1,
                Delivery::EndOfStream | Delivery::Aborted => return Ok(GenerationStop::Interrupted),
            }
        }

        // The answer becomes part of the context on the next turn
        request.cache.turns_seen += 1;
        Ok(GenerationStop::Completed)
    }
}
