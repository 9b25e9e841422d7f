//! Call contract between the streaming pipeline and a generation engine
//!
//! Engines are blocking: `generate` runs on a dedicated thread and pushes
//! fragments into the [`TokenWriter`] as they are decoded. A `put` that does
//! not come back as [`Delivery::Delivered`] means the round is over and the
//! engine should return [`GenerationStop::Interrupted`] without flushing any
//! further output.
//!
//! [`Delivery::Delivered`]: crate::services::streaming::Delivery::Delivered

use crate::services::streaming::TokenWriter;
use crate::types::{EngineError, Turn};

/// Per-session key/value context grown by the engine across turns.
pub trait ContextCache: Send + 'static {
    /// Logical sequence length currently held
    fn seq_len(&self) -> usize;

    fn reset(&mut self);
}

/// One-shot callback fired once image features have been computed.
pub struct FeaturesHook(Option<Box<dyn FnOnce() + Send>>);

impl FeaturesHook {
    pub fn new(callback: impl FnOnce() + Send + 'static) -> Self {
        Self(Some(Box::new(callback)))
    }

    pub fn none() -> Self {
        Self(None)
    }

    pub fn is_armed(&self) -> bool {
        self.0.is_some()
    }

    /// Runs the callback the first time only.
    pub fn fire(&mut self) {
        if let Some(callback) = self.0.take() {
            callback();
        }
    }
}

impl std::fmt::Debug for FeaturesHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("FeaturesHook").field(&self.is_armed()).finish()
    }
}

pub struct GenerationRequest<'a, C> {
    pub session_id: &'a str,
    pub conversation: &'a [Turn],
    pub cache: &'a mut C,
    pub sink: &'a mut TokenWriter,
    pub on_features_ready: FeaturesHook,
    pub max_new_tokens: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationStop {
    /// Ran to an end-of-sequence or the token budget
    Completed,
    /// The sink refused a fragment
    Interrupted,
}

pub trait GenerationEngine: Send + Sync + 'static {
    type Cache: ContextCache;

    fn new_cache(&self) -> Self::Cache;

    fn generate(
        &self,
        request: GenerationRequest<'_, Self::Cache>,
    ) -> Result<GenerationStop, EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_features_hook_fires_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut hook = FeaturesHook::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(hook.is_armed());
        hook.fire();
        hook.fire();

        assert!(!hook.is_armed());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_empty_hook_is_noop() {
        let mut hook = FeaturesHook::none();
        hook.fire();
        assert!(!hook.is_armed());
    }
}
