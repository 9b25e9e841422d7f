//! Context-window guard applied to a session cache before each round

use super::engine::ContextCache;

/// Default safety margin below the model context window.
pub const DEFAULT_CACHE_THRESHOLD: usize = 3900;

#[derive(Debug, Clone, Copy)]
pub struct CachePolicy {
    threshold: usize,
}

impl CachePolicy {
    pub fn new(threshold: usize) -> Self {
        Self { threshold }
    }

    /// Resets `cache` when it has grown past the threshold.
    ///
    /// Returns the length it had before the reset. Only the cache is touched;
    /// the conversation is re-ingested by the engine on the next call.
    pub fn enforce<C: ContextCache>(&self, session_id: &str, cache: &mut C) -> Option<usize> {
        let len = cache.seq_len();
        if len <= self.threshold {
            return None;
        }

        tracing::warn!(
            "[CACHE {}] size exceeded, resetting ({} > {})",
            session_id,
            len,
            self.threshold
        );
        cache.reset();
        Some(len)
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedCache(usize);

    impl ContextCache for FixedCache {
        fn seq_len(&self) -> usize {
            self.0
        }

        fn reset(&mut self) {
            self.0 = 0;
        }
    }

    #[test]
    fn test_cache_over_threshold_is_reset() {
        let policy = CachePolicy::default();
        let mut cache = FixedCache(3901);

        assert_eq!(policy.enforce("s", &mut cache), Some(3901));
        assert_eq!(cache.seq_len(), 0);
    }

    #[test]
    fn test_cache_at_threshold_is_kept() {
        let policy = CachePolicy::new(3900);
        let mut cache = FixedCache(3900);

        assert_eq!(policy.enforce("s", &mut cache), None);
        assert_eq!(cache.seq_len(), 3900);
    }
}
