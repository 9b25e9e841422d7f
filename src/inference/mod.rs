//! Generation engine contract, cache policy and the bundled stub engine

mod cache;
mod engine;
pub mod stub;

pub use cache::{CachePolicy, DEFAULT_CACHE_THRESHOLD};
pub use engine::{ContextCache, FeaturesHook, GenerationEngine, GenerationRequest, GenerationStop};
pub use stub::{StubCache, StubEngine};
