// Core modules
pub mod config;
pub mod inference;
pub mod services;
pub mod state;
pub mod types;
pub mod web;

// Re-exports
pub use config::Config;
pub use services::ChatService;
pub use state::AppState;
