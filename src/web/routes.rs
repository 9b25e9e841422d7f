use crate::state::AppState;
use axum::{routing::get, Router};

pub fn create_routes(state: AppState) -> Router {
    Router::new()
        // Session socket
        .route("/ws", get(super::handlers::socket::session_socket))

        // Health check
        .route("/health", get(super::handlers::health::health_check))

        .with_state(state)
}
