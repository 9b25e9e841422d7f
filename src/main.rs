use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vlchat_server::{config::Config, state::AppState, web};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vlchat_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("🚀 Starting vlchat server");

    // Load configuration
    let config = Config::from_env()?;
    tokio::fs::create_dir_all(&config.history_dir).await?;

    // Create application state
    let app_state = AppState::new(config);

    // Start web server
    web::start_server(app_state).await?;

    Ok(())
}
