use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sessionwatch_backend::{
    config::Config, router::build_router, services::create_activity_service, state::AppState,
};

fn mask_secret(s: &str) -> String {
    if s.is_empty() {
        return "<empty>".into();
    }
    let prefix = s.chars().take(4).collect::<String>();
    format!("{}*** (len={})", prefix, s.len())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sessionwatch_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::load()?;
    tracing::info!(
        bind_addr = %config.bind_addr,
        backend = %config.activity.backend,
        session_types = ?config.activity.durations,
        redis_prefix = %config.activity.redis_prefix,
        redis_interval = ?config.activity.interval,
        redis_url = %mask_secret(config.redis_url.as_deref().unwrap_or_default()),
        "Loaded configuration from environment/.env"
    );

    let activity = create_activity_service(&config).await?;
    activity.start().await?;

    let addr: SocketAddr = config.bind_addr.parse()?;
    let app = build_router(AppState::new(activity.clone(), config));

    tracing::info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutting down activity tracking");
    activity.stop().await?;

    Ok(())
}
