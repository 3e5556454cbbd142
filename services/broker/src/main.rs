use anyhow::{Context, Result};
use realtime_voice_broker::routes::cors_layer;
use realtime_voice_broker::{AppState, Config, OpenAiSessionProvider, router};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::fmt::time::ChronoLocal;

#[tokio::main]
async fn main() -> Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load broker configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .init();

    // --- 3. Build the router ---
    let provider = Arc::new(OpenAiSessionProvider::new(
        config.openai_api_key.clone(),
        &config.openai_base_url,
    ));
    let app = router(
        AppState::new(provider),
        cors_layer(config.allowed_origins.as_deref()),
    );

    // --- 4. Serve ---
    let listener = tokio::net::TcpListener::bind(config.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address))?;
    info!("Realtime session broker listening on {}", config.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Realtime session broker stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
