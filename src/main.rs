use std::sync::Arc;

use anyhow::Result;

use medical_chatbot::app::build_chain;
use medical_chatbot::config::Settings;
use medical_chatbot::logging;
use medical_chatbot::server::{router, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let settings = Settings::load()?;
    tracing::debug!("Loaded settings: {:?}", settings);

    let chain = build_chain(&settings).await?;
    let state = Arc::new(AppState { chain });
    let app = router(state, &settings.static_dir);

    let listener = tokio::net::TcpListener::bind(settings.bind_addr()).await?;
    tracing::info!("Chat server listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
