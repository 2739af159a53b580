//! Serve command handler.
//!
//! Runs the HTTP service until interrupted.

use clap::Args;
use kbchat_core::{config::AppConfig, AppError, AppResult};
use kbchat_server::{router, AppState};

/// Run the HTTP service
#[derive(Args, Debug)]
pub struct ServeCommand {
    /// Address to listen on (e.g. 0.0.0.0:7861)
    #[arg(short, long)]
    pub bind: Option<String>,
}

impl ServeCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::debug!("Serve options: {:?}", self);

        config.validate()?;
        let addr = config.bind_addr()?;
        let state = AppState::from_config(config)?;
        let app = router(state);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| AppError::Config(format!("Failed to bind {}: {}", addr, e)))?;

        tracing::info!("Listening on http://{}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
