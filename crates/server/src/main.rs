//! crawlable gateway entry point.
//!
//! Boots the escaped-fragment prerender gateway: loads configuration, opens
//! the render cache, and serves HTTP with the interception middleware
//! mounted over a pass-through fallback. Logging goes to stderr as JSON.

use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use axum::http::StatusCode;
use crawlable_core::{AppConfig, CacheStore, SqliteStore};
use crawlable_render::{HeadlessPipeline, Renderer};
use tracing_subscriber::EnvFilter;

mod error;
mod middleware;

use middleware::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = Arc::new(AppConfig::load()?);

    tracing::info!(
        bind_addr = %config.bind_addr,
        dedicated_mode = config.dedicated_mode,
        css_selector = %config.css_selector,
        "starting crawlable gateway"
    );

    let cache: Arc<dyn CacheStore> = Arc::new(SqliteStore::open(&config.db_path).await?);
    let renderer: Arc<dyn Renderer> = Arc::new(HeadlessPipeline::new(&config));

    let state = AppState { config: config.clone(), cache, renderer };

    let app = Router::new()
        .fallback(not_prerendered)
        .layer(axum::middleware::from_fn_with_state(state, middleware::escaped_fragment));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Requests without the escaped-fragment marker have no content here; in a
/// full deployment the rest of the serving stack sits behind the gateway.
async fn not_prerendered() -> StatusCode {
    StatusCode::NOT_FOUND
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
    }
    tracing::info!("shutting down");
}
