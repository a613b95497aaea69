//! # TechSpace API Binary
//!
//! The entry point that assembles the application: configuration,
//! document store, identity provider, services, and the HTTP surface.

use std::sync::Arc;

use anyhow::Context;
use api_adapters::{router, AppState};
use auth_adapters::{RestIdentityProvider, StaticIdentityProvider};
use configs::AppConfig;
use domains::IdentityProvider;
use services::RateLimiter;
use storage_adapters::MemoryStore;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::load().context("failed to load configuration")?;

    let store = Arc::new(MemoryStore::new());

    let identity: Arc<dyn IdentityProvider> = match &config.identity_api_key {
        Some(key) => Arc::new(
            RestIdentityProvider::new(key.clone())
                .context("failed to build identity client")?,
        ),
        None => {
            warn!("IDENTITY_API_KEY not set, using the in-process identity provider");
            Arc::new(StaticIdentityProvider::new())
        }
    };

    let limiter = Arc::new(RateLimiter::new(config.rate_limit_per_minute));

    let state = AppState::new(store, identity, limiter);
    let app = router(state, &config.origins());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!("techspace-api listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            warn!(%error, "failed to install ctrl-c handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => warn!(%error, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received ctrl-c"),
        _ = terminate => info!("received SIGTERM"),
    }
}
