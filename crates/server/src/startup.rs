use std::sync::Arc;

use axum::Router;
use configs::AppConfig;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::errors::StartupError;
use crate::routes::{self, auth::BasicAuth, AppState};
use service::{file::state_store::FileStateStore, metrics};

fn build_cors() -> CorsLayer {
    CorsLayer::very_permissive()
}

/// Wire the store and the optional basic auth from configuration.
pub async fn build_app(cfg: &AppConfig) -> Result<Router, StartupError> {
    common::env::ensure_storage_dir(&cfg.storage.directory).await?;
    let store = Arc::new(FileStateStore::new(&cfg.storage.directory));
    info!(dir = %store.dir().display(), "state store ready");

    let mut state = AppState::new(store);
    if cfg.auth.enabled {
        info!(user = %cfg.auth.username, "basic auth enabled");
        state = state.with_auth(BasicAuth::new(cfg.auth_map()));
    }
    Ok(routes::build_router(state, build_cors()))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

/// Public entry: build the app and run the HTTP server until Ctrl+C
pub async fn run(cfg: AppConfig) -> Result<(), StartupError> {
    let app = build_app(&cfg).await?;

    if let Some(addr) = cfg.server.metrics_addr.as_deref() {
        common::admin_http::spawn_admin_server(addr, metrics::encode_metrics);
    }

    let addr = cfg.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| StartupError::Bind { addr: addr.clone(), source })?;
    info!(%addr, "tfstate backend listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| StartupError::Any(e.into()))?;
    info!("server stopped");
    Ok(())
}
