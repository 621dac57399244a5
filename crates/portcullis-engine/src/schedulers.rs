//! Background maintenance loops started once at bootstrap, alongside the
//! per-credential auto-recovery tasks `portcullis_core::CredentialPool`
//! spawns for itself.

use std::sync::Arc;
use std::time::Duration;

use crate::proxy_engine::ProxyEngine;

const TOKEN_REFRESH_INTERVAL: Duration = Duration::from_secs(12 * 60 * 60);
const LOG_RETENTION_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);
const LOG_RETENTION_WINDOW: time::Duration = time::Duration::days(30);

/// Spawns the token-refresh and log-retention sweeps as detached tasks.
/// Returns immediately; the loops run for the lifetime of the process.
pub fn spawn(engine: Arc<ProxyEngine>) {
    tokio::spawn(token_refresh_loop(engine.clone()));
    tokio::spawn(log_retention_loop(engine));
}

async fn token_refresh_loop(engine: Arc<ProxyEngine>) {
    let mut ticker = tokio::time::interval(TOKEN_REFRESH_INTERVAL);
    ticker.tick().await; // first tick fires immediately; skip it, bootstrap just loaded everything
    loop {
        ticker.tick().await;
        tracing::info!("starting scheduled credential refresh sweep");
        engine.refresh_credentials_sweep().await;
    }
}

async fn log_retention_loop(engine: Arc<ProxyEngine>) {
    let mut ticker = tokio::time::interval(LOG_RETENTION_INTERVAL);
    ticker.tick().await;
    loop {
        ticker.tick().await;
        engine.run_log_retention_sweep(LOG_RETENTION_WINDOW).await;
    }
}
