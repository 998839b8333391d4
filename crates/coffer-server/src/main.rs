mod cleanup;
mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};

use coffer_api::AppStateInner;
use coffer_core::{Cipher, LocalBlobStore};
use coffer_db::Database;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "coffer=debug,coffer_api=debug,coffer_core=debug,tower_http=debug"
                    .into()
            }),
        )
        .init();

    let config = Config::from_env()?;

    // Init DB and storage
    let db = Arc::new(Database::open(&config.db_path)?);
    let blobs = Arc::new(LocalBlobStore::new(config.storage_dir.clone()).await?);

    let state = AppStateInner::new(
        db,
        blobs,
        Cipher::new(config.kdf),
        config.jwt_secret.clone(),
        config.token_ttl_hours,
        config.max_upload_bytes,
    );

    tokio::spawn(cleanup::run_prune_loop(
        state.clone(),
        config.prune_interval_secs,
    ));

    let app = coffer_api::router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Coffer listening on {}", addr);
    info!(
        "Uploads capped at {} MB, scrypt N=2^{}",
        config.max_upload_bytes / (1024 * 1024),
        config.kdf.log_n()
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
