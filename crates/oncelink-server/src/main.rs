use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use oncelink_core::impls::{
    InMemoryObjectStore, InMemoryRecordStore, LocalObjectStore, SqliteRecordStore, TimeoutStore,
};
use oncelink_core::ports::{Clock, ObjectStore, RecordStore, SystemClock};
use oncelink_core::{LifecycleBuilder, SweepLoop};
use oncelink_server::cli::ServerArgs;
use oncelink_server::{AppState, logging, router};
use tokio::sync::watch;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = ServerArgs::parse();
    logging::init(args.log_format)?;

    let config = args.grant_config();
    tracing::info!(?config, "starting oncelink-server");

    // (A) ストア: 起動時に開いて、LifecycleManager に明示的に渡す
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store: Arc<dyn RecordStore> = match &args.database_url {
        Some(url) => {
            let sqlite = SqliteRecordStore::connect(url, &config, clock)
                .await
                .with_context(|| format!("opening record store {url}"))?;
            Arc::new(TimeoutStore::new(sqlite, config.store_timeout))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, grants are kept in memory and lost on restart");
            let records = InMemoryRecordStore::new(&config, clock);
            Arc::new(TimeoutStore::new(records, config.store_timeout))
        }
    };

    let objects: Arc<dyn ObjectStore> = match &args.media_dir {
        Some(dir) => {
            let local = LocalObjectStore::open(dir, args.base_url.as_str())
                .await
                .with_context(|| format!("opening media dir {}", dir.display()))?;
            tracing::info!(dir = %dir.display(), "storing uploads on disk");
            Arc::new(local)
        }
        None => {
            tracing::warn!("MEDIA_DIR not set, uploads are kept in memory");
            Arc::new(InMemoryObjectStore::new(args.base_url.as_str()))
        }
    };

    let manager = LifecycleBuilder::new(config.clone())
        .record_store(store)
        .object_store(objects)
        .build()?;

    // (B) sweeper とサーバーは同じ shutdown シグナルで止める
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = tokio::spawn(
        SweepLoop::new(manager.clone(), config.sweep_interval).run_until(stopped(shutdown_rx)),
    );

    let app = router(
        AppState::new(manager, &args.base_url, args.view_seconds),
        args.max_upload_bytes,
    );
    let addr = args.bind_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, base_url = %args.base_url, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            tracing::info!("shutdown requested");
            let _ = shutdown_tx.send(true);
        })
        .await
        .context("server error")?;

    sweeper.await.context("sweeper task panicked")?;
    Ok(())
}

async fn stopped(mut rx: watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
