// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::{env, process, sync::Arc};

use okuru_server::{
    api::router,
    config::{Config, DEFAULT_LOG_FILTER, LOG_FORMAT_ENV},
    state::AppState,
    storage::{FsBlobStore, KeySpace, RedisStore},
    watcher::CleanupWatcher,
};
use tokio::{net::TcpListener, signal};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    init_logging();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => fatal("Invalid configuration", &e),
    };

    let store = match RedisStore::connect(&config.redis).await {
        Ok(store) => Arc::new(store),
        Err(e) => fatal("Cannot connect to Redis", &e),
    };

    let blobs = match FsBlobStore::new(&config.file_folder) {
        Ok(blobs) => Arc::new(blobs),
        Err(e) => fatal("Cannot prepare file folder", &e),
    };

    let shutdown = CancellationToken::new();
    let watcher = match CleanupWatcher::subscribe(
        &*store,
        blobs.clone(),
        KeySpace::new(config.key_prefix.clone()),
    )
    .await
    {
        Ok(watcher) => watcher,
        Err(e) => fatal("Cannot subscribe to expiry notifications", &e),
    };
    let watcher_handle = tokio::spawn(watcher.run(shutdown.clone()));

    let addr = config.bind_addr();
    let state = AppState::new(config, store, blobs);
    let app = router(state);

    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => fatal("Cannot bind listener", &e),
    };
    info!(addr = %addr, "Okuru server listening (docs at /docs)");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(error = %e, "HTTP server failed");
    }

    shutdown.cancel();
    let _ = watcher_handle.await;
    info!("Okuru server stopped");
}

fn fatal(context: &str, e: &dyn std::fmt::Display) -> ! {
    error!(error = %e, "{context}");
    process::exit(1);
}

/// `LOG_FORMAT=json` switches to JSON lines; anything else is human-readable.
fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let json = env::var(LOG_FORMAT_ENV)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let _ = if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_current_span(false)
            .with_target(false)
            .try_init()
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).try_init()
    };
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        if let Ok(mut stream) = signal(SignalKind::terminate()) {
            let _ = stream.recv().await;
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("Shutdown signal received");
}
