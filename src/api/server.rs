use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::{Router, routing::get, routing::post};
use tokio::net::TcpListener;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{info, warn};

use super::{
    services::{get_video, health, youtube_cookies},
    state::AppState,
};
use crate::cache::{INDEX_FILE, IdleSweeper};
use crate::config::Config;
use crate::extractor::YtDlp;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

const INDEX_PLACEHOLDER: &str = "<!DOCTYPE html>\n<html><head><title>vidcache</title></head>\
<body><p>vidcache is running.</p></body></html>\n";

/// Build the HTTP router; everything outside the API is served from the cache root
pub fn router(state: AppState) -> Router {
    let cache_root = state.store.root().to_path_buf();

    Router::new()
        .route("/api/getvideo", get(get_video))
        .route("/api/youtube-cookies", post(youtube_cookies))
        .route("/health", get(health))
        .fallback_service(ServeDir::new(cache_root))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub async fn run(config: Config) -> Result<(), AnyError> {
    let address = config.server.bind_addr;
    let evict_interval = Duration::from_secs(config.cache.evict_interval_minutes * 60);
    let evict_unused = Duration::from_secs(config.cache.evict_unused_minutes * 60);

    let ytdlp = YtDlp::from_config(&config.ytdl);
    ytdlp.cookies().warn_if_missing().await;

    info!(path = %config.cache.path.display(), "Opening cache");
    let state = AppState::new(config, Arc::new(ytdlp))
        .map_err(|e| format!("Failed to initialise services: {}", e))?;

    write_index(state.store.root()).await;

    tokio::spawn(state.downloader.clone().run());

    let sweeper = IdleSweeper::new(state.store.clone());
    if !sweeper.start(evict_interval, evict_unused) {
        info!("Idle eviction disabled");
    }

    let app = router(state);

    let listener = TcpListener::bind(address).await?;
    info!(%address, "vidcache listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.stop();
    Ok(())
}

/// Placeholder for `/`, never tracked by the cache index
async fn write_index(root: &Path) {
    let path = root.join(INDEX_FILE);
    if let Err(e) = tokio::fs::write(&path, INDEX_PLACEHOLDER).await {
        warn!(path = %path.display(), error = %e, "Failed to write index placeholder");
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm = signal(SignalKind::terminate())
            .expect("failed to install signal handler");
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
