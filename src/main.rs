// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Pingback Receiver Service
//!
//! Serves the XML-RPC pingback endpoint for a blog and keeps the history
//! of accepted pingbacks.
//!
//! ## Endpoints
//!
//! - `POST /pingback`: XML-RPC `pingback.ping`
//! - `GET /pingbacks`: history, newest first
//! - `DELETE /pingbacks/:id`: remove one history entry
//! - `GET /health`, `GET /metrics`
//!
//! ## Configuration
//!
//! Configuration is loaded from `CONFIG_FILE` (JSON) and environment
//! variables, with `.env` honoured:
//!
//! - `BIND_ADDR`: Server bind address (default: 0.0.0.0:8080)
//! - `SITE_HOSTS`: Comma-separated hosts pingback targets must live on
//! - `SITE_ADDRESSES`: Comma-separated addresses the blog itself uses
//! - `POSTS_FILE`: JSON array of posts to accept pingbacks for
//! - `FETCH_TIMEOUT_SECS`: Source fetch timeout (default: 10)
//! - `MAX_RATE_RPM`: Max requests per minute per IP (default: 60)
//! - `MAX_RATE_PER_SOURCE`: Max requests per minute per source URL (default: 10)
//! - `COOLDOWN_MS`: Burst cooldown in milliseconds (default: 30000)

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use pingback_receiver::{
    config::Config,
    fetcher::HttpSourceFetcher,
    handlers::{router, AppState},
    metrics::PingbackMetrics,
    models::PingbackRecord,
    recorder::PingSuccessCallback,
    service::{Collaborators, PingbackService},
    store::{InMemoryPingbackStore, InMemoryPostCatalog},
};

/// Bumps the pinged post's pingback counter.
struct PingCountCallback {
    catalog: Arc<InMemoryPostCatalog>,
}

impl PingSuccessCallback for PingCountCallback {
    fn on_ping_success(&self, record: &PingbackRecord) -> anyhow::Result<()> {
        let count = self.catalog.increment_ping_count(record.target_post_id)?;
        info!(post_id = %record.target_post_id, count, "Post pingback count updated");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let config = Config::load()?;
    info!(
        bind_addr = %config.bind_addr,
        site_hosts = ?config.site.hosts,
        fetch_timeout_secs = config.fetcher.timeout_secs,
        rate_limit = config.rate_limit.enabled,
        max_rate_rpm = config.rate_limit.max_rate_rpm,
        max_rate_per_source = config.rate_limit.max_rate_per_source,
        "Starting pingback receiver"
    );

    let catalog = match &config.posts_file {
        Some(path) => Arc::new(InMemoryPostCatalog::from_json_file(path)?),
        None => {
            warn!("POSTS_FILE not set; every pingback target will be rejected");
            Arc::new(InMemoryPostCatalog::default())
        }
    };
    info!(posts = catalog.posts().len(), "Post catalog loaded");

    let metrics = Arc::new(
        PingbackMetrics::new().map_err(|e| anyhow::anyhow!("metrics registry: {e}"))?,
    );
    let collaborators = Collaborators {
        targets: catalog.clone(),
        store: Arc::new(InMemoryPingbackStore::new()),
        fetcher: Arc::new(HttpSourceFetcher::new(&config.fetcher)?),
    };

    let state = Arc::new(AppState {
        service: PingbackService::new(&config, collaborators, metrics),
        callback: Arc::new(PingCountCallback { catalog }),
        config: config.clone(),
    });

    // Spawn cleanup task
    let cleanup_state = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));
        loop {
            interval.tick().await;
            cleanup_state.service.cleanup().await;
        }
    });

    let app = router(state);

    // Start server
    let addr: SocketAddr = config.bind_addr.parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "Server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
