// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! An in-process blog with fake source pages.

use async_trait::async_trait;
use pingback_receiver::{
    config::{Config, RateLimitConfig},
    fetcher::{FetchError, FetchedPage, SourceFetcher},
    metrics::PingbackMetrics,
    models::Post,
    handlers::{router, AppState},
    store::{InMemoryPingbackStore, InMemoryPostCatalog},
    Collaborators, NoopCallback, PingbackService,
};
use axum::Router;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

pub const BLOG_HOST: &str = "blog.example";
pub const HELLO_WORLD: &str = "https://blog.example/posts/hello-world";

/// Address the blog itself sends requests from.
pub fn blog_ip() -> IpAddr {
    "203.0.113.7".parse().unwrap()
}

/// An ordinary remote caller.
pub fn remote_ip() -> IpAddr {
    "198.51.100.20".parse().unwrap()
}

/// Source pages keyed by URL, served after an optional delay.
#[derive(Default)]
pub struct FakeWeb {
    pages: HashMap<String, FetchedPage>,
    delay: Duration,
    fetches: AtomicUsize,
}

impl FakeWeb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, status: u16, body: impl Into<String>) -> Self {
        self.pages.insert(
            url.to_string(),
            FetchedPage {
                status,
                body: body.into(),
                final_url: None,
            },
        );
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceFetcher for FakeWeb {
    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<FetchedPage, FetchError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);

        if self.delay > timeout {
            tokio::time::sleep(timeout).await;
            return Err(FetchError::Timeout(timeout));
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.pages
            .get(url.as_str())
            .cloned()
            .ok_or_else(|| FetchError::Transport(format!("connection refused: {url}")))
    }
}

/// HTML page linking to `target`.
pub fn page_linking_to(title: &str, target: &str) -> String {
    format!(
        "<html><head><title>{title}</title></head><body>\
         <p>Read <a href=\"{target}\">this</a>.</p></body></html>"
    )
}

/// Configuration for a blog served at [`BLOG_HOST`], rate limiting off.
pub fn blog_config() -> Config {
    let mut config = Config::default();
    config.site.hosts = vec![BLOG_HOST.to_string()];
    config.site.own_addresses = vec![blog_ip()];
    config.fetcher.timeout_secs = 1;
    config.rate_limit = RateLimitConfig {
        enabled: false,
        ..Default::default()
    };
    config
}

/// A blog with one post, "Hello World", and a running service.
pub struct TestBlog {
    pub config: Config,
    pub service: PingbackService,
    pub store: Arc<InMemoryPingbackStore>,
    pub catalog: Arc<InMemoryPostCatalog>,
    pub web: Arc<FakeWeb>,
    pub metrics: Arc<PingbackMetrics>,
    pub hello_world: Post,
}

impl TestBlog {
    pub fn new(web: FakeWeb) -> Self {
        Self::with_config(blog_config(), web)
    }

    pub fn with_config(config: Config, web: FakeWeb) -> Self {
        Self::with_posts(config, web, Vec::new())
    }

    /// Like [`TestBlog::with_config`], with extra posts next to "Hello World".
    pub fn with_posts(config: Config, web: FakeWeb, extra: Vec<Post>) -> Self {
        let hello_world = Post::new("Hello World", "hello-world");
        let mut posts = vec![hello_world.clone()];
        posts.extend(extra);
        let catalog = Arc::new(InMemoryPostCatalog::new(posts));
        let store = Arc::new(InMemoryPingbackStore::new());
        let web = Arc::new(web);
        let metrics = Arc::new(PingbackMetrics::new().unwrap());

        let service = PingbackService::new(
            &config,
            Collaborators {
                targets: catalog.clone(),
                store: store.clone(),
                fetcher: web.clone(),
            },
            metrics.clone(),
        );

        Self {
            config,
            service,
            store,
            catalog,
            web,
            metrics,
            hello_world,
        }
    }

    /// HTTP router over this blog, with a no-op success callback.
    pub fn into_router(self) -> Router {
        router(Arc::new(AppState {
            service: self.service,
            callback: Arc::new(NoopCallback),
            config: self.config,
        }))
    }
}
