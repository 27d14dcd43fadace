// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Source page fetching.
//!
//! The validator only sees the [`SourceFetcher`] trait; the service runs
//! with [`HttpSourceFetcher`], a `reqwest` client bounded by a timeout and
//! a body size cap. Redirects are followed by hand so every hop is checked
//! against the address policy.

use crate::config::FetcherConfig;
use async_trait::async_trait;
use reqwest::{header, redirect, Client, Response};
use std::net::IpAddr;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::{Host, Url};

/// Redirect hops followed before giving up.
const MAX_REDIRECTS: usize = 5;

/// A fetched source page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    /// HTTP status code
    pub status: u16,
    /// Response body, decoded lossily as UTF-8
    pub body: String,
    /// Where the page was served from after redirects, when that differs
    /// from the requested URL
    pub final_url: Option<Url>,
}

impl FetchedPage {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Fetch failures. All of them mean the source does not exist for us.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Response body exceeds {limit} bytes")]
    TooLarge { limit: usize },

    #[error("Destination not allowed: {0}")]
    Forbidden(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

/// Retrieves the page a pingback claims links to us.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<FetchedPage, FetchError>;
}

/// `reqwest`-backed source fetcher.
pub struct HttpSourceFetcher {
    client: Client,
    max_body_bytes: usize,
    allow_private_addresses: bool,
}

impl HttpSourceFetcher {
    /// Create a fetcher from configuration.
    pub fn new(config: &FetcherConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.timeout())
            .redirect(redirect::Policy::none())
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            max_body_bytes: config.max_body_bytes,
            allow_private_addresses: config.allow_private_addresses,
        })
    }

    async fn fetch_inner(&self, url: &Url) -> Result<FetchedPage, FetchError> {
        let mut current = url.clone();
        let mut hops = 0;

        loop {
            self.check_destination(&current).await?;

            let response = self
                .client
                .get(current.clone())
                .send()
                .await
                .map_err(|e| FetchError::Transport(e.to_string()))?;

            let location = response
                .status()
                .is_redirection()
                .then(|| response.headers().get(header::LOCATION))
                .flatten()
                .and_then(|v| v.to_str().ok())
                .map(str::to_owned);

            let Some(location) = location else {
                let final_url = (current != *url).then_some(current);
                return self.read_page(response, final_url).await;
            };

            if hops == MAX_REDIRECTS {
                return Err(FetchError::Transport(format!(
                    "more than {MAX_REDIRECTS} redirects"
                )));
            }
            let next = current
                .join(&location)
                .map_err(|e| FetchError::Transport(format!("bad redirect location: {e}")))?;
            debug!(from = %current, to = %next, "Following source redirect");
            current = next;
            hops += 1;
        }
    }

    async fn read_page(
        &self,
        mut response: Response,
        final_url: Option<Url>,
    ) -> Result<FetchedPage, FetchError> {
        let status = response.status().as_u16();
        if let Some(len) = response.content_length() {
            if len as usize > self.max_body_bytes {
                return Err(FetchError::TooLarge {
                    limit: self.max_body_bytes,
                });
            }
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?
        {
            if body.len() + chunk.len() > self.max_body_bytes {
                return Err(FetchError::TooLarge {
                    limit: self.max_body_bytes,
                });
            }
            body.extend_from_slice(&chunk);
        }

        Ok(FetchedPage {
            status,
            body: String::from_utf8_lossy(&body).into_owned(),
            final_url,
        })
    }

    /// Refuse non-web schemes and hosts resolving to non-public addresses.
    async fn check_destination(&self, url: &Url) -> Result<(), FetchError> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(FetchError::Forbidden(format!("scheme {}", url.scheme())));
        }
        if self.allow_private_addresses {
            return Ok(());
        }

        let addrs: Vec<IpAddr> = match url.host() {
            Some(Host::Ipv4(ip)) => vec![IpAddr::V4(ip)],
            Some(Host::Ipv6(ip)) => vec![IpAddr::V6(ip)],
            Some(Host::Domain(domain)) => {
                let port = url.port_or_known_default().unwrap_or(80);
                tokio::net::lookup_host((domain, port))
                    .await
                    .map_err(|e| FetchError::Transport(format!("resolving {domain}: {e}")))?
                    .map(|addr| addr.ip())
                    .collect()
            }
            None => return Err(FetchError::Forbidden("missing host".to_string())),
        };

        match addrs.into_iter().find(|ip| !is_public_address(*ip)) {
            Some(ip) => {
                debug!(source = %url, %ip, "Source resolves to a non-public address");
                Err(FetchError::Forbidden(format!("{ip} is not a public address")))
            }
            None => Ok(()),
        }
    }
}

#[async_trait]
impl SourceFetcher for HttpSourceFetcher {
    async fn fetch(&self, url: &Url, timeout: Duration) -> Result<FetchedPage, FetchError> {
        debug!(source = %url, ?timeout, "Fetching source page");
        match tokio::time::timeout(timeout, self.fetch_inner(url)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(timeout)),
        }
    }
}

/// Whether `ip` is globally routable.
pub fn is_public_address(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let [a, b, ..] = v4.octets();
            !(v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                || v4.is_documentation()
                || v4.is_unspecified()
                || v4.is_multicast()
                || a == 0
                || a >= 240
                // 100.64.0.0/10 carrier-grade NAT
                || (a == 100 && (64..128).contains(&b)))
        }
        IpAddr::V6(v6) => {
            if let Some(v4) = v6.to_ipv4_mapped() {
                return is_public_address(IpAddr::V4(v4));
            }
            let first = v6.segments()[0];
            !(v6.is_loopback()
                || v6.is_unspecified()
                || v6.is_multicast()
                // fc00::/7 unique local
                || (first & 0xfe00) == 0xfc00
                // fe80::/10 link-local
                || (first & 0xffc0) == 0xfe80)
        }
    }
}
