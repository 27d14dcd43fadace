// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Pingback validator.
//!
//! Applies the verification rules to a decoded pingback, in order, with
//! the first failure winning:
//! - Self-ping blocking (same host, called from the blog's own address)
//! - Target host and target post resolution
//! - Duplicate detection
//! - Source fetch and link verification
//! - Source title extraction

use crate::config::{SiteConfig, ValidationConfig};
use crate::error::{PingbackError, Result};
use crate::fetcher::SourceFetcher;
use crate::links;
use crate::metrics::PingbackMetrics;
use crate::models::{PingbackRequest, Post};
use crate::store::{PingbackStore, TargetLookup};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use url::Url;

/// A pingback that passed every check and can be recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedPingback {
    /// Normalized source URI
    pub source: Url,
    /// Normalized target URI
    pub target: Url,
    /// Source page title, possibly empty
    pub source_title: String,
    /// The pinged post
    pub post: Post,
}

/// Result of validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    /// Pingback is valid and new
    Accepted(ValidatedPingback),
    /// Pingback for this (source, target) pair is already stored
    Duplicate,
}

/// Pingback validator.
pub struct PingbackValidator {
    config: ValidationConfig,
    site: SiteConfig,
    fetch_timeout: Duration,
    targets: Arc<dyn TargetLookup>,
    store: Arc<dyn PingbackStore>,
    fetcher: Arc<dyn SourceFetcher>,
    metrics: Arc<PingbackMetrics>,
}

impl PingbackValidator {
    /// Create a new validator over the given collaborators.
    pub fn new(
        config: ValidationConfig,
        site: SiteConfig,
        fetch_timeout: Duration,
        targets: Arc<dyn TargetLookup>,
        store: Arc<dyn PingbackStore>,
        fetcher: Arc<dyn SourceFetcher>,
        metrics: Arc<PingbackMetrics>,
    ) -> Self {
        Self {
            config,
            site,
            fetch_timeout,
            targets,
            store,
            fetcher,
            metrics,
        }
    }

    /// Reject pings the blog sends to itself.
    pub fn check_self_ping(&self, request: &PingbackRequest, caller_ip: IpAddr) -> Result<()> {
        if !self.config.block_self_ping {
            return Ok(());
        }

        if let (Some(source_host), Some(target_host)) =
            (request.source.host_str(), request.target.host_str())
        {
            if source_host.eq_ignore_ascii_case(target_host)
                && self.site.own_addresses.contains(&caller_ip)
            {
                debug!(host = %source_host, %caller_ip, "Self-ping detected");
                return Err(PingbackError::SelfPing {
                    host: source_host.to_lowercase(),
                });
            }
        }

        Ok(())
    }

    /// Reject targets that do not live on this blog.
    pub fn check_target_host(&self, target: &Url) -> Result<()> {
        if self.site.hosts.is_empty() {
            return Ok(());
        }

        let host = target.host_str().unwrap_or_default();
        if self.site.hosts.iter().any(|h| h.eq_ignore_ascii_case(host)) {
            Ok(())
        } else {
            debug!(target = %target, "Target host is not served by this blog");
            Err(PingbackError::TargetNotPingable)
        }
    }

    /// Resolve the target URI to a live post that accepts pingbacks.
    pub async fn resolve_target(&self, target: &Url) -> Result<Post> {
        let path = target.path().trim_end_matches('/');
        let post = self
            .targets
            .find_published_post_by_slug_or_path(path)
            .await?
            .filter(Post::is_live)
            .ok_or(PingbackError::TargetNotExist)?;

        if !post.pingback_enabled {
            debug!(post_id = %post.id, "Pingbacks disabled for post");
            return Err(PingbackError::TargetNotPingable);
        }

        Ok(post)
    }

    /// Whether this (source, target) pair is already recorded.
    pub async fn is_duplicate(&self, source: &Url, target: &Url) -> Result<bool> {
        let existing = self
            .store
            .find_by_pair(source.as_str(), target.as_str())
            .await?;
        Ok(existing.is_some())
    }

    /// Fetch the source and confirm it links to the target.
    ///
    /// Returns the source page title.
    pub async fn verify_source(&self, source: &Url, target: &Url) -> Result<String> {
        let started = Instant::now();
        let fetched = self.fetcher.fetch(source, self.fetch_timeout).await;
        self.metrics.observe_fetch(started.elapsed().as_secs_f64());

        let page = fetched.map_err(|e| {
            debug!(source = %source, error = %e, "Source fetch failed");
            PingbackError::SourceNotExist(e.to_string())
        })?;

        if !page.is_success() {
            debug!(source = %source, status = page.status, "Source returned non-success status");
            return Err(PingbackError::SourceNotExist(format!(
                "status {}",
                page.status
            )));
        }

        // Relative hrefs resolve against where the page was actually served
        let base = page.final_url.as_ref().unwrap_or(source);
        if !links::contains_link(&page.body, base, target) {
            debug!(source = %source, target = %target, "Source does not link to target");
            return Err(PingbackError::SourceNotContainTargetUri);
        }

        Ok(links::extract_title(&page.body))
    }

    /// Validate a complete pingback.
    pub async fn validate(
        &self,
        request: &PingbackRequest,
        caller_ip: IpAddr,
    ) -> Result<ValidationResult> {
        let source = links::normalize(&request.source);
        let target = links::normalize(&request.target);

        self.check_self_ping(request, caller_ip)?;
        self.check_target_host(&target)?;
        let post = self.resolve_target(&target).await?;
        debug!(post_id = %post.id, title = %post.title, "Target post resolved");

        if self.is_duplicate(&source, &target).await? {
            if self.config.report_duplicates_as_fault {
                return Err(PingbackError::AlreadyRegistered);
            }
            info!(source = %source, target = %target, "Pingback already registered");
            return Ok(ValidationResult::Duplicate);
        }

        let source_title = self.verify_source(&source, &target).await?;

        debug!(source = %source, target = %target, "Pingback valid");
        Ok(ValidationResult::Accepted(ValidatedPingback {
            source,
            target,
            source_title,
            post,
        }))
    }
}
