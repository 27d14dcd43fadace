// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Token bucket rate limiting for pingback ingress.
//!
//! Two independent layers guard the endpoint: one bucket per caller IP and
//! one per source page. An IP that bursts past its expected rate is put in
//! cooldown. Any limit maps to pingback fault 49 (access denied).

use crate::config::RateLimitConfig;
use std::collections::HashMap;
use std::hash::Hash;
use std::net::IpAddr;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, warn};
use url::Url;

/// Window used for burst detection.
const BURST_WINDOW: Duration = Duration::from_secs(10);

/// Buckets untouched for this long are dropped by [`RateLimiter::cleanup`].
const STALE_AFTER: Duration = Duration::from_secs(300);

/// Result of a rate limit check.
#[derive(Debug, Clone)]
pub enum RateLimitResult {
    /// Request is allowed
    Allowed {
        /// Remaining requests in current window
        remaining: u32,
        /// Time until window resets
        reset_in: Duration,
    },
    /// Request is rate limited
    Limited {
        reason: RateLimitReason,
        /// Time until rate limit expires
        retry_after: Duration,
    },
}

impl RateLimitResult {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

/// Reason for rate limiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitReason {
    IpRateExceeded,
    SourceRateExceeded,
    BurstCooldown,
}

impl std::fmt::Display for RateLimitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IpRateExceeded => write!(f, "too many pingbacks from this address"),
            Self::SourceRateExceeded => write!(f, "too many pingbacks for this source"),
            Self::BurstCooldown => write!(f, "burst detected, in cooldown"),
        }
    }
}

#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    max_tokens: f64,
    /// Tokens per second
    refill_rate: f64,
    last_refill: Instant,
    /// Recent request timestamps for burst detection
    request_times: Vec<Instant>,
}

impl TokenBucket {
    fn new(max_rate_per_minute: u32) -> Self {
        let max_tokens = max_rate_per_minute as f64;
        Self {
            tokens: max_tokens,
            max_tokens,
            refill_rate: max_tokens / 60.0,
            last_refill: Instant::now(),
            request_times: Vec::new(),
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.max_tokens);
        self.last_refill = now;
    }

    /// Consume a token, or report how long until one is available.
    fn take(&mut self) -> Result<u32, Duration> {
        let now = Instant::now();
        self.refill(now);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            self.request_times.push(now);
            Ok(self.tokens.floor() as u32)
        } else if self.refill_rate > 0.0 {
            Err(Duration::from_secs_f64((1.0 - self.tokens) / self.refill_rate))
        } else {
            Err(Duration::from_secs(60))
        }
    }

    /// More than `multiplier` times the expected rate within the burst window.
    fn is_bursting(&mut self, multiplier: f32) -> bool {
        let now = Instant::now();
        self.request_times
            .retain(|t| now.duration_since(*t) < BURST_WINDOW);

        let expected = (self.max_tokens / 6.0).max(1.0);
        let threshold = (expected * multiplier as f64).max(3.0) as usize;
        self.request_times.len() > threshold
    }
}

/// A keyed set of token buckets sharing one capacity.
struct Buckets<K> {
    capacity: u32,
    map: RwLock<HashMap<K, TokenBucket>>,
}

impl<K: Hash + Eq> Buckets<K> {
    fn new(capacity: u32) -> Self {
        Self {
            capacity,
            map: RwLock::new(HashMap::new()),
        }
    }

    async fn take(&self, key: K) -> Result<u32, Duration> {
        let mut map = self.map.write().await;
        map.entry(key)
            .or_insert_with(|| TokenBucket::new(self.capacity))
            .take()
    }

    async fn drop_stale(&self, now: Instant) {
        self.map
            .write()
            .await
            .retain(|_, bucket| now.duration_since(bucket.last_refill) < STALE_AFTER);
    }
}

/// Thread-safe pingback rate limiter.
pub struct RateLimiter {
    config: RateLimitConfig,
    ips: Buckets<IpAddr>,
    sources: Buckets<String>,
    /// Cooldown deadline per IP
    cooldowns: RwLock<HashMap<IpAddr, Instant>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            ips: Buckets::new(config.max_rate_rpm),
            sources: Buckets::new(config.max_rate_per_source),
            cooldowns: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Check rate limit for a caller IP.
    pub async fn check_ip(&self, ip: IpAddr) -> RateLimitResult {
        let now = Instant::now();
        if let Some(until) = self.cooldowns.read().await.get(&ip) {
            if now < *until {
                let retry_after = until.duration_since(now);
                debug!(%ip, ?retry_after, "IP in cooldown");
                return RateLimitResult::Limited {
                    reason: RateLimitReason::BurstCooldown,
                    retry_after,
                };
            }
        }

        let mut buckets = self.ips.map.write().await;
        let bucket = buckets
            .entry(ip)
            .or_insert_with(|| TokenBucket::new(self.config.max_rate_rpm));

        if bucket.is_bursting(self.config.burst_threshold_multiplier) {
            let cooldown = self.config.cooldown_duration();
            warn!(%ip, ?cooldown, "Burst detected, applying cooldown");
            self.cooldowns.write().await.insert(ip, now + cooldown);
            return RateLimitResult::Limited {
                reason: RateLimitReason::BurstCooldown,
                retry_after: cooldown,
            };
        }

        match bucket.take() {
            Ok(remaining) => RateLimitResult::Allowed {
                remaining,
                reset_in: self.config.window_duration(),
            },
            Err(retry_after) => {
                debug!(%ip, ?retry_after, "IP rate limit exceeded");
                RateLimitResult::Limited {
                    reason: RateLimitReason::IpRateExceeded,
                    retry_after,
                }
            }
        }
    }

    /// Check rate limit for a source page.
    pub async fn check_source(&self, source: &Url) -> RateLimitResult {
        let key = source_key(source);
        match self.sources.take(key.clone()).await {
            Ok(remaining) => RateLimitResult::Allowed {
                remaining,
                reset_in: self.config.window_duration(),
            },
            Err(retry_after) => {
                debug!(source = %key, ?retry_after, "Source rate limit exceeded");
                RateLimitResult::Limited {
                    reason: RateLimitReason::SourceRateExceeded,
                    retry_after,
                }
            }
        }
    }

    /// Check both IP and source limits; the IP layer is consulted first.
    pub async fn check(&self, ip: IpAddr, source: Option<&Url>) -> RateLimitResult {
        let ip_result = self.check_ip(ip).await;
        if !ip_result.is_allowed() {
            return ip_result;
        }

        if let Some(source) = source {
            let source_result = self.check_source(source).await;
            if !source_result.is_allowed() {
                return source_result;
            }
        }

        ip_result
    }

    /// Drop stale buckets and expired cooldowns. Call periodically.
    pub async fn cleanup(&self) {
        let now = Instant::now();
        self.ips.drop_stale(now).await;
        self.sources.drop_stale(now).await;
        self.cooldowns.write().await.retain(|_, until| now < *until);
    }
}

/// Source pages are limited per page, ignoring query and fragment.
fn source_key(source: &Url) -> String {
    let mut key = source.clone();
    key.set_query(None);
    key.set_fragment(None);
    key.to_string()
}
