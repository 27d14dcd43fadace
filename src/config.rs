// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Configuration for the pingback receiver.
//!
//! Values come from an optional JSON file (`CONFIG_FILE`) and are then
//! overridden by environment variables. Rate limit defaults align with the
//! CURPS webmention policy, which pingback ingress shares.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Invalid value for {var}: {value}")]
    InvalidEnv { var: &'static str, value: String },
}

/// Configuration for the pingback receiver service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server bind address (default: 0.0.0.0:8080)
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Identity of the blog receiving pingbacks
    #[serde(default)]
    pub site: SiteConfig,

    /// Source page fetch configuration
    #[serde(default)]
    pub fetcher: FetcherConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Validation configuration
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,

    /// JSON file with the published posts served by the in-memory catalog
    #[serde(default)]
    pub posts_file: Option<PathBuf>,
}

/// The blog's own identity, used for target host and self-ping checks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Hosts that pingback targets must live on. Empty accepts any host.
    #[serde(default)]
    pub hosts: Vec<String>,

    /// Addresses the blog itself calls from
    #[serde(default)]
    pub own_addresses: Vec<IpAddr>,

    /// Honour the first `X-Forwarded-For` entry as the caller IP
    #[serde(default)]
    pub trust_forwarded_for: bool,
}

/// Source page fetch configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    /// Fetch timeout in seconds (default: 10)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Largest source page accepted, in bytes (default: 1 MiB)
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// User-Agent sent with source fetches
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Allow fetching sources that resolve to loopback, private or
    /// link-local addresses (default: false)
    #[serde(default)]
    pub allow_private_addresses: bool,
}

/// Rate limiting configuration matching CURPS ingress constraints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Enable rate limiting (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Maximum requests per minute per IP (default: 60)
    #[serde(default = "default_max_rate_rpm")]
    pub max_rate_rpm: u32,

    /// Maximum requests per minute per source URL (default: 10)
    #[serde(default = "default_max_rate_per_source")]
    pub max_rate_per_source: u32,

    /// Cooldown period after burst detection in milliseconds (default: 30000)
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_on_burst_ms: u64,

    /// Burst threshold multiplier (default: 3x normal rate in 10s window)
    #[serde(default = "default_burst_threshold")]
    pub burst_threshold_multiplier: f32,

    /// Time window for rate calculation in seconds (default: 60)
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

/// Validation configuration for pingback requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Accepted content types (default: text/xml, application/xml)
    #[serde(default = "default_content_types")]
    pub require_content_type: Vec<String>,

    /// Block self-ping from the blog's own addresses (default: true)
    #[serde(default = "default_true")]
    pub block_self_ping: bool,

    /// Answer duplicates with fault 48 instead of success (default: false)
    #[serde(default)]
    pub report_duplicates_as_fault: bool,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable Prometheus metrics endpoint (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics endpoint path (default: /metrics)
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

// Default value functions
fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

fn default_user_agent() -> String {
    concat!("pingback-receiver/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_max_rate_rpm() -> u32 {
    60 // Matches CURPS policy
}

fn default_max_rate_per_source() -> u32 {
    10 // Matches CURPS policy
}

fn default_cooldown_ms() -> u64 {
    30000 // 30 seconds, matches CURPS policy
}

fn default_burst_threshold() -> f32 {
    3.0
}

fn default_window_secs() -> u64 {
    60
}

fn default_content_types() -> Vec<String> {
    vec!["text/xml".to_string(), "application/xml".to_string()]
}

fn default_true() -> bool {
    true
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            site: SiteConfig::default(),
            fetcher: FetcherConfig::default(),
            rate_limit: RateLimitConfig::default(),
            validation: ValidationConfig::default(),
            metrics: MetricsConfig::default(),
            posts_file: None,
        }
    }
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_body_bytes: default_max_body_bytes(),
            user_agent: default_user_agent(),
            allow_private_addresses: false,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            max_rate_rpm: default_max_rate_rpm(),
            max_rate_per_source: default_max_rate_per_source(),
            cooldown_on_burst_ms: default_cooldown_ms(),
            burst_threshold_multiplier: default_burst_threshold(),
            window_secs: default_window_secs(),
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            require_content_type: default_content_types(),
            block_self_ping: default_true(),
            report_duplicates_as_fault: false,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            path: default_metrics_path(),
        }
    }
}

impl RateLimitConfig {
    /// Get the cooldown duration
    pub fn cooldown_duration(&self) -> Duration {
        Duration::from_millis(self.cooldown_on_burst_ms)
    }

    /// Get the rate window duration
    pub fn window_duration(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

impl FetcherConfig {
    /// Get the fetch timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load configuration from `CONFIG_FILE` (if set) and environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let base = match std::env::var("CONFIG_FILE") {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        base.with_env_overrides(|var| std::env::var(var).ok())
    }

    /// Apply overrides from a variable lookup.
    ///
    /// Taking the lookup as a closure keeps this testable without touching
    /// the process environment.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("BIND_ADDR") {
            self.bind_addr = v;
        }
        if let Some(v) = lookup("SITE_HOSTS") {
            self.site.hosts = split_list(&v).map(str::to_lowercase).collect();
        }
        if let Some(v) = lookup("SITE_ADDRESSES") {
            self.site.own_addresses = split_list(&v)
                .map(|s| {
                    s.parse().map_err(|_| ConfigError::InvalidEnv {
                        var: "SITE_ADDRESSES",
                        value: s.to_string(),
                    })
                })
                .collect::<Result<_, _>>()?;
        }
        if let Some(v) = lookup("TRUST_FORWARDED_FOR") {
            self.site.trust_forwarded_for = parse_env("TRUST_FORWARDED_FOR", &v)?;
        }
        if let Some(v) = lookup("POSTS_FILE") {
            self.posts_file = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("FETCH_TIMEOUT_SECS") {
            self.fetcher.timeout_secs = parse_env("FETCH_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("MAX_RATE_RPM") {
            self.rate_limit.max_rate_rpm = parse_env("MAX_RATE_RPM", &v)?;
        }
        if let Some(v) = lookup("MAX_RATE_PER_SOURCE") {
            self.rate_limit.max_rate_per_source = parse_env("MAX_RATE_PER_SOURCE", &v)?;
        }
        if let Some(v) = lookup("COOLDOWN_MS") {
            self.rate_limit.cooldown_on_burst_ms = parse_env("COOLDOWN_MS", &v)?;
        }
        Ok(self)
    }
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(',').map(str::trim).filter(|s| !s.is_empty())
}

fn parse_env<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        var,
        value: value.to_string(),
    })
}
