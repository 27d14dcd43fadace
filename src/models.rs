// SPDX-License-Identifier: PMPL-1.0-or-later
//! Data models for pingback requests, records and responses

use crate::error::{FaultCode, PingbackError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

/// A decoded `pingback.ping` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingbackRequest {
    /// Page claiming to contain the backlink
    pub source: Url,
    /// Local post being linked to
    pub target: Url,
}

/// An accepted pingback, as handed to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingbackRecord {
    /// Unique record identifier
    pub id: Uuid,
    /// Source page URI
    pub source_uri: String,
    /// Target post URI
    pub target_uri: String,
    /// Title of the source page (may be empty)
    pub source_title: String,
    /// Address the pingback was received from
    pub source_ip: String,
    /// Reception timestamp
    pub ping_time_utc: DateTime<Utc>,
    /// Title of the pinged post
    pub target_post_title: String,
    /// Identifier of the pinged post
    pub target_post_id: Uuid,
}

/// A blog post as seen by target resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub title: String,
    /// URL slug (last path segment)
    pub slug: String,
    /// Full route path, e.g. `/posts/hello-world`
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default = "default_true")]
    pub published: bool,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default = "default_true")]
    pub pingback_enabled: bool,
}

fn default_true() -> bool {
    true
}

impl Post {
    /// Create a published post that accepts pingbacks.
    pub fn new(title: impl Into<String>, slug: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            slug: slug.into(),
            path: None,
            published: true,
            deleted: false,
            pingback_enabled: true,
        }
    }

    /// Whether the post is visible to the public.
    pub fn is_live(&self) -> bool {
        self.published && !self.deleted
    }
}

/// Outcome of a single `pingback.ping` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingbackResponse {
    pub success: bool,
    pub fault_code: FaultCode,
    pub message: String,
}

impl PingbackResponse {
    /// Successful response.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            fault_code: FaultCode::None,
            message: message.into(),
        }
    }

    /// Fault response for a rejection.
    pub fn fault(err: &PingbackError) -> Self {
        Self {
            success: false,
            fault_code: err.fault_code(),
            message: err.to_string(),
        }
    }
}
