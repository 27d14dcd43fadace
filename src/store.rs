// SPDX-License-Identifier: PMPL-1.0-or-later
//! Collaborator interfaces for target lookup and pingback storage,
//! plus the in-memory backends the service runs with.

use crate::error::StoreError;
use crate::models::{PingbackRecord, Post};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Resolves pingback targets to blog posts.
#[async_trait]
pub trait TargetLookup: Send + Sync {
    /// Find a published, non-deleted post by slug or route path.
    async fn find_published_post_by_slug_or_path(
        &self,
        path: &str,
    ) -> Result<Option<Post>, StoreError>;
}

/// Storage for accepted pingbacks.
///
/// Implementations must enforce uniqueness of (source_uri, target_uri) and
/// report a violation from `insert` as [`StoreError::Duplicate`].
#[async_trait]
pub trait PingbackStore: Send + Sync {
    async fn find_by_pair(
        &self,
        source_uri: &str,
        target_uri: &str,
    ) -> Result<Option<PingbackRecord>, StoreError>;

    async fn insert(&self, record: PingbackRecord) -> Result<PingbackRecord, StoreError>;

    async fn list_all(&self) -> Result<Vec<PingbackRecord>, StoreError>;

    /// Returns `false` when no record had the id.
    async fn delete_by_id(&self, id: Uuid) -> Result<bool, StoreError>;
}

/// In-memory pingback store keyed by id with a unique (source, target) index.
#[derive(Default)]
pub struct InMemoryPingbackStore {
    inner: RwLock<StoreInner>,
}

#[derive(Default)]
struct StoreInner {
    records: HashMap<Uuid, PingbackRecord>,
    pairs: HashMap<(String, String), Uuid>,
}

impl InMemoryPingbackStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.inner.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl PingbackStore for InMemoryPingbackStore {
    async fn find_by_pair(
        &self,
        source_uri: &str,
        target_uri: &str,
    ) -> Result<Option<PingbackRecord>, StoreError> {
        let inner = self.inner.read().await;
        let key = (source_uri.to_string(), target_uri.to_string());
        Ok(inner
            .pairs
            .get(&key)
            .and_then(|id| inner.records.get(id))
            .cloned())
    }

    async fn insert(&self, record: PingbackRecord) -> Result<PingbackRecord, StoreError> {
        let mut inner = self.inner.write().await;
        let key = (record.source_uri.clone(), record.target_uri.clone());
        if inner.pairs.contains_key(&key) {
            return Err(StoreError::Duplicate {
                source_uri: key.0,
                target_uri: key.1,
            });
        }
        inner.pairs.insert(key, record.id);
        inner.records.insert(record.id, record.clone());
        Ok(record)
    }

    async fn list_all(&self) -> Result<Vec<PingbackRecord>, StoreError> {
        Ok(self.inner.read().await.records.values().cloned().collect())
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        match inner.records.remove(&id) {
            Some(record) => {
                inner.pairs.remove(&(record.source_uri, record.target_uri));
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// In-memory post catalog with per-post pingback counters.
#[derive(Default)]
pub struct InMemoryPostCatalog {
    posts: Vec<Post>,
    ping_counts: Mutex<HashMap<Uuid, u64>>,
}

impl InMemoryPostCatalog {
    pub fn new(posts: Vec<Post>) -> Self {
        Self {
            posts,
            ping_counts: Mutex::new(HashMap::new()),
        }
    }

    /// Load posts from a JSON array file.
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let posts: Vec<Post> = serde_json::from_str(&raw)?;
        Ok(Self::new(posts))
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    /// Increment the pingback counter of a post.
    pub fn increment_ping_count(&self, post_id: Uuid) -> anyhow::Result<u64> {
        let mut counts = self
            .ping_counts
            .lock()
            .map_err(|_| anyhow::anyhow!("ping counter lock poisoned"))?;
        let count = counts.entry(post_id).or_insert(0);
        *count += 1;
        Ok(*count)
    }

    pub fn ping_count(&self, post_id: Uuid) -> u64 {
        self.ping_counts
            .lock()
            .map(|counts| counts.get(&post_id).copied().unwrap_or(0))
            .unwrap_or(0)
    }
}

#[async_trait]
impl TargetLookup for InMemoryPostCatalog {
    async fn find_published_post_by_slug_or_path(
        &self,
        path: &str,
    ) -> Result<Option<Post>, StoreError> {
        let trimmed = path.trim_end_matches('/');
        let slug = trimmed.rsplit('/').next().unwrap_or(trimmed);

        Ok(self
            .posts
            .iter()
            .filter(|p| p.is_live())
            .find(|p| match &p.path {
                Some(route) => route.trim_end_matches('/').eq_ignore_ascii_case(trimmed),
                None => !slug.is_empty() && p.slug.eq_ignore_ascii_case(slug),
            })
            .cloned())
    }
}
