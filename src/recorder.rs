// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Persists accepted pingbacks and runs the caller's success callback.

use crate::error::{PingbackError, Result, StoreError};
use crate::metrics::PingbackMetrics;
use crate::models::PingbackRecord;
use crate::store::PingbackStore;
use crate::validator::ValidatedPingback;
use chrono::Utc;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Side effect run after a pingback is committed, e.g. bumping a counter.
///
/// Called synchronously before the response is sent. An error is logged
/// and counted; the committed record stays.
pub trait PingSuccessCallback: Send + Sync {
    fn on_ping_success(&self, record: &PingbackRecord) -> anyhow::Result<()>;
}

/// Callback that does nothing.
pub struct NoopCallback;

impl PingSuccessCallback for NoopCallback {
    fn on_ping_success(&self, _record: &PingbackRecord) -> anyhow::Result<()> {
        Ok(())
    }
}

impl<F> PingSuccessCallback for F
where
    F: Fn(&PingbackRecord) -> anyhow::Result<()> + Send + Sync,
{
    fn on_ping_success(&self, record: &PingbackRecord) -> anyhow::Result<()> {
        self(record)
    }
}

/// What the recorder did with a validated pingback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    Recorded(PingbackRecord),
    /// A concurrent call stored the same pair first
    Duplicate,
}

pub struct PingbackRecorder {
    store: Arc<dyn PingbackStore>,
    metrics: Arc<PingbackMetrics>,
}

impl PingbackRecorder {
    pub fn new(store: Arc<dyn PingbackStore>, metrics: Arc<PingbackMetrics>) -> Self {
        Self { store, metrics }
    }

    /// Store the pingback, then invoke `on_success` with the stored record.
    pub async fn record(
        &self,
        pingback: ValidatedPingback,
        caller_ip: IpAddr,
        on_success: &dyn PingSuccessCallback,
    ) -> Result<RecordOutcome> {
        let record = PingbackRecord {
            id: Uuid::new_v4(),
            source_uri: pingback.source.to_string(),
            target_uri: pingback.target.to_string(),
            source_title: pingback.source_title,
            source_ip: caller_ip.to_string(),
            ping_time_utc: Utc::now(),
            target_post_title: pingback.post.title,
            target_post_id: pingback.post.id,
        };

        let stored = match self.store.insert(record).await {
            Ok(stored) => stored,
            Err(StoreError::Duplicate { source_uri, target_uri }) => {
                info!(source = %source_uri, target = %target_uri, "Pingback stored concurrently, skipping");
                return Ok(RecordOutcome::Duplicate);
            }
            Err(err) => {
                warn!(error = %err, "Failed to store pingback");
                return Err(PingbackError::from(err));
            }
        };

        info!(
            id = %stored.id,
            source = %stored.source_uri,
            post_id = %stored.target_post_id,
            "Pingback recorded"
        );

        if let Err(err) = on_success.on_ping_success(&stored) {
            warn!(id = %stored.id, error = %err, "Pingback success callback failed");
            self.metrics.observe_callback_failure();
        }

        Ok(RecordOutcome::Recorded(stored))
    }
}
