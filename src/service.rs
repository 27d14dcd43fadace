// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Pingback service: parse, rate limit, validate, record, respond.
//!
//! A single call moves through
//! `Received -> Parsed -> Validated -> {Recorded | DuplicateSkipped | Rejected}`.
//! Every rejection becomes a fault response here; nothing past this point
//! sees a validation error.

use crate::config::Config;
use crate::error::{PingbackError, Result};
use crate::fetcher::SourceFetcher;
use crate::limiter::{RateLimitResult, RateLimiter};
use crate::metrics::PingbackMetrics;
use crate::models::{PingbackRecord, PingbackRequest, PingbackResponse};
use crate::recorder::{PingSuccessCallback, PingbackRecorder, RecordOutcome};
use crate::store::{PingbackStore, TargetLookup};
use crate::validator::{PingbackValidator, ValidationResult};
use crate::xmlrpc::RequestParser;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Message returned to clients for accepted pingbacks.
pub const SUCCESS_MESSAGE: &str = "Thanks! Pingback registered.";

/// Terminal state of a pingback call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PingOutcome {
    Recorded(PingbackRecord),
    DuplicateSkipped,
    Rejected(PingbackError),
}

impl PingOutcome {
    /// Metric label for the outcome.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Recorded(_) => "recorded",
            Self::DuplicateSkipped => "duplicate",
            Self::Rejected(err) => err.label(),
        }
    }

    pub fn into_response(self) -> PingbackResponse {
        match self {
            Self::Recorded(_) | Self::DuplicateSkipped => PingbackResponse::success(SUCCESS_MESSAGE),
            Self::Rejected(err) => PingbackResponse::fault(&err),
        }
    }
}

/// An inbound pingback call as received over the wire.
#[derive(Debug, Clone, Copy)]
pub struct InboundPing<'a> {
    pub body: &'a str,
    /// Content-Type header; `None` skips the content type check
    pub content_type: Option<&'a str>,
    pub caller_ip: IpAddr,
}

/// Collaborators the service runs against.
#[derive(Clone)]
pub struct Collaborators {
    pub targets: Arc<dyn TargetLookup>,
    pub store: Arc<dyn PingbackStore>,
    pub fetcher: Arc<dyn SourceFetcher>,
}

pub struct PingbackService {
    parser: RequestParser,
    limiter: Option<RateLimiter>,
    validator: PingbackValidator,
    recorder: PingbackRecorder,
    store: Arc<dyn PingbackStore>,
    metrics: Arc<PingbackMetrics>,
}

impl PingbackService {
    pub fn new(config: &Config, collaborators: Collaborators, metrics: Arc<PingbackMetrics>) -> Self {
        let Collaborators {
            targets,
            store,
            fetcher,
        } = collaborators;

        let limiter = config
            .rate_limit
            .enabled
            .then(|| RateLimiter::new(config.rate_limit.clone()));

        Self {
            parser: RequestParser::new(config.validation.require_content_type.clone()),
            limiter,
            validator: PingbackValidator::new(
                config.validation.clone(),
                config.site.clone(),
                config.fetcher.timeout(),
                targets,
                store.clone(),
                fetcher,
                metrics.clone(),
            ),
            recorder: PingbackRecorder::new(store.clone(), metrics.clone()),
            store,
            metrics,
        }
    }

    /// Process a raw `pingback.ping` body received from `caller_ip`.
    pub async fn receive_ping(
        &self,
        body: &str,
        caller_ip: IpAddr,
        on_success: &dyn PingSuccessCallback,
    ) -> PingbackResponse {
        self.receive(
            InboundPing {
                body,
                content_type: None,
                caller_ip,
            },
            on_success,
        )
        .await
    }

    /// Process an inbound call, including its content type.
    pub async fn receive(
        &self,
        ping: InboundPing<'_>,
        on_success: &dyn PingSuccessCallback,
    ) -> PingbackResponse {
        debug!(caller_ip = %ping.caller_ip, bytes = ping.body.len(), "Pingback received");

        let outcome = self.process(ping, on_success).await;
        self.finish(ping.caller_ip, outcome)
    }

    /// Answer a call that was rejected before it could be read.
    pub fn reject(&self, caller_ip: IpAddr, err: PingbackError) -> PingbackResponse {
        self.finish(caller_ip, PingOutcome::Rejected(err))
    }

    fn finish(&self, caller_ip: IpAddr, outcome: PingOutcome) -> PingbackResponse {
        self.metrics.observe_outcome(outcome.label());

        match &outcome {
            PingOutcome::Recorded(record) => {
                info!(id = %record.id, %caller_ip, "Pingback accepted")
            }
            PingOutcome::DuplicateSkipped => {
                info!(%caller_ip, "Duplicate pingback skipped")
            }
            PingOutcome::Rejected(err) => info!(
                %caller_ip,
                fault_code = err.fault_code().code(),
                error = %err,
                "Pingback rejected"
            ),
        }

        outcome.into_response()
    }

    /// Run a call to its terminal state.
    pub async fn process(
        &self,
        ping: InboundPing<'_>,
        on_success: &dyn PingSuccessCallback,
    ) -> PingOutcome {
        let request = match self.parser.parse_ping_request(ping.body, ping.content_type) {
            Ok(request) => request,
            Err(err) => return PingOutcome::Rejected(err),
        };
        debug!(source = %request.source, target = %request.target, "Pingback parsed");

        if let Err(err) = self.check_rate(&request, ping.caller_ip).await {
            return PingOutcome::Rejected(err);
        }

        let validated = match self.validator.validate(&request, ping.caller_ip).await {
            Ok(ValidationResult::Accepted(validated)) => validated,
            Ok(ValidationResult::Duplicate) => return PingOutcome::DuplicateSkipped,
            Err(err) => return PingOutcome::Rejected(err),
        };

        match self
            .recorder
            .record(validated, ping.caller_ip, on_success)
            .await
        {
            Ok(RecordOutcome::Recorded(record)) => PingOutcome::Recorded(record),
            Ok(RecordOutcome::Duplicate) => PingOutcome::DuplicateSkipped,
            Err(err) => PingOutcome::Rejected(err),
        }
    }

    async fn check_rate(&self, request: &PingbackRequest, caller_ip: IpAddr) -> Result<()> {
        let Some(limiter) = &self.limiter else {
            return Ok(());
        };

        match limiter.check(caller_ip, Some(&request.source)).await {
            RateLimitResult::Allowed { .. } => Ok(()),
            RateLimitResult::Limited { reason, retry_after } => {
                warn!(%caller_ip, %reason, retry_after_secs = retry_after.as_secs(), "Pingback rate limited");
                Err(PingbackError::AccessDenied(reason.to_string()))
            }
        }
    }

    /// All recorded pingbacks, newest first.
    pub async fn get_history(&self) -> Result<Vec<PingbackRecord>> {
        let mut records = self.store.list_all().await?;
        records.sort_by(|a, b| b.ping_time_utc.cmp(&a.ping_time_utc));
        Ok(records)
    }

    /// Delete one recorded pingback.
    pub async fn delete_history(&self, id: Uuid) -> Result<()> {
        if self.store.delete_by_id(id).await? {
            info!(%id, "Pingback history entry deleted");
            Ok(())
        } else {
            Err(PingbackError::NotFound(id))
        }
    }

    /// Drop idle rate limit state.
    pub async fn cleanup(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.cleanup().await;
        }
    }

    pub fn metrics(&self) -> &PingbackMetrics {
        &self.metrics
    }
}
