// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Prometheus metrics for pingback processing.

use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

/// Pingback counters and timings, registered on their own registry.
#[derive(Clone)]
pub struct PingbackMetrics {
    registry: Registry,
    requests: IntCounterVec,
    callback_failures: IntCounter,
    fetch_seconds: Histogram,
}

impl PingbackMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests = IntCounterVec::new(
            Opts::new("pingback_requests_total", "Pingback calls by terminal outcome"),
            &["outcome"],
        )?;
        let callback_failures = IntCounter::new(
            "pingback_callback_failures_total",
            "Success callbacks that returned an error",
        )?;
        let fetch_seconds = Histogram::with_opts(
            HistogramOpts::new("pingback_source_fetch_seconds", "Source page fetch latency")
                .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 15.0]),
        )?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(callback_failures.clone()))?;
        registry.register(Box::new(fetch_seconds.clone()))?;

        Ok(Self {
            registry,
            requests,
            callback_failures,
            fetch_seconds,
        })
    }

    /// Count a finished pingback call.
    pub fn observe_outcome(&self, outcome: &str) {
        self.requests.with_label_values(&[outcome]).inc();
    }

    pub fn observe_callback_failure(&self) {
        self.callback_failures.inc();
    }

    pub fn observe_fetch(&self, seconds: f64) {
        self.fetch_seconds.observe(seconds);
    }

    /// Number of calls that ended with `outcome`.
    pub fn outcome_count(&self, outcome: &str) -> u64 {
        self.requests.with_label_values(&[outcome]).get()
    }

    /// Render all metrics in the Prometheus text format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
