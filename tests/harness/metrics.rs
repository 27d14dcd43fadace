// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Outcome tallies for flood simulation results.

use pingback_receiver::PingbackResponse;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Collects responses during a simulated flood.
#[derive(Debug, Default)]
pub struct FloodMetrics {
    start_time: Option<Instant>,
    end_time: Option<Instant>,
    /// Count of responses by fault code, 0 meaning success
    by_code: HashMap<i32, usize>,
    successes: usize,
    /// Latency samples (microseconds)
    latencies: Vec<u64>,
}

impl FloodMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self) {
        self.start_time = Some(Instant::now());
    }

    pub fn finish(&mut self) {
        self.end_time = Some(Instant::now());
    }

    /// Record one response.
    pub fn record(&mut self, response: &PingbackResponse, latency: Duration) {
        if response.success {
            self.successes += 1;
        } else {
            *self.by_code.entry(response.fault_code.code()).or_insert(0) += 1;
        }
        self.latencies.push(latency.as_micros() as u64);
    }

    pub fn total(&self) -> usize {
        self.successes + self.by_code.values().sum::<usize>()
    }

    pub fn successes(&self) -> usize {
        self.successes
    }

    /// Count of faults with the given code.
    pub fn faults(&self, code: i32) -> usize {
        self.by_code.get(&code).copied().unwrap_or(0)
    }

    pub fn duration(&self) -> Duration {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => end.duration_since(start),
            (Some(start), None) => start.elapsed(),
            _ => Duration::ZERO,
        }
    }

    /// Ratio of faulted to total responses.
    pub fn block_rate(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        (total - self.successes) as f64 / total as f64
    }

    pub fn median_latency_us(&self) -> u64 {
        if self.latencies.is_empty() {
            return 0;
        }
        let mut sorted = self.latencies.clone();
        sorted.sort_unstable();
        sorted[sorted.len() / 2]
    }

    /// One-line summary for test output.
    pub fn summary(&self) -> String {
        let mut codes: Vec<_> = self.by_code.iter().collect();
        codes.sort();
        format!(
            "total={} ok={} faults={:?} block_rate={:.2} median_us={} elapsed={:?}",
            self.total(),
            self.successes,
            codes,
            self.block_rate(),
            self.median_latency_us(),
            self.duration()
        )
    }
}
