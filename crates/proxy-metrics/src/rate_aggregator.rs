// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Per-tier latency and throughput roll-up.
//!
//! Each [`RateAggregator`] collects per-call outcomes into a window. Every
//! `interval` the window is swapped out, summarized into [`TpsStats`] and
//! handed to the reporting loop over a channel. Latencies are bucketed at
//! millisecond resolution, so percentiles are exact to the millisecond while
//! min, max and avg are exact.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::timer_period;

/// Rolled-up statistics for one window. Latencies are in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TpsStats {
    pub tps: i64,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub tp_50: f64,
    pub tp_90: f64,
    pub tp_99: f64,
    pub tp_999: f64,
    pub total_number: u64,
    pub err_number: u64,
}

/// Call counts for a single operation within a window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApiStats {
    pub calls: u64,
    pub errors: u64,
}

impl ApiStats {
    fn add(&mut self, succeeded: bool) {
        self.calls += 1;
        if !succeeded {
            self.errors += 1;
        }
    }
}

/// Summary emitted by an aggregator at the end of each window.
#[derive(Debug, Clone)]
pub struct TpsSummary {
    pub meter: String,
    pub stats: TpsStats,
}

#[derive(Debug, Default)]
pub struct Window {
    total: u64,
    errors: u64,
    sum_ms: f64,
    min_ms: f64,
    max_ms: f64,
    /// whole milliseconds -> number of calls
    histogram: BTreeMap<u64, u64>,
    apis: HashMap<String, ApiStats>,
}

impl Window {
    fn insert(&mut self, operation: &str, succeeded: bool, latency: Duration) {
        let ms = latency.as_nanos() as f64 / 1_000_000.0;
        if self.total == 0 || ms < self.min_ms {
            self.min_ms = ms;
        }
        if ms > self.max_ms {
            self.max_ms = ms;
        }
        self.total += 1;
        self.sum_ms += ms;
        *self.histogram.entry(latency.as_millis() as u64).or_insert(0) += 1;

        if !succeeded {
            self.errors += 1;
        }
        if let Some(api) = self.apis.get_mut(operation) {
            api.add(succeeded);
        } else {
            let mut api = ApiStats::default();
            api.add(succeeded);
            self.apis.insert(operation.to_string(), api);
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn apis(&self) -> &HashMap<String, ApiStats> {
        &self.apis
    }

    /// Nearest-rank percentile over the millisecond histogram.
    fn percentile(&self, quantile: f64) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        let rank = ((quantile * self.total as f64).ceil() as u64).clamp(1, self.total);
        let mut seen = 0;
        for (&bucket, &count) in &self.histogram {
            seen += count;
            if seen >= rank {
                return bucket as f64;
            }
        }
        self.max_ms
    }
}

impl TpsStats {
    pub fn from_window(window: &Window, interval: Duration) -> Self {
        if window.total == 0 {
            return TpsStats::default();
        }
        let secs = interval.as_secs_f64();
        let tps = if secs > 0.0 {
            (window.total as f64 / secs) as i64
        } else {
            window.total as i64
        };
        TpsStats {
            tps,
            min: window.min_ms,
            max: window.max_ms,
            avg: window.sum_ms / window.total as f64,
            tp_50: window.percentile(0.50),
            tp_90: window.percentile(0.90),
            tp_99: window.percentile(0.99),
            tp_999: window.percentile(0.999),
            total_number: window.total,
            err_number: window.errors,
        }
    }
}

pub struct RateAggregator {
    name: String,
    interval: Duration,
    window: Mutex<Window>,
}

impl RateAggregator {
    pub fn new(name: impl Into<String>, interval: Duration) -> Self {
        let name = name.into();
        let interval = timer_period(&name, interval);
        Self {
            name,
            interval,
            window: Mutex::new(Window::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn record(&self, operation: &str, succeeded: bool, latency: Duration) {
        let mut window = self.window.lock().unwrap_or_else(|e| e.into_inner());
        window.insert(operation, succeeded, latency);
    }

    /// Swaps out the current window.
    pub fn take_window(&self) -> Window {
        let mut window = self.window.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *window)
    }

    /// Closes the current window and summarizes it.
    pub fn roll_up(&self) -> TpsSummary {
        let window = self.take_window();
        for (operation, api) in window.apis() {
            debug!(
                "{} api {operation}: calls={} errors={}",
                self.name, api.calls, api.errors
            );
        }
        TpsSummary {
            meter: self.name.clone(),
            stats: TpsStats::from_window(&window, self.interval),
        }
    }

    /// Emits one summary per interval until cancelled or the receiver is gone.
    pub async fn run(
        self: std::sync::Arc<Self>,
        sink: mpsc::UnboundedSender<TpsSummary>,
        cancel: CancellationToken,
    ) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.tick().await; // discard first tick, which is instantaneous

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let summary = self.roll_up();
                    debug!("{} TpsStats {:?}", self.name, summary.stats);
                    if sink.send(summary).is_err() {
                        warn!("{} summary receiver dropped, stopping", self.name);
                        break;
                    }
                }
                _ = cancel.cancelled() => {
                    debug!("{} rate aggregator shutting down", self.name);
                    break;
                }
            }
        }
    }
}
