// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The single background task that drains telemetry state and ships it.
//!
//! Two triggers drive it: a fixed slow-log interval, and the summaries that
//! each rate aggregator emits at the end of its own window. Every cycle starts
//! from fresh state, so there is nothing to retry or carry over.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::timer_period;
use crate::counter::ConnectionCounter;
use crate::exporter::{Exporter, MetricEndpoints};
use crate::payload::{CompositeReport, SlowLogStats};
use crate::process::ProcessStatsCollector;
use crate::rate_aggregator::TpsSummary;
use crate::slow_log::SlowLogRecorder;

/// What a single reporting cycle ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Nothing to send, or local data could not be gathered.
    Skipped,
    Sent,
    /// The collector could not be reached or refused the payload. The data is
    /// dropped.
    Failed,
}

pub struct ReportingLoopConfig {
    pub exporter: Exporter,
    pub endpoints: MetricEndpoints,
    pub slow_log: Arc<SlowLogRecorder>,
    pub connections: Arc<ConnectionCounter>,
    pub collector: Box<dyn ProcessStatsCollector>,
    pub slow_log_interval: Duration,
    pub summaries: mpsc::UnboundedReceiver<TpsSummary>,
}

pub struct ReportingLoop {
    exporter: Exporter,
    endpoints: MetricEndpoints,
    slow_log: Arc<SlowLogRecorder>,
    connections: Arc<ConnectionCounter>,
    collector: Box<dyn ProcessStatsCollector>,
    slow_log_interval: Duration,
    summaries: mpsc::UnboundedReceiver<TpsSummary>,
}

impl ReportingLoop {
    pub fn new(config: ReportingLoopConfig) -> Self {
        ReportingLoop {
            exporter: config.exporter,
            endpoints: config.endpoints,
            slow_log: config.slow_log,
            connections: config.connections,
            collector: config.collector,
            slow_log_interval: timer_period("slow log", config.slow_log_interval),
            summaries: config.summaries,
        }
    }

    /// Rotates the slow log and ships whatever was in it.
    pub async fn flush_slow_log(&self) -> CycleOutcome {
        let drained = self.slow_log.rotate();
        if drained.is_empty() {
            return CycleOutcome::Skipped;
        }
        let overwritten = drained.write_count().saturating_sub(drained.len() as u64);
        if overwritten > 0 {
            debug!("{overwritten} slow logs were overwritten before this flush");
        }

        let stats = SlowLogStats {
            slow_logs: drained.into_records(),
        };
        match self.exporter.send(&self.endpoints.slow_log, &stats).await {
            Ok(()) => {
                debug!("Sent {} slow logs", stats.slow_logs.len());
                CycleOutcome::Sent
            }
            Err(e) => {
                warn!("send metric server failed, err[{e}]");
                CycleOutcome::Failed
            }
        }
    }

    /// Combines a rate summary with fresh process stats and ships the result.
    pub async fn report_process(&self, summary: TpsSummary) -> CycleOutcome {
        debug!("{} TpsStats metric {:?}", summary.meter, summary.stats);

        let mut snapshot = match self.collector.collect() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("get process stats failed, err {e}");
                return CycleOutcome::Skipped;
            }
        };
        snapshot.connection_count = self.connections.snapshot();

        let report = CompositeReport::new(snapshot, summary.stats);
        match self.exporter.send(&self.endpoints.process, &report).await {
            Ok(()) => CycleOutcome::Sent,
            Err(e) => {
                warn!("send metric server failed, err[{e}]");
                CycleOutcome::Failed
            }
        }
    }

    /// Runs both cycles until `cancel` fires. The slow-log cycle keeps going
    /// even if every rate aggregator has stopped.
    pub async fn run(mut self, cancel: CancellationToken) {
        debug!("Reporting loop started");

        let mut slow_log_ticker = tokio::time::interval(self.slow_log_interval);
        slow_log_ticker.tick().await; // discard first tick, which is instantaneous
        let mut summaries_open = true;

        loop {
            tokio::select! {
                _ = slow_log_ticker.tick() => {
                    self.flush_slow_log().await;
                }
                summary = self.summaries.recv(), if summaries_open => {
                    match summary {
                        Some(summary) => {
                            self.report_process(summary).await;
                        }
                        None => {
                            warn!("All rate aggregators stopped, process stats will no longer be reported");
                            summaries_open = false;
                        }
                    }
                }
                _ = cancel.cancelled() => {
                    break;
                }
            }
        }

        debug!("Reporting loop stopped");
    }
}
