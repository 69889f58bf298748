// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Handle the proxy's request paths use to record telemetry.
//!
//! Telemetry is optional. When no collector is configured, or the exporter
//! cannot be built, the proxy gets [`ProxyMetrics::Disabled`] and every call
//! is a no-op. The handle is cheap to clone and is passed explicitly to the
//! code that needs it.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::counter::ConnectionCounter;
use crate::errors;
use crate::exporter::{Exporter, MetricEndpoints};
use crate::process::{self, ProcessStatsCollector};
use crate::rate_aggregator::RateAggregator;
use crate::reporter::{ReportingLoop, ReportingLoopConfig};
use crate::slow_log::SlowLogRecorder;

pub const PROXY_METER_NAME: &str = "GS-Proxy";
pub const STORE_METER_NAME: &str = "GS-Store";

/// Shared state producers write into.
pub struct Telemetry {
    proxy_meter: Arc<RateAggregator>,
    store_meter: Arc<RateAggregator>,
    slow_log: Arc<SlowLogRecorder>,
    connections: Arc<ConnectionCounter>,
}

#[derive(Clone)]
pub enum ProxyMetrics {
    Enabled(Arc<Telemetry>),
    Disabled,
}

impl ProxyMetrics {
    /// Builds the telemetry pipeline and spawns its tasks on the current tokio
    /// runtime. They run until `cancel` fires.
    pub fn start(config: &Config, cancel: CancellationToken) -> Self {
        let Some(addr) = config.metric_addr.as_deref() else {
            info!("metric collector address not set, proxy telemetry disabled");
            return ProxyMetrics::Disabled;
        };

        let collector: Box<dyn ProcessStatsCollector> = match process::current_process_collector()
        {
            Ok(collector) => collector,
            Err(e) => {
                error!("Failed to create process stats collector: {e}, proxy telemetry disabled");
                return ProxyMetrics::Disabled;
            }
        };

        match Self::start_with_collector(config, addr, collector, cancel) {
            Ok(metrics) => metrics,
            Err(e) => {
                error!("Failed to start proxy telemetry: {e}");
                ProxyMetrics::Disabled
            }
        }
    }

    fn start_with_collector(
        config: &Config,
        addr: &str,
        collector: Box<dyn ProcessStatsCollector>,
        cancel: CancellationToken,
    ) -> Result<Self, errors::Creation> {
        let endpoints = MetricEndpoints::new(addr, config.cluster_id, &config.host)?;
        let exporter = Exporter::new(config.connect_timeout, config.response_header_timeout)?;

        let telemetry = Arc::new(Telemetry {
            proxy_meter: Arc::new(RateAggregator::new(PROXY_METER_NAME, config.meter_interval)),
            store_meter: Arc::new(RateAggregator::new(STORE_METER_NAME, config.meter_interval)),
            slow_log: Arc::new(SlowLogRecorder::new(config.max_slow_log_num)),
            connections: Arc::new(ConnectionCounter::new()),
        });

        let (tx, rx) = mpsc::unbounded_channel();
        let reporting_loop = ReportingLoop::new(ReportingLoopConfig {
            exporter,
            endpoints,
            slow_log: Arc::clone(&telemetry.slow_log),
            connections: Arc::clone(&telemetry.connections),
            collector,
            slow_log_interval: config.slow_log_flush_interval,
            summaries: rx,
        });

        tokio::spawn(Arc::clone(&telemetry.proxy_meter).run(tx.clone(), cancel.clone()));
        tokio::spawn(Arc::clone(&telemetry.store_meter).run(tx, cancel.clone()));
        tokio::spawn(reporting_loop.run(cancel));

        debug!(
            "proxy telemetry reporting to {addr} for cluster {} as {}",
            config.cluster_id, config.host
        );
        Ok(ProxyMetrics::Enabled(telemetry))
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, ProxyMetrics::Enabled(_))
    }

    /// Outcome and latency of a client-facing API call.
    pub fn proxy_api_metric(&self, method: &str, ack: bool, delay: Duration) {
        if let ProxyMetrics::Enabled(telemetry) = self {
            telemetry.proxy_meter.record(method, ack, delay);
        }
    }

    /// Outcome and latency of a call to the backing store.
    pub fn store_api_metric(&self, method: &str, ack: bool, delay: Duration) {
        if let ProxyMetrics::Enabled(telemetry) = self {
            telemetry.store_meter.record(method, ack, delay);
        }
    }

    pub fn slow_log_metric(&self, slow_log: impl Into<String>, delay: Duration) {
        if let ProxyMetrics::Enabled(telemetry) = self {
            telemetry.slow_log.record(slow_log, delay);
        }
    }

    /// Connection lifecycle signal: `1` on accept, `-1` on close.
    pub fn add_connect_count(&self, delta: i64) {
        if let ProxyMetrics::Enabled(telemetry) = self {
            telemetry.connections.add(delta);
        }
    }
}
