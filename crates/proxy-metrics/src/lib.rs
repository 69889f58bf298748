// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Self-reporting telemetry for the proxy.
//!
//! Request-handling tasks record API latencies, slow operations and connection
//! lifecycle events through a [`telemetry::ProxyMetrics`] handle. A single
//! background [`reporter::ReportingLoop`] periodically drains that state and
//! POSTs it to the metrics collector. Delivery is best effort: a failed send is
//! logged and the data for that interval is dropped.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod config;
pub mod counter;
pub mod errors;
pub mod exporter;
pub mod payload;
pub mod process;
pub mod rate_aggregator;
pub mod reporter;
pub mod slow_log;
pub mod telemetry;
