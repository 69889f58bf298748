// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use reqwest::header::CONTENT_TYPE;
use reqwest::{StatusCode, Url};
use serde::Serialize;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

use crate::errors;

/// Namespace tag the collector files proxy metrics under.
pub const NAMESPACE: &str = "GS";

/// Longest collector error body kept in a [`ShippingError`].
pub const MAX_ERROR_BODY_BYTES: usize = 256;

#[derive(Debug, Error)]
pub enum ShippingError {
    #[error("failed to prepare payload: {0}")]
    Payload(String),
    #[error("collector rejected metrics ({0:?}): {1}")]
    Destination(Option<StatusCode>, String),
}

/// Collector URLs for each kind of report, tagged with the cluster and the
/// reporting host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricEndpoints {
    pub slow_log: Url,
    pub process: Url,
}

impl MetricEndpoints {
    /// `addr` is usually `host:port`; a full `http://` or `https://` prefix is
    /// accepted as well.
    pub fn new(addr: &str, cluster_id: u64, host: &str) -> Result<Self, errors::Creation> {
        let base = if addr.starts_with("http://") || addr.starts_with("https://") {
            addr.trim_end_matches('/').to_string()
        } else {
            format!("http://{addr}")
        };
        let cluster_id = cluster_id.to_string();
        let params = [
            ("clusterId", cluster_id.as_str()),
            ("namespace", NAMESPACE),
            ("subsystem", host),
        ];
        let build = |kind: &str| {
            Url::parse_with_params(&format!("{base}/metric/{kind}"), &params).map_err(|e| {
                errors::Creation::Address {
                    addr: addr.to_string(),
                    reason: e.to_string(),
                }
            })
        };
        Ok(Self {
            slow_log: build("slowlog")?,
            process: build("process")?,
        })
    }
}

/// Serializes payloads to JSON and POSTs them to the collector. One attempt
/// per call; the caller decides what to log and never retries.
#[derive(Clone, Debug)]
pub struct Exporter {
    client: reqwest::Client,
}

impl Exporter {
    /// A request fails after `connect_timeout` if the collector cannot be
    /// reached, and after `connect_timeout + response_header_timeout` overall.
    pub fn new(
        connect_timeout: Duration,
        response_header_timeout: Duration,
    ) -> Result<Self, errors::Creation> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(connect_timeout + response_header_timeout)
            .build()?;
        Ok(Self { client })
    }

    pub async fn send<T: Serialize + ?Sized>(
        &self,
        url: &Url,
        payload: &T,
    ) -> Result<(), ShippingError> {
        let body = serde_json::to_vec(payload).map_err(|e| ShippingError::Payload(e.to_string()))?;

        let start = Instant::now();
        let response = self
            .client
            .post(url.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| ShippingError::Destination(e.status(), e.to_string()))?;

        let status = response.status();
        // read the body to the end so the connection goes back to the pool
        let drained = response.bytes().await;

        if status != StatusCode::OK {
            let message = match drained {
                Ok(bytes) => {
                    let end = bytes.len().min(MAX_ERROR_BODY_BYTES);
                    String::from_utf8_lossy(&bytes[..end]).into_owned()
                }
                Err(e) => format!("response not ok, body unreadable: {e}"),
            };
            return Err(ShippingError::Destination(Some(status), message));
        }
        if let Err(e) = drained {
            debug!("Failed to drain collector response from {}: {e}", url.path());
        }

        debug!(
            "Shipped metrics to {} in {} ms",
            url.path(),
            start.elapsed().as_millis()
        );
        Ok(())
    }
}
