// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! JSON bodies accepted by the metrics collector.

use serde::Serialize;

use crate::process::ProcessSnapshot;
use crate::rate_aggregator::TpsStats;
use crate::slow_log::SlowRecord;

/// Body of `POST /metric/slowlog`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlowLogStats {
    pub slow_logs: Vec<SlowRecord>,
}

/// Body of `POST /metric/process`: process resource usage plus the latency
/// summary of the window that triggered the report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositeReport {
    #[serde(rename = "cpu_proc_rate")]
    pub cpu_rate_percent: f64,
    #[serde(rename = "memory_total")]
    pub memory_total_bytes: u64,
    #[serde(rename = "memory_used")]
    pub memory_used_bytes: u64,
    #[serde(rename = "handle_num")]
    pub file_descriptor_count: u32,
    #[serde(rename = "thread_num")]
    pub thread_count: u32,
    #[serde(rename = "connect_count")]
    pub connection_count: u64,
    #[serde(rename = "tp_stats")]
    pub tps: TpsStats,
}

impl CompositeReport {
    pub fn new(snapshot: ProcessSnapshot, tps: TpsStats) -> Self {
        Self {
            cpu_rate_percent: snapshot.cpu_rate_percent,
            memory_total_bytes: snapshot.memory_total_bytes,
            memory_used_bytes: snapshot.memory_used_bytes,
            file_descriptor_count: snapshot.file_descriptor_count,
            thread_count: snapshot.thread_count,
            connection_count: snapshot.connection_count,
            tps,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn test_composite_report_json() {
        let snapshot = ProcessSnapshot {
            cpu_rate_percent: 12.5,
            memory_total_bytes: 8_192,
            memory_used_bytes: 4_096,
            file_descriptor_count: 7,
            thread_count: 3,
            connection_count: 11,
        };
        let tps = TpsStats {
            tps: 2,
            min: 1.0,
            max: 9.0,
            avg: 4.0,
            tp_50: 3.0,
            tp_90: 8.0,
            tp_99: 9.0,
            tp_999: 9.0,
            total_number: 120,
            err_number: 1,
        };
        let value = serde_json::to_value(CompositeReport::new(snapshot, tps)).unwrap();
        assert_eq!(
            value,
            json!({
                "cpu_proc_rate": 12.5,
                "memory_total": 8192,
                "memory_used": 4096,
                "handle_num": 7,
                "thread_num": 3,
                "connect_count": 11,
                "tp_stats": {
                    "tps": 2,
                    "min": 1.0,
                    "max": 9.0,
                    "avg": 4.0,
                    "tp_50": 3.0,
                    "tp_90": 8.0,
                    "tp_99": 9.0,
                    "tp_999": 9.0,
                    "total_number": 120,
                    "err_number": 1
                }
            })
        );
    }

    #[test]
    fn test_slow_log_stats_json() {
        let stats = SlowLogStats {
            slow_logs: vec![SlowRecord::new("select t1", Duration::from_secs(2))],
        };
        assert_eq!(
            serde_json::to_value(stats).unwrap(),
            json!({"slow_logs": [{"slow_log": "select t1", "lats": 2.0}]})
        );
    }
}
