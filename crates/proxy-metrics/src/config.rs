// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::env;
use std::time::Duration;

use crate::errors::ConfigError;
use tracing::warn;

const DEFAULT_MAX_SLOW_LOG_NUM: usize = 1000;
const DEFAULT_SLOW_LOG_FLUSH_INTERVAL_SECS: u64 = 600;
const DEFAULT_METER_INTERVAL_SECS: u64 = 60;
const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 1000;
const DEFAULT_RESPONSE_HEADER_TIMEOUT_MS: u64 = 1000;

/// Shortest period a timer is allowed to run with.
pub(crate) const MIN_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub cluster_id: u64,
    /// Reported as the `subsystem` query parameter
    pub host: String,
    /// `host:port` of the metrics collector. `None` disables telemetry.
    pub metric_addr: Option<String>,
    /// Capacity of the slow log ring
    pub max_slow_log_num: usize,
    /// how often the slow log is drained and shipped
    pub slow_log_flush_interval: Duration,
    /// how often each rate aggregator rolls up a window
    pub meter_interval: Duration,
    pub connect_timeout: Duration,
    pub response_header_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            cluster_id: 0,
            host: "unknown".to_string(),
            metric_addr: None,
            max_slow_log_num: DEFAULT_MAX_SLOW_LOG_NUM,
            slow_log_flush_interval: Duration::from_secs(DEFAULT_SLOW_LOG_FLUSH_INTERVAL_SECS),
            meter_interval: Duration::from_secs(DEFAULT_METER_INTERVAL_SECS),
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            response_header_timeout: Duration::from_millis(DEFAULT_RESPONSE_HEADER_TIMEOUT_MS),
        }
    }
}

impl Config {
    pub fn new() -> Result<Config, ConfigError> {
        let metric_addr = env::var("GS_METRIC_ADDR")
            .ok()
            .map(|addr| addr.trim().to_string())
            .filter(|addr| !addr.is_empty());

        let host = env::var("GS_HOST")
            .or_else(|_| env::var("HOSTNAME"))
            .unwrap_or_else(|_| "unknown".to_string());

        Ok(Config {
            cluster_id: read_number("GS_CLUSTER_ID", 0)?,
            host,
            metric_addr,
            max_slow_log_num: read_number("GS_MAX_SLOW_LOG_NUM", DEFAULT_MAX_SLOW_LOG_NUM as u64)?
                as usize,
            slow_log_flush_interval: Duration::from_secs(read_interval(
                "GS_SLOW_LOG_FLUSH_INTERVAL_SECS",
                DEFAULT_SLOW_LOG_FLUSH_INTERVAL_SECS,
            )?),
            meter_interval: Duration::from_secs(read_interval(
                "GS_METER_INTERVAL_SECS",
                DEFAULT_METER_INTERVAL_SECS,
            )?),
            connect_timeout: Duration::from_millis(read_number(
                "GS_METRIC_CONNECT_TIMEOUT_MS",
                DEFAULT_CONNECT_TIMEOUT_MS,
            )?),
            response_header_timeout: Duration::from_millis(read_number(
                "GS_METRIC_RESPONSE_TIMEOUT_MS",
                DEFAULT_RESPONSE_HEADER_TIMEOUT_MS,
            )?),
        })
    }
}

fn read_number(var: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(var) {
        Ok(value) => value
            .trim()
            .parse::<u64>()
            .map_err(|_| ConfigError::InvalidNumber { var, value }),
        Err(_) => Ok(default),
    }
}

/// Like [`read_number`], but a period of zero is rejected.
fn read_interval(var: &'static str, default: u64) -> Result<u64, ConfigError> {
    match read_number(var, default)? {
        0 => Err(ConfigError::ZeroInterval { var }),
        secs => Ok(secs),
    }
}

/// Periodic timers cannot have a zero period. `Config` values built by hand
/// skip [`Config::new`], so the timers clamp here as well.
pub(crate) fn timer_period(owner: &str, interval: Duration) -> Duration {
    if interval < MIN_INTERVAL {
        warn!("{owner} interval {interval:?} is too short, using {MIN_INTERVAL:?}");
        return MIN_INTERVAL;
    }
    interval
}

#[cfg(test)]
mod tests {
    use serial_test::serial;
    use std::env;
    use std::time::Duration;

    use crate::config::Config;
    use crate::errors::ConfigError;

    const VARS: [&str; 8] = [
        "GS_METRIC_ADDR",
        "GS_CLUSTER_ID",
        "GS_HOST",
        "GS_MAX_SLOW_LOG_NUM",
        "GS_SLOW_LOG_FLUSH_INTERVAL_SECS",
        "GS_METER_INTERVAL_SECS",
        "GS_METRIC_CONNECT_TIMEOUT_MS",
        "GS_METRIC_RESPONSE_TIMEOUT_MS",
    ];

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_defaults_disable_telemetry() {
        clear_env();
        let config = Config::new().expect("config");
        assert_eq!(config.metric_addr, None);
        assert_eq!(config.cluster_id, 0);
        assert_eq!(config.max_slow_log_num, 1000);
        assert_eq!(config.slow_log_flush_interval, Duration::from_secs(600));
        assert_eq!(config.meter_interval, Duration::from_secs(60));
        assert_eq!(config.connect_timeout, Duration::from_secs(1));
        assert_eq!(config.response_header_timeout, Duration::from_secs(1));
    }

    #[test]
    #[serial]
    fn test_reads_env() {
        clear_env();
        env::set_var("GS_METRIC_ADDR", "10.0.0.1:8887");
        env::set_var("GS_CLUSTER_ID", "42");
        env::set_var("GS_HOST", "proxy-7");
        env::set_var("GS_MAX_SLOW_LOG_NUM", "16");
        env::set_var("GS_METER_INTERVAL_SECS", "5");
        let config = Config::new().expect("config");
        assert_eq!(config.metric_addr.as_deref(), Some("10.0.0.1:8887"));
        assert_eq!(config.cluster_id, 42);
        assert_eq!(config.host, "proxy-7");
        assert_eq!(config.max_slow_log_num, 16);
        assert_eq!(config.meter_interval, Duration::from_secs(5));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_blank_addr_is_disabled() {
        clear_env();
        env::set_var("GS_METRIC_ADDR", "   ");
        let config = Config::new().expect("config");
        assert_eq!(config.metric_addr, None);
        clear_env();
    }

    #[test]
    #[serial]
    fn test_invalid_number() {
        clear_env();
        env::set_var("GS_CLUSTER_ID", "-3");
        let err = Config::new().expect_err("negative cluster id must be rejected");
        assert_eq!(
            err,
            ConfigError::InvalidNumber {
                var: "GS_CLUSTER_ID",
                value: "-3".to_string()
            }
        );
        clear_env();
    }

    #[test]
    #[serial]
    fn test_zero_interval_rejected() {
        clear_env();
        env::set_var("GS_METER_INTERVAL_SECS", "0");
        assert_eq!(
            Config::new(),
            Err(ConfigError::ZeroInterval {
                var: "GS_METER_INTERVAL_SECS"
            })
        );

        clear_env();
        env::set_var("GS_SLOW_LOG_FLUSH_INTERVAL_SECS", "0");
        assert_eq!(
            Config::new(),
            Err(ConfigError::ZeroInterval {
                var: "GS_SLOW_LOG_FLUSH_INTERVAL_SECS"
            })
        );
        clear_env();
    }
}
