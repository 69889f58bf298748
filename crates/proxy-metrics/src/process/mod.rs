// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Resource usage of the current process.
//!
//! On Linux everything is read straight from `/proc`:
//!
//! ```text
//! /proc/
//!   ├── <pid>/
//!   │   ├── stat     # utime, stime and starttime in clock ticks
//!   │   ├── status   # VmRSS
//!   │   ├── fd/      # one entry per open file descriptor
//!   │   └── task/    # one directory per thread
//!   ├── meminfo      # MemTotal
//!   └── uptime       # seconds since boot
//! ```
//!
//! Other targets get a collector that always fails, which makes the reporting
//! loop skip process reports there.

pub mod clock;
pub mod constants;
#[cfg(target_os = "linux")]
pub mod linux;
#[cfg(not(target_os = "linux"))]
pub mod unsupported;

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Point-in-time resource usage. `connection_count` is not an OS measurement;
/// collectors leave it at zero and the reporting loop fills it in.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProcessSnapshot {
    pub cpu_rate_percent: f64,
    pub memory_total_bytes: u64,
    pub memory_used_bytes: u64,
    pub file_descriptor_count: u32,
    pub thread_count: u32,
    pub connection_count: u64,
}

#[derive(Debug, Error)]
pub enum CollectError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed {path}: {reason}")]
    Parse { path: PathBuf, reason: String },
    #[error("could not determine clock ticks per second: {0}")]
    ClockTicks(io::Error),
    #[error("process stats are not supported on this platform")]
    Unsupported,
}

pub trait ProcessStatsCollector: Send + Sync {
    fn collect(&self) -> Result<ProcessSnapshot, CollectError>;
}

/// Collector for the current process on this platform.
pub fn current_process_collector() -> Result<Box<dyn ProcessStatsCollector>, CollectError> {
    #[cfg(target_os = "linux")]
    {
        Ok(Box::new(linux::ProcfsCollector::for_current_process()?))
    }
    #[cfg(not(target_os = "linux"))]
    {
        Ok(Box::new(unsupported::UnsupportedCollector))
    }
}
