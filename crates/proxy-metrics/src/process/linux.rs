// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::fs;
use std::path::{Path, PathBuf};
use tracing::trace;

use super::clock::get_clk_tck;
use super::constants::{
    BYTES_PER_KB, FD_DIR, MEMINFO_FILE, PROC_PATH, STATUS_FILE, STAT_FILE, TASK_DIR, UPTIME_FILE,
};
use super::{CollectError, ProcessSnapshot, ProcessStatsCollector};

// Positions in /proc/<pid>/stat counted from the first field after the
// command name, i.e. field N of proc(5) is at index N - 3.
const STAT_UTIME_INDEX: usize = 11;
const STAT_STIME_INDEX: usize = 12;
const STAT_STARTTIME_INDEX: usize = 19;

/// Reads a process's resource usage from a procfs tree.
#[derive(Debug, Clone)]
pub struct ProcfsCollector {
    root: PathBuf,
    pid: u32,
    clk_tck: u64,
}

impl ProcfsCollector {
    pub fn for_current_process() -> Result<Self, CollectError> {
        let clk_tck = get_clk_tck().map_err(CollectError::ClockTicks)?;
        Ok(Self::new(PROC_PATH, std::process::id(), clk_tck))
    }

    pub fn new(root: impl Into<PathBuf>, pid: u32, clk_tck: u64) -> Self {
        Self {
            root: root.into(),
            pid,
            clk_tck,
        }
    }

    fn pid_path(&self, entry: &str) -> PathBuf {
        self.root.join(self.pid.to_string()).join(entry)
    }

    /// Average CPU utilization over the lifetime of the process, the same
    /// figure `ps` reports as `%CPU`.
    fn cpu_rate(&self) -> Result<f64, CollectError> {
        let stat_path = self.pid_path(STAT_FILE);
        let stat = read(&stat_path)?;
        // the command name may contain spaces and parentheses
        let fields: Vec<&str> = stat
            .rsplit_once(')')
            .map(|(_, rest)| rest.split_whitespace().collect())
            .ok_or_else(|| parse_error(&stat_path, "missing command name"))?;

        let ticks = |index: usize, name: &str| -> Result<f64, CollectError> {
            fields
                .get(index)
                .and_then(|v| v.parse::<u64>().ok())
                .map(|v| v as f64)
                .ok_or_else(|| parse_error(&stat_path, &format!("invalid {name}")))
        };
        let utime = ticks(STAT_UTIME_INDEX, "utime")?;
        let stime = ticks(STAT_STIME_INDEX, "stime")?;
        let starttime = ticks(STAT_STARTTIME_INDEX, "starttime")?;

        let uptime_path = self.root.join(UPTIME_FILE);
        let uptime = read(&uptime_path)?
            .split_whitespace()
            .next()
            .and_then(|v| v.parse::<f64>().ok())
            .ok_or_else(|| parse_error(&uptime_path, "invalid uptime"))?;

        let clk_tck = self.clk_tck as f64;
        let age_secs = uptime - starttime / clk_tck;
        if age_secs <= 0.0 {
            return Ok(0.0);
        }
        let cpu_secs = (utime + stime) / clk_tck;
        Ok(cpu_secs / age_secs * 100.0)
    }

    fn memory_total(&self) -> Result<u64, CollectError> {
        let path = self.root.join(MEMINFO_FILE);
        kb_field(&path, &read(&path)?, "MemTotal:")
    }

    fn memory_used(&self) -> Result<u64, CollectError> {
        let path = self.pid_path(STATUS_FILE);
        kb_field(&path, &read(&path)?, "VmRSS:")
    }

    fn fd_count(&self) -> Result<u32, CollectError> {
        let path = self.pid_path(FD_DIR);
        let entries = fs::read_dir(&path).map_err(|source| CollectError::Read {
            path: path.clone(),
            source,
        })?;
        Ok(entries.count() as u32)
    }

    fn thread_count(&self) -> Result<u32, CollectError> {
        let path = self.pid_path(TASK_DIR);
        let entries = fs::read_dir(&path).map_err(|source| CollectError::Read {
            path: path.clone(),
            source,
        })?;
        Ok(entries
            .flatten()
            .filter_map(|entry| entry.file_type().ok())
            .filter(fs::FileType::is_dir)
            .count() as u32)
    }
}

impl ProcessStatsCollector for ProcfsCollector {
    fn collect(&self) -> Result<ProcessSnapshot, CollectError> {
        let snapshot = ProcessSnapshot {
            cpu_rate_percent: self.cpu_rate()?,
            memory_total_bytes: self.memory_total()?,
            memory_used_bytes: self.memory_used()?,
            file_descriptor_count: self.fd_count()?,
            thread_count: self.thread_count()?,
            connection_count: 0,
        };
        trace!("collected process stats for pid {}: {:?}", self.pid, snapshot);
        Ok(snapshot)
    }
}

fn read(path: &Path) -> Result<String, CollectError> {
    fs::read_to_string(path).map_err(|source| CollectError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_error(path: &Path, reason: &str) -> CollectError {
    CollectError::Parse {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

/// Finds a `Key:   1234 kB` line and returns the value in bytes.
fn kb_field(path: &Path, contents: &str, key: &str) -> Result<u64, CollectError> {
    contents
        .lines()
        .find_map(|line| line.strip_prefix(key))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|v| v.parse::<u64>().ok())
        .map(|kb| kb * BYTES_PER_KB)
        .ok_or_else(|| parse_error(path, &format!("{key} not found")))
}
