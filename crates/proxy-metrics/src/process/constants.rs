// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

pub const PROC_PATH: &str = "/proc";

pub const MEMINFO_FILE: &str = "meminfo";

pub const UPTIME_FILE: &str = "uptime";

pub const STAT_FILE: &str = "stat";

pub const STATUS_FILE: &str = "status";

pub const FD_DIR: &str = "fd";

pub const TASK_DIR: &str = "task";

pub(crate) const BYTES_PER_KB: u64 = 1024;
