// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use super::{CollectError, ProcessSnapshot, ProcessStatsCollector};
use tracing::debug;

pub struct UnsupportedCollector;

impl ProcessStatsCollector for UnsupportedCollector {
    fn collect(&self) -> Result<ProcessSnapshot, CollectError> {
        debug!("Process stats are only collected on Linux");
        Err(CollectError::Unsupported)
    }
}
