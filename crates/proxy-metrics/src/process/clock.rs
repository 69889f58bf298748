// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Clock tick rate (`USER_HZ`), the unit of the CPU times in `/proc/<pid>/stat`.

use std::io;

#[cfg(unix)]
#[allow(clippy::cast_sign_loss)]
pub fn get_clk_tck() -> Result<u64, io::Error> {
    use nix::unistd::{sysconf, SysconfVar};

    match sysconf(SysconfVar::CLK_TCK) {
        Ok(Some(clk_tck)) if clk_tck > 0 => Ok(clk_tck as u64),
        _ => Err(io::Error::new(
            io::ErrorKind::NotFound,
            "Could not find system clock ticks per second",
        )),
    }
}

#[cfg(not(unix))]
pub fn get_clk_tck() -> Result<u64, io::Error> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "clock ticks are only available on unix",
    ))
}
