// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Local machine resource probing

use serde::{Deserialize, Serialize};
use sysinfo::System;

use crate::error::{Result, SupaloadError};

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Snapshot of the machine running the import
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalSpecs {
    /// Logical CPU count
    pub cpu_cores: u32,
    /// Total RAM in GB
    pub memory_gb: f64,
    /// Currently available RAM in GB
    pub available_memory_gb: f64,
    /// Instantaneous global CPU utilisation, 0-100
    pub cpu_percent: f64,
}

/// Source of [`LocalSpecs`]
pub trait ResourceProbe {
    fn probe(&self) -> Result<LocalSpecs>;
}

/// Reads the host through `sysinfo`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProbe;

impl ResourceProbe for SystemProbe {
    fn probe(&self) -> Result<LocalSpecs> {
        let mut sys = System::new();
        sys.refresh_memory();

        // CPU usage needs two samples at least MINIMUM_CPU_UPDATE_INTERVAL apart
        sys.refresh_cpu_usage();
        std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
        sys.refresh_cpu_usage();

        let cpu_cores = match sys.cpus().len() {
            0 => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(0),
            n => n,
        };
        let total = sys.total_memory();

        if cpu_cores == 0 || total == 0 {
            return Err(SupaloadError::Probe(
                "host did not report CPU or memory information".to_string(),
            ));
        }

        let specs = LocalSpecs {
            cpu_cores: cpu_cores as u32,
            memory_gb: total as f64 / BYTES_PER_GB,
            available_memory_gb: sys.available_memory() as f64 / BYTES_PER_GB,
            cpu_percent: f64::from(sys.global_cpu_usage()),
        };
        tracing::debug!(?specs, "probed local resources");
        Ok(specs)
    }
}

/// Returns a fixed snapshot; used for reproducible runs and tests
#[derive(Debug, Clone, Copy)]
pub struct FixedProbe(pub LocalSpecs);

impl ResourceProbe for FixedProbe {
    fn probe(&self) -> Result<LocalSpecs> {
        Ok(self.0)
    }
}
