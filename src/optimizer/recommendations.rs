// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Advisory notes attached to an optimization result

use std::fmt;

use super::probe::LocalSpecs;
use super::profile::{InstanceProfile, PerformanceLevel};

/// Local available memory (GB) under which we warn
pub const LOW_LOCAL_MEMORY_GB: f64 = 4.0;
/// Local CPU utilisation (%) over which we warn
pub const HIGH_CPU_PERCENT: f64 = 80.0;

/// A single piece of advice. Informational only; never blocks an import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recommendation {
    UpgradeInstance,
    ImportOffPeak,
    AvoidParallelism,
    AggressiveMode,
    DisableIndexes,
    ConservativeMode,
    LowLocalMemory,
    HighLocalCpu,
}

impl Recommendation {
    pub fn is_warning(&self) -> bool {
        matches!(
            self,
            Recommendation::UpgradeInstance
                | Recommendation::AggressiveMode
                | Recommendation::LowLocalMemory
                | Recommendation::HighLocalCpu
        )
    }

    pub fn message(&self) -> &'static str {
        match self {
            Recommendation::UpgradeInstance => {
                "Smallest instance tier has very limited resources. Consider upgrading for large imports."
            }
            Recommendation::ImportOffPeak => "Import during off-peak hours for better performance.",
            Recommendation::AvoidParallelism => {
                "Instance has 2 or fewer cores. Consider loading files sequentially (--no-parallel)."
            }
            Recommendation::AggressiveMode => {
                "Aggressive mode: monitor for connection limit and statement timeout errors."
            }
            Recommendation::DisableIndexes => {
                "Drop or disable non-critical indexes before COPY for maximum speed."
            }
            Recommendation::ConservativeMode => {
                "Conservative mode: stable but slower. Safe for production imports."
            }
            Recommendation::LowLocalMemory => {
                "Local available memory is below 4GB. Close other applications before importing."
            }
            Recommendation::HighLocalCpu => {
                "Local CPU usage is above 80%. Consider reducing parallel workers."
            }
        }
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = if self.is_warning() { "Warning" } else { "Tip" };
        write!(f, "{}: {}", prefix, self.message())
    }
}

/// Build the ordered advice list for a calculation
pub fn recommend(
    instance_size: u8,
    instance: &InstanceProfile,
    level: &PerformanceLevel,
    local: &LocalSpecs,
) -> Vec<Recommendation> {
    let mut out = Vec::new();

    if instance_size == 1 {
        out.push(Recommendation::UpgradeInstance);
        out.push(Recommendation::ImportOffPeak);
    }

    if instance.cpu_cores <= 2 {
        out.push(Recommendation::AvoidParallelism);
    }

    if level.is_most_aggressive() {
        out.push(Recommendation::AggressiveMode);
        out.push(Recommendation::DisableIndexes);
    } else if level.is_most_conservative() {
        out.push(Recommendation::ConservativeMode);
    }

    if local.available_memory_gb < LOW_LOCAL_MEMORY_GB {
        out.push(Recommendation::LowLocalMemory);
    }

    if local.cpu_percent > HIGH_CPU_PERCENT {
        out.push(Recommendation::HighLocalCpu);
    }

    out
}
