// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Static instance size and performance level tables

use serde::Serialize;
use std::fmt;

use crate::error::OptimizerError;

/// Whether an instance shares its host with other tenants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceTier {
    /// Shared compute, low connection ceilings
    Shared,
    /// Dedicated compute
    Dedicated,
}

impl InstanceTier {
    pub fn is_shared(&self) -> bool {
        matches!(self, InstanceTier::Shared)
    }
}

impl fmt::Display for InstanceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceTier::Shared => write!(f, "shared"),
            InstanceTier::Dedicated => write!(f, "dedicated"),
        }
    }
}

/// Declared size class of the target database instance
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceProfile {
    pub name: &'static str,
    pub memory_gb: f64,
    pub cpu_cores: u32,
    pub tier: InstanceTier,
}

const fn profile(
    name: &'static str,
    memory_gb: f64,
    cpu_cores: u32,
    tier: InstanceTier,
) -> InstanceProfile {
    InstanceProfile {
        name,
        memory_gb,
        cpu_cores,
        tier,
    }
}

/// Instance profiles, indexed by `size - 1`
pub const INSTANCE_PROFILES: [InstanceProfile; 11] = [
    profile("Nano", 0.5, 1, InstanceTier::Shared),
    profile("Micro", 1.0, 2, InstanceTier::Shared),
    profile("Small", 2.0, 2, InstanceTier::Dedicated),
    profile("Medium", 4.0, 2, InstanceTier::Dedicated),
    profile("Large", 8.0, 2, InstanceTier::Dedicated),
    profile("XL", 16.0, 4, InstanceTier::Dedicated),
    profile("2XL", 32.0, 8, InstanceTier::Dedicated),
    profile("4XL", 64.0, 16, InstanceTier::Dedicated),
    profile("8XL", 128.0, 32, InstanceTier::Dedicated),
    profile("12XL", 192.0, 48, InstanceTier::Dedicated),
    profile("16XL", 256.0, 48, InstanceTier::Dedicated),
];

impl InstanceProfile {
    /// Look up a profile by its 1-based size number
    pub fn for_size(size: u8) -> Result<&'static InstanceProfile, OptimizerError> {
        (size as usize)
            .checked_sub(1)
            .and_then(|idx| INSTANCE_PROFILES.get(idx))
            .ok_or(OptimizerError::InvalidInstanceSize {
                value: size,
                max: INSTANCE_PROFILES.len(),
            })
    }

    pub fn memory_mb(&self) -> u64 {
        (self.memory_gb * 1024.0) as u64
    }
}

impl fmt::Display for InstanceProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}GB RAM, {} cores, {})",
            self.name, self.memory_gb, self.cpu_cores, self.tier
        )
    }
}

/// User-selected aggressiveness
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PerformanceLevel {
    pub name: &'static str,
    pub multiplier: f64,
}

/// Performance levels, indexed by `level - 1`
pub const PERFORMANCE_LEVELS: [PerformanceLevel; 3] = [
    PerformanceLevel {
        name: "Conservative",
        multiplier: 0.5,
    },
    PerformanceLevel {
        name: "Balanced",
        multiplier: 1.0,
    },
    PerformanceLevel {
        name: "Aggressive",
        multiplier: 1.5,
    },
];

impl PerformanceLevel {
    /// Look up a level by its 1-based number
    pub fn for_level(level: u8) -> Result<&'static PerformanceLevel, OptimizerError> {
        (level as usize)
            .checked_sub(1)
            .and_then(|idx| PERFORMANCE_LEVELS.get(idx))
            .ok_or(OptimizerError::InvalidPerformanceLevel { value: level })
    }

    pub fn is_most_aggressive(&self) -> bool {
        self.multiplier >= max_multiplier()
    }

    pub fn is_most_conservative(&self) -> bool {
        self.multiplier <= min_multiplier()
    }
}

fn max_multiplier() -> f64 {
    PERFORMANCE_LEVELS
        .iter()
        .map(|l| l.multiplier)
        .fold(f64::MIN, f64::max)
}

fn min_multiplier() -> f64 {
    PERFORMANCE_LEVELS
        .iter()
        .map(|l| l.multiplier)
        .fold(f64::MAX, f64::min)
}

impl fmt::Display for PerformanceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (x{})", self.name, self.multiplier)
    }
}
