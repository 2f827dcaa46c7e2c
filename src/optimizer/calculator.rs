// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Settings calculation
//!
//! Balances three ceilings: the declared remote instance (memory, cores), the
//! local machine (available memory, cores) and the requested aggressiveness
//! multiplier. No output may exceed what either side can take.

use super::probe::{LocalSpecs, ResourceProbe};
use super::profile::{InstanceProfile, PerformanceLevel, INSTANCE_PROFILES, PERFORMANCE_LEVELS};
use super::recommendations::recommend;
use super::tuning::{
    default_keepalive, DatabaseTuning, ImportTuning, OptimizationSettings, OptimizedSettings,
    PoolSettings, StatementTimeout,
};
use crate::error::{OptimizerError, Result};

pub const MIN_CHUNK_SIZE_MB: u32 = 10;
pub const MAX_CHUNK_SIZE_MB: u32 = 500;
pub const MIN_WORK_MEM_MB: u64 = 2;
pub const MAX_WORK_MEM_MB: u64 = 1024;

/// Maps (instance size, performance level) to tuning knobs.
///
/// Holds only the local resource snapshot taken at construction; build a new
/// optimizer for fresh readings.
#[derive(Debug, Clone)]
pub struct SettingsOptimizer {
    local: LocalSpecs,
}

impl SettingsOptimizer {
    /// Probe the local machine once and keep the snapshot
    pub fn new(probe: &dyn ResourceProbe) -> Result<Self> {
        Ok(Self::with_local_specs(probe.probe()?))
    }

    pub fn with_local_specs(local: LocalSpecs) -> Self {
        Self { local }
    }

    pub fn local_specs(&self) -> &LocalSpecs {
        &self.local
    }

    /// Instance tiers, smallest first; index + 1 is the size number
    pub fn instance_profiles() -> &'static [InstanceProfile] {
        &INSTANCE_PROFILES
    }

    pub fn performance_levels() -> &'static [PerformanceLevel] {
        &PERFORMANCE_LEVELS
    }

    /// Compute settings for a 1-based instance size and performance level.
    ///
    /// Both arguments are validated before any calculation happens.
    pub fn optimized_settings(
        &self,
        instance_size: u8,
        performance_level: u8,
    ) -> std::result::Result<OptimizedSettings, OptimizerError> {
        let instance = InstanceProfile::for_size(instance_size)?;
        let level = PerformanceLevel::for_level(performance_level)?;
        let m = level.multiplier;

        let pool = pool_settings(instance, &self.local, m);
        let work_mem = work_mem_mb(instance, m);
        let maintenance_work_mem = maintenance_work_mem_mb(instance, work_mem);
        let chunk_size_mb = chunk_size_mb(instance, &self.local, m);
        let batch_size = batch_size(instance, m);
        let parallel_workers = parallel_workers(instance, &self.local, m);
        let timeout = statement_timeout(chunk_size_mb, m);

        let recommended_actions = recommend(instance_size, instance, level, &self.local)
            .into_iter()
            .map(|r| r.to_string())
            .collect();

        Ok(OptimizedSettings {
            database: DatabaseTuning { pool },
            import: ImportTuning {
                chunk_size_mb,
                batch_size,
                parallel_workers,
                use_copy: true,
            },
            optimization: OptimizationSettings {
                work_mem: format!("{}MB", work_mem),
                maintenance_work_mem: format!("{}MB", maintenance_work_mem),
                statement_timeout: timeout.to_string(),
                disable_triggers: m > 0.5,
                run_vacuum: m < 1.5,
                run_analyze: true,
            },
            recommended_actions,
        })
    }
}

pub(crate) fn pool_settings(instance: &InstanceProfile, local: &LocalSpecs, m: f64) -> PoolSettings {
    let (min_connections, max_connections) = if instance.tier.is_shared() {
        (1, (2.0 * m) as u32)
    } else {
        // Leave one instance core for its own background work
        let ceiling = instance.cpu_cores.saturating_sub(1).max(1);
        let max = ((f64::from(local.cpu_cores) * m).round() as u32).clamp(1, ceiling);
        ((max / 2).max(1), max)
    };

    PoolSettings {
        min_connections,
        max_connections,
        keepalive: default_keepalive(),
    }
}

pub(crate) fn work_mem_mb(instance: &InstanceProfile, m: f64) -> u64 {
    let raw = (instance.memory_gb * 1024.0 * (0.1 + m * 0.05)) as u64;
    raw.clamp(MIN_WORK_MEM_MB, MAX_WORK_MEM_MB)
}

pub(crate) fn maintenance_work_mem_mb(instance: &InstanceProfile, work_mem_mb: u64) -> u64 {
    (work_mem_mb * 4).min(instance.memory_mb())
}

pub(crate) fn chunk_size_mb(instance: &InstanceProfile, local: &LocalSpecs, m: f64) -> u32 {
    // Chunks are built locally, then shipped to the instance
    let bound_gb = local.available_memory_gb.min(instance.memory_gb * 0.5);
    let raw = if bound_gb < 4.0 {
        50.0 + 20.0 * m
    } else if bound_gb < 16.0 {
        100.0 + 50.0 * m
    } else {
        200.0 + 100.0 * m
    };
    (raw as u32).clamp(MIN_CHUNK_SIZE_MB, MAX_CHUNK_SIZE_MB)
}

pub(crate) fn batch_size(instance: &InstanceProfile, m: f64) -> u32 {
    let base: f64 = if instance.memory_gb < 4.0 {
        500.0
    } else if instance.memory_gb < 16.0 {
        2000.0
    } else {
        10000.0
    };
    (base * (1.0 + m)) as u32
}

pub(crate) fn parallel_workers(instance: &InstanceProfile, local: &LocalSpecs, m: f64) -> u32 {
    if instance.tier.is_shared() {
        return 1;
    }

    let usable_cores = instance.cpu_cores.min(local.cpu_cores);
    let raw = (2.0 + f64::from(usable_cores) / 10.0 * m).round() as u32;
    let ceiling = instance
        .cpu_cores
        .saturating_sub(1)
        .min(local.cpu_cores.saturating_sub(1))
        .max(1);
    raw.clamp(1, ceiling)
}

pub(crate) fn statement_timeout(chunk_size_mb: u32, m: f64) -> StatementTimeout {
    let minutes = f64::from(chunk_size_mb) * (2.0 - m) / 10.0;
    if minutes < 30.0 {
        StatementTimeout::HalfHour
    } else if minutes < 60.0 {
        StatementTimeout::OneHour
    } else {
        StatementTimeout::TwoHours
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::probe::FixedProbe;
    use crate::optimizer::profile::INSTANCE_PROFILES;

    fn local(cores: u32, available_gb: f64) -> LocalSpecs {
        LocalSpecs {
            cpu_cores: cores,
            memory_gb: available_gb * 2.0,
            available_memory_gb: available_gb,
            cpu_percent: 5.0,
        }
    }

    fn nano() -> &'static InstanceProfile {
        &INSTANCE_PROFILES[0]
    }

    // ===== pool tests =====

    #[test]
    fn test_shared_pool_is_fixed() {
        let l = local(32, 64.0);
        assert_eq!(pool_settings(nano(), &l, 0.5).max_connections, 1);
        assert_eq!(pool_settings(nano(), &l, 1.0).max_connections, 2);
        assert_eq!(pool_settings(nano(), &l, 1.5).max_connections, 3);
        assert_eq!(pool_settings(nano(), &l, 1.5).min_connections, 1);
    }

    #[test]
    fn test_dedicated_pool_capped_by_instance_cores() {
        // XL has 4 cores: ceiling is 3
        let xl = &INSTANCE_PROFILES[5];
        let pool = pool_settings(xl, &local(16, 32.0), 1.0);
        assert_eq!(pool.max_connections, 3);
        assert_eq!(pool.min_connections, 1);
        assert_eq!(pool.keepalive, 30);
    }

    #[test]
    fn test_dedicated_pool_scales_with_local_cores() {
        let big = &INSTANCE_PROFILES[10];
        let pool = pool_settings(big, &local(8, 32.0), 1.5);
        assert_eq!(pool.max_connections, 12);
        assert_eq!(pool.min_connections, 6);
    }

    // ===== memory tests =====

    #[test]
    fn test_work_mem_formula_and_clamp() {
        // 0.5GB * 1024 * 0.125 = 64
        assert_eq!(work_mem_mb(nano(), 0.5), 64);
        // Medium: 4096 * 0.15 = 614
        assert_eq!(work_mem_mb(&INSTANCE_PROFILES[3], 1.0), 614);
        assert_eq!(work_mem_mb(&INSTANCE_PROFILES[10], 1.5), MAX_WORK_MEM_MB);
    }

    #[test]
    fn test_maintenance_work_mem_capped_by_instance_memory() {
        assert_eq!(maintenance_work_mem_mb(nano(), 200), 512);
        assert_eq!(maintenance_work_mem_mb(&INSTANCE_PROFILES[6], 1024), 4096);
    }

    // ===== chunk tests =====

    #[test]
    fn test_chunk_size_tiers() {
        let large = &INSTANCE_PROFILES[10];
        assert_eq!(chunk_size_mb(large, &local(8, 2.0), 1.0), 70);
        assert_eq!(chunk_size_mb(large, &local(8, 8.0), 1.0), 150);
        assert_eq!(chunk_size_mb(large, &local(8, 64.0), 1.5), 350);
    }

    #[test]
    fn test_chunk_size_bounded_by_instance_memory() {
        // Nano: half of 0.5GB keeps it in the smallest bucket whatever the host has
        assert_eq!(chunk_size_mb(nano(), &local(64, 512.0), 0.5), 60);
    }

    // ===== batch tests =====

    #[test]
    fn test_batch_size_tiers() {
        assert_eq!(batch_size(nano(), 0.5), 750);
        assert_eq!(batch_size(&INSTANCE_PROFILES[3], 1.0), 4000);
        assert_eq!(batch_size(&INSTANCE_PROFILES[10], 1.5), 25000);
    }

    // ===== worker tests =====

    #[test]
    fn test_shared_tier_single_worker() {
        assert_eq!(parallel_workers(nano(), &local(32, 64.0), 1.5), 1);
        assert_eq!(parallel_workers(&INSTANCE_PROFILES[1], &local(32, 64.0), 1.5), 1);
    }

    #[test]
    fn test_workers_capped_by_spare_cores() {
        // Small has 2 cores: ceiling is 1
        assert_eq!(parallel_workers(&INSTANCE_PROFILES[2], &local(16, 32.0), 1.5), 1);
        // single-core host: ceiling floors at 1
        assert_eq!(parallel_workers(&INSTANCE_PROFILES[8], &local(1, 32.0), 1.5), 1);
    }

    #[test]
    fn test_workers_formula() {
        // min(48, 32) / 10 * 1.5 = 4.8 -> round(6.8) = 7
        assert_eq!(parallel_workers(&INSTANCE_PROFILES[10], &local(32, 64.0), 1.5), 7);
        // min(16, 8) / 10 * 0.5 = 0.4 -> round(2.4) = 2
        assert_eq!(parallel_workers(&INSTANCE_PROFILES[7], &local(8, 64.0), 0.5), 2);
    }

    // ===== timeout tests =====

    #[test]
    fn test_statement_timeout_buckets() {
        assert_eq!(statement_timeout(60, 0.5), StatementTimeout::HalfHour);
        assert_eq!(statement_timeout(300, 1.0), StatementTimeout::OneHour);
        assert_eq!(statement_timeout(250, 0.5), StatementTimeout::OneHour);
        assert_eq!(statement_timeout(500, 0.5), StatementTimeout::TwoHours);
    }

    // ===== optimizer tests =====

    #[test]
    fn test_optimizer_rejects_bad_input_first() {
        let opt = SettingsOptimizer::with_local_specs(local(8, 16.0));
        assert_eq!(
            opt.optimized_settings(12, 2),
            Err(OptimizerError::InvalidInstanceSize { value: 12, max: 11 })
        );
        assert_eq!(
            opt.optimized_settings(3, 0),
            Err(OptimizerError::InvalidPerformanceLevel { value: 0 })
        );
    }

    #[test]
    fn test_optimizer_nano_conservative() {
        let opt = SettingsOptimizer::new(&FixedProbe(local(8, 16.0))).unwrap();
        let s = opt.optimized_settings(1, 1).unwrap();
        assert_eq!(s.import.parallel_workers, 1);
        assert!(s.database.pool.max_connections <= 1);
        assert_eq!(s.optimization.statement_timeout, "30min");
        assert_eq!(s.optimization.work_mem, "64MB");
        assert_eq!(s.optimization.maintenance_work_mem, "256MB");
        assert!(!s.optimization.disable_triggers);
        assert!(s.optimization.run_vacuum);
        assert!(s.import.use_copy);
        assert_eq!(s.recommended_actions.len(), 4);
    }

    #[test]
    fn test_optimizer_16xl_aggressive() {
        let opt = SettingsOptimizer::with_local_specs(local(32, 64.0));
        let s = opt.optimized_settings(11, 3).unwrap();
        assert_eq!(s.import.batch_size, 25000);
        assert_eq!(s.import.chunk_size_mb, 350);
        assert!(s.optimization.disable_triggers);
        assert!(!s.optimization.run_vacuum);
        assert!(s.optimization.run_analyze);
    }

    #[test]
    fn test_optimizer_is_deterministic() {
        let opt = SettingsOptimizer::with_local_specs(local(12, 24.0));
        assert_eq!(
            opt.optimized_settings(7, 2).unwrap(),
            opt.optimized_settings(7, 2).unwrap()
        );
    }
}
