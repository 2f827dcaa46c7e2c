// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use proptest::prelude::*;
use supaload::error::OptimizerError;
use supaload::optimizer::{
    parse_megabytes, FixedProbe, InstanceProfile, LocalSpecs, OptimizedSettings,
    PerformanceLevel, SettingsOptimizer, MAX_CHUNK_SIZE_MB, MAX_WORK_MEM_MB, MIN_CHUNK_SIZE_MB,
    MIN_WORK_MEM_MB,
};

fn workstation() -> LocalSpecs {
    LocalSpecs {
        cpu_cores: 12,
        memory_gb: 32.0,
        available_memory_gb: 20.0,
        cpu_percent: 15.0,
    }
}

fn local_specs() -> impl Strategy<Value = LocalSpecs> {
    (1u32..=128, 0.5f64..512.0, 0.0f64..=1.0, 0.0f64..=100.0).prop_map(
        |(cpu_cores, memory_gb, available_fraction, cpu_percent)| LocalSpecs {
            cpu_cores,
            memory_gb,
            available_memory_gb: memory_gb * available_fraction,
            cpu_percent,
        },
    )
}

fn all_pairs() -> impl Iterator<Item = (u8, u8)> {
    (1..=11u8).flat_map(|size| (1..=3u8).map(move |level| (size, level)))
}

fn assert_bounds(s: &OptimizedSettings) {
    let pool = &s.database.pool;
    assert!(pool.min_connections >= 1, "{:?}", pool);
    assert!(pool.max_connections >= pool.min_connections, "{:?}", pool);
    assert!(s.import.parallel_workers >= 1);
    assert!((MIN_CHUNK_SIZE_MB..=MAX_CHUNK_SIZE_MB).contains(&s.import.chunk_size_mb));

    let work_mem = parse_megabytes(&s.optimization.work_mem).expect("work_mem is <N>MB");
    assert!((MIN_WORK_MEM_MB..=MAX_WORK_MEM_MB).contains(&work_mem));
    let maintenance = parse_megabytes(&s.optimization.maintenance_work_mem).expect("<N>MB");
    assert!(maintenance <= work_mem * 4);

    assert!(["30min", "1h", "2h"].contains(&s.optimization.statement_timeout.as_str()));
    assert!(s.import.use_copy);
    assert!(s.optimization.run_analyze);
}

// ==================== Bounds ====================

#[test]
fn test_all_33_pairs_within_bounds() {
    let optimizer = SettingsOptimizer::with_local_specs(workstation());
    let mut seen = 0;
    for (size, level) in all_pairs() {
        assert_bounds(&optimizer.optimized_settings(size, level).unwrap());
        seen += 1;
    }
    assert_eq!(seen, 33);
}

proptest! {
    #[test]
    fn prop_bounds_hold_for_any_machine(local in local_specs(), size in 1u8..=11, level in 1u8..=3) {
        let optimizer = SettingsOptimizer::with_local_specs(local);
        let settings = optimizer.optimized_settings(size, level).unwrap();
        assert_bounds(&settings);
    }

    #[test]
    fn prop_deterministic(local in local_specs(), size in 1u8..=11, level in 1u8..=3) {
        let optimizer = SettingsOptimizer::with_local_specs(local);
        prop_assert_eq!(
            optimizer.optimized_settings(size, level).unwrap(),
            optimizer.optimized_settings(size, level).unwrap()
        );
    }

    #[test]
    fn prop_aggressiveness_never_tightens(local in local_specs(), size in 1u8..=11) {
        let optimizer = SettingsOptimizer::with_local_specs(local);
        let results: Vec<_> = (1..=3)
            .map(|level| optimizer.optimized_settings(size, level).unwrap())
            .collect();

        for pair in results.windows(2) {
            prop_assert!(pair[1].import.chunk_size_mb >= pair[0].import.chunk_size_mb);
            prop_assert!(pair[1].import.batch_size >= pair[0].import.batch_size);
            prop_assert!(pair[1].import.parallel_workers >= pair[0].import.parallel_workers);
        }
    }

    #[test]
    fn prop_shared_tier_is_serial(local in local_specs(), size in 1u8..=2, level in 1u8..=3) {
        let optimizer = SettingsOptimizer::with_local_specs(local);
        let settings = optimizer.optimized_settings(size, level).unwrap();
        let multiplier = PerformanceLevel::for_level(level).unwrap().multiplier;

        prop_assert!(InstanceProfile::for_size(size).unwrap().tier.is_shared());
        prop_assert_eq!(settings.import.parallel_workers, 1);
        prop_assert!(f64::from(settings.database.pool.max_connections) <= 2.0 * multiplier);
    }

    #[test]
    fn prop_dedicated_pool_leaves_a_core(local in local_specs(), size in 3u8..=11, level in 1u8..=3) {
        let optimizer = SettingsOptimizer::with_local_specs(local);
        let settings = optimizer.optimized_settings(size, level).unwrap();
        let instance = InstanceProfile::for_size(size).unwrap();

        prop_assert!(settings.database.pool.max_connections <= instance.cpu_cores - 1);
        prop_assert!(settings.import.parallel_workers <= (instance.cpu_cores - 1).max(1));
    }
}

// ==================== Concrete cases ====================

#[test]
fn test_nano_conservative() {
    let optimizer = SettingsOptimizer::with_local_specs(workstation());
    let s = optimizer.optimized_settings(1, 1).unwrap();

    assert_eq!(s.import.parallel_workers, 1);
    assert!(s.database.pool.max_connections <= 1);
    assert_eq!(s.database.pool.min_connections, 1);
    assert_eq!(s.optimization.statement_timeout, "30min");
    assert!(!s.optimization.disable_triggers);
    assert!(s.optimization.run_vacuum);
    assert!(s.recommended_actions[0].starts_with("Warning: Smallest instance tier"));
}

#[test]
fn test_16xl_aggressive() {
    let optimizer = SettingsOptimizer::with_local_specs(workstation());
    let s = optimizer.optimized_settings(11, 3).unwrap();

    assert_eq!(s.import.batch_size, 25000);
    // min(20GB available, 128GB) lands in the top tier: 200 + 100 × 1.5
    assert_eq!(s.import.chunk_size_mb, 350);
    assert!(s.optimization.disable_triggers);
    assert!(!s.optimization.run_vacuum);
    assert_eq!(s.optimization.work_mem, "1024MB");
    assert_eq!(s.optimization.maintenance_work_mem, "4096MB");
    assert_eq!(s.database.pool.max_connections, 18);
    assert_eq!(s.database.pool.min_connections, 9);
}

#[test]
fn test_snapshot_is_taken_once() {
    let optimizer = SettingsOptimizer::new(&FixedProbe(workstation())).unwrap();
    assert_eq!(optimizer.local_specs(), &workstation());
    assert_eq!(SettingsOptimizer::instance_profiles().len(), 11);
    assert_eq!(SettingsOptimizer::performance_levels().len(), 3);
}

// ==================== Errors ====================

#[test]
fn test_invalid_arguments() {
    let optimizer = SettingsOptimizer::with_local_specs(workstation());

    assert_eq!(
        optimizer.optimized_settings(12, 2).unwrap_err(),
        OptimizerError::InvalidInstanceSize { value: 12, max: 11 }
    );
    assert_eq!(
        optimizer.optimized_settings(0, 2).unwrap_err(),
        OptimizerError::InvalidInstanceSize { value: 0, max: 11 }
    );
    assert_eq!(
        optimizer.optimized_settings(3, 0).unwrap_err(),
        OptimizerError::InvalidPerformanceLevel { value: 0 }
    );
    assert_eq!(
        optimizer.optimized_settings(3, 4).unwrap_err().to_string(),
        "Invalid performance level 4. Choose 1 (Conservative), 2 (Balanced), or 3 (Aggressive)"
    );
}

#[test]
fn test_size_checked_before_level() {
    let optimizer = SettingsOptimizer::with_local_specs(workstation());
    assert!(matches!(
        optimizer.optimized_settings(99, 99),
        Err(OptimizerError::InvalidInstanceSize { .. })
    ));
}
