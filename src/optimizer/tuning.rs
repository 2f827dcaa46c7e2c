// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Tuning knobs produced by the optimizer and consumed by the import pipeline

use serde::{Deserialize, Serialize};
use std::fmt;

/// Connection pool bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSettings {
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Seconds
    #[serde(default = "default_keepalive")]
    pub keepalive: u32,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            min_connections: default_min_connections(),
            max_connections: default_max_connections(),
            keepalive: default_keepalive(),
        }
    }
}

fn default_min_connections() -> u32 {
    2
}

fn default_max_connections() -> u32 {
    10
}

pub(crate) fn default_keepalive() -> u32 {
    30
}

/// Database side of the optimizer output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseTuning {
    pub pool: PoolSettings,
}

/// Loader side of the optimizer output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportTuning {
    pub chunk_size_mb: u32,
    pub batch_size: u32,
    pub parallel_workers: u32,
    pub use_copy: bool,
}

/// Session settings and maintenance toggles applied around a load
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizationSettings {
    #[serde(default = "default_work_mem")]
    pub work_mem: String,
    #[serde(default = "default_maintenance_work_mem")]
    pub maintenance_work_mem: String,
    #[serde(default = "default_statement_timeout")]
    pub statement_timeout: String,
    #[serde(default)]
    pub disable_triggers: bool,
    #[serde(default = "default_true")]
    pub run_vacuum: bool,
    #[serde(default = "default_true")]
    pub run_analyze: bool,
}

impl Default for OptimizationSettings {
    fn default() -> Self {
        Self {
            work_mem: default_work_mem(),
            maintenance_work_mem: default_maintenance_work_mem(),
            statement_timeout: default_statement_timeout(),
            disable_triggers: false,
            run_vacuum: true,
            run_analyze: true,
        }
    }
}

fn default_work_mem() -> String {
    "64MB".to_string()
}

fn default_maintenance_work_mem() -> String {
    "256MB".to_string()
}

fn default_statement_timeout() -> String {
    StatementTimeout::HalfHour.to_string()
}

fn default_true() -> bool {
    true
}

/// Bucketed statement timeout
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum StatementTimeout {
    HalfHour,
    OneHour,
    TwoHours,
}

impl StatementTimeout {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatementTimeout::HalfHour => "30min",
            StatementTimeout::OneHour => "1h",
            StatementTimeout::TwoHours => "2h",
        }
    }
}

impl fmt::Display for StatementTimeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full optimizer result. Recomputed on every call, never cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizedSettings {
    pub database: DatabaseTuning,
    pub import: ImportTuning,
    pub optimization: OptimizationSettings,
    pub recommended_actions: Vec<String>,
}

/// Parse a `"<N>MB"` memory value back into megabytes
pub fn parse_megabytes(value: &str) -> Option<u64> {
    value.trim().strip_suffix("MB")?.trim().parse().ok()
}
