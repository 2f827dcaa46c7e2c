// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Settings management for supaload
//!
//! Handles loading and saving the YAML import configuration (config.yaml by default).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::optimizer::{OptimizationSettings, OptimizedSettings, PoolSettings};

mod io;
mod validation;

pub use io::{env_database_url, DATABASE_URL_ENV};

/// Top-level sections that must be present in a config file
pub const REQUIRED_SECTIONS: [&str; 4] = ["database", "import", "directories", "logging"];

/// Main settings structure, read from config.yaml
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Target database and connection pool
    pub database: DatabaseConfig,

    /// Chunking, batching and parallelism
    pub import: ImportConfig,

    /// Session settings and maintenance toggles applied around a load
    #[serde(default)]
    pub optimization: OptimizationSettings,

    /// Working directories
    pub directories: DirectoriesConfig,

    /// Log output
    pub logging: LoggingConfig,

    /// Input file handling
    #[serde(default)]
    pub file_handling: FileHandlingConfig,
}

/// Database connection configuration.
///
/// Either `connection_string` or the individual `host`/`port`/`database`/
/// `user`/`password` fields must be given.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Full postgres:// URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_string: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Schema holding the target table
    #[serde(default = "default_schema")]
    pub schema: String,

    /// Target table
    #[serde(default)]
    pub table_name: String,

    #[serde(default)]
    pub pool: PoolSettings,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            connection_string: None,
            host: None,
            port: None,
            database: None,
            user: None,
            password: None,
            schema: default_schema(),
            table_name: String::new(),
            pool: PoolSettings::default(),
        }
    }
}

/// Import tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Files larger than this are split into chunks of this size
    #[serde(default = "default_chunk_size_mb")]
    pub chunk_size_mb: u32,

    /// Rows per INSERT statement when COPY is not used
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Chunks loaded concurrently
    #[serde(default = "default_parallel_workers")]
    pub parallel_workers: u32,

    /// Use COPY FROM STDIN (falls back to INSERT when rejected)
    #[serde(default = "default_true")]
    pub use_copy: bool,

    /// Retry policy for a single file
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            chunk_size_mb: default_chunk_size_mb(),
            batch_size: default_batch_size(),
            parallel_workers: default_parallel_workers(),
            use_copy: true,
            retry: RetryConfig::default(),
        }
    }
}

/// Retry configuration for loading a single file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay in milliseconds for exponential backoff
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Maximum delay in milliseconds (cap for backoff)
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

/// Working directories
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoriesConfig {
    /// Where chunk files are written
    #[serde(default = "default_temp_directory")]
    pub temp_directory: PathBuf,

    /// Where per-run log files are written
    #[serde(default = "default_log_directory")]
    pub log_directory: PathBuf,
}

impl Default for DirectoriesConfig {
    fn default() -> Self {
        Self {
            temp_directory: default_temp_directory(),
            log_directory: default_log_directory(),
        }
    }
}

/// Log file output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Level for the log file (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,

    /// Overrides `directories.log_directory`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            directory: None,
        }
    }
}

/// Input file handling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileHandlingConfig {
    /// Sniff the encoding of each file
    #[serde(default = "default_true")]
    pub encoding_detection: bool,

    /// Encoding assumed when detection is off
    #[serde(default = "default_encoding")]
    pub default_encoding: String,
}

impl Default for FileHandlingConfig {
    fn default() -> Self {
        Self {
            encoding_detection: true,
            default_encoding: default_encoding(),
        }
    }
}

fn default_schema() -> String {
    "public".to_string()
}

fn default_chunk_size_mb() -> u32 {
    100
}

fn default_batch_size() -> u32 {
    10000
}

fn default_parallel_workers() -> u32 {
    4
}

fn default_max_retries() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    100
}

fn default_max_delay_ms() -> u64 {
    5000
}

fn default_temp_directory() -> PathBuf {
    PathBuf::from("./temp")
}

fn default_log_directory() -> PathBuf {
    PathBuf::from("./logs")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_encoding() -> String {
    "utf-8".to_string()
}

fn default_true() -> bool {
    true
}

impl Settings {
    /// Merge optimizer output into these settings.
    ///
    /// Retry policy, directories and connection details are left alone.
    pub fn apply_optimized(&mut self, optimized: &OptimizedSettings) {
        self.database.pool = optimized.database.pool;
        self.import.chunk_size_mb = optimized.import.chunk_size_mb;
        self.import.batch_size = optimized.import.batch_size;
        self.import.parallel_workers = optimized.import.parallel_workers;
        self.import.use_copy = optimized.import.use_copy;
        self.optimization = optimized.optimization.clone();
    }

    /// Directory for per-run log files
    pub fn log_directory(&self) -> PathBuf {
        self.logging
            .directory
            .clone()
            .unwrap_or_else(|| self.directories.log_directory.clone())
    }

    /// Schema-qualified table name, for display
    pub fn qualified_table(&self) -> String {
        format!("{}.{}", self.database.schema, self.database.table_name)
    }
}
