// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Error types for supaload
//!
//! This module defines all error types used throughout the application.

use thiserror::Error;

/// Main error type for supaload operations
#[derive(Error, Debug)]
pub enum SupaloadError {
    /// Optimizer input validation errors
    #[error("Optimizer error: {0}")]
    Optimizer(#[from] OptimizerError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV reader errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// File analysis errors
    #[error("Analysis error: {0}")]
    Analysis(String),

    /// Import errors
    #[error("Import error: {0}")]
    Import(String),

    /// Local resource probe errors
    #[error("Resource probe error: {0}")]
    Probe(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Optimizer-specific error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OptimizerError {
    /// Instance size outside the predefined tiers
    #[error("Invalid instance size {value}. Choose between 1-{max}")]
    InvalidInstanceSize { value: u8, max: usize },

    /// Performance level outside the predefined levels
    #[error(
        "Invalid performance level {value}. Choose 1 (Conservative), 2 (Balanced), or 3 (Aggressive)"
    )]
    InvalidPerformanceLevel { value: u8 },
}

/// Result type alias for supaload operations
pub type Result<T> = std::result::Result<T, SupaloadError>;

impl SupaloadError {
    pub fn config(msg: impl Into<String>) -> Self {
        SupaloadError::Config(msg.into())
    }

    pub fn analysis(msg: impl Into<String>) -> Self {
        SupaloadError::Analysis(msg.into())
    }

    pub fn import(msg: impl Into<String>) -> Self {
        SupaloadError::Import(msg.into())
    }

    /// Whether this error came back from the database server itself
    /// (as opposed to IO, pool or protocol failures).
    pub fn is_database_rejection(&self) -> bool {
        matches!(self, SupaloadError::Database(sqlx::Error::Database(_)))
    }
}
