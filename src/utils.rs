// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Formatting helpers for summaries and error output

use std::time::Duration;

use crate::error::SupaloadError;

/// Storage price used for the cost estimate, USD per GB-month
pub const STORAGE_COST_PER_GB: f64 = 0.125;

/// Format a size in bytes to human-readable form
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// `45.2s`, `3m 05s`, `2h 07m`
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{:.1}s", duration.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else {
        format!("{}h {:02}m", secs / 3600, (secs % 3600) / 60)
    }
}

/// Format a number with thousand separators for readability
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

/// Rate over `secs`; zero when no time has passed
pub fn per_second(amount: f64, secs: f64) -> f64 {
    if secs > 0.0 {
        amount / secs
    } else {
        0.0
    }
}

/// Monthly storage cost of `bytes` at [`STORAGE_COST_PER_GB`]
pub fn estimate_storage_cost(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0 * 1024.0) * STORAGE_COST_PER_GB
}

/// Format an error for display to the user
pub fn format_error(error: &SupaloadError) -> String {
    match error {
        SupaloadError::Optimizer(e) => format!("Error: {}", e),
        SupaloadError::Database(e) => format!(
            "Database error: {}\nCheck the database section of your config or DATABASE_URL.",
            e
        ),
        SupaloadError::Config(msg) => format!(
            "Configuration error: {}\nSee config.example.yaml for the expected layout.",
            msg
        ),
        _ => format!("Error: {}", error),
    }
}
