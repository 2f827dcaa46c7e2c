// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Thread-safe import progress counters with an optional terminal bar

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

const BAR_TEMPLATE: &str =
    "[{elapsed_precise}] {bar:40.cyan/blue} {bytes:>10}/{total_bytes:10} ({bytes_per_sec}) {msg}";

/// Point-in-time view of a [`ProgressTracker`]
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressStats {
    pub elapsed: Duration,
    pub rows: u64,
    pub bytes: u64,
    pub rows_per_second: f64,
    pub bytes_per_second: f64,
    pub status: String,
}

/// Counts rows and bytes loaded across concurrent workers
pub struct ProgressTracker {
    started: Instant,
    rows: AtomicU64,
    bytes: AtomicU64,
    status: Mutex<String>,
    bar: ProgressBar,
}

impl ProgressTracker {
    /// Tracker with a byte progress bar of `total_bytes` drawn to stderr
    pub fn with_bar(total_bytes: u64) -> Self {
        let bar = ProgressBar::new(total_bytes);
        bar.set_style(
            ProgressStyle::with_template(BAR_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("##-"),
        );
        Self::from_bar(bar)
    }

    /// Tracker that draws nothing
    pub fn hidden() -> Self {
        Self::from_bar(ProgressBar::hidden())
    }

    fn from_bar(bar: ProgressBar) -> Self {
        Self {
            started: Instant::now(),
            rows: AtomicU64::new(0),
            bytes: AtomicU64::new(0),
            status: Mutex::new("Initializing...".to_string()),
            bar,
        }
    }

    pub fn add_rows(&self, count: u64) {
        self.rows.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_bytes(&self, count: u64) {
        self.bytes.fetch_add(count, Ordering::Relaxed);
        self.bar.inc(count);
    }

    pub fn set_status(&self, status: impl Into<String>) {
        let status = status.into();
        self.bar.set_message(status.clone());
        *self.status.lock().unwrap_or_else(PoisonError::into_inner) = status;
    }

    pub fn rows(&self) -> u64 {
        self.rows.load(Ordering::Relaxed)
    }

    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> ProgressStats {
        let elapsed = self.started.elapsed();
        let secs = elapsed.as_secs_f64();
        let rows = self.rows();
        let bytes = self.bytes();
        let rate = |n: u64| if secs > 0.0 { n as f64 / secs } else { 0.0 };

        ProgressStats {
            elapsed,
            rows,
            bytes,
            rows_per_second: rate(rows),
            bytes_per_second: rate(bytes),
            status: self
                .status
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
        }
    }

    /// Remove the bar from the terminal
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_counters_accumulate() {
        let tracker = ProgressTracker::hidden();
        tracker.add_rows(10);
        tracker.add_rows(5);
        tracker.add_bytes(2048);
        tracker.set_status("Importing file 1/2");

        let stats = tracker.stats();
        assert_eq!(stats.rows, 15);
        assert_eq!(stats.bytes, 2048);
        assert_eq!(stats.status, "Importing file 1/2");
        assert!(stats.rows_per_second >= 0.0);
    }

    #[test]
    fn test_concurrent_updates() {
        let tracker = Arc::new(ProgressTracker::hidden());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let t = Arc::clone(&tracker);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        t.add_rows(1);
                        t.add_bytes(3);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(tracker.rows(), 8000);
        assert_eq!(tracker.bytes(), 24000);
    }

    #[test]
    fn test_initial_status() {
        assert_eq!(ProgressTracker::hidden().stats().status, "Initializing...");
    }
}
