// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! tracing subscriber setup
//!
//! Console output goes to stderr and is filtered by `-v` or `RUST_LOG`. When a
//! config file was loaded, every run also writes a timestamped log file at the
//! configured level and format.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;

use chrono::{Local, NaiveDateTime};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

use crate::config::{LogFormat, Settings};
use crate::error::{Result, SupaloadError};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Console directive for a `-v` count
pub fn verbosity_directive(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "warn,supaload=info",
        _ => "info,supaload=debug",
    }
}

/// `RUST_LOG` when set, otherwise derived from `-v`
pub fn console_filter(verbose: u8) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(verbosity_directive(verbose)))
}

pub fn log_file_path(dir: &Path, at: NaiveDateTime) -> PathBuf {
    dir.join(format!("supaload_{}.log", at.format("%Y%m%d_%H%M%S")))
}

/// Install the global subscriber. Returns the log file path, if one was opened.
pub fn init(verbose: u8, settings: Option<&Settings>) -> Result<Option<PathBuf>> {
    let mut layers: Vec<BoxedLayer> = vec![fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(console_filter(verbose))
        .boxed()];

    let mut log_path = None;
    if let Some(settings) = settings {
        let dir = settings.log_directory();
        std::fs::create_dir_all(&dir)?;
        let path = log_file_path(&dir, Local::now().naive_local());
        let file = File::create(&path)?;

        let level = LevelFilter::from_str(&settings.logging.level).map_err(|_| {
            SupaloadError::config(format!("Invalid log level: {}", settings.logging.level))
        })?;

        let base = fmt::layer()
            .with_ansi(false)
            .with_thread_ids(true)
            .with_writer(Mutex::new(file));
        layers.push(match settings.logging.format {
            LogFormat::Json => base.json().with_filter(level).boxed(),
            LogFormat::Text => base.with_filter(level).boxed(),
        });
        log_path = Some(path);
    }

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .map_err(|e| SupaloadError::config(format!("Failed to initialize logging: {}", e)))?;

    if let Some(path) = &log_path {
        tracing::debug!(file = %path.display(), "writing log file");
    }
    Ok(log_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_verbosity_directive() {
        assert_eq!(verbosity_directive(0), "warn");
        assert_eq!(verbosity_directive(1), "warn,supaload=info");
        assert_eq!(verbosity_directive(2), "info,supaload=debug");
        assert_eq!(verbosity_directive(9), "info,supaload=debug");
    }

    #[test]
    fn test_log_file_path() {
        let at = NaiveDate::from_ymd_opt(2025, 3, 7)
            .unwrap()
            .and_hms_opt(14, 5, 9)
            .unwrap();
        assert_eq!(
            log_file_path(Path::new("logs"), at),
            PathBuf::from("logs/supaload_20250307_140509.log")
        );
    }
}
