// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Import command

use std::path::Path;
use std::time::Duration;

use serde::Serialize;
use tracing::info;

use super::analyze::render_analysis;
use super::optimize::{confirm_on_stdin, interactive_tuning};
use crate::cli::args::{ImportArgs, OutputFormat};
use crate::config::Settings;
use crate::error::{Result, SupaloadError};
use crate::pipeline::{FileStatus, ImportRunner, PgLoader, RunOptions, RunReport, TableLoader};
use crate::utils::{format_duration, format_number, format_size};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ImportSummary<'a> {
    table: &'a str,
    table_rows: Option<i64>,
    files_attempted: usize,
    files_succeeded: usize,
    rows: u64,
    bytes: u64,
    rows_per_second: f64,
    mb_per_second: f64,
    estimated_monthly_cost: f64,
    #[serde(flatten)]
    report: &'a RunReport,
}

/// Run options from settings with command-line overrides applied last
pub fn run_options(args: &ImportArgs, settings: &Settings, format: OutputFormat) -> RunOptions {
    let mut options = RunOptions::from_settings(settings);
    if let Some(chunk_size) = args.chunk_size {
        options.chunk_size_mb = chunk_size;
    }
    if let Some(batch_size) = args.batch_size {
        options.batch_size = batch_size;
    }
    if let Some(temp_dir) = &args.temp_dir {
        options.temp_dir = temp_dir.clone();
    }
    options.parallel = !args.no_parallel;
    options.optimize_db = !args.no_optimize_db;
    options.dry_run = args.dry_run;
    options.show_progress = format == OutputFormat::Text;
    options
}

/// Text summary of a finished run
pub fn render_summary(report: &RunReport, table: &str, table_rows: Option<i64>) -> String {
    let dry_run = report
        .files
        .iter()
        .all(|f| f.status == FileStatus::Analyzed);
    let status = if dry_run {
        "Dry run (nothing loaded)"
    } else if report.is_success() {
        "Completed"
    } else {
        "Completed with errors"
    };

    let mut out = String::new();
    out.push_str("\n=== Import Summary ===\n");
    out.push_str(&format!("Status: {}\n", status));
    out.push_str(&format!("Table: {}\n", table));
    out.push_str(&format!(
        "Files: {}/{} succeeded\n",
        report.files_succeeded(),
        report.files_attempted()
    ));
    out.push_str(&format!(
        "Duration: {}\n",
        format_duration(Duration::from_secs_f64(report.elapsed_secs))
    ));
    out.push_str(&format!("Rows: {}\n", format_number(report.rows())));
    out.push_str(&format!("Data: {}\n", format_size(report.bytes())));

    if !dry_run {
        out.push_str(&format!(
            "Throughput: {} rows/sec, {:.2} MB/sec\n",
            format_number(report.rows_per_second() as u64),
            report.mb_per_second()
        ));
        out.push_str(&format!(
            "Estimated storage cost: ${:.4}/month\n",
            report.estimated_cost()
        ));
    }
    if let Some(count) = table_rows {
        out.push_str(&format!("Rows in table: {}\n", format_number(count.max(0) as u64)));
    }

    let failed: Vec<_> = report.files.iter().filter(|f| !f.is_success()).collect();
    if !failed.is_empty() {
        out.push_str("\n=== Failed Files ===\n");
        for file in failed {
            out.push_str(&format!(
                "  ✗ {}: {}\n",
                file.path.display(),
                file.error.as_deref().unwrap_or("unknown error")
            ));
        }
    }
    out
}

/// Execute the import command
pub async fn execute(
    args: &ImportArgs,
    config_path: &Path,
    settings: Option<Settings>,
    format: OutputFormat,
) -> Result<()> {
    let mut settings = settings.ok_or_else(|| {
        SupaloadError::config(format!(
            "Configuration file not found: {}",
            config_path.display()
        ))
    })?;

    if args.wants_optimizer() {
        let tuning = interactive_tuning(args.instance_size, args.performance_level, format)?;
        if confirm_on_stdin("Apply these settings to this import?", args.yes)? {
            settings.apply_optimized(&tuning.settings);
            info!(
                instance_size = tuning.instance_size,
                performance_level = tuning.performance_level,
                "applied optimized settings"
            );
        } else {
            eprintln!("Keeping the settings from {}", config_path.display());
        }
    }

    let options = run_options(args, &settings, format);
    let table = settings.qualified_table();
    info!(
        path = %args.path.display(),
        table = %table,
        chunk_size_mb = options.chunk_size_mb,
        batch_size = options.batch_size,
        parallel = options.parallel,
        optimize_db = options.optimize_db,
        "starting import"
    );

    let loader = PgLoader::connect(&settings, options.optimize_db).await?;
    let dry_run = options.dry_run;
    let runner = ImportRunner::new(loader, options);

    let outcome = runner.run_path(&args.path).await;
    let table_rows = match (&outcome, dry_run) {
        (Ok(_), false) => runner.loader().row_count().await.ok(),
        _ => None,
    };
    runner.loader().close().await;
    let report = outcome?;

    match format {
        OutputFormat::Json => {
            let summary = ImportSummary {
                table: &table,
                table_rows,
                files_attempted: report.files_attempted(),
                files_succeeded: report.files_succeeded(),
                rows: report.rows(),
                bytes: report.bytes(),
                rows_per_second: report.rows_per_second(),
                mb_per_second: report.mb_per_second(),
                estimated_monthly_cost: report.estimated_cost(),
                report: &report,
            };
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        OutputFormat::Text => {
            if dry_run {
                for analysis in report.files.iter().filter_map(|f| f.analysis.as_ref()) {
                    print!("{}", render_analysis(analysis, runner.options().chunk_size_mb));
                }
            }
            print!("{}", render_summary(&report, &table, table_rows));
        }
    }

    if report.is_success() {
        Ok(())
    } else {
        Err(SupaloadError::import(format!(
            "{} of {} files failed",
            report.files_failed(),
            report.files_attempted()
        )))
    }
}
