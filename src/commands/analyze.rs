// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Analyze command: inspect CSV files without touching the database

use crate::cli::args::{AnalyzeArgs, OutputFormat};
use crate::config::Settings;
use crate::error::Result;
use crate::pipeline::{analyze_file, collect_csv_files, FileAnalysis};
use crate::utils::{format_number, format_size};

/// Text block for one analyzed file
pub fn render_analysis(analysis: &FileAnalysis, chunk_size_mb: u32) -> String {
    let mut out = String::new();
    out.push_str(&format!("\n=== {} ===\n", analysis.path.display()));
    out.push_str(&format!("Size: {}\n", format_size(analysis.size_bytes)));
    out.push_str(&format!("Encoding: {}\n", analysis.encoding));
    out.push_str(&format!(
        "Rows: {}{}\n",
        format_number(analysis.row_count),
        if analysis.row_count_estimated {
            " (estimated)"
        } else {
            ""
        }
    ));
    out.push_str(&format!(
        "Columns ({}): {}\n",
        analysis.column_count(),
        analysis.columns.join(", ")
    ));
    if analysis.needs_split(chunk_size_mb) {
        out.push_str(&format!(
            "Chunks: ~{} of {}MB\n",
            analysis.estimated_chunks, chunk_size_mb
        ));
    }

    if !analysis.sample_rows.is_empty() {
        out.push_str("Sample:\n");
        for row in &analysis.sample_rows {
            out.push_str(&format!("  {}\n", row.join(" | ")));
        }
    }
    out
}

/// Execute the analyze command
pub fn execute(args: &AnalyzeArgs, settings: Option<&Settings>, format: OutputFormat) -> Result<()> {
    let defaults = Settings::default();
    let settings = settings.unwrap_or(&defaults);
    let chunk_size_mb = settings.import.chunk_size_mb;

    let analyses = collect_csv_files(&args.path)?
        .iter()
        .map(|file| analyze_file(file, chunk_size_mb, &settings.file_handling))
        .collect::<Result<Vec<_>>>()?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&analyses)?),
        OutputFormat::Text => {
            for analysis in &analyses {
                print!("{}", render_analysis(analysis, chunk_size_mb));
            }
            let total_bytes: u64 = analyses.iter().map(|a| a.size_bytes).sum();
            let total_rows: u64 = analyses.iter().map(|a| a.row_count).sum();
            println!(
                "\n{} file(s), {}, ~{} rows",
                analyses.len(),
                format_size(total_bytes),
                format_number(total_rows)
            );
        }
    }
    Ok(())
}
