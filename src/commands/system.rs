// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Local machine information command

use crate::cli::args::OutputFormat;
use crate::error::Result;
use crate::optimizer::{
    LocalSpecs, ResourceProbe, SystemProbe, HIGH_CPU_PERCENT, LOW_LOCAL_MEMORY_GB,
};

/// Text report for a probe snapshot
pub fn render_text(specs: &LocalSpecs) -> String {
    let mut out = String::new();
    out.push_str("\n=== Local Machine ===\n");
    out.push_str(&format!("CPU Cores: {}\n", specs.cpu_cores));
    out.push_str(&format!("Memory: {:.1}GB\n", specs.memory_gb));
    out.push_str(&format!(
        "Available Memory: {:.1}GB{}\n",
        specs.available_memory_gb,
        if specs.available_memory_gb < LOW_LOCAL_MEMORY_GB {
            " ⚠️"
        } else {
            ""
        }
    ));
    out.push_str(&format!(
        "CPU Usage: {:.1}%{}\n",
        specs.cpu_percent,
        if specs.cpu_percent > HIGH_CPU_PERCENT {
            " ⚠️"
        } else {
            ""
        }
    ));
    out
}

/// Execute the system command
pub fn execute(format: OutputFormat) -> Result<()> {
    let specs = SystemProbe.probe()?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&specs)?),
        OutputFormat::Text => print!("{}", render_text(&specs)),
    }
    Ok(())
}
