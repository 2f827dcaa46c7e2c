// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! CLI argument definitions using Clap
//!
//! Defines all command-line arguments and subcommands for supaload.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// supaload - bulk CSV loader for PostgreSQL and Supabase
#[derive(Parser, Debug)]
#[command(name = "supaload")]
#[command(version, about = "Bulk CSV loader for PostgreSQL and Supabase")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file path
    #[arg(long, global = true, env = "SUPALOAD_CONFIG", default_value = "config.yaml")]
    pub config: PathBuf,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Import a CSV file, or every CSV file in a directory
    Import(ImportArgs),

    /// Compute tuned settings for an instance size and performance level
    Optimize(OptimizeArgs),

    /// Inspect CSV files without importing
    Analyze(AnalyzeArgs),

    /// Show local CPU and memory as seen by the optimizer
    #[command(alias = "sys")]
    System,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ImportArgs {
    /// CSV file or directory of CSV files
    pub path: PathBuf,

    /// Run the interactive optimizer before importing
    #[arg(long)]
    pub optimize: bool,

    /// Instance size (1 = Nano ... 11 = 16XL)
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=11))]
    pub instance_size: Option<u8>,

    /// Performance level (1 = Conservative, 2 = Balanced, 3 = Aggressive)
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=3))]
    pub performance_level: Option<u8>,

    /// Chunk size in MB, overrides config and optimizer
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub chunk_size: Option<u32>,

    /// Rows per INSERT batch, overrides config and optimizer
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub batch_size: Option<u32>,

    /// Load chunks one at a time
    #[arg(long)]
    pub no_parallel: bool,

    /// Skip session tuning, trigger handling and VACUUM/ANALYZE
    #[arg(long)]
    pub no_optimize_db: bool,

    /// Directory for chunk files
    #[arg(long)]
    pub temp_dir: Option<PathBuf>,

    /// Analyze only, do not load
    #[arg(long)]
    pub dry_run: bool,

    /// Apply optimizer settings without asking
    #[arg(short, long)]
    pub yes: bool,
}

impl ImportArgs {
    /// Whether the optimizer should run before the import
    pub fn wants_optimizer(&self) -> bool {
        self.optimize || self.instance_size.is_some() || self.performance_level.is_some()
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct OptimizeArgs {
    /// Instance size (1 = Nano ... 11 = 16XL); prompts when omitted
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=11))]
    pub instance_size: Option<u8>,

    /// Performance level (1 = Conservative, 2 = Balanced, 3 = Aggressive); prompts when omitted
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=3))]
    pub performance_level: Option<u8>,

    /// Merge the result into the config file
    #[arg(long)]
    pub write: bool,

    /// Do not ask before writing
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Args, Debug, Clone)]
pub struct AnalyzeArgs {
    /// CSV file or directory of CSV files
    pub path: PathBuf,
}

/// Output format options
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq)]
pub enum OutputFormat {
    /// Plain text output
    #[default]
    Text,

    /// JSON output
    Json,
}
