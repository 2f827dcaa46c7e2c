// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! supaload - bulk CSV loader for PostgreSQL and Supabase
//!
//! Entry point for the supaload CLI application.

use std::process::ExitCode;

use clap::Parser;

use supaload::cli::{Cli, Commands};
use supaload::commands;
use supaload::config::{env_database_url, Settings, DATABASE_URL_ENV};
use supaload::error::Result;
use supaload::logging;
use supaload::utils;

#[tokio::main]
async fn main() -> ExitCode {
    // .env first so it can supply SUPALOAD_CONFIG and DATABASE_URL
    dotenv::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("\n{}", utils::format_error(&e));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    // A missing config file is fine for commands that do not need one
    let settings = Settings::load_optional(&cli.config)?;
    if let Some(settings) = &settings {
        settings.ensure_directories()?;
    }

    if let Some(path) = logging::init(cli.verbose, settings.as_ref())? {
        tracing::info!(log_file = %path.display(), config = %cli.config.display(), "supaload starting");
    }
    // settings load before the subscriber exists
    if settings.is_some() && env_database_url(|key| std::env::var(key).ok()).is_some() {
        tracing::debug!("using {} from environment", DATABASE_URL_ENV);
    }

    // Dispatch to appropriate command
    match &cli.command {
        Commands::Import(args) => {
            commands::import::execute(args, &cli.config, settings, cli.format).await?;
        }
        Commands::Optimize(args) => {
            commands::optimize::execute(args, &cli.config, cli.format)?;
        }
        Commands::Analyze(args) => {
            commands::analyze::execute(args, settings.as_ref(), cli.format)?;
        }
        Commands::System => {
            commands::system::execute(cli.format)?;
        }
    }

    Ok(())
}
