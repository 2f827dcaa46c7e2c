// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! supaload - bulk CSV loader for PostgreSQL and Supabase.
//!
//! This crate exposes the runtime used by the `supaload` CLI (`src/main.rs`).
//!
//! Architecture highlights:
//! - `optimizer`: maps an instance size and performance level, plus a probe of
//!   the local machine, to pool bounds, chunk/batch sizes and session settings
//! - `pipeline`: file analysis, chunk splitting, COPY/INSERT loading and the
//!   run orchestrator
//! - `config`: YAML settings with environment overrides
//! - `commands`: subcommand entry points and text/JSON rendering

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod optimizer;
pub mod pipeline;
pub mod utils;

pub use error::{Result, SupaloadError};
