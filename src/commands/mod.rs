// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Subcommand implementations
//!
//! Each module exposes an `execute` entry point called from `main`.

pub mod analyze;
pub mod import;
pub mod optimize;
pub mod system;
