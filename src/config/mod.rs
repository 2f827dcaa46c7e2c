// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Configuration module for supaload
//!
//! Handles loading, validating and saving the YAML import configuration.

pub mod settings;

pub use settings::*;
