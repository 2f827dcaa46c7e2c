// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Import settings optimizer
//!
//! Turns a declared instance size and performance level, plus a snapshot of
//! the local machine, into pool bounds, chunk/batch sizes, worker counts and
//! session settings for the loader.

pub mod calculator;
pub mod probe;
pub mod profile;
pub mod recommendations;
pub mod tuning;

pub use calculator::*;
pub use probe::*;
pub use profile::*;
pub use recommendations::*;
pub use tuning::*;
