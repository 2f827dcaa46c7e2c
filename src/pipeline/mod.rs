// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! CSV import pipeline
//!
//! analyze → split → load → clean up, driven by [`ImportRunner`].

pub mod analyzer;
pub mod encoding;
pub mod loader;
pub mod progress;
pub mod runner;
pub mod splitter;

pub use analyzer::*;
pub use encoding::*;
pub use loader::*;
pub use progress::*;
pub use runner::*;
pub use splitter::*;
