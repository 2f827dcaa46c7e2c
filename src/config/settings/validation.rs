// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::str::FromStr;

use crate::error::{Result, SupaloadError};
use crate::pipeline::TextEncoding;

use super::{Settings, REQUIRED_SECTIONS};

pub(super) fn check_required_sections(raw: &serde_yaml::Value) -> Result<()> {
    let map = raw
        .as_mapping()
        .ok_or_else(|| SupaloadError::config("Configuration file must be a YAML mapping"))?;

    for section in REQUIRED_SECTIONS {
        if !map.contains_key(section) {
            return Err(SupaloadError::config(format!(
                "Missing required configuration section: {}",
                section
            )));
        }
    }
    Ok(())
}

impl Settings {
    /// Check field-level rules serde cannot express.
    pub fn validate(&self) -> Result<()> {
        self.validate_database()?;

        let pool = &self.database.pool;
        if pool.max_connections == 0 {
            return Err(SupaloadError::config(
                "database.pool.max_connections must be at least 1",
            ));
        }
        if pool.min_connections > pool.max_connections {
            return Err(SupaloadError::config(format!(
                "database.pool.min_connections ({}) exceeds max_connections ({})",
                pool.min_connections, pool.max_connections
            )));
        }

        if self.import.chunk_size_mb == 0 {
            return Err(SupaloadError::config("import.chunk_size_mb must be positive"));
        }
        if self.import.batch_size == 0 {
            return Err(SupaloadError::config("import.batch_size must be positive"));
        }
        if self.import.parallel_workers == 0 {
            return Err(SupaloadError::config(
                "import.parallel_workers must be at least 1",
            ));
        }

        TextEncoding::from_str(&self.file_handling.default_encoding)?;

        if tracing::Level::from_str(&self.logging.level).is_err() {
            return Err(SupaloadError::config(format!(
                "Unknown logging.level: {}",
                self.logging.level
            )));
        }

        Ok(())
    }

    fn validate_database(&self) -> Result<()> {
        let db = &self.database;

        if db.connection_string.is_none() {
            let missing = [
                ("host", db.host.is_none()),
                ("port", db.port.is_none()),
                ("database", db.database.is_none()),
                ("user", db.user.is_none()),
                ("password", db.password.is_none()),
            ]
            .into_iter()
            .find(|(_, missing)| *missing);

            if let Some((field, _)) = missing {
                return Err(SupaloadError::config(format!(
                    "Missing required database configuration: {}",
                    field
                )));
            }
        }

        if db.table_name.trim().is_empty() {
            return Err(SupaloadError::config(
                "Missing required database configuration: table_name",
            ));
        }
        if db.schema.trim().is_empty() {
            return Err(SupaloadError::config("database.schema must not be empty"));
        }

        Ok(())
    }
}
