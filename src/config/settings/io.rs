// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::path::Path;

use crate::error::{Result, SupaloadError};

use super::validation;
use super::Settings;

/// Environment variable that replaces `database.connection_string`
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

/// Non-blank [`DATABASE_URL_ENV`] value, if any
pub fn env_database_url<F>(lookup: F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(DATABASE_URL_ENV).filter(|v| !v.trim().is_empty())
}

impl Settings {
    /// Load, check and validate settings from a YAML file.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SupaloadError::config(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path)?;
        let mut settings = Self::from_yaml(&content)?;
        settings.apply_env_overrides_with(|key| std::env::var(key).ok());
        settings.validate()?;
        Ok(settings)
    }

    /// Like [`Settings::load_from`], but a missing file is `Ok(None)`.
    pub fn load_optional(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        Self::load_from(path).map(Some)
    }

    /// Parse YAML text, reporting missing sections by name.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let raw: serde_yaml::Value = serde_yaml::from_str(content)?;
        validation::check_required_sections(&raw)?;
        Ok(serde_yaml::from_value(raw)?)
    }

    /// Environment takes priority over the config file. Returns whether
    /// anything was overridden.
    pub fn apply_env_overrides_with<F>(&mut self, lookup: F) -> bool
    where
        F: Fn(&str) -> Option<String>,
    {
        match env_database_url(lookup) {
            Some(url) => {
                self.database.connection_string = Some(url);
                true
            }
            None => false,
        }
    }

    /// Save settings to a specific path, fully overwriting.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Ensure the temp and log directories exist.
    pub fn ensure_directories(&self) -> Result<()> {
        for dir in [self.directories.temp_directory.clone(), self.log_directory()] {
            if !dir.exists() {
                std::fs::create_dir_all(&dir)?;
            }
        }
        Ok(())
    }
}
