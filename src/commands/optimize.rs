// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Optimize command and the interactive tuning wizard

use std::io::{self, BufRead, Write};
use std::path::Path;

use serde::Serialize;

use crate::cli::args::{OptimizeArgs, OutputFormat};
use crate::config::Settings;
use crate::error::{Result, SupaloadError};
use crate::optimizer::{
    InstanceProfile, LocalSpecs, OptimizedSettings, PerformanceLevel, SettingsOptimizer,
    SystemProbe,
};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OptimizationReport<'a> {
    instance_size: u8,
    instance: &'a InstanceProfile,
    performance_level: u8,
    level: &'a PerformanceLevel,
    local: &'a LocalSpecs,
    settings: &'a OptimizedSettings,
}

/// A computed tuning together with the choices that produced it
#[derive(Debug, Clone)]
pub struct Tuning {
    pub instance_size: u8,
    pub performance_level: u8,
    pub local: LocalSpecs,
    pub settings: OptimizedSettings,
}

impl Tuning {
    /// Validate the choices and run the calculation
    pub fn compute(
        optimizer: &SettingsOptimizer,
        instance_size: u8,
        performance_level: u8,
    ) -> Result<Self> {
        Ok(Self {
            instance_size,
            performance_level,
            local: *optimizer.local_specs(),
            settings: optimizer.optimized_settings(instance_size, performance_level)?,
        })
    }

    pub fn to_json(&self) -> Result<String> {
        let report = OptimizationReport {
            instance_size: self.instance_size,
            instance: InstanceProfile::for_size(self.instance_size)?,
            performance_level: self.performance_level,
            level: PerformanceLevel::for_level(self.performance_level)?,
            local: &self.local,
            settings: &self.settings,
        };
        Ok(serde_json::to_string_pretty(&report)?)
    }

    pub fn render_text(&self) -> Result<String> {
        let instance = InstanceProfile::for_size(self.instance_size)?;
        let level = PerformanceLevel::for_level(self.performance_level)?;
        let s = &self.settings;
        let mut out = String::new();

        out.push_str("\n=== Optimization Summary ===\n");
        out.push_str(&format!("Instance: {}\n", instance));
        out.push_str(&format!("Performance Level: {}\n", level));

        out.push_str("\n=== Local Machine ===\n");
        out.push_str(&format!("CPU Cores: {}\n", self.local.cpu_cores));
        out.push_str(&format!(
            "Memory: {:.1}GB ({:.1}GB available)\n",
            self.local.memory_gb, self.local.available_memory_gb
        ));
        out.push_str(&format!("CPU Usage: {:.1}%\n", self.local.cpu_percent));

        out.push_str("\n=== Optimized Settings ===\n");
        out.push_str(&format!(
            "Connection Pool: {}-{} connections (keepalive {}s)\n",
            s.database.pool.min_connections,
            s.database.pool.max_connections,
            s.database.pool.keepalive
        ));
        out.push_str(&format!("Chunk Size: {}MB\n", s.import.chunk_size_mb));
        out.push_str(&format!("Batch Size: {} rows\n", s.import.batch_size));
        out.push_str(&format!("Parallel Workers: {}\n", s.import.parallel_workers));
        out.push_str(&format!("Work Memory: {}\n", s.optimization.work_mem));
        out.push_str(&format!(
            "Maintenance Work Memory: {}\n",
            s.optimization.maintenance_work_mem
        ));
        out.push_str(&format!("Statement Timeout: {}\n", s.optimization.statement_timeout));
        out.push_str(&format!(
            "Disable Triggers: {}\n",
            yes_no(s.optimization.disable_triggers)
        ));
        out.push_str(&format!("Run VACUUM: {}\n", yes_no(s.optimization.run_vacuum)));

        if !s.recommended_actions.is_empty() {
            out.push_str("\n=== Recommendations ===\n");
            for action in &s.recommended_actions {
                out.push_str(&format!("  • {}\n", action));
            }
        }
        Ok(out)
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

/// Ask for a number in `1..=max` until one is given
pub fn prompt_choice<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    prompt: &str,
    max: u8,
) -> Result<u8> {
    loop {
        write!(output, "{} (1-{}): ", prompt, max)?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Err(SupaloadError::InvalidInput(
                "input closed before a choice was made".to_string(),
            ));
        }
        match line.trim().parse::<u8>() {
            Ok(n) if (1..=max).contains(&n) => return Ok(n),
            _ => writeln!(output, "Please enter a number between 1 and {}.", max)?,
        }
    }
}

/// Yes/no question; only `y` or `yes` count as yes
pub fn confirm<R: BufRead, W: Write>(input: &mut R, output: &mut W, question: &str) -> Result<bool> {
    write!(output, "{} [y/N]: ", question)?;
    output.flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(matches!(line.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

/// Fill in whichever of size and level are missing by prompting
pub fn run_wizard<R: BufRead, W: Write>(
    instance_size: Option<u8>,
    performance_level: Option<u8>,
    input: &mut R,
    output: &mut W,
) -> Result<(u8, u8)> {
    let size = match instance_size {
        Some(size) => size,
        None => {
            writeln!(output, "\n=== Instance Sizes ===")?;
            for (idx, profile) in SettingsOptimizer::instance_profiles().iter().enumerate() {
                writeln!(output, "  {:>2}. {}", idx + 1, profile)?;
            }
            prompt_choice(
                input,
                output,
                "Select your instance size",
                SettingsOptimizer::instance_profiles().len() as u8,
            )?
        }
    };

    let level = match performance_level {
        Some(level) => level,
        None => {
            writeln!(output, "\n=== Performance Levels ===")?;
            for (idx, level) in SettingsOptimizer::performance_levels().iter().enumerate() {
                writeln!(output, "  {}. {}", idx + 1, level)?;
            }
            prompt_choice(
                input,
                output,
                "Select performance level",
                SettingsOptimizer::performance_levels().len() as u8,
            )?
        }
    };

    Ok((size, level))
}

/// Probe, prompt for missing choices on stdin, compute and print the tuning
pub fn interactive_tuning(
    instance_size: Option<u8>,
    performance_level: Option<u8>,
    format: OutputFormat,
) -> Result<Tuning> {
    let optimizer = SettingsOptimizer::new(&SystemProbe)?;

    let stdin = io::stdin();
    let (size, level) = run_wizard(
        instance_size,
        performance_level,
        &mut stdin.lock(),
        &mut io::stderr(),
    )?;

    let tuning = Tuning::compute(&optimizer, size, level)?;
    match format {
        OutputFormat::Json => println!("{}", tuning.to_json()?),
        OutputFormat::Text => print!("{}", tuning.render_text()?),
    }
    Ok(tuning)
}

/// Ask on stdin unless `assume_yes`
pub fn confirm_on_stdin(question: &str, assume_yes: bool) -> Result<bool> {
    if assume_yes {
        return Ok(true);
    }
    confirm(&mut io::stdin().lock(), &mut io::stderr(), question)
}

/// Execute the optimize command
pub fn execute(args: &OptimizeArgs, config_path: &Path, format: OutputFormat) -> Result<()> {
    let tuning = interactive_tuning(args.instance_size, args.performance_level, format)?;

    if !args.write {
        return Ok(());
    }

    if !config_path.exists() {
        return Err(SupaloadError::config(format!(
            "--write needs an existing configuration file ({} not found)",
            config_path.display()
        )));
    }

    if !confirm_on_stdin(
        &format!("Write these settings to {}?", config_path.display()),
        args.yes,
    )? {
        eprintln!("Settings not written.");
        return Ok(());
    }

    // Re-read without environment overrides so DATABASE_URL is not persisted
    let mut settings = Settings::from_yaml(&std::fs::read_to_string(config_path)?)?;
    settings.apply_optimized(&tuning.settings);
    settings.save_to(config_path)?;
    tracing::info!(file = %config_path.display(), "saved optimized settings");
    eprintln!("Settings written to {}", config_path.display());
    Ok(())
}
