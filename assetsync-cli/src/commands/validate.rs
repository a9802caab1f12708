//! `assetsync validate`: check a manifest file against the schema.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use assetsync_core::config::LoggingConfig;
use assetsync_core::validate_yaml;

use crate::commands::init_logging;
use crate::GlobalArgs;

#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Manifest file to check.
    pub file: PathBuf,
}

impl ValidateArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<ExitCode> {
        init_logging(global.verbose, &LoggingConfig::default());
        let text = std::fs::read_to_string(&self.file)
            .with_context(|| format!("failed to read {}", self.file.display()))?;

        match validate_yaml(&text) {
            Ok(manifest) => {
                println!(
                    "{} {} {} ({})",
                    "✓".green(),
                    manifest.id,
                    manifest.version,
                    manifest.category
                );
                Ok(ExitCode::SUCCESS)
            }
            Err(violation) => {
                println!("{} {} is invalid", "✗".red(), self.file.display());
                for error in &violation.errors {
                    println!("  - {error}");
                }
                Ok(ExitCode::FAILURE)
            }
        }
    }
}
