//! `assetsync create|update|delete`: write-back to the repository.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use assetsync_engine::WriteOutcome;

use crate::commands::{read_manifest_file, Services};
use crate::GlobalArgs;

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Manifest file describing the new asset.
    pub file: PathBuf,

    /// Recorded in the commit message.
    #[arg(long)]
    pub author: String,

    /// Commit message override.
    #[arg(long)]
    pub message: Option<String>,
}

#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Asset id.
    pub id: String,

    /// Manifest file with the new content.
    pub file: PathBuf,

    #[arg(long)]
    pub author: String,

    #[arg(long)]
    pub message: Option<String>,
}

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Asset id.
    pub id: String,

    #[arg(long)]
    pub author: String,

    #[arg(long)]
    pub message: Option<String>,
}

impl CreateArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<ExitCode> {
        let manifest = read_manifest_file(&self.file)?;
        let services = Services::open(global)?;
        services.connect()?;
        let outcome = services
            .engine()
            .create_asset(&manifest, &self.author, self.message.as_deref())
            .context("create failed")?;
        report("created", &outcome);
        Ok(ExitCode::SUCCESS)
    }
}

impl UpdateArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<ExitCode> {
        let manifest = read_manifest_file(&self.file)?;
        let services = Services::open(global)?;
        services.connect()?;
        let outcome = services
            .engine()
            .update_asset(&self.id, &manifest, &self.author, self.message.as_deref())
            .with_context(|| format!("update of '{}' failed", self.id))?;
        report("updated", &outcome);
        Ok(ExitCode::SUCCESS)
    }
}

impl DeleteArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<ExitCode> {
        let services = Services::open(global)?;
        services.connect()?;
        let outcome = services
            .engine()
            .delete_asset(&self.id, &self.author, self.message.as_deref())
            .with_context(|| format!("delete of '{}' failed", self.id))?;
        report("deleted", &outcome);
        Ok(ExitCode::SUCCESS)
    }
}

fn report(verb: &str, outcome: &WriteOutcome) {
    println!(
        "{} {verb} {} {} at {}",
        "✓".green(),
        outcome.id,
        outcome.version,
        outcome.location
    );
    if !outcome.store_synced {
        println!(
            "  {} store not updated; the next sync will pick it up",
            "!".yellow()
        );
    }
}
