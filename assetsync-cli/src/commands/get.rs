//! `assetsync get`: one stored record.

use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use crate::commands::{format_time, print_json, Services};
use crate::GlobalArgs;

#[derive(Args, Debug)]
pub struct GetArgs {
    /// Asset id.
    pub id: String,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl GetArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<ExitCode> {
        let services = Services::open(global)?;
        services.connect()?;
        let Some(asset) = services
            .engine()
            .get_asset(&self.id)
            .with_context(|| format!("failed to read asset '{}'", self.id))?
        else {
            bail!("asset '{}' not found", self.id);
        };

        if self.json {
            print_json(&asset)?;
            return Ok(ExitCode::SUCCESS);
        }

        println!("{} {}", asset.id.bold(), asset.version);
        println!("  name:        {}", asset.name);
        println!("  category:    {}", asset.category);
        println!("  description: {}", asset.description);
        if let Some(author) = &asset.author {
            println!("  author:      {author}");
        }
        println!("  path:        {}", asset.github_path);
        println!("  revision:    {}", asset.github_sha);
        println!("  created:     {}", format_time(Some(asset.created_at)));
        println!("  updated:     {}", format_time(Some(asset.updated_at)));
        Ok(ExitCode::SUCCESS)
    }
}
