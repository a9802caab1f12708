//! `assetsync list`: the catalogue from the global summary index.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use tabled::{settings::Style, Table, Tabled};

use assetsync_core::{Category, SummaryEntry};

use crate::commands::{print_json, Services};
use crate::GlobalArgs;

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only assets of this category.
    #[arg(long)]
    pub category: Option<Category>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct AssetRow {
    id: String,
    category: String,
    version: String,
    name: String,
    description: String,
}

impl ListArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<ExitCode> {
        let services = Services::open(global)?;
        services.connect()?;
        let engine = services.engine();

        let entries: Vec<SummaryEntry> = match self.category {
            Some(category) => engine
                .assets_by_category(category)
                .with_context(|| format!("failed to list {category} assets"))?
                .iter()
                .map(SummaryEntry::from_asset)
                .collect(),
            None => engine.list_assets().context("failed to read the asset index")?,
        };

        if self.json {
            print_json(&entries)?;
            return Ok(ExitCode::SUCCESS);
        }
        if entries.is_empty() {
            println!("No assets found.");
            return Ok(ExitCode::SUCCESS);
        }

        let rows: Vec<AssetRow> = entries
            .into_iter()
            .map(|e| AssetRow {
                id: e.id,
                category: e.category.to_string(),
                version: e.version,
                name: e.name,
                description: e.description,
            })
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        Ok(ExitCode::SUCCESS)
    }
}
