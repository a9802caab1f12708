//! `assetsync status`: sync-state record and recent changes.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use assetsync_core::{Category, SyncState, SyncStatus};

use crate::commands::{format_time, print_json, Services};
use crate::GlobalArgs;

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Number of recently changed ids to show.
    #[arg(long, default_value_t = 10)]
    pub recent: usize,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct StatusJson {
    sync: SyncState,
    categories: Vec<CategoryCount>,
    recent_changes: Vec<String>,
}

#[derive(Serialize, Tabled)]
struct CategoryCount {
    category: Category,
    assets: usize,
}

impl StatusArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<ExitCode> {
        let services = Services::open(global)?;
        services.connect()?;
        let engine = services.engine();

        let state = engine.sync_state().context("failed to read sync state")?;
        let categories: Vec<CategoryCount> = engine
            .list_categories()
            .context("failed to count categories")?
            .into_iter()
            .map(|(category, assets)| CategoryCount { category, assets })
            .collect();
        let recent = engine
            .recent_changes(self.recent)
            .context("failed to read changed-assets queue")?;

        if self.json {
            print_json(&StatusJson {
                sync: state,
                categories,
                recent_changes: recent,
            })?;
            return Ok(ExitCode::SUCCESS);
        }

        let status = match state.sync_status {
            SyncStatus::Idle => state.sync_status.to_string().green(),
            SyncStatus::Syncing => state.sync_status.to_string().yellow(),
            SyncStatus::Failed => state.sync_status.to_string().red(),
        };
        println!("assetsync v{} | status {status}", env!("CARGO_PKG_VERSION"));
        println!("last sync:   {}", format_time(state.last_sync_time));
        println!("synced:      {}", state.synced_count);
        println!(
            "revision:    {}",
            state.last_commit_sha.as_deref().unwrap_or("unknown")
        );

        let mut table = Table::new(categories);
        table.with(Style::rounded());
        println!("{table}");

        if recent.is_empty() {
            println!("No recent changes.");
        } else {
            println!("{}", "Recent changes:".bold());
            for id in recent {
                println!("  {id}");
            }
        }
        Ok(ExitCode::SUCCESS)
    }
}
