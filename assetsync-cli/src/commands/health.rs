//! `assetsync health`: reachability of the store and the repository.

use std::process::ExitCode;

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde::Serialize;

use crate::commands::{print_json, Services};
use crate::GlobalArgs;

#[derive(Args, Debug)]
pub struct HealthArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct HealthJson {
    healthy: bool,
    store: bool,
    repository: bool,
}

impl HealthArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<ExitCode> {
        let services = Services::open(global)?;
        let report = services.engine().health_check();

        if self.json {
            print_json(&HealthJson {
                healthy: report.healthy(),
                store: report.store,
                repository: report.repository,
            })?;
        } else {
            println!("store:      {}", label(report.store));
            println!("repository: {}", label(report.repository));
        }

        Ok(if report.healthy() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        })
    }
}

fn label(ok: bool) -> String {
    if ok {
        "ok".green().to_string()
    } else {
        "unreachable".red().to_string()
    }
}
