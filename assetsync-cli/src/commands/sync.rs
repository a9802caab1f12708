//! `assetsync sync`: one reconciliation pass, or a polling loop.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use assetsync_daemon::{start_blocking, PassKind, PollSettings};
use assetsync_engine::{SyncStats, SyncSummary};

use crate::commands::{print_json, Services};
use crate::GlobalArgs;

/// Arguments for `assetsync sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Skip the pass when the repository has not changed since the last one.
    #[arg(long)]
    pub incremental: bool,

    /// Keep running, one pass per configured interval, until ctrl-c.
    #[arg(long)]
    pub continuous: bool,

    /// Print the pass summary as JSON.
    #[arg(long)]
    pub json: bool,
}

impl SyncArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<ExitCode> {
        let services = Services::open(global)?;
        services.connect()?;

        if self.continuous {
            return self.run_continuous(&services);
        }

        let engine = services.engine();
        let verbose = global.verbose;
        let mut progress = |p: &assetsync_engine::SyncProgress| {
            if verbose {
                eprintln!("  {} {}/{}", p.message, p.current, p.total);
            }
        };
        let stats = if self.incremental {
            engine.incremental_sync_with_progress(&mut progress)
        } else {
            engine.sync_from_repository_with_progress(&mut progress)
        }
        .context("sync failed")?;

        if self.json {
            print_json(&stats.summary())?;
        } else {
            print_stats(&stats);
        }
        Ok(if stats.has_failures() {
            ExitCode::FAILURE
        } else {
            ExitCode::SUCCESS
        })
    }

    fn run_continuous(&self, services: &Services) -> Result<ExitCode> {
        let mut settings = PollSettings::from_config(&services.config);
        if self.incremental {
            settings.kind = PassKind::Incremental;
        }
        println!(
            "Polling every {}s ({}), ctrl-c to stop",
            settings.interval.as_secs(),
            match settings.kind {
                PassKind::Full => "full",
                PassKind::Incremental => "incremental",
            }
        );
        let report = start_blocking(services.daemon_services(), settings)
            .context("continuous sync exited with error")?;
        println!(
            "Stopped after {} passes ({} failed)",
            report.passes, report.failed_passes
        );
        if let Some(last) = report.last.as_ref() {
            print_summary_line(last);
        }
        Ok(ExitCode::SUCCESS)
    }
}

fn print_stats(stats: &SyncStats) {
    let summary = stats.summary();
    print_summary_line(&summary);
    if !summary.errors.is_empty() {
        println!("{}", "Errors:".yellow().bold());
        for error in &summary.errors {
            println!("  - {error}");
        }
        let hidden = stats.errors.len() - summary.errors.len();
        if hidden > 0 {
            println!("  … and {hidden} more");
        }
    }
}

fn print_summary_line(summary: &SyncSummary) {
    let mark = if summary.failed > 0 {
        "✗".red().to_string()
    } else {
        "✓".green().to_string()
    };
    println!(
        "{mark} {} processed, {} created, {} updated, {} deleted, {} failed, {} skipped ({:.2}s)",
        summary.total_processed,
        summary.created,
        summary.updated,
        summary.deleted,
        summary.failed,
        summary.skipped,
        summary.duration_seconds,
    );
}
