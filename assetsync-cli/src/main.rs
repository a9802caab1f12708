//! assetsync: keep a key-value asset catalogue in step with a manifest
//! repository.
//!
//! # Usage
//!
//! ```text
//! assetsync sync [--incremental] [--continuous] [--json]
//! assetsync health [--json]
//! assetsync list [--category tool|prompt|skill] [--json]
//! assetsync get <id> [--json]
//! assetsync status [--recent <n>] [--json]
//! assetsync validate <file>
//! assetsync create <file> --author <name> [--message <m>]
//! assetsync update <id> <file> --author <name> [--message <m>]
//! assetsync delete <id> --author <name> [--message <m>]
//! ```

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    get::GetArgs, health::HealthArgs, list::ListArgs, status::StatusArgs, sync::SyncArgs,
    validate::ValidateArgs, write::CreateArgs, write::DeleteArgs, write::UpdateArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "assetsync",
    version,
    about = "Sync tool, prompt and skill manifests from a repository into the asset store",
    long_about = None,
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every subcommand.
#[derive(clap::Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Settings file. Defaults to ./settings.yaml, then the user config dir.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Debug logging and per-batch progress.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Reconcile the store with the repository.
    Sync(SyncArgs),

    /// Check store and repository reachability.
    Health(HealthArgs),

    /// List catalogued assets.
    List(ListArgs),

    /// Show one stored asset.
    Get(GetArgs),

    /// Show the sync state and recently changed assets.
    Status(StatusArgs),

    /// Validate a manifest file without touching anything.
    Validate(ValidateArgs),

    /// Add a new asset to the repository.
    Create(CreateArgs),

    /// Replace an existing asset's manifest.
    Update(UpdateArgs),

    /// Remove an asset from the repository.
    Delete(DeleteArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let global = cli.global;
    match cli.command {
        Commands::Sync(args) => args.run(&global),
        Commands::Health(args) => args.run(&global),
        Commands::List(args) => args.run(&global),
        Commands::Get(args) => args.run(&global),
        Commands::Status(args) => args.run(&global),
        Commands::Validate(args) => args.run(&global),
        Commands::Create(args) => args.run(&global),
        Commands::Update(args) => args.run(&global),
        Commands::Delete(args) => args.run(&global),
    }
}
