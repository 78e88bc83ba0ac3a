//! CLI struct definitions for the omt command-line interface.
//!
//! Top-level clap types live here; each command group's own types live in
//! its plugin module. Dispatch lives in `lib.rs`.

use crate::plugins::{contracts, hive, task};

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "omt",
    version = env!("CARGO_PKG_VERSION"),
    about = "Contract validation and resumable workflow state for multi-agent workspaces"
)]
pub(crate) struct Cli {
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(clap::Args, Debug)]
pub(crate) struct InitCli {
    /// Task management system recorded in the workspace metadata.
    #[clap(long, default_value = "local")]
    pub task_mgmt: String,
    /// Directory to initialize (defaults to current working directory).
    #[clap(short, long)]
    pub dir: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub(crate) struct StateCheckCli {
    /// Output format: 'text' or 'json'.
    #[clap(long, default_value = "text")]
    pub format: String,
}

#[derive(clap::Args, Debug)]
pub(crate) struct SchemaCli {
    /// Optional: filter by command group name
    #[clap(long)]
    pub subsystem: Option<String>,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Create the .agents/ workspace layout
    Init(InitCli),

    /// Validate an agent payload against its contract
    Validate(contracts::ValidateCli),

    /// Show a digest of the workspace state documents
    Status,

    /// Reconcile hive state with artifacts on disk
    #[clap(name = "state-check")]
    StateCheck(StateCheckCli),

    /// Task state ledger
    Task(task::TaskCli),

    /// Hive state ledger
    Hive(hive::HiveCli),

    /// Print machine-readable command group descriptors
    Schema(SchemaCli),
}
