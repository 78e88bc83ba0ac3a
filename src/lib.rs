//! omt: contract validation and resumable workflow state for agent workspaces
//!
//! **omt is a local-first ledger that agents call on demand.** It does not run
//! agents; it checks what they are handed and what they produce, and keeps a
//! durable record of where a workflow stands so a restarted coordinator can
//! pick up where the last one left off.
//!
//! # Pieces
//!
//! - **Contract validation** ([`core::contract`], [`core::rules`]): an agent's
//!   contract lists required and optional fields with a type tag and ordered
//!   rules (`minLength:N`, `maxLength:N`, `minItems:N`, `pattern:REGEX`,
//!   `fileExists`). Violations are data, never errors.
//! - **Task ledger** ([`core::task_state`]): one task's linear phase
//!   progress (planning → execution → review → complete) and agent history.
//! - **Hive ledger** ([`core::hive_state`]): the multi-role workflow phase,
//!   role statuses, consensus decision and execution counters. Writes are
//!   permissive; the ledger records, it does not gatekeep.
//! - **Consistency checker** ([`core::consistency`]): read-only reconciliation
//!   of hive claims against artifacts and unenforced invariants.
//!
//! # Storage
//!
//! Ledgers are whole JSON documents behind [`core::store::DocumentStore`].
//! There is no locking: omt assumes a single serial coordinator per workspace.
//!
//! # Examples
//!
//! ```bash
//! omt init --task-mgmt local
//! omt hive start --goal "ship v2"
//! omt validate --agent planner --phase input --data '{"goal": "ship v2"}'
//! omt hive agent --role pm --status completed --output .agents/outputs/pm.md
//! omt state-check
//! omt status
//! ```

pub mod cli;
pub mod core;
pub mod plugins;

use crate::cli::{Cli, Command};
use crate::core::{error::OmtError, workspace};
use crate::plugins::{contracts, hive, status, task};

use clap::Parser;
use std::process::ExitCode;

fn print_schema(subsystem: Option<&str>) -> Result<(), OmtError> {
    let all = [
        ("validate", contracts::schema()),
        ("task", task::schema()),
        ("hive", hive::schema()),
        ("status", status::schema()),
    ];
    let selected: Vec<_> = all
        .into_iter()
        .filter(|(name, _)| subsystem.is_none_or(|s| s == *name))
        .map(|(_, schema)| schema)
        .collect();
    if selected.is_empty() {
        return Err(OmtError::NotFound(format!(
            "unknown subsystem '{}'",
            subsystem.unwrap_or_default()
        )));
    }
    let rendered = serde_json::to_string_pretty(&serde_json::json!({
        "name": "omt",
        "version": env!("CARGO_PKG_VERSION"),
        "subsystems": selected,
    }))
    .map_err(|e| OmtError::MalformedInput(e.to_string()))?;
    println!("{rendered}");
    Ok(())
}

fn exit_for(passed: bool) -> ExitCode {
    if passed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Parses the command line and runs one command.
///
/// `Ok(ExitCode::FAILURE)` means the command ran and reported a negative
/// verdict (invalid payload, inconsistent state); `Err` means it could not run.
pub fn run() -> Result<ExitCode, OmtError> {
    let cli = Cli::parse();
    let current_dir = std::env::current_dir()?;

    match cli.command {
        Command::Init(init) => {
            let target = init.dir.unwrap_or_else(|| current_dir.clone());
            std::fs::create_dir_all(&target).map_err(OmtError::IoError)?;
            let target = std::fs::canonicalize(&target).map_err(OmtError::IoError)?;
            let report = workspace::init_workspace(&target, &init.task_mgmt)?;
            println!("Workspace initialized:");
            for path in &report.created {
                println!("  {}", path.display());
            }
            for path in &report.preserved {
                println!("  {} (preserved)", path.display());
            }
            println!("  task_management: {}", init.task_mgmt);
            Ok(ExitCode::SUCCESS)
        }
        Command::Validate(validate) => {
            let ws = workspace::Workspace::discover(&current_dir).ok();
            let valid = contracts::run_validate_cli(ws.as_ref(), validate)?;
            Ok(exit_for(valid))
        }
        Command::Status => {
            let ws = workspace::Workspace::discover(&current_dir)?;
            status::run_status(&ws)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::StateCheck(check) => {
            let ws = workspace::Workspace::discover(&current_dir)?;
            let passed = status::run_state_check(&ws, &check.format)?;
            Ok(exit_for(passed))
        }
        Command::Task(task_cli) => {
            let ws = workspace::Workspace::discover(&current_dir)?;
            task::run_task_cli(&ws, task_cli)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Hive(hive_cli) => {
            let ws = workspace::Workspace::discover(&current_dir)?;
            let ok = hive::run_hive_cli(&ws, hive_cli)?;
            Ok(exit_for(ok))
        }
        Command::Schema(schema) => {
            print_schema(schema.subsystem.as_deref())?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
