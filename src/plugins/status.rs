//! Read-only surfaces: the workspace status digest and `state-check`.

use crate::core::consistency::{ConsistencyChecker, FsArtifactProbe, StateCheckOutcome};
use crate::core::error::OmtError;
use crate::core::hive_state::HiveRole;
use crate::core::output;
use crate::core::workspace::Workspace;
use colored::Colorize;

const GOAL_PREVIEW_CHARS: usize = 120;

/// Human-readable digest of config.json, hive-state.json and state.json.
pub fn render_status(ws: &Workspace) -> Result<String, OmtError> {
    if !ws.state_dir().is_dir() {
        return Err(OmtError::NotFound(
            ".agents/.state/ not found. Run `omt init` first.".to_string(),
        ));
    }

    let mut lines: Vec<String> = vec!["=== OMT Workspace Status ===".to_string(), String::new()];

    if let Some(meta) = ws.read_meta()? {
        lines.push(format!("Version: {}", meta.workspace.version));
        lines.push(format!("Initialized: {}", meta.workspace.initialized_at));
        lines.push(format!("Task Management: {}", meta.task_management.system));
        lines.push(String::new());
    }

    if let Some(hive) = ws.hive_ledger().load_state()? {
        lines.push(format!(
            "Hive Phase: {}",
            hive.phase
                .map_or_else(|| "(none)".to_string(), |p| p.to_string())
        ));
        if let Some(goal) = &hive.goal {
            lines.push(format!(
                "Goal: {}",
                output::compact_line(goal, GOAL_PREVIEW_CHARS)
            ));
        }
        if let Some(agents) = &hive.agents {
            for role in HiveRole::ALL {
                lines.push(format!("Agent {}: {}", role, agents.get(role).status));
            }
        }
        if let Some(consensus) = &hive.consensus {
            lines.push(format!("Consensus: {}", consensus.status));
        }
        if let Some(execution) = &hive.execution {
            lines.push(format!(
                "Execution: {}/{} tasks ({} failures, max {})",
                execution.tasks_completed,
                execution.tasks_total,
                execution.failure_count,
                execution.max_failures
            ));
        }
        lines.push(format!(
            "Resumable: {}",
            if hive.is_resumable() { "yes" } else { "no" }
        ));
        lines.push(String::new());
    }

    if let Some(task) = ws.task_ledger().read_state()? {
        lines.push(format!(
            "Task: {}",
            task.task_id.as_deref().unwrap_or("(none)")
        ));
        if let Some(title) = &task.title {
            lines.push(format!("Title: {}", output::compact_line(title, GOAL_PREVIEW_CHARS)));
        }
        lines.push(format!(
            "Phase: {}",
            task.current_phase
                .map_or_else(|| "(none)".to_string(), |p| p.to_string())
        ));
        if let Some(planning) = &task.planning {
            lines.push(format!(
                "Planning agents: {}",
                output::join_or_none(&planning.agents_executed)
            ));
        }
        if let Some(execution) = &task.execution {
            lines.push(format!(
                "Execution agents: {}",
                output::join_or_none(&execution.agents_completed)
            ));
            if let Some(current) = &execution.current_agent {
                lines.push(format!("Current agent: {current}"));
            }
        }
    }

    Ok(lines.join("\n"))
}

pub fn run_status(ws: &Workspace) -> Result<(), OmtError> {
    println!("{}", render_status(ws)?);
    Ok(())
}

pub fn state_check(ws: &Workspace) -> Result<StateCheckOutcome, OmtError> {
    let config = ws.config()?;
    let checker = ConsistencyChecker::new(&config.artifacts)
        .stale_after_hours(config.state_check.stale_after_hours);
    checker.run(&ws.hive_ledger(), &FsArtifactProbe::new(&ws.root))
}

/// Prints the outcome; returns whether the check passed.
pub fn run_state_check(ws: &Workspace, format: &str) -> Result<bool, OmtError> {
    let outcome = state_check(ws)?;

    if format == "json" {
        let rendered = serde_json::to_string_pretty(&serde_json::json!({
            "cmd": "state-check",
            "passed": outcome.passed(),
            "report": outcome,
        }))
        .map_err(|e| OmtError::MalformedInput(e.to_string()))?;
        println!("{rendered}");
        return Ok(outcome.passed());
    }

    match &outcome {
        StateCheckOutcome::NothingToCheck => {
            println!("No hive state found: nothing to check.");
        }
        StateCheckOutcome::Checked { issues } if issues.is_empty() => {
            println!("{} hive state is consistent", "PASS".green().bold());
        }
        StateCheckOutcome::Checked { issues } => {
            println!(
                "{} {} issue(s) found:",
                "FAIL".red().bold(),
                issues.len()
            );
            println!("{}", output::numbered(issues));
        }
    }
    Ok(outcome.passed())
}

pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "name": "status",
        "version": "0.1.0",
        "description": "Workspace digest and hive state consistency check",
        "commands": [
            { "name": "status", "parameters": [] },
            { "name": "state-check", "parameters": ["format"] }
        ],
        "checks": [
            "completed role without artifact",
            "pending role with artifact",
            "completed tasks without execution artifact",
            "stale non-terminal state",
            "execution without approved consensus"
        ],
        "storage": ["config.json", "hive-state.json", "state.json", "omt.toml"]
    })
}
