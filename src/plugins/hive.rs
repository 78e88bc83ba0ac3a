use crate::core::error::OmtError;
use crate::core::hive_state::{
    AgentStatus, ConsensusGuard, ConsensusStatus, ConsensusUpdate, ExecutionUpdate, HivePhase,
    HiveRole,
};
use crate::core::time;
use crate::core::workspace::Workspace;
use crate::plugins::task::print_envelope;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[clap(
    name = "hive",
    about = "Record the multi-role workflow's phase, roles, consensus and execution counters"
)]
pub struct HiveCli {
    #[clap(subcommand)]
    pub command: HiveCommand,
}

#[derive(Subcommand, Debug)]
pub enum HiveCommand {
    /// Write a fresh all-pending hive document for a goal.
    Start {
        #[clap(long)]
        goal: String,
    },
    /// Set the hive phase. Any phase is accepted unless --strict.
    Phase {
        #[clap(value_enum)]
        phase: HivePhase,
        /// Refuse to enter execution before consensus is approved.
        #[clap(long)]
        strict: bool,
    },
    /// Update one role's status (and optionally its output).
    Agent {
        #[clap(long, value_enum)]
        role: HiveRole,
        #[clap(long, value_enum)]
        status: AgentStatus,
        #[clap(long, conflicts_with = "clear_output")]
        output: Option<String>,
        #[clap(long)]
        clear_output: bool,
    },
    /// Shallow-merge execution counters.
    Exec {
        #[clap(long)]
        tasks_total: Option<u64>,
        #[clap(long)]
        tasks_completed: Option<u64>,
        #[clap(long, conflicts_with = "clear_current_task")]
        current_task: Option<String>,
        #[clap(long)]
        clear_current_task: bool,
        #[clap(long)]
        failure_count: Option<u64>,
        #[clap(long)]
        max_failures: Option<u64>,
    },
    /// Record the consensus decision.
    Consensus {
        #[clap(long, value_enum)]
        status: Option<ConsensusStatus>,
        /// JSON array of decision points.
        #[clap(long)]
        decision_points: Option<String>,
        /// JSON value describing the user's decisions.
        #[clap(long)]
        user_decisions: Option<String>,
    },
    /// Report whether the workflow can be resumed (exit status 0 when it can).
    Resumable,
    /// Print the hive document.
    Show,
}

/// Returns `false` only for `resumable` on a non-resumable workflow.
pub fn run_hive_cli(ws: &Workspace, cli: HiveCli) -> Result<bool, OmtError> {
    let ledger = ws.hive_ledger();
    let envelope = match cli.command {
        HiveCommand::Start { goal } => {
            let state = ledger.start(&goal)?;
            time::command_envelope("hive.start", "ok", serde_json::json!({ "hive": state }))
        }
        HiveCommand::Phase { phase, strict } => {
            let state = if strict {
                ledger.with_guard(ConsensusGuard).set_phase(phase)?
            } else {
                ledger.set_phase(phase)?
            };
            time::command_envelope(
                "hive.phase",
                "ok",
                serde_json::json!({ "phase": state.phase }),
            )
        }
        HiveCommand::Agent {
            role,
            status,
            output,
            clear_output,
        } => {
            let output = if clear_output { Some(None) } else { output.map(Some) };
            let state = ledger.update_agent_status(role, status, output)?;
            let slot = state.agents.as_ref().map(|a| a.get(role).clone());
            time::command_envelope(
                "hive.agent",
                "ok",
                serde_json::json!({ "role": role, "agent": slot }),
            )
        }
        HiveCommand::Exec {
            tasks_total,
            tasks_completed,
            current_task,
            clear_current_task,
            failure_count,
            max_failures,
        } => {
            let state = ledger.update_execution(ExecutionUpdate {
                tasks_total,
                tasks_completed,
                current_task: if clear_current_task {
                    Some(None)
                } else {
                    current_task.map(|task| Some(serde_json::Value::String(task)))
                },
                failure_count,
                max_failures,
            })?;
            time::command_envelope(
                "hive.exec",
                "ok",
                serde_json::json!({ "execution": state.execution }),
            )
        }
        HiveCommand::Consensus {
            status,
            decision_points,
            user_decisions,
        } => {
            let decision_points = decision_points
                .map(|raw| parse_json_arg::<Vec<serde_json::Value>>("--decision-points", &raw))
                .transpose()?;
            let user_decisions = user_decisions
                .map(|raw| parse_json_arg::<serde_json::Value>("--user-decisions", &raw))
                .transpose()?
                .map(|v| if v.is_null() { None } else { Some(v) });
            let state = ledger.update_consensus(ConsensusUpdate {
                status,
                decision_points,
                user_decisions,
            })?;
            time::command_envelope(
                "hive.consensus",
                "ok",
                serde_json::json!({ "consensus": state.consensus }),
            )
        }
        HiveCommand::Resumable => {
            let resumable = ledger.is_resumable()?;
            print_envelope(&time::command_envelope(
                "hive.resumable",
                "ok",
                serde_json::json!({ "resumable": resumable }),
            ))?;
            return Ok(resumable);
        }
        HiveCommand::Show => {
            let state = ledger.load_state()?;
            time::command_envelope("hive.show", "ok", serde_json::json!({ "hive": state }))
        }
    };
    print_envelope(&envelope)?;
    Ok(true)
}

fn parse_json_arg<T: serde::de::DeserializeOwned>(flag: &str, raw: &str) -> Result<T, OmtError> {
    serde_json::from_str(raw)
        .map_err(|e| OmtError::MalformedInput(format!("{flag} must be valid JSON: {e}")))
}

pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "name": "hive",
        "version": "0.1.0",
        "description": "Hive state ledger commands (permissive writer; see state-check)",
        "commands": [
            { "name": "start", "parameters": ["goal"] },
            { "name": "phase", "parameters": ["phase", "strict"] },
            { "name": "agent", "parameters": ["role", "status", "output", "clear_output"] },
            { "name": "exec", "parameters": ["tasks_total", "tasks_completed", "current_task", "clear_current_task", "failure_count", "max_failures"] },
            { "name": "consensus", "parameters": ["status", "decision_points", "user_decisions"] },
            { "name": "resumable", "parameters": [] },
            { "name": "show", "parameters": [] }
        ],
        "phases": ["init", "pm", "arch", "consensus", "execution", "completed", "aborted", "escalated"],
        "storage": [".agents/.state/hive-state.json"]
    })
}
