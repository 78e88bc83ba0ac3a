use crate::core::error::OmtError;
use crate::core::task_state::{TaskContext, TaskPhase};
use crate::core::time;
use crate::core::workspace::Workspace;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[clap(name = "task", about = "Record the active task's phase progress")]
pub struct TaskCli {
    #[clap(subcommand)]
    pub command: TaskCommand,
}

#[derive(Subcommand, Debug)]
pub enum TaskCommand {
    /// Start a fresh task document (replaces any previous one).
    Start {
        #[clap(long)]
        id: String,
        #[clap(long)]
        title: String,
    },
    /// Set the task phase.
    Phase {
        #[clap(value_enum)]
        phase: TaskPhase,
    },
    /// Shallow-merge a JSON object into the task context.
    Context {
        #[clap(long)]
        data: String,
    },
    /// Mark an execution agent as running.
    Agent {
        #[clap(long)]
        name: String,
    },
    /// Print the task document.
    Show,
}

pub fn run_task_cli(ws: &Workspace, cli: TaskCli) -> Result<(), OmtError> {
    let ledger = ws.task_ledger();
    let envelope = match cli.command {
        TaskCommand::Start { id, title } => {
            let state = ledger.init_task(&id, &title)?;
            time::command_envelope("task.start", "ok", serde_json::json!({ "task": state }))
        }
        TaskCommand::Phase { phase } => {
            ledger.set_phase(phase)?;
            time::command_envelope("task.phase", "ok", serde_json::json!({ "phase": phase }))
        }
        TaskCommand::Context { data } => {
            let update: TaskContext = serde_json::from_str(&data).map_err(|e| {
                OmtError::MalformedInput(format!("--data must be a JSON object: {e}"))
            })?;
            let context = ledger.update_context(update)?;
            time::command_envelope(
                "task.context",
                "ok",
                serde_json::json!({ "context": context }),
            )
        }
        TaskCommand::Agent { name } => {
            ledger.begin_execution_agent(&name)?;
            time::command_envelope("task.agent", "ok", serde_json::json!({ "agent": name }))
        }
        TaskCommand::Show => {
            let state = ledger.read_state()?;
            time::command_envelope("task.show", "ok", serde_json::json!({ "task": state }))
        }
    };
    print_envelope(&envelope)
}

pub(crate) fn print_envelope(envelope: &serde_json::Value) -> Result<(), OmtError> {
    let rendered = serde_json::to_string_pretty(envelope)
        .map_err(|e| OmtError::MalformedInput(e.to_string()))?;
    println!("{rendered}");
    Ok(())
}

pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "name": "task",
        "version": "0.1.0",
        "description": "Task state ledger commands",
        "commands": [
            { "name": "start", "parameters": ["id", "title"] },
            { "name": "phase", "parameters": ["phase"] },
            { "name": "context", "parameters": ["data"] },
            { "name": "agent", "parameters": ["name"] },
            { "name": "show", "parameters": [] }
        ],
        "storage": [".agents/.state/state.json"]
    })
}
