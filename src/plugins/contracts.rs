use crate::core::contract::{
    self, AgentExecutionContext, ContractValidationResult, ValidationPhase,
};
use crate::core::error::OmtError;
use crate::core::workspace::Workspace;
use clap::Parser;
use serde_json::{Map, Value};
use std::path::PathBuf;

/// Ledger section a validation result is fed into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum RecordTarget {
    Planning,
    Execution,
}

#[derive(Parser, Debug)]
#[clap(
    name = "validate",
    about = "Validate an agent payload against its contract"
)]
pub struct ValidateCli {
    /// Agent name; the contract is read from `<contracts-dir>/<agent>.json`.
    #[clap(long)]
    pub agent: String,
    /// Which side of the contract to check.
    #[clap(long, value_enum)]
    pub phase: ValidationPhase,
    /// Payload as a JSON object.
    #[clap(long)]
    pub data: String,
    /// Overrides the configured contracts directory.
    #[clap(long)]
    pub contracts_dir: Option<PathBuf>,
    /// Output format: 'text' or 'json'.
    #[clap(long, default_value = "text")]
    pub format: String,
    /// Also record the result in the task ledger.
    #[clap(long, value_enum)]
    pub record: Option<RecordTarget>,
    /// Output file stored with a planning record (defaults to `.agents/outputs/<agent>.md`).
    #[clap(long)]
    pub output_file: Option<String>,
    /// Task id carried in the validation context.
    #[clap(long, default_value = "cli-validate")]
    pub task_id: String,
}

/// Parses `--data`; anything but a JSON object is malformed.
pub fn parse_payload(raw: &str) -> Result<Map<String, Value>, OmtError> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| OmtError::MalformedInput(format!("--data must be valid JSON: {e}")))?;
    match value {
        Value::Object(map) => Ok(map),
        other => Err(OmtError::MalformedInput(format!(
            "--data must be a JSON object, got {}",
            crate::core::rules::type_tag(&other)
        ))),
    }
}

/// Returns whether the payload satisfied the contract.
pub fn run_validate_cli(
    workspace: Option<&Workspace>,
    cli: ValidateCli,
) -> Result<bool, OmtError> {
    let contracts_dir = match (&cli.contracts_dir, workspace) {
        (Some(dir), _) => dir.clone(),
        (None, Some(ws)) => ws.config()?.contracts_dir(&ws.root),
        (None, None) => {
            return Err(OmtError::NotFound(
                "no workspace found and no --contracts-dir given".to_string(),
            ));
        }
    };
    let contract = contract::load_contract(&contracts_dir, &cli.agent)?;
    let data = parse_payload(&cli.data)?;

    let context = AgentExecutionContext {
        agent: cli.agent.clone(),
        task_id: cli.task_id.clone(),
        phase: cli.phase,
        input_data: if cli.phase == ValidationPhase::Input {
            data.clone()
        } else {
            Map::new()
        },
        output_data: (cli.phase == ValidationPhase::Output).then_some(data),
    };
    let result = contract::validate(&contract, &context);

    if let Some(target) = cli.record {
        let ws = workspace.ok_or_else(|| {
            OmtError::NotFound("--record needs an initialized workspace".to_string())
        })?;
        record(ws, target, &cli, &result)?;
    }

    if cli.format == "json" {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "agent": cli.agent,
                "phase": cli.phase,
                "result": result,
            }))
            .map_err(|e| OmtError::MalformedInput(e.to_string()))?
        );
    } else {
        println!("{}", contract::format_validation_result(&result, cli.phase));
    }

    Ok(result.valid)
}

fn record(
    ws: &Workspace,
    target: RecordTarget,
    cli: &ValidateCli,
    result: &ContractValidationResult,
) -> Result<(), OmtError> {
    let ledger = ws.task_ledger();
    match target {
        RecordTarget::Planning => {
            let output_file = cli.output_file.clone().unwrap_or_else(|| {
                ws.default_output_file(&cli.agent)
                    .to_string_lossy()
                    .into_owned()
            });
            ledger.record_planning_agent(&cli.agent, &output_file, result)
        }
        RecordTarget::Execution => ledger.record_execution_agent(&cli.agent, result),
    }
}

pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "name": "validate",
        "version": "0.1.0",
        "description": "Contract validation for agent input/output payloads",
        "commands": [
            { "name": "validate", "parameters": ["agent", "phase", "data", "contracts_dir", "format", "record", "output_file", "task_id"] }
        ],
        "rules": ["minLength:N", "maxLength:N", "minItems:N", "pattern:REGEX", "fileExists"],
        "storage": ["contracts/<agent>.json", "state.json"]
    })
}
