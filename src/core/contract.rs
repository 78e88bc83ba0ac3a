//! Agent contracts and the contract validator.
//!
//! A contract declares the required and optional fields of an agent's input
//! and output payloads. Validation walks those lists through the field rule
//! engine and aggregates the verdicts into a [`ContractValidationResult`].
//! Both entry points are pure apart from the timestamp they stamp.

use crate::core::error::OmtError;
use crate::core::rules;
use crate::core::time;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

/// Field reported when an output payload is absent altogether.
pub const ROOT_FIELD: &str = "__root__";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractField {
    pub field_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validation: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractSource {
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputContract {
    pub required: Vec<ContractField>,
    #[serde(default)]
    pub optional: Vec<ContractField>,
    #[serde(default)]
    pub source: Vec<ContractSource>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputContract {
    pub required: Vec<ContractField>,
    #[serde(default)]
    pub optional: Vec<ContractField>,
    #[serde(default)]
    pub destination: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentMethod {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentContract {
    pub agent: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub method: AgentMethod,
    pub input_contract: InputContract,
    pub output_contract: OutputContract,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity_range: Option<(u32, u32)>,
}

/// Which side of an agent run is being checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ValidationPhase {
    Input,
    Output,
}

impl fmt::Display for ValidationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationPhase::Input => write!(f, "input"),
            ValidationPhase::Output => write!(f, "output"),
        }
    }
}

/// One validation call's view of an agent run.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentExecutionContext {
    pub agent: String,
    pub task_id: String,
    pub phase: ValidationPhase,
    pub input_data: Map<String, Value>,
    pub output_data: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldStatus {
    Valid,
    Invalid,
    Missing,
}

impl fmt::Display for FieldStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldStatus::Valid => write!(f, "valid"),
            FieldStatus::Invalid => write!(f, "invalid"),
            FieldStatus::Missing => write!(f, "missing"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldValidationResult {
    pub field: String,
    pub status: FieldStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_value: Option<Value>,
}

impl FieldValidationResult {
    /// Message if present, else the bare status word.
    pub fn summary(&self) -> String {
        match &self.message {
            Some(m) if !m.is_empty() => m.clone(),
            _ => self.status.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractValidationResult {
    pub valid: bool,
    pub errors: Vec<FieldValidationResult>,
    pub warnings: Vec<FieldValidationResult>,
    pub timestamp: String,
}

pub fn validate_input(
    contract: &AgentContract,
    context: &AgentExecutionContext,
) -> ContractValidationResult {
    let result = validate_fields(
        &contract.input_contract.required,
        &contract.input_contract.optional,
        &context.input_data,
    );
    tracing::debug!(
        agent = %context.agent,
        task_id = %context.task_id,
        valid = result.valid,
        errors = result.errors.len(),
        "validated input contract"
    );
    result
}

pub fn validate_output(
    contract: &AgentContract,
    context: &AgentExecutionContext,
) -> ContractValidationResult {
    let Some(output) = context.output_data.as_ref() else {
        tracing::debug!(agent = %context.agent, "output contract checked without output data");
        return ContractValidationResult {
            valid: false,
            errors: vec![FieldValidationResult {
                field: ROOT_FIELD.to_string(),
                status: FieldStatus::Missing,
                message: Some("No output data provided".to_string()),
                actual_value: None,
            }],
            warnings: Vec::new(),
            timestamp: time::now_iso(),
        };
    };

    let result = validate_fields(
        &contract.output_contract.required,
        &contract.output_contract.optional,
        output,
    );
    tracing::debug!(
        agent = %context.agent,
        task_id = %context.task_id,
        valid = result.valid,
        errors = result.errors.len(),
        "validated output contract"
    );
    result
}

/// Dispatches on `context.phase`.
pub fn validate(
    contract: &AgentContract,
    context: &AgentExecutionContext,
) -> ContractValidationResult {
    match context.phase {
        ValidationPhase::Input => validate_input(contract, context),
        ValidationPhase::Output => validate_output(contract, context),
    }
}

fn validate_fields(
    required: &[ContractField],
    optional: &[ContractField],
    data: &Map<String, Value>,
) -> ContractValidationResult {
    let errors: Vec<_> = required
        .iter()
        .map(|field| rules::validate_field(field, data, true))
        .filter(|r| matches!(r.status, FieldStatus::Missing | FieldStatus::Invalid))
        .collect();

    // Absent optional fields come back valid, so only rule/type failures warn.
    let warnings: Vec<_> = optional
        .iter()
        .map(|field| rules::validate_field(field, data, false))
        .filter(|r| r.status == FieldStatus::Invalid)
        .collect();

    ContractValidationResult {
        valid: errors.is_empty(),
        errors,
        warnings,
        timestamp: time::now_iso(),
    }
}

/// Human-readable report. Same result in, same bytes out.
pub fn format_validation_result(
    result: &ContractValidationResult,
    phase: ValidationPhase,
) -> String {
    let mut lines: Vec<String> = Vec::new();

    lines.push(format!(
        "{} Contract Validation:",
        phase.to_string().to_uppercase()
    ));
    lines.push(format!(
        "Status: {}",
        if result.valid { "✓ PASSED" } else { "✗ FAILED" }
    ));
    lines.push(format!("Timestamp: {}", result.timestamp));
    lines.push(String::new());

    if !result.errors.is_empty() {
        lines.push("Errors:".to_string());
        for error in &result.errors {
            lines.push(format!("  ✗ {}: {}", error.field, error.summary()));
        }
        lines.push(String::new());
    }

    if !result.warnings.is_empty() {
        lines.push("Warnings:".to_string());
        for warning in &result.warnings {
            lines.push(format!("  ⚠ {}: {}", warning.field, warning.summary()));
        }
        lines.push(String::new());
    }

    if result.valid {
        lines.push("All required fields validated successfully.".to_string());
    }

    lines.join("\n")
}

/// Reads `<dir>/<agent>.json`.
pub fn load_contract(dir: &Path, agent: &str) -> Result<AgentContract, OmtError> {
    let path = dir.join(format!("{agent}.json"));
    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(OmtError::NotFound(format!(
                "Contract not found: {}",
                path.display()
            )));
        }
        Err(e) => return Err(OmtError::IoError(e)),
    };
    parse_contract(&raw)
        .map_err(|e| OmtError::MalformedInput(format!("invalid contract {}: {e}", path.display())))
}

pub fn parse_contract(raw: &str) -> Result<AgentContract, serde_json::Error> {
    serde_json::from_str(raw)
}
