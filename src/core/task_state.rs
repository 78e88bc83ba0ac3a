//! Task state ledger.
//!
//! One `state.json` document per workspace recording the active task's linear
//! phase progress and the agents that have run for it. Every mutator reads
//! the whole document, changes it in memory, and replaces it whole; see the
//! single-writer note in [`crate::core::store`].

use crate::core::contract::ContractValidationResult;
use crate::core::error::OmtError;
use crate::core::store::{self, DocumentStore, TASK_STATE_DOC};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Key added to a validation snapshot when the run was valid.
pub const STATUS_KEY: &str = "__status__";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TaskPhase {
    Planning,
    Execution,
    Review,
    Complete,
}

impl fmt::Display for TaskPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskPhase::Planning => "planning",
            TaskPhase::Execution => "execution",
            TaskPhase::Review => "review",
            TaskPhase::Complete => "complete",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentOutputRecord {
    pub agent: String,
    pub output_file: String,
    pub contract_validated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_results: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlanningState {
    #[serde(default)]
    pub agents_executed: Vec<String>,
    #[serde(default)]
    pub outputs: BTreeMap<String, AgentOutputRecord>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_provided: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_output: Option<Map<String, Value>>,
    #[serde(default)]
    pub agents_completed: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Review agents write these; counts they leave out read as zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeQualityReview {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub issues: u64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecurityReview {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub vulnerabilities: u64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_quality: Option<CodeQualityReview>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security: Option<SecurityReview>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

pub const COMPLEXITY_ESTIMATE_KEY: &str = "complexity_estimate";
pub const FILES_INVOLVED_KEY: &str = "files_involved";
pub const SCOPE_OVERFLOW_KEY: &str = "scope_overflow";

/// Free-form task context object. Planning agents conventionally write
/// `complexity_estimate`, `files_involved` and `scope_overflow`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskContext(pub Map<String, Value>);

impl TaskContext {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn complexity_estimate(&self) -> Option<u64> {
        self.get(COMPLEXITY_ESTIMATE_KEY).and_then(Value::as_u64)
    }

    pub fn files_involved(&self) -> Option<u64> {
        self.get(FILES_INVOLVED_KEY).and_then(Value::as_u64)
    }

    pub fn scope_overflow(&self) -> Option<bool> {
        self.get(SCOPE_OVERFLOW_KEY).and_then(Value::as_bool)
    }

    /// Shallow merge: every key present in `update` replaces the stored key
    /// wholesale. An explicit `null` is stored as `null`.
    pub fn merge(&mut self, update: TaskContext) {
        for (k, v) in update.0 {
            self.0.insert(k, v);
        }
    }
}

/// `task_id`, `title` and `current_phase` are optional because `omt init`
/// writes a placeholder document with all three set to null.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskState {
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub current_phase: Option<TaskPhase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub planning: Option<PlanningState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution: Option<ExecutionState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review: Option<ReviewState>,
    #[serde(default)]
    pub context: TaskContext,
    /// Keys written by other tools; carried through every rewrite.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TaskState {
    /// Placeholder written by workspace scaffolding.
    pub fn placeholder() -> Self {
        Self::default()
    }
}

/// Repository over the task document.
pub struct TaskStateLedger<S: DocumentStore> {
    store: S,
}

impl<S: DocumentStore> TaskStateLedger<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Creates a fresh planning-phase document, discarding whatever was there.
    pub fn init_task(&self, task_id: &str, title: &str) -> Result<TaskState, OmtError> {
        let state = TaskState {
            task_id: Some(task_id.to_string()),
            title: Some(title.to_string()),
            current_phase: Some(TaskPhase::Planning),
            ..TaskState::default()
        };
        self.save_state(&state)?;
        tracing::info!(task_id, "initialized task state");
        Ok(state)
    }

    pub fn read_state(&self) -> Result<Option<TaskState>, OmtError> {
        match self.store.read(TASK_STATE_DOC)? {
            Some(raw) => store::from_document(TASK_STATE_DOC, &raw).map(Some),
            None => Ok(None),
        }
    }

    pub fn save_state(&self, state: &TaskState) -> Result<(), OmtError> {
        let raw = store::to_document(TASK_STATE_DOC, state)?;
        self.store.replace(TASK_STATE_DOC, &raw)
    }

    fn require_state(&self) -> Result<TaskState, OmtError> {
        self.read_state()?
            .ok_or_else(|| OmtError::MissingDocument("task state".to_string()))
    }

    /// Appends `agent` to the executed list (repeats are kept) and upserts its
    /// output record.
    pub fn record_planning_agent(
        &self,
        agent: &str,
        output_file: &str,
        validation: &ContractValidationResult,
    ) -> Result<(), OmtError> {
        let mut state = self.require_state()?;
        let planning = state.planning.get_or_insert_with(PlanningState::default);

        planning.agents_executed.push(agent.to_string());
        planning.outputs.insert(
            agent.to_string(),
            AgentOutputRecord {
                agent: agent.to_string(),
                output_file: output_file.to_string(),
                contract_validated: validation.valid,
                validation_results: Some(validation_snapshot(validation)),
                timestamp: Some(validation.timestamp.clone()),
            },
        );

        self.save_state(&state)?;
        tracing::info!(agent, valid = validation.valid, "recorded planning agent");
        Ok(())
    }

    /// Points `execution.current_agent` at the agent about to run.
    pub fn begin_execution_agent(&self, agent: &str) -> Result<(), OmtError> {
        let mut state = self.require_state()?;
        state
            .execution
            .get_or_insert_with(ExecutionState::default)
            .current_agent = Some(agent.to_string());
        self.save_state(&state)?;
        tracing::debug!(agent, "execution agent started");
        Ok(())
    }

    /// Appends `agent` to the completed list (repeats are kept) and clears the
    /// current-agent pointer.
    pub fn record_execution_agent(
        &self,
        agent: &str,
        validation: &ContractValidationResult,
    ) -> Result<(), OmtError> {
        let mut state = self.require_state()?;
        let execution = state.execution.get_or_insert_with(ExecutionState::default);

        execution.agents_completed.push(agent.to_string());
        execution.current_agent = None;

        self.save_state(&state)?;
        tracing::info!(agent, valid = validation.valid, "recorded execution agent");
        Ok(())
    }

    pub fn set_phase(&self, phase: TaskPhase) -> Result<(), OmtError> {
        let mut state = self.require_state()?;
        state.current_phase = Some(phase);
        self.save_state(&state)?;
        tracing::info!(%phase, "task phase set");
        Ok(())
    }

    pub fn update_context(&self, update: TaskContext) -> Result<TaskContext, OmtError> {
        let mut state = self.require_state()?;
        state.context.merge(update);
        self.save_state(&state)?;
        tracing::debug!("task context updated");
        Ok(state.context)
    }
}

/// Compact field -> message map stored alongside an agent's output record.
pub fn validation_snapshot(result: &ContractValidationResult) -> BTreeMap<String, String> {
    let mut formatted = BTreeMap::new();

    for error in &result.errors {
        formatted.insert(error.field.clone(), format!("✗ {}", error.summary()));
    }
    for warning in &result.warnings {
        formatted.insert(warning.field.clone(), format!("⚠ {}", warning.summary()));
    }
    if result.valid {
        formatted.insert(STATUS_KEY.to_string(), "✓ all valid".to_string());
    }

    formatted
}
