//! Hive state ledger.
//!
//! `hive-state.json` records a multi-role workflow: the hive phase, the
//! status of each tracked role, the consensus decision, and execution
//! counters. The ledger is a passive record. [`HiveStateLedger::set_phase`]
//! accepts any declared phase from any phase, and cross-field invariants
//! (`tasks_completed <= tasks_total`, `execution` implies approved consensus)
//! are only reported after the fact by [`crate::core::consistency`]. Callers
//! that want enforcement install a [`TransitionGuard`].

use crate::core::error::OmtError;
use crate::core::store::{self, DocumentStore, HIVE_STATE_DOC};
use crate::core::time;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

pub const DEFAULT_MAX_FAILURES: u64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum HivePhase {
    Init,
    Pm,
    Arch,
    Consensus,
    Execution,
    Completed,
    Aborted,
    Escalated,
}

impl HivePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            HivePhase::Init => "init",
            HivePhase::Pm => "pm",
            HivePhase::Arch => "arch",
            HivePhase::Consensus => "consensus",
            HivePhase::Execution => "execution",
            HivePhase::Completed => "completed",
            HivePhase::Aborted => "aborted",
            HivePhase::Escalated => "escalated",
        }
    }
}

impl fmt::Display for HivePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal set is {completed, aborted, null}.
pub fn is_terminal(phase: Option<HivePhase>) -> bool {
    matches!(
        phase,
        None | Some(HivePhase::Completed) | Some(HivePhase::Aborted)
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum HiveRole {
    Pm,
    Arch,
}

impl HiveRole {
    pub const ALL: [HiveRole; 2] = [HiveRole::Pm, HiveRole::Arch];

    pub fn as_str(&self) -> &'static str {
        match self {
            HiveRole::Pm => "pm",
            HiveRole::Arch => "arch",
        }
    }
}

impl fmt::Display for HiveRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AgentStatus::Pending => "pending",
            AgentStatus::Running => "running",
            AgentStatus::Completed => "completed",
            AgentStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSlot {
    #[serde(default)]
    pub status: AgentStatus,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HiveAgents {
    #[serde(default)]
    pub pm: AgentSlot,
    #[serde(default)]
    pub arch: AgentSlot,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl HiveAgents {
    pub fn get(&self, role: HiveRole) -> &AgentSlot {
        match role {
            HiveRole::Pm => &self.pm,
            HiveRole::Arch => &self.arch,
        }
    }

    pub fn get_mut(&mut self, role: HiveRole) -> &mut AgentSlot {
        match role {
            HiveRole::Pm => &mut self.pm,
            HiveRole::Arch => &mut self.arch,
        }
    }
}

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ConsensusStatus {
    #[default]
    Pending,
    Approved,
    Modified,
    Aborted,
}

impl fmt::Display for ConsensusStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConsensusStatus::Pending => "pending",
            ConsensusStatus::Approved => "approved",
            ConsensusStatus::Modified => "modified",
            ConsensusStatus::Aborted => "aborted",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Consensus {
    #[serde(default)]
    pub status: ConsensusStatus,
    #[serde(default)]
    pub decision_points: Vec<Value>,
    #[serde(default)]
    pub user_decisions: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionCounters {
    #[serde(default)]
    pub tasks_total: u64,
    #[serde(default)]
    pub tasks_completed: u64,
    /// Whatever identifier the coordinator uses: a name, a number, an object.
    #[serde(default)]
    pub current_task: Option<Value>,
    #[serde(default)]
    pub failure_count: u64,
    #[serde(default = "default_max_failures")]
    pub max_failures: u64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_max_failures() -> u64 {
    DEFAULT_MAX_FAILURES
}

impl Default for ExecutionCounters {
    fn default() -> Self {
        Self {
            tasks_total: 0,
            tasks_completed: 0,
            current_task: None,
            failure_count: 0,
            max_failures: DEFAULT_MAX_FAILURES,
            extra: Map::new(),
        }
    }
}

/// Fields left `None` keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionUpdate {
    pub tasks_total: Option<u64>,
    pub tasks_completed: Option<u64>,
    /// `Some(None)` clears the current task.
    pub current_task: Option<Option<Value>>,
    pub failure_count: Option<u64>,
    pub max_failures: Option<u64>,
}

/// Fields left `None` keep their stored value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsensusUpdate {
    pub status: Option<ConsensusStatus>,
    pub decision_points: Option<Vec<Value>>,
    /// `Some(None)` clears the recorded decisions.
    pub user_decisions: Option<Option<Value>>,
}

/// Every block but `phase` may be absent: `omt init` writes `{"phase": null}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HiveState {
    #[serde(default)]
    pub phase: Option<HivePhase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agents: Option<HiveAgents>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consensus: Option<Consensus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution: Option<ExecutionCounters>,
    /// Keys written by other tools; carried through every rewrite.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl HiveState {
    /// Placeholder written by workspace scaffolding.
    pub fn placeholder() -> Self {
        Self::default()
    }

    pub fn is_resumable(&self) -> bool {
        !is_terminal(self.phase)
    }
}

/// Consulted by [`HiveStateLedger::set_phase`] before a phase write.
pub trait TransitionGuard {
    /// `Err` carries the reason the write is refused.
    fn check(&self, state: &HiveState, next: HivePhase) -> Result<(), String>;
}

/// Refuses to enter `execution` until consensus is approved.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsensusGuard;

impl TransitionGuard for ConsensusGuard {
    fn check(&self, state: &HiveState, next: HivePhase) -> Result<(), String> {
        if next != HivePhase::Execution {
            return Ok(());
        }
        match state.consensus.as_ref().map(|c| c.status) {
            Some(ConsensusStatus::Approved) => Ok(()),
            Some(other) => Err(format!(
                "cannot enter execution while consensus is {other}"
            )),
            None => Err("cannot enter execution without a consensus block".to_string()),
        }
    }
}

pub struct HiveStateLedger<S: DocumentStore> {
    store: S,
    guard: Option<Box<dyn TransitionGuard>>,
}

impl<S: DocumentStore> HiveStateLedger<S> {
    pub fn new(store: S) -> Self {
        Self { store, guard: None }
    }

    pub fn with_guard(mut self, guard: impl TransitionGuard + 'static) -> Self {
        self.guard = Some(Box::new(guard));
        self
    }

    /// All-pending initial document for `goal`. Not persisted.
    pub fn create_initial_state(goal: &str) -> HiveState {
        let now = time::now_iso();
        HiveState {
            phase: Some(HivePhase::Init),
            goal: Some(goal.to_string()),
            started_at: Some(now.clone()),
            updated_at: Some(now),
            agents: Some(HiveAgents::default()),
            consensus: Some(Consensus::default()),
            execution: Some(ExecutionCounters::default()),
            extra: Map::new(),
        }
    }

    /// Persists a fresh initial document, replacing any previous one.
    pub fn start(&self, goal: &str) -> Result<HiveState, OmtError> {
        let mut state = Self::create_initial_state(goal);
        self.save_state(&mut state)?;
        tracing::info!(goal, "hive state started");
        Ok(state)
    }

    pub fn load_state(&self) -> Result<Option<HiveState>, OmtError> {
        match self.store.read(HIVE_STATE_DOC)? {
            Some(raw) => store::from_document(HIVE_STATE_DOC, &raw).map(Some),
            None => Ok(None),
        }
    }

    /// Stamps `updated_at` and replaces the document.
    pub fn save_state(&self, state: &mut HiveState) -> Result<(), OmtError> {
        state.updated_at = Some(time::now_iso());
        let raw = store::to_document(HIVE_STATE_DOC, state)?;
        self.store.replace(HIVE_STATE_DOC, &raw)
    }

    fn require_state(&self) -> Result<HiveState, OmtError> {
        self.load_state()?
            .ok_or_else(|| OmtError::MissingDocument("hive state".to_string()))
    }

    /// Writes `phase` regardless of the current phase unless a guard objects.
    pub fn set_phase(&self, phase: HivePhase) -> Result<HiveState, OmtError> {
        let mut state = self.require_state()?;
        if let Some(guard) = &self.guard {
            guard.check(&state, phase).map_err(|reason| {
                tracing::warn!(from = ?state.phase, to = %phase, %reason, "phase write refused");
                OmtError::TransitionRejected(reason)
            })?;
        }
        let from = state.phase;
        state.phase = Some(phase);
        self.save_state(&mut state)?;
        tracing::info!(from = ?from, to = %phase, "hive phase set");
        Ok(state)
    }

    /// `output`: `None` leaves it untouched, `Some(None)` clears it.
    pub fn update_agent_status(
        &self,
        role: HiveRole,
        status: AgentStatus,
        output: Option<Option<String>>,
    ) -> Result<HiveState, OmtError> {
        let mut state = self.require_state()?;
        let slot = state
            .agents
            .get_or_insert_with(HiveAgents::default)
            .get_mut(role);
        slot.status = status;
        if let Some(output) = output {
            slot.output = output;
        }
        self.save_state(&mut state)?;
        tracing::info!(%role, %status, "hive agent status updated");
        Ok(state)
    }

    pub fn update_execution(&self, update: ExecutionUpdate) -> Result<HiveState, OmtError> {
        let mut state = self.require_state()?;
        let execution = state
            .execution
            .get_or_insert_with(ExecutionCounters::default);
        if let Some(v) = update.tasks_total {
            execution.tasks_total = v;
        }
        if let Some(v) = update.tasks_completed {
            execution.tasks_completed = v;
        }
        if let Some(v) = update.current_task {
            execution.current_task = v;
        }
        if let Some(v) = update.failure_count {
            execution.failure_count = v;
        }
        if let Some(v) = update.max_failures {
            execution.max_failures = v;
        }
        self.save_state(&mut state)?;
        tracing::debug!(execution = ?state.execution, "hive execution updated");
        Ok(state)
    }

    pub fn update_consensus(&self, update: ConsensusUpdate) -> Result<HiveState, OmtError> {
        let mut state = self.require_state()?;
        let consensus = state.consensus.get_or_insert_with(Consensus::default);
        if let Some(v) = update.status {
            consensus.status = v;
        }
        if let Some(v) = update.decision_points {
            consensus.decision_points = v;
        }
        if let Some(v) = update.user_decisions {
            consensus.user_decisions = v;
        }
        self.save_state(&mut state)?;
        tracing::info!(status = ?state.consensus.as_ref().map(|c| c.status), "hive consensus updated");
        Ok(state)
    }

    /// `false` without a document; otherwise whether the phase is non-terminal.
    pub fn is_resumable(&self) -> Result<bool, OmtError> {
        Ok(self
            .load_state()?
            .is_some_and(|state| state.is_resumable()))
    }
}
