//! Consistency checker.
//!
//! Read-only pass reconciling what `hive-state.json` claims with the
//! artifacts that actually exist and with the invariants the ledger does not
//! enforce at write time. Issues come back in evaluation order.

use crate::core::error::OmtError;
use crate::core::hive_state::{
    self, AgentStatus, ConsensusStatus, HivePhase, HiveRole, HiveState, HiveStateLedger,
};
use crate::core::store::DocumentStore;
use crate::core::time;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

pub const DEFAULT_STALE_AFTER_HOURS: u64 = 24;

/// Workspace-relative artifact locations the checker looks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactLayout {
    pub pm: PathBuf,
    pub arch: PathBuf,
    pub execution_file: PathBuf,
    pub execution_dir: PathBuf,
}

impl Default for ArtifactLayout {
    fn default() -> Self {
        let outputs = Path::new(".agents").join("outputs");
        Self {
            pm: outputs.join("pm.md"),
            arch: outputs.join("arch.md"),
            execution_file: outputs.join("execution.md"),
            execution_dir: outputs.join("execution"),
        }
    }
}

impl ArtifactLayout {
    pub fn for_role(&self, role: HiveRole) -> &Path {
        match role {
            HiveRole::Pm => &self.pm,
            HiveRole::Arch => &self.arch,
        }
    }
}

/// Answers "does this artifact exist?".
pub trait ArtifactProbe {
    fn exists(&self, path: &Path) -> bool;
}

/// Probes the filesystem under a workspace root.
#[derive(Debug, Clone)]
pub struct FsArtifactProbe {
    pub root: PathBuf,
}

impl FsArtifactProbe {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ArtifactProbe for FsArtifactProbe {
    fn exists(&self, path: &Path) -> bool {
        crate::core::store::resolve_under(&self.root, path).exists()
    }
}

/// A fixed set of known paths.
impl ArtifactProbe for BTreeSet<PathBuf> {
    fn exists(&self, path: &Path) -> bool {
        self.contains(path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StateCheckOutcome {
    /// No hive document; nothing to reconcile.
    NothingToCheck,
    Checked { issues: Vec<String> },
}

impl StateCheckOutcome {
    pub fn passed(&self) -> bool {
        match self {
            StateCheckOutcome::NothingToCheck => true,
            StateCheckOutcome::Checked { issues } => issues.is_empty(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConsistencyChecker<'a> {
    pub layout: &'a ArtifactLayout,
    pub stale_after_hours: u64,
}

impl<'a> ConsistencyChecker<'a> {
    pub fn new(layout: &'a ArtifactLayout) -> Self {
        Self {
            layout,
            stale_after_hours: DEFAULT_STALE_AFTER_HOURS,
        }
    }

    pub fn stale_after_hours(mut self, hours: u64) -> Self {
        self.stale_after_hours = hours;
        self
    }

    pub fn check(
        &self,
        state: &HiveState,
        probe: &dyn ArtifactProbe,
        now: DateTime<Utc>,
    ) -> Vec<String> {
        let mut issues = Vec::new();

        if let Some(agents) = &state.agents {
            for role in HiveRole::ALL {
                let path = self.layout.for_role(role);
                if agents.get(role).status == AgentStatus::Completed && !probe.exists(path) {
                    issues.push(format!(
                        "agents.{role}.status is completed but {} does not exist",
                        path.display()
                    ));
                }
            }
            for role in HiveRole::ALL {
                let path = self.layout.for_role(role);
                if agents.get(role).status == AgentStatus::Pending && probe.exists(path) {
                    issues.push(format!(
                        "agents.{role}.status is pending but {} already exists",
                        path.display()
                    ));
                }
            }
        }

        if let Some(execution) = &state.execution {
            if execution.tasks_completed > 0
                && !probe.exists(&self.layout.execution_file)
                && !probe.exists(&self.layout.execution_dir)
            {
                issues.push(format!(
                    "execution.tasks_completed is {} but neither {} nor {} exists",
                    execution.tasks_completed,
                    self.layout.execution_file.display(),
                    self.layout.execution_dir.display()
                ));
            }
        }

        if !hive_state::is_terminal(state.phase) {
            if let Some(updated) = state.updated_at.as_deref().and_then(time::parse_iso) {
                let elapsed_ms = (now - updated).num_milliseconds();
                // A window too large to represent never expires.
                let window_ms = i64::try_from(self.stale_after_hours)
                    .ok()
                    .and_then(|hours| hours.checked_mul(3_600_000));
                if window_ms.is_some_and(|window| elapsed_ms > window) {
                    let hours = (elapsed_ms as f64 / 3_600_000.0).round() as i64;
                    issues.push(format!(
                        "state is stale: last updated {hours}h ago (phase: {})",
                        phase_label(state.phase)
                    ));
                }
            }
        }

        if state.phase == Some(HivePhase::Execution) {
            let consensus = state.consensus.as_ref().map(|c| c.status);
            if consensus != Some(ConsensusStatus::Approved) {
                let actual = consensus.map_or_else(|| "missing".to_string(), |s| s.to_string());
                issues.push(format!(
                    "phase is execution but consensus.status is {actual} (expected approved)"
                ));
            }
        }

        tracing::debug!(issues = issues.len(), "consistency check finished");
        issues
    }

    /// Loads the hive document and checks it against `probe` at the current time.
    pub fn run<S: DocumentStore>(
        &self,
        ledger: &HiveStateLedger<S>,
        probe: &dyn ArtifactProbe,
    ) -> Result<StateCheckOutcome, OmtError> {
        let Some(state) = ledger.load_state()? else {
            tracing::info!("no hive state; nothing to check");
            return Ok(StateCheckOutcome::NothingToCheck);
        };
        let issues = self.check(&state, probe, Utc::now());
        if !issues.is_empty() {
            tracing::warn!(issues = issues.len(), "hive state is inconsistent");
        }
        Ok(StateCheckOutcome::Checked { issues })
    }
}

fn phase_label(phase: Option<HivePhase>) -> String {
    phase.map_or_else(|| "null".to_string(), |p| p.to_string())
}
