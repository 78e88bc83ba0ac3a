//! Workspace configuration.
//!
//! Two files live here: the optional operator-edited `.agents/omt.toml`, and
//! the `config.json` metadata document that `omt init` writes into the state
//! area.

use crate::core::consistency::{ArtifactLayout, DEFAULT_STALE_AFTER_HOURS};
use crate::core::error::OmtError;
use crate::core::store::resolve_under;
use crate::core::time;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "omt.toml";
pub const WORKSPACE_VERSION: &str = "2.0.0";

/// Fibonacci complexity scale shared with planning agents.
pub const COMPLEXITY_VALUES: [u32; 10] = [1, 2, 3, 5, 8, 13, 21, 34, 55, 89];
pub const TOKENS_PER_COMPLEXITY_POINT: u32 = 1000;

pub const TASK_STATES: [(&str, &str); 6] = [
    ("pending", "Task created, waiting to start"),
    ("in_progress", "Task in progress"),
    ("blocked", "Task blocked, requires intervention"),
    ("completed", "Task completed"),
    ("failed", "Task failed"),
    ("cancelled", "Task cancelled"),
];

pub const AGENT_STATES: [(&str, &str); 5] = [
    ("idle", "Agent idle, waiting for tasks"),
    ("working", "Agent working"),
    ("completed", "Agent completed its part"),
    ("blocked", "Agent encountered issues"),
    ("skipped", "Agent skipped"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateCheckConfig {
    pub stale_after_hours: u64,
}

impl Default for StateCheckConfig {
    fn default() -> Self {
        Self {
            stale_after_hours: DEFAULT_STALE_AFTER_HOURS,
        }
    }
}

/// Contents of `.agents/omt.toml`. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OmtConfig {
    pub contracts_dir: Option<PathBuf>,
    pub state_check: StateCheckConfig,
    pub artifacts: ArtifactLayout,
}

impl OmtConfig {
    /// Contracts directory resolved against the workspace root.
    pub fn contracts_dir(&self, workspace_root: &Path) -> PathBuf {
        match &self.contracts_dir {
            Some(dir) => resolve_under(workspace_root, dir),
            None => workspace_root.join(".agents").join("contracts"),
        }
    }
}

/// Loads `<agents_dir>/omt.toml`; a missing file yields the defaults.
pub fn load_config(agents_dir: &Path) -> Result<OmtConfig, OmtError> {
    let path = agents_dir.join(CONFIG_FILE);
    let content = match fs::read_to_string(&path) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(OmtConfig::default()),
        Err(e) => return Err(OmtError::IoError(e)),
    };
    toml::from_str(&content)
        .map_err(|e| OmtError::ConfigError(format!("{}: {}", path.display(), e)))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceInfo {
    pub version: String,
    pub initialized_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskManagement {
    pub system: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplexityScale {
    pub values: Vec<u32>,
    pub token_estimates: BTreeMap<String, u32>,
}

impl Default for ComplexityScale {
    fn default() -> Self {
        Self {
            values: COMPLEXITY_VALUES.to_vec(),
            token_estimates: COMPLEXITY_VALUES
                .iter()
                .map(|v| (v.to_string(), v * TOKENS_PER_COMPLEXITY_POINT))
                .collect(),
        }
    }
}

/// `config.json` in the state area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceMeta {
    pub workspace: WorkspaceInfo,
    pub task_management: TaskManagement,
    #[serde(default)]
    pub complexity_scale: Option<ComplexityScale>,
    #[serde(default)]
    pub task_states: BTreeMap<String, String>,
    #[serde(default)]
    pub agent_states: BTreeMap<String, String>,
}

impl WorkspaceMeta {
    pub fn new(task_management: &str) -> Self {
        Self {
            workspace: WorkspaceInfo {
                version: WORKSPACE_VERSION.to_string(),
                initialized_at: time::now_iso(),
            },
            task_management: TaskManagement {
                system: task_management.to_string(),
            },
            complexity_scale: Some(ComplexityScale::default()),
            task_states: describe(&TASK_STATES),
            agent_states: describe(&AGENT_STATES),
        }
    }
}

fn describe(table: &[(&str, &str)]) -> BTreeMap<String, String> {
    table
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
