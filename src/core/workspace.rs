//! Workspace layout, discovery, and scaffolding.
//!
//! ```text
//! <root>/.agents/
//!   .gitignore          ignores .state/
//!   omt.toml            optional config
//!   outputs/            agent artifacts
//!   .state/
//!     config.json       workspace metadata
//!     state.json        task ledger
//!     hive-state.json   hive ledger
//!     tasks/
//! ```

use crate::core::config::{self, OmtConfig, WorkspaceMeta};
use crate::core::error::OmtError;
use crate::core::hive_state::{HiveState, HiveStateLedger};
use crate::core::store::{
    self, DocumentStore, FsDocumentStore, HIVE_STATE_DOC, TASK_STATE_DOC, WORKSPACE_CONFIG_DOC,
};
use crate::core::task_state::{TaskState, TaskStateLedger};
use std::fs;
use std::path::{Path, PathBuf};

pub const AGENTS_DIR: &str = ".agents";
pub const STATE_DIR: &str = ".state";
pub const OUTPUTS_DIR: &str = "outputs";
pub const TASKS_DIR: &str = "tasks";

#[derive(Debug, Clone)]
pub struct Workspace {
    pub root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Nearest ancestor of `start` (inclusive) that holds `.agents/`.
    pub fn discover(start: &Path) -> Result<Self, OmtError> {
        let mut current = PathBuf::from(start);
        loop {
            if current.join(AGENTS_DIR).is_dir() {
                return Ok(Self::new(current));
            }
            if !current.pop() {
                return Err(OmtError::NotFound(
                    "'.agents' directory not found in current or parent directories. Run `omt init` first.".to_string(),
                ));
            }
        }
    }

    pub fn agents_dir(&self) -> PathBuf {
        self.root.join(AGENTS_DIR)
    }

    pub fn state_dir(&self) -> PathBuf {
        self.agents_dir().join(STATE_DIR)
    }

    pub fn outputs_dir(&self) -> PathBuf {
        self.agents_dir().join(OUTPUTS_DIR)
    }

    pub fn store(&self) -> FsDocumentStore {
        FsDocumentStore::new(self.state_dir())
    }

    pub fn task_ledger(&self) -> TaskStateLedger<FsDocumentStore> {
        TaskStateLedger::new(self.store())
    }

    pub fn hive_ledger(&self) -> HiveStateLedger<FsDocumentStore> {
        HiveStateLedger::new(self.store())
    }

    pub fn config(&self) -> Result<OmtConfig, OmtError> {
        config::load_config(&self.agents_dir())
    }

    pub fn read_meta(&self) -> Result<Option<WorkspaceMeta>, OmtError> {
        match self.store().read(WORKSPACE_CONFIG_DOC)? {
            Some(raw) => store::from_document(WORKSPACE_CONFIG_DOC, &raw).map(Some),
            None => Ok(None),
        }
    }

    /// Default artifact path for an agent's output file.
    pub fn default_output_file(&self, agent: &str) -> PathBuf {
        Path::new(AGENTS_DIR)
            .join(OUTPUTS_DIR)
            .join(format!("{agent}.md"))
    }
}

/// What `init` touched, workspace-relative.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InitReport {
    pub created: Vec<PathBuf>,
    pub preserved: Vec<PathBuf>,
}

/// Scaffolds `.agents/` under `root`. Metadata and `.gitignore` are always
/// rewritten; existing ledgers are left untouched.
pub fn init_workspace(root: &Path, task_management: &str) -> Result<InitReport, OmtError> {
    let ws = Workspace::new(root);
    let mut report = InitReport::default();
    let rel = |p: &Path| p.strip_prefix(root).unwrap_or(p).to_path_buf();

    for dir in [
        ws.agents_dir(),
        ws.outputs_dir(),
        ws.state_dir(),
        ws.state_dir().join(TASKS_DIR),
    ] {
        fs::create_dir_all(&dir).map_err(OmtError::IoError)?;
        report.created.push(rel(&dir));
    }

    let gitignore = ws.agents_dir().join(".gitignore");
    fs::write(&gitignore, format!("{STATE_DIR}/\n")).map_err(OmtError::IoError)?;
    report.created.push(rel(&gitignore));

    let docs = ws.store();
    let meta = store::to_document(WORKSPACE_CONFIG_DOC, &WorkspaceMeta::new(task_management))?;
    docs.replace(WORKSPACE_CONFIG_DOC, &meta)?;
    report.created.push(rel(&docs.path_of(WORKSPACE_CONFIG_DOC)));

    let placeholders = [
        (
            TASK_STATE_DOC,
            store::to_document(TASK_STATE_DOC, &TaskState::placeholder())?,
        ),
        (
            HIVE_STATE_DOC,
            store::to_document(HIVE_STATE_DOC, &HiveState::placeholder())?,
        ),
    ];
    for (name, contents) in placeholders {
        let path = rel(&docs.path_of(name));
        if docs.read(name)?.is_some() {
            report.preserved.push(path);
        } else {
            docs.replace(name, &contents)?;
            report.created.push(path);
        }
    }

    tracing::info!(root = %root.display(), task_management, "workspace initialized");
    Ok(report)
}
