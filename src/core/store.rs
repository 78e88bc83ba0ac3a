//! Document store abstraction for omt's ledgers.
//!
//! Every ledger is one named JSON document that is read whole and replaced
//! whole. The store knows nothing about document shapes; the ledgers own
//! (de)serialization, so a backend only has to move strings.
//!
//! # Single-writer assumption
//!
//! No backend takes a lock, carries a version token, or renames atomically.
//! Two mutators racing on the same document each read, modify, and replace;
//! the later `replace` wins and the earlier writer's change is lost. omt
//! assumes one serial coordinator drives all edits to a workspace.

use crate::core::error::OmtError;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Document name of the task ledger.
pub const TASK_STATE_DOC: &str = "state.json";
/// Document name of the hive ledger.
pub const HIVE_STATE_DOC: &str = "hive-state.json";
/// Document name of the workspace metadata written by `init`.
pub const WORKSPACE_CONFIG_DOC: &str = "config.json";

pub trait DocumentStore {
    /// Returns `Ok(None)` when the document does not exist. Any other
    /// failure is propagated unmodified.
    fn read(&self, name: &str) -> Result<Option<String>, OmtError>;

    /// Replaces the whole document.
    fn replace(&self, name: &str, contents: &str) -> Result<(), OmtError>;
}

impl<S: DocumentStore + ?Sized> DocumentStore for &S {
    fn read(&self, name: &str) -> Result<Option<String>, OmtError> {
        (**self).read(name)
    }

    fn replace(&self, name: &str, contents: &str) -> Result<(), OmtError> {
        (**self).replace(name, contents)
    }
}

/// Flat files under one state directory (`<workspace>/.agents/.state/`).
#[derive(Debug, Clone)]
pub struct FsDocumentStore {
    pub root: PathBuf,
}

impl FsDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

impl DocumentStore for FsDocumentStore {
    fn read(&self, name: &str) -> Result<Option<String>, OmtError> {
        match fs::read_to_string(self.path_of(name)) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(OmtError::IoError(e)),
        }
    }

    fn replace(&self, name: &str, contents: &str) -> Result<(), OmtError> {
        let path = self.path_of(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(OmtError::IoError)?;
        }
        fs::write(&path, contents).map_err(OmtError::IoError)
    }
}

/// In-process store for embedding omt and for tests.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    docs: RefCell<BTreeMap<String, String>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(self, name: &str, contents: &str) -> Self {
        self.docs
            .borrow_mut()
            .insert(name.to_string(), contents.to_string());
        self
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn read(&self, name: &str) -> Result<Option<String>, OmtError> {
        Ok(self.docs.borrow().get(name).cloned())
    }

    fn replace(&self, name: &str, contents: &str) -> Result<(), OmtError> {
        self.docs
            .borrow_mut()
            .insert(name.to_string(), contents.to_string());
        Ok(())
    }
}

/// Pretty JSON with a trailing newline, the on-disk form of every document.
pub fn to_document<T: serde::Serialize>(name: &str, value: &T) -> Result<String, OmtError> {
    let mut raw = serde_json::to_string_pretty(value)
        .map_err(|e| OmtError::MalformedInput(format!("failed to serialize {name}: {e}")))?;
    raw.push('\n');
    Ok(raw)
}

pub fn from_document<T: serde::de::DeserializeOwned>(
    name: &str,
    raw: &str,
) -> Result<T, OmtError> {
    serde_json::from_str(raw).map_err(|e| OmtError::MalformedInput(format!("invalid {name}: {e}")))
}

/// Resolves `path` against `root` unless it is already absolute.
pub fn resolve_under(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}
