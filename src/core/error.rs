use std::io;
use thiserror::Error;

/// Failures that abort an invocation.
///
/// Contract violations are not errors: they come back as a
/// [`ContractValidationResult`](crate::core::contract::ContractValidationResult).
#[derive(Error, Debug)]
pub enum OmtError {
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("Malformed input: {0}")]
    MalformedInput(String),
    #[error("No active {0} found")]
    MissingDocument(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Config error: {0}")]
    ConfigError(String),
    #[error("Transition rejected: {0}")]
    TransitionRejected(String),
}
