//! Error types for the check engine

use doc_container::ContainerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(
        "check {check:?} requires {missing:?} to run before it; \
         register {missing:?} earlier or skip one of the two"
    )]
    PrerequisiteViolation { check: String, missing: String },
}

/// Failure of a single fix application. Captured per issue; never aborts
/// the batch.
#[derive(Debug, Error)]
pub enum FixError {
    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error("{0}")]
    Failed(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
