//! Error types for the processing service

use check_engine::EngineError;
use doc_container::ContainerError;
use tag_schema::SchemaError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error("schema failed to load: {0}")]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("failed to write report: {0}")]
    Report(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ProcessingError>;
