//! Error types for schema loading and pattern compilation

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("failed to read schema file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse schema: {0}")]
    Parse(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("empty pattern")]
    Empty,

    #[error("unexpected token {found:?} at offset {pos}")]
    UnexpectedToken { pos: usize, found: String },

    #[error("unbalanced parenthesis at offset {pos}")]
    UnbalancedParen { pos: usize },

    #[error("quantifier {quantifier:?} at offset {pos} has nothing to repeat")]
    DanglingQuantifier { pos: usize, quantifier: char },
}

pub type Result<T> = std::result::Result<T, SchemaError>;
