//! Error types for container operations

use crate::ObjId;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("input not found: {0}")]
    NotFound(PathBuf),

    #[error("input unreadable: {0}")]
    Unreadable(String),

    #[error("output unwritable: {0}")]
    Unwritable(String),

    #[error("document is encrypted and requires a credential")]
    Encrypted,

    #[error("node not found: {0}")]
    NodeNotFound(ObjId),

    #[error("not a structure element: {0}")]
    NotAnElement(ObjId),

    #[error("page {0} not found")]
    PageNotFound(u32),

    #[error("marked content id {mcid} not found on page {page}")]
    McidNotFound { page: u32, mcid: u32 },
}

pub type Result<T> = std::result::Result<T, ContainerError>;
