//! Processing service - phase orchestration over one document
//!
//! Owns the input/output file lifecycles and sequences the engine:
//! analyze detects and reports, remediate detects, applies fixes, and
//! re-detects into a fresh output document.

mod error;
mod report;
mod service;

pub use error::*;
pub use report::*;
pub use service::*;
