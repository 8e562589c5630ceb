//! Check engine - audit and remediation of tagged document structure
//!
//! One depth-first walk drives all structure-tree checks; document checks
//! run after it. Checks emit [`Issue`]s, issues may carry a [`Fix`], and
//! the engine applies fixes in priority order with invalidation between
//! them.

mod context;
mod engine;
mod error;
mod fix;
mod issue;
mod walker;
pub mod checks;
pub mod doc_checks;
mod fixes;

pub use context::*;
pub use engine::*;
pub use error::*;
pub use fix::*;
pub use issue::*;
pub use walker::*;
