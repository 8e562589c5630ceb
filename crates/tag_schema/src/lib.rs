//! Tag schema - role catalog and child-sequence patterns
//!
//! The schema drives structural validation: which roles exist, which
//! parents and children they admit, cardinality, and an optional pattern
//! the child-role sequence must match.

mod error;
mod pattern;
mod rule;
mod schema;

pub use error::*;
pub use pattern::*;
pub use rule::*;
pub use schema::*;
