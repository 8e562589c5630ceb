//! Stable object identity

use serde::{Deserialize, Serialize};
use std::fmt;

/// Storage identity of an object inside the container.
///
/// Structure-element wrappers handed out by a container library may be
/// re-created between traversals; the object number is the only identity
/// that survives, so every comparison in the engine goes through `ObjId`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ObjId(pub u32);

impl ObjId {
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ObjId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "obj#{}", self.0)
    }
}
