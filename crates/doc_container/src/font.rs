//! Font records
//!
//! Only the part of a font the audit cares about is modeled: the mapping
//! from character codes to extracted text. Badly authored documents map
//! ligature glyphs to private-use or presentation-form codepoints here,
//! which is what the ligature check and remap fix operate on.

use crate::ObjId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A font resource referenced by page content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Font {
    pub id: ObjId,
    /// Base font name, e.g. "Times-Roman"
    pub base_name: String,
    /// Character code -> extracted text mapping
    pub to_unicode: BTreeMap<u16, String>,
}

impl Font {
    pub fn new(id: ObjId, base_name: impl Into<String>) -> Self {
        Self {
            id,
            base_name: base_name.into(),
            to_unicode: BTreeMap::new(),
        }
    }

    /// Decode a single character code to its text
    pub fn decode(&self, code: u16) -> Option<&str> {
        self.to_unicode.get(&code).map(String::as_str)
    }

    /// Replace the text a code decodes to, returning the previous mapping
    pub fn remap(&mut self, code: u16, text: impl Into<String>) -> Option<String> {
        self.to_unicode.insert(code, text.into())
    }
}
