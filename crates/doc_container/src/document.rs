//! The tagged document aggregate

use crate::{Annotation, ContainerError, Font, ObjId, Rect, Result, StructTree};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Tab traversal order of a page's annotations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum TabOrder {
    /// Follow the structure tree (the accessible setting)
    Structure,
    Row,
    Column,
    #[default]
    Unspecified,
}

/// Document-wide metadata the audit consults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentInfo {
    /// Natural language, e.g. "en-US"
    pub language: Option<String>,
    /// Whether the document declares itself tagged
    pub marked_tagged: bool,
    /// Declared PDF/UA conformance part, if any
    pub ua_part: Option<u32>,
    /// Whether the container was encrypted
    pub encrypted: bool,
    pub title: Option<String>,
}

/// One physical page
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    /// 1-based page number
    pub number: u32,
    pub media_box: Rect,
    /// Raw content operator stream
    pub content: Vec<u8>,
    pub tab_order: TabOrder,
    pub annotations: Vec<Annotation>,
    /// Named Properties resources resolving to marked-content ids
    pub properties: HashMap<String, u32>,
}

impl Page {
    pub fn new(number: u32) -> Self {
        Self {
            number,
            media_box: Rect::new(0.0, 0.0, 612.0, 792.0),
            content: Vec::new(),
            tab_order: TabOrder::Unspecified,
            annotations: Vec::new(),
            properties: HashMap::new(),
        }
    }

    /// Remove every annotation matching `target` (identity, equality, or
    /// rect within tolerance). Returns how many were removed.
    pub fn remove_matching_annotations(&mut self, target: &Annotation) -> usize {
        let before = self.annotations.len();
        self.annotations.retain(|a| !a.matches(target));
        before - self.annotations.len()
    }

    pub fn annotation(&self, id: ObjId) -> Option<&Annotation> {
        self.annotations.iter().find(|a| a.id == id)
    }
}

/// The in-memory model of one tagged binary document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaggedDocument {
    pub info: DocumentInfo,
    pages: Vec<Page>,
    /// Font resources by resource name (e.g. "F1")
    pub fonts: HashMap<String, Font>,
    struct_tree: Option<StructTree>,
    next_obj: u32,
}

impl TaggedDocument {
    pub fn new() -> Self {
        Self {
            info: DocumentInfo::default(),
            pages: Vec::new(),
            fonts: HashMap::new(),
            struct_tree: None,
            next_obj: 1,
        }
    }

    /// Allocate a fresh object number for annotations and fonts
    pub fn alloc_object_id(&mut self) -> ObjId {
        let id = ObjId(self.next_obj);
        self.next_obj += 1;
        id
    }

    pub fn add_page(&mut self, page: Page) {
        self.pages.push(page);
        self.pages.sort_by_key(|p| p.number);
    }

    pub fn page(&self, number: u32) -> Option<&Page> {
        self.pages.iter().find(|p| p.number == number)
    }

    pub fn page_mut(&mut self, number: u32) -> Option<&mut Page> {
        self.pages.iter_mut().find(|p| p.number == number)
    }

    pub fn require_page_mut(&mut self, number: u32) -> Result<&mut Page> {
        self.page_mut(number)
            .ok_or(ContainerError::PageNotFound(number))
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn pages_mut(&mut self) -> &mut [Page] {
        &mut self.pages
    }

    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    pub fn struct_tree(&self) -> Option<&StructTree> {
        self.struct_tree.as_ref()
    }

    pub fn struct_tree_mut(&mut self) -> Option<&mut StructTree> {
        self.struct_tree.as_mut()
    }

    pub fn set_struct_tree(&mut self, tree: StructTree) {
        self.struct_tree = Some(tree);
    }

    pub fn has_struct_tree(&self) -> bool {
        self.struct_tree.is_some()
    }

    /// All link annotations across the document with their page numbers
    pub fn link_annotations(&self) -> Vec<(u32, &Annotation)> {
        self.pages
            .iter()
            .flat_map(|p| {
                p.annotations
                    .iter()
                    .filter(|a| a.is_link())
                    .map(move |a| (p.number, a))
            })
            .collect()
    }
}

impl Default for TaggedDocument {
    fn default() -> Self {
        Self::new()
    }
}
