//! Per-document run context
//!
//! Owns the open document for one engine run, the object-to-page index,
//! and the lazily memoized per-page marked-content geometry the proximity
//! checks consult. Caches use interior mutability because visitors only
//! ever hold a shared reference; the engine is single-threaded by design.

use doc_container::{content, first_explicit_page, ObjId, Page, Rect, StructNode, TaggedDocument};
use serde::Serialize;
use std::cell::RefCell;
use std::collections::HashMap;

/// Produces per-MCID bounding rectangles for one page
pub type BoundsProducer = Box<dyn Fn(&Page) -> HashMap<u32, Rect>>;

/// One fix that was applied during this run
#[derive(Debug, Clone, Serialize)]
pub struct AppliedFix {
    pub group: String,
    pub description: String,
    pub pages: Vec<u32>,
}

/// Accumulating record of what a run did
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunRecord {
    pub applied: Vec<AppliedFix>,
}

/// Per-document scratchpad for one engine run
pub struct DocContext {
    doc: TaggedDocument,
    /// Object number -> resolved page number
    page_index: HashMap<ObjId, u32>,
    bounds_cache: RefCell<HashMap<u32, HashMap<u32, Rect>>>,
    bounds_producer: BoundsProducer,
    pub record: RunRecord,
}

impl DocContext {
    /// Build a context over an opened document. The default bounds
    /// producer scans the page's text and rectangle operators.
    pub fn new(doc: TaggedDocument) -> Self {
        Self::with_bounds_producer(
            doc,
            Box::new(|page: &Page| content::text_bounds(&page.content, &page.properties)),
        )
    }

    pub fn with_bounds_producer(doc: TaggedDocument, bounds_producer: BoundsProducer) -> Self {
        let page_index = build_page_index(&doc);
        Self {
            doc,
            page_index,
            bounds_cache: RefCell::new(HashMap::new()),
            bounds_producer,
            record: RunRecord::default(),
        }
    }

    pub fn doc(&self) -> &TaggedDocument {
        &self.doc
    }

    pub fn doc_mut(&mut self) -> &mut TaggedDocument {
        &mut self.doc
    }

    /// Hand the document back, consuming the context
    pub fn into_doc(self) -> TaggedDocument {
        self.doc
    }

    /// Resolve the page of a node: its explicit page if set, else the
    /// first explicit page found by pre-order descent, else the cached
    /// object-to-page lookup, else 0.
    pub fn page_number_of(&self, id: ObjId) -> u32 {
        let Some(tree) = self.doc.struct_tree() else {
            return 0;
        };
        match tree.get(id) {
            Some(StructNode::Element(e)) => {
                if let Some(page) = e.page {
                    return page;
                }
                if let Some(page) = first_explicit_page(tree, id) {
                    return page;
                }
                self.page_index.get(&id).copied().unwrap_or(0)
            }
            Some(StructNode::Mcr { page, .. }) | Some(StructNode::Objr { page, .. }) => *page,
            None => self.page_index.get(&id).copied().unwrap_or(0),
        }
    }

    /// Bounding rectangle of one marked-content id on a page, if the page
    /// geometry resolves it. Computed on demand and memoized per page.
    pub fn mcid_bounds(&self, page: u32, mcid: u32) -> Option<Rect> {
        self.ensure_bounds(page);
        self.bounds_cache
            .borrow()
            .get(&page)
            .and_then(|m| m.get(&mcid))
            .copied()
    }

    /// All marked-content bounds of a page (cloned out of the cache)
    pub fn page_bounds(&self, page: u32) -> HashMap<u32, Rect> {
        self.ensure_bounds(page);
        self.bounds_cache
            .borrow()
            .get(&page)
            .cloned()
            .unwrap_or_default()
    }

    fn ensure_bounds(&self, page: u32) {
        if self.bounds_cache.borrow().contains_key(&page) {
            return;
        }
        let computed = self
            .doc
            .page(page)
            .map(|p| (self.bounds_producer)(p))
            .unwrap_or_default();
        self.bounds_cache.borrow_mut().insert(page, computed);
    }

    /// Drop cached geometry for a page whose content was rewritten
    pub fn invalidate_bounds(&self, page: u32) {
        self.bounds_cache.borrow_mut().remove(&page);
    }

    /// Rebuild the object-to-page index after structural fixes
    pub fn refresh_page_index(&mut self) {
        self.page_index = build_page_index(&self.doc);
    }
}

/// Assign every structure node a page by post-order traversal, so inherited
/// page references resolve deepest-first.
fn build_page_index(doc: &TaggedDocument) -> HashMap<ObjId, u32> {
    let mut index = HashMap::new();
    let Some(tree) = doc.struct_tree() else {
        return index;
    };
    assign_page(tree, tree.root(), &mut index, 0);
    index
}

fn assign_page(
    tree: &doc_container::StructTree,
    id: ObjId,
    index: &mut HashMap<ObjId, u32>,
    depth: usize,
) -> Option<u32> {
    if depth > doc_container::MAX_TRAVERSAL_DEPTH {
        return None;
    }
    match tree.get(id)? {
        StructNode::Mcr { page, .. } | StructNode::Objr { page, .. } => {
            index.insert(id, *page);
            Some(*page)
        }
        StructNode::Element(e) => {
            let kids: Vec<ObjId> = e.kids.as_slice().to_vec();
            let mut inherited = None;
            for kid in kids {
                let kid_page = assign_page(tree, kid, index, depth + 1);
                if inherited.is_none() {
                    inherited = kid_page;
                }
            }
            let page = e.page.or(inherited);
            if let Some(page) = page {
                index.insert(id, page);
            }
            page
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doc_container::{StructTree, TaggedDocument};

    fn doc_with_tree() -> (TaggedDocument, ObjId, ObjId, ObjId) {
        let mut tree = StructTree::new();
        let document = tree.new_element("Document");
        let p = tree.new_element("P");
        let mcr = tree.new_mcr(2, 5);
        tree.add_child(tree.root(), document).unwrap();
        tree.add_child(document, p).unwrap();
        tree.add_child(p, mcr).unwrap();

        let mut doc = TaggedDocument::new();
        doc.add_page(Page::new(1));
        doc.add_page(Page::new(2));
        doc.set_struct_tree(tree);
        (doc, document, p, mcr)
    }

    #[test]
    fn test_page_resolution_order() {
        let (doc, document, p, mcr) = doc_with_tree();
        let ctx = DocContext::new(doc);

        // MCR carries its page directly
        assert_eq!(ctx.page_number_of(mcr), 2);
        // Elements inherit deepest-first through descent
        assert_eq!(ctx.page_number_of(p), 2);
        assert_eq!(ctx.page_number_of(document), 2);
    }

    #[test]
    fn test_explicit_page_wins() {
        let (mut doc, document, _, _) = doc_with_tree();
        doc.struct_tree_mut()
            .unwrap()
            .set_page(document, Some(1))
            .unwrap();
        let ctx = DocContext::new(doc);
        assert_eq!(ctx.page_number_of(document), 1);
    }

    #[test]
    fn test_unresolvable_page_is_zero() {
        let mut tree = StructTree::new();
        let empty = tree.new_element("Sect");
        tree.add_child(tree.root(), empty).unwrap();
        let mut doc = TaggedDocument::new();
        doc.set_struct_tree(tree);
        let ctx = DocContext::new(doc);
        assert_eq!(ctx.page_number_of(empty), 0);
    }

    #[test]
    fn test_bounds_memoized_and_invalidated() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in = Arc::clone(&calls);

        let (doc, ..) = doc_with_tree();
        let ctx = DocContext::with_bounds_producer(
            doc,
            Box::new(move |_page| {
                calls_in.fetch_add(1, Ordering::SeqCst);
                let mut m = HashMap::new();
                m.insert(5, Rect::new(0.0, 0.0, 10.0, 10.0));
                m
            }),
        );

        assert!(ctx.mcid_bounds(2, 5).is_some());
        assert!(ctx.mcid_bounds(2, 5).is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        ctx.invalidate_bounds(2);
        assert!(ctx.mcid_bounds(2, 5).is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
