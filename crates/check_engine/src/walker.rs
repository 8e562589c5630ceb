//! The structure-tree walker
//!
//! One depth-first pre-order pass drives every registered visitor. Visitors
//! see nodes in a deterministic order, may veto descent into a subtree, and
//! hand their issues back after the walk. A visitor that hits an internal
//! problem logs it and keeps the issues it has already emitted; it never
//! aborts the walk or the other visitors.

use crate::{DocContext, IssueList};
use doc_container::{mapped_role, struct_kids, ObjId, StructTree, MAX_TRAVERSAL_DEPTH, ROOT_ROLE};
use tag_schema::{Pattern, Rule, TagSchema};
use tracing::warn;

/// Immutable per-node view handed to visitors
#[derive(Debug)]
pub struct StructTreeContext<'a> {
    /// The structure element being visited
    pub node: ObjId,
    /// Mapped role
    pub role: String,
    /// Role path breadcrumb, e.g. `/Document[1].L[7].LI[9]`
    pub path: String,
    /// Mapped role of the parent (the synthetic root role at depth 0)
    pub parent_role: String,
    /// Structure children with their mapped roles, in order
    pub struct_children: Vec<(ObjId, String)>,
    /// Schema rule for this role, if any
    pub rule: Option<&'a Rule>,
    /// Compiled child pattern for this role, if any
    pub pattern: Option<&'a Pattern>,
    /// 0 at direct root kids
    pub depth: usize,
    /// 1-based global traversal index
    pub index: usize,
}

impl StructTreeContext<'_> {
    /// Roles of the structure children, in order
    pub fn child_roles(&self) -> Vec<&str> {
        self.struct_children.iter().map(|(_, r)| r.as_str()).collect()
    }
}

/// A structure-tree check driven by the walker
pub trait StructTreeCheck {
    fn name(&self) -> &'static str;

    /// Checks that must be registered (and thus run) before this one
    fn prerequisites(&self) -> &'static [&'static str] {
        &[]
    }

    fn before_traversal(&mut self, _dc: &DocContext) {}

    /// Called on every element in pre-order. Returning false skips the
    /// element's children for all visitors; `leave_element` still runs.
    fn enter_element(&mut self, _ctx: &StructTreeContext<'_>, _dc: &DocContext) -> bool {
        true
    }

    /// Called after the element's children, in post-order
    fn leave_element(&mut self, _ctx: &StructTreeContext<'_>, _dc: &DocContext) {}

    fn after_traversal(&mut self, _dc: &DocContext) {}

    /// Hand back the issues collected during this run
    fn take_issues(&mut self) -> IssueList;
}

/// Drives one pre-order pass over the structure elements under the root
pub struct StructTreeWalker<'a> {
    schema: &'a TagSchema,
}

impl<'a> StructTreeWalker<'a> {
    pub fn new(schema: &'a TagSchema) -> Self {
        Self { schema }
    }

    /// Run all visitors over the tree and collect their issues in
    /// registration order.
    pub fn walk(
        &self,
        dc: &DocContext,
        visitors: &mut [Box<dyn StructTreeCheck>],
    ) -> IssueList {
        for visitor in visitors.iter_mut() {
            visitor.before_traversal(dc);
        }

        if let Some(tree) = dc.doc().struct_tree() {
            let mut index = 0usize;
            for kid in struct_kids(tree, tree.root()) {
                self.visit(dc, tree, kid, 0, "", &mut index, visitors);
            }
        }

        for visitor in visitors.iter_mut() {
            visitor.after_traversal(dc);
        }

        let mut issues = IssueList::new();
        for visitor in visitors.iter_mut() {
            issues.extend(visitor.take_issues());
        }
        issues
    }

    #[allow(clippy::too_many_arguments)]
    fn visit(
        &self,
        dc: &DocContext,
        tree: &StructTree,
        node: ObjId,
        depth: usize,
        parent_path: &str,
        index: &mut usize,
        visitors: &mut [Box<dyn StructTreeCheck>],
    ) {
        if depth >= MAX_TRAVERSAL_DEPTH {
            warn!(%node, depth, "structure tree deeper than traversal cap, skipping subtree");
            return;
        }
        let Some(role) = mapped_role(tree, node).map(String::from) else {
            return;
        };
        *index += 1;

        let path = if parent_path.is_empty() {
            format!("/{role}[{index}]")
        } else {
            format!("{parent_path}.{role}[{index}]")
        };
        let parent_role = tree
            .get(node)
            .and_then(|n| n.as_element())
            .and_then(|e| e.parent)
            .and_then(|p| mapped_role(tree, p))
            .unwrap_or(ROOT_ROLE)
            .to_string();
        let struct_children: Vec<(ObjId, String)> = struct_kids(tree, node)
            .into_iter()
            .filter_map(|k| mapped_role(tree, k).map(|r| (k, r.to_string())))
            .collect();

        let ctx = StructTreeContext {
            node,
            rule: self.schema.rule(&role),
            pattern: self.schema.compiled_pattern(&role),
            role,
            path,
            parent_role,
            struct_children,
            depth,
            index: *index,
        };

        let mut descend = true;
        for visitor in visitors.iter_mut() {
            if !visitor.enter_element(&ctx, dc) {
                descend = false;
            }
        }

        if descend {
            let kids: Vec<ObjId> = ctx.struct_children.iter().map(|(k, _)| *k).collect();
            for kid in kids {
                self.visit(dc, tree, kid, depth + 1, &ctx.path, index, visitors);
            }
        }

        for visitor in visitors.iter_mut() {
            visitor.leave_element(&ctx, dc);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doc_container::TaggedDocument;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Trace {
        entered: Vec<String>,
        left: Vec<String>,
    }

    /// Records traversal order; optionally vetoes descent under one role
    struct Recorder {
        trace: Rc<RefCell<Trace>>,
        skip_role: Option<&'static str>,
    }

    impl StructTreeCheck for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        fn enter_element(&mut self, ctx: &StructTreeContext<'_>, _dc: &DocContext) -> bool {
            self.trace.borrow_mut().entered.push(ctx.path.clone());
            Some(ctx.role.as_str()) != self.skip_role
        }

        fn leave_element(&mut self, ctx: &StructTreeContext<'_>, _dc: &DocContext) {
            self.trace.borrow_mut().left.push(ctx.role.clone());
        }

        fn take_issues(&mut self) -> IssueList {
            IssueList::new()
        }
    }

    fn sample_context() -> DocContext {
        let mut tree = doc_container::StructTree::new();
        let document = tree.new_element("Document");
        let l = tree.new_element("L");
        let li = tree.new_element("LI");
        let p = tree.new_element("P");
        tree.add_child(tree.root(), document).unwrap();
        tree.add_child(document, l).unwrap();
        tree.add_child(l, li).unwrap();
        tree.add_child(document, p).unwrap();

        let mut doc = TaggedDocument::new();
        doc.set_struct_tree(tree);
        DocContext::new(doc)
    }

    #[test]
    fn test_preorder_paths_and_indices() {
        let dc = sample_context();
        let schema = tag_schema::TagSchema::default();
        let walker = StructTreeWalker::new(&schema);
        let trace = Rc::new(RefCell::new(Trace::default()));
        let mut visitors: Vec<Box<dyn StructTreeCheck>> = vec![Box::new(Recorder {
            trace: Rc::clone(&trace),
            skip_role: None,
        })];
        walker.walk(&dc, &mut visitors);

        let trace = trace.borrow();
        assert_eq!(
            trace.entered,
            vec![
                "/Document[1]",
                "/Document[1].L[2]",
                "/Document[1].L[2].LI[3]",
                "/Document[1].P[4]",
            ]
        );
        // Post-order leaves
        assert_eq!(trace.left, vec!["LI", "L", "P", "Document"]);
    }

    #[test]
    fn test_skip_children_still_calls_leave() {
        let dc = sample_context();
        let schema = tag_schema::TagSchema::default();
        let walker = StructTreeWalker::new(&schema);
        let trace = Rc::new(RefCell::new(Trace::default()));
        let mut visitors: Vec<Box<dyn StructTreeCheck>> = vec![Box::new(Recorder {
            trace: Rc::clone(&trace),
            skip_role: Some("L"),
        })];
        walker.walk(&dc, &mut visitors);

        let trace = trace.borrow();
        // LI under L is never entered
        assert!(!trace.entered.iter().any(|p| p.contains("LI")));
        // but L itself still gets its leave call
        assert!(trace.left.contains(&"L".to_string()));
    }
}
