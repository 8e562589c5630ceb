//! Pure structure-tree queries and moves
//!
//! Free-standing helpers over [`StructTree`]. None of these own the tree;
//! mutation goes through the model's add/remove APIs so parent back-links
//! stay consistent.

use crate::{ObjId, StructNode, StructTree};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Subtree walks stop descending past this depth and skip the remainder
pub const MAX_TRAVERSAL_DEPTH: usize = 64;

/// The role of an element after role-map substitution
pub fn mapped_role(tree: &StructTree, id: ObjId) -> Option<&str> {
    match tree.get(id)? {
        StructNode::Element(e) => Some(tree.map_role(&e.role)),
        _ => None,
    }
}

/// Children that are structure elements, in order
pub fn struct_kids(tree: &StructTree, id: ObjId) -> Vec<ObjId> {
    tree.kids(id)
        .iter()
        .copied()
        .filter(|&k| tree.is_element(k))
        .collect()
}

/// The parent structure element, or None for the root and detached nodes
pub fn parent_of(tree: &StructTree, id: ObjId) -> Option<ObjId> {
    match tree.get(id)? {
        StructNode::Element(e) => e.parent,
        _ => None,
    }
}

/// Remove `node` from `from_parent` and append it to `to_parent`.
/// Returns true iff `from_parent`'s child sequence contained the node.
pub fn move_element(
    tree: &mut StructTree,
    from_parent: ObjId,
    node: ObjId,
    to_parent: ObjId,
) -> bool {
    let contained = tree.remove_child(from_parent, node);
    if tree.add_child(to_parent, node).is_err() {
        warn!(%node, %to_parent, "move_element: target is not an element");
        return false;
    }
    contained
}

/// Detach `node` from `parent`; no-op when it is not a child
pub fn remove_from_parent(tree: &mut StructTree, node: ObjId, parent: ObjId) {
    tree.remove_child(parent, node);
}

/// Identity by underlying storage reference. Wrappers may be re-created on
/// each traversal; the object number is what persists.
pub fn is_same_element(a: ObjId, b: ObjId) -> bool {
    a == b
}

/// Walk parent links from `candidate` looking for `ancestor`
pub fn is_descendant_of(tree: &StructTree, candidate: ObjId, ancestor: ObjId) -> bool {
    let mut current = candidate;
    for _ in 0..MAX_TRAVERSAL_DEPTH {
        match parent_of(tree, current) {
            Some(p) if p == ancestor => return true,
            Some(p) => current = p,
            None => return false,
        }
    }
    false
}

/// First explicit page reference found by pre-order descent, the node
/// itself included
pub fn first_explicit_page(tree: &StructTree, id: ObjId) -> Option<u32> {
    let mut stack = vec![(id, 0usize)];
    while let Some((current, depth)) = stack.pop() {
        match tree.get(current) {
            Some(StructNode::Element(e)) => {
                if let Some(page) = e.page {
                    return Some(page);
                }
                if depth >= MAX_TRAVERSAL_DEPTH {
                    warn!(%current, "page descent exceeded depth cap, skipping subtree");
                    continue;
                }
                // Pre-order: push kids in reverse so the first kid pops first
                for &kid in e.kids.as_slice().iter().rev() {
                    stack.push((kid, depth + 1));
                }
            }
            Some(StructNode::Mcr { page, .. }) | Some(StructNode::Objr { page, .. }) => {
                return Some(*page);
            }
            None => {}
        }
    }
    None
}

/// All marked-content references in the subtree as (page, mcid), in order
pub fn mcrs_in_subtree(tree: &StructTree, id: ObjId) -> Vec<(u32, u32)> {
    let mut out = Vec::new();
    let mut stack = vec![(id, 0usize)];
    while let Some((current, depth)) = stack.pop() {
        match tree.get(current) {
            Some(StructNode::Mcr { page, mcid }) => out.push((*page, *mcid)),
            Some(StructNode::Element(e)) => {
                if depth >= MAX_TRAVERSAL_DEPTH {
                    warn!(%current, "subtree walk exceeded depth cap, skipping subtree");
                    continue;
                }
                for &kid in e.kids.as_slice().iter().rev() {
                    stack.push((kid, depth + 1));
                }
            }
            _ => {}
        }
    }
    out
}

/// All object references in the subtree as (page, annotation id), in order
pub fn objrs_in_subtree(tree: &StructTree, id: ObjId) -> Vec<(u32, ObjId)> {
    let mut out = Vec::new();
    let mut stack = vec![(id, 0usize)];
    while let Some((current, depth)) = stack.pop() {
        match tree.get(current) {
            Some(StructNode::Objr { page, annot }) => out.push((*page, *annot)),
            Some(StructNode::Element(e)) => {
                if depth >= MAX_TRAVERSAL_DEPTH {
                    warn!(%current, "subtree walk exceeded depth cap, skipping subtree");
                    continue;
                }
                for &kid in e.kids.as_slice().iter().rev() {
                    stack.push((kid, depth + 1));
                }
            }
            _ => {}
        }
    }
    out
}

/// Whether any MCR exists under the node
pub fn has_mcr_descendant(tree: &StructTree, id: ObjId) -> bool {
    !mcrs_in_subtree(tree, id).is_empty()
}

/// A plain role tree for debugging and tests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleNode {
    pub role: String,
    pub kids: Vec<RoleNode>,
}

impl RoleNode {
    pub fn leaf(role: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            kids: Vec::new(),
        }
    }

    pub fn with_kids(role: impl Into<String>, kids: Vec<RoleNode>) -> Self {
        Self {
            role: role.into(),
            kids,
        }
    }

    fn fmt_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        writeln!(f, "{}{}", "  ".repeat(depth), self.role)?;
        for kid in &self.kids {
            kid.fmt_indented(f, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for RoleNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_indented(f, 0)
    }
}

/// Project the element subtree at `id` to mapped roles
pub fn to_role_tree(tree: &StructTree, id: ObjId) -> Option<RoleNode> {
    to_role_tree_at(tree, id, 0)
}

fn to_role_tree_at(tree: &StructTree, id: ObjId, depth: usize) -> Option<RoleNode> {
    let role = mapped_role(tree, id)?.to_string();
    if depth >= MAX_TRAVERSAL_DEPTH {
        warn!(%id, "role tree projection exceeded depth cap, skipping subtree");
        return Some(RoleNode::leaf(role));
    }
    let kids = struct_kids(tree, id)
        .into_iter()
        .filter_map(|k| to_role_tree_at(tree, k, depth + 1))
        .collect();
    Some(RoleNode { role, kids })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> (StructTree, ObjId, ObjId, ObjId) {
        let mut tree = StructTree::new();
        let doc = tree.new_element("Document");
        let l = tree.new_element("L");
        let li = tree.new_element("LI");
        tree.add_child(tree.root(), doc).unwrap();
        tree.add_child(doc, l).unwrap();
        tree.add_child(l, li).unwrap();
        (tree, doc, l, li)
    }

    #[test]
    fn test_mapped_role_uses_role_map() {
        let (mut tree, doc, _, _) = sample_tree();
        tree.set_role_mapping("Document", "Div");
        assert_eq!(mapped_role(&tree, doc), Some("Div"));
    }

    #[test]
    fn test_struct_kids_filters_leaves() {
        let (mut tree, _, l, li) = sample_tree();
        let mcr = tree.new_mcr(1, 7);
        tree.add_child(l, mcr).unwrap();
        assert_eq!(struct_kids(&tree, l), vec![li]);
        assert_eq!(tree.kids(l), &[li, mcr]);
    }

    #[test]
    fn test_is_descendant_of() {
        let (tree, doc, l, li) = sample_tree();
        assert!(is_descendant_of(&tree, li, doc));
        assert!(is_descendant_of(&tree, l, tree.root()));
        assert!(!is_descendant_of(&tree, doc, li));
        assert!(!is_descendant_of(&tree, doc, doc));
    }

    #[test]
    fn test_move_element_reports_containment() {
        let (mut tree, doc, l, li) = sample_tree();
        let sect = tree.new_element("Sect");
        tree.add_child(doc, sect).unwrap();

        assert!(move_element(&mut tree, l, li, sect));
        assert_eq!(parent_of(&tree, li), Some(sect));
        assert!(struct_kids(&tree, l).is_empty());

        // Moving a node the source does not contain still appends, but
        // reports false
        let stray = tree.new_element("P");
        assert!(!move_element(&mut tree, l, stray, sect));
        assert_eq!(parent_of(&tree, stray), Some(sect));
    }

    #[test]
    fn test_first_explicit_page_prefers_shallow_preorder() {
        let (mut tree, doc, l, li) = sample_tree();
        assert_eq!(first_explicit_page(&tree, doc), None);

        let mcr = tree.new_mcr(3, 0);
        tree.add_child(li, mcr).unwrap();
        assert_eq!(first_explicit_page(&tree, doc), Some(3));

        tree.set_page(l, Some(2)).unwrap();
        assert_eq!(first_explicit_page(&tree, doc), Some(2));

        tree.set_page(doc, Some(1)).unwrap();
        assert_eq!(first_explicit_page(&tree, doc), Some(1));
    }

    #[test]
    fn test_mcrs_in_subtree_in_order() {
        let (mut tree, doc, l, li) = sample_tree();
        let a = tree.new_mcr(1, 0);
        let b = tree.new_mcr(1, 1);
        let c = tree.new_mcr(2, 0);
        tree.add_child(li, a).unwrap();
        tree.add_child(li, b).unwrap();
        tree.add_child(l, c).unwrap();
        assert_eq!(mcrs_in_subtree(&tree, doc), vec![(1, 0), (1, 1), (2, 0)]);
        assert!(has_mcr_descendant(&tree, doc));
        assert_eq!(mcrs_in_subtree(&tree, li), vec![(1, 0), (1, 1)]);
    }

    #[test]
    fn test_to_role_tree() {
        let (tree, doc, _, _) = sample_tree();
        let role_tree = to_role_tree(&tree, doc).unwrap();
        assert_eq!(
            role_tree,
            RoleNode::with_kids(
                "Document",
                vec![RoleNode::with_kids("L", vec![RoleNode::leaf("LI")])]
            )
        );
        assert_eq!(role_tree.to_string(), "Document\n  L\n    LI\n");
    }
}
