//! Structural tree rewrites

use crate::{DocContext, FixError, FixOutcome};
use doc_container::{
    mapped_role, move_element, parent_of, struct_kids, Kids, ObjId, StructTree,
};
use std::collections::{BTreeMap, BTreeSet};

fn kid_position(tree: &StructTree, parent: ObjId, child: ObjId) -> Option<usize> {
    tree.kids(parent).iter().position(|&k| k == child)
}

/// Find the Document element directly under the root, if there is one
fn document_element(tree: &StructTree) -> Option<ObjId> {
    struct_kids(tree, tree.root())
        .into_iter()
        .find(|&k| mapped_role(tree, k) == Some("Document"))
}

/// Ensure a single `Document` element wraps all root content
pub(crate) fn wrap_in_document(ctx: &mut DocContext) -> Result<FixOutcome, FixError> {
    let (root, kids, existing) = {
        let Some(tree) = ctx.doc().struct_tree() else {
            return Ok(FixOutcome::Skipped);
        };
        let root = tree.root();
        (root, tree.kids(root).to_vec(), document_element(tree))
    };

    if kids.len() == 1 && existing == Some(kids[0]) {
        return Ok(FixOutcome::AlreadyApplied);
    }

    let Some(tree) = ctx.doc_mut().struct_tree_mut() else {
        return Ok(FixOutcome::Skipped);
    };

    if let Some(document) = existing {
        let mut moved = false;
        for kid in kids {
            if kid != document {
                move_element(tree, root, kid, document);
                moved = true;
            }
        }
        return Ok(if moved {
            FixOutcome::Applied
        } else {
            FixOutcome::AlreadyApplied
        });
    }

    let document = tree.new_element("Document");
    for kid in kids {
        move_element(tree, root, kid, document);
    }
    tree.add_child(root, document)?;
    Ok(FixOutcome::Applied)
}

/// Collapse a wrapper chain: the topmost wrapper adopts the deepest
/// wrapper's children and the intermediates are removed. Each wrapper is
/// spliced out at its own position, so MCR/OBJR leaves riding on a chain
/// wrapper stay in the tree in order.
pub(crate) fn flatten_nesting(
    ctx: &mut DocContext,
    chain: &[ObjId],
) -> Result<FixOutcome, FixError> {
    if chain.len() < 2 {
        return Ok(FixOutcome::Skipped);
    }
    {
        let Some(tree) = ctx.doc().struct_tree() else {
            return Ok(FixOutcome::Skipped);
        };
        if !tree.contains(chain[0]) || !tree.contains(chain[1]) {
            // The chain was already collapsed
            return Ok(FixOutcome::AlreadyApplied);
        }
        // Each wrapper must still hold its successor as its only
        // structural child; leaves do not count
        for pair in chain.windows(2) {
            if struct_kids(tree, pair[0]) != [pair[1]] {
                return Ok(FixOutcome::Skipped);
            }
        }
    }

    let Some(tree) = ctx.doc_mut().struct_tree_mut() else {
        return Ok(FixOutcome::Skipped);
    };
    for &wrapper in &chain[1..] {
        let Some(parent) = parent_of(tree, wrapper) else {
            continue;
        };
        let Some(idx) = kid_position(tree, parent, wrapper) else {
            continue;
        };
        let kids: Vec<ObjId> = tree.kids(wrapper).to_vec();
        tree.element_mut(wrapper)?.kids = Kids::None;
        tree.remove_child(parent, wrapper);
        for (offset, &kid) in kids.iter().enumerate() {
            tree.insert_child(parent, idx + offset, kid)?;
        }
        tree.remove_subtree(wrapper);
    }
    Ok(FixOutcome::Applied)
}

/// Ensure `Document > Part[page=k]` wrappers and move each direct child of
/// `Document` into the Part matching its resolved page. Children without a
/// resolvable page stay direct children.
pub(crate) fn setup_page_parts(ctx: &mut DocContext) -> Result<FixOutcome, FixError> {
    wrap_in_document(ctx)?;

    let page_count = ctx.doc().page_count();
    let (doc_el, mut parts, moves) = {
        let Some(tree) = ctx.doc().struct_tree() else {
            return Ok(FixOutcome::Skipped);
        };
        let Some(doc_el) = document_element(tree) else {
            return Ok(FixOutcome::Skipped);
        };

        let mut parts: BTreeMap<u32, ObjId> = BTreeMap::new();
        for kid in struct_kids(tree, doc_el) {
            if mapped_role(tree, kid) == Some("Part") {
                if let Ok(elem) = tree.element(kid) {
                    if let Some(page) = elem.page {
                        if (1..=page_count).contains(&page) {
                            parts.entry(page).or_insert(kid);
                        }
                    }
                }
            }
        }

        let part_ids: BTreeSet<ObjId> = parts.values().copied().collect();
        let moves: Vec<(ObjId, u32)> = tree
            .kids(doc_el)
            .iter()
            .filter(|k| !part_ids.contains(k))
            .map(|&k| (k, ctx.page_number_of(k)))
            .collect();
        (doc_el, parts, moves)
    };

    let Some(tree) = ctx.doc_mut().struct_tree_mut() else {
        return Ok(FixOutcome::Skipped);
    };

    let mut changed = false;
    for page in 1..=page_count {
        if let std::collections::btree_map::Entry::Vacant(entry) = parts.entry(page) {
            let part = tree.new_element("Part");
            tree.set_page(part, Some(page))?;
            tree.add_child(doc_el, part)?;
            entry.insert(part);
            changed = true;
        }
    }

    for (kid, page) in moves {
        if !(1..=page_count).contains(&page) {
            continue;
        }
        if let Some(&part) = parts.get(&page) {
            if move_element(tree, doc_el, kid, part) {
                changed = true;
            }
        }
    }

    // Keep Parts in page order ahead of anything unresolvable
    let current = tree.kids(doc_el).to_vec();
    let part_ids: BTreeSet<ObjId> = parts.values().copied().collect();
    let mut order: Vec<ObjId> = parts.values().copied().collect();
    order.extend(current.iter().copied().filter(|k| !part_ids.contains(k)));
    if order != current {
        *tree.normalize_k_array(doc_el)? = order;
        changed = true;
    }

    Ok(if changed {
        FixOutcome::Applied
    } else {
        FixOutcome::AlreadyApplied
    })
}

/// Validation shared by the single-child wraps: is `child` still a child of
/// `parent`, already wrapped in `wrapper_role` under `parent`, or gone?
enum WrapState {
    InPlace(usize),
    AlreadyWrapped,
    Vanished,
}

fn wrap_state(tree: &StructTree, parent: ObjId, child: ObjId, wrapper_role: &str) -> WrapState {
    match parent_of(tree, child) {
        Some(p) if p == parent => match kid_position(tree, parent, child) {
            Some(idx) => WrapState::InPlace(idx),
            None => WrapState::Vanished,
        },
        Some(p)
            if mapped_role(tree, p) == Some(wrapper_role) && parent_of(tree, p) == Some(parent) =>
        {
            WrapState::AlreadyWrapped
        }
        _ => WrapState::Vanished,
    }
}

pub(crate) fn wrap_in_li(
    ctx: &mut DocContext,
    parent: ObjId,
    child: ObjId,
) -> Result<FixOutcome, FixError> {
    wrap_single(ctx, parent, child, "LI")
}

pub(crate) fn wrap_in_lbody(
    ctx: &mut DocContext,
    parent: ObjId,
    child: ObjId,
) -> Result<FixOutcome, FixError> {
    wrap_single(ctx, parent, child, "LBody")
}

fn wrap_single(
    ctx: &mut DocContext,
    parent: ObjId,
    child: ObjId,
    wrapper_role: &str,
) -> Result<FixOutcome, FixError> {
    let idx = {
        let Some(tree) = ctx.doc().struct_tree() else {
            return Ok(FixOutcome::Skipped);
        };
        match wrap_state(tree, parent, child, wrapper_role) {
            WrapState::InPlace(idx) => idx,
            WrapState::AlreadyWrapped => return Ok(FixOutcome::AlreadyApplied),
            WrapState::Vanished => return Ok(FixOutcome::Skipped),
        }
    };

    let Some(tree) = ctx.doc_mut().struct_tree_mut() else {
        return Ok(FixOutcome::Skipped);
    };
    let wrapper = tree.new_element(wrapper_role);
    tree.remove_child(parent, child);
    tree.insert_child(parent, idx, wrapper)?;
    tree.add_child(wrapper, child)?;
    Ok(FixOutcome::Applied)
}

/// Convert a decorative `Lbl > Figure` bullet: the Figure becomes a `Lbl`
/// with actual text "Bullet" in the outer label's place, and the outer
/// label is dropped.
pub(crate) fn treat_lbl_figure_as_bullet(
    ctx: &mut DocContext,
    lbl: ObjId,
    figure: ObjId,
) -> Result<FixOutcome, FixError> {
    let (grandparent, idx) = {
        let Some(tree) = ctx.doc().struct_tree() else {
            return Ok(FixOutcome::Skipped);
        };
        if !tree.contains(lbl) {
            let done = tree
                .element(figure)
                .map(|e| tree.map_role(&e.role) == "Lbl")
                .unwrap_or(false);
            return Ok(if done {
                FixOutcome::AlreadyApplied
            } else {
                FixOutcome::Skipped
            });
        }
        if parent_of(tree, figure) != Some(lbl) {
            return Ok(FixOutcome::Skipped);
        }
        let Some(grandparent) = parent_of(tree, lbl) else {
            return Ok(FixOutcome::Skipped);
        };
        let Some(idx) = kid_position(tree, grandparent, lbl) else {
            return Ok(FixOutcome::Skipped);
        };
        (grandparent, idx)
    };

    let Some(tree) = ctx.doc_mut().struct_tree_mut() else {
        return Ok(FixOutcome::Skipped);
    };
    tree.set_role(figure, "Lbl")?;
    tree.set_actual_text(figure, "Bullet")?;
    tree.remove_child(lbl, figure);
    tree.insert_child(grandparent, idx, figure)?;
    // Keep any remaining label content (bullet image refs) under the new Lbl
    for kid in tree.kids(lbl).to_vec() {
        move_element(tree, lbl, kid, figure);
    }
    tree.remove_subtree(lbl);
    Ok(FixOutcome::Applied)
}

/// Promote a misplaced `P > LBody` into a new `L > LI > LBody` sibling
/// following the paragraph.
pub(crate) fn extract_lbody_to_list(
    ctx: &mut DocContext,
    paragraph: ObjId,
    lbody: ObjId,
) -> Result<FixOutcome, FixError> {
    let (grandparent, idx) = {
        let Some(tree) = ctx.doc().struct_tree() else {
            return Ok(FixOutcome::Skipped);
        };
        match parent_of(tree, lbody) {
            Some(p) if p == paragraph => {}
            Some(p) if mapped_role(tree, p) == Some("LI") => {
                return Ok(FixOutcome::AlreadyApplied)
            }
            _ => return Ok(FixOutcome::Skipped),
        }
        let Some(grandparent) = parent_of(tree, paragraph) else {
            return Ok(FixOutcome::Skipped);
        };
        let Some(idx) = kid_position(tree, grandparent, paragraph) else {
            return Ok(FixOutcome::Skipped);
        };
        (grandparent, idx + 1)
    };

    let Some(tree) = ctx.doc_mut().struct_tree_mut() else {
        return Ok(FixOutcome::Skipped);
    };
    tree.remove_child(paragraph, lbody);
    let l = tree.new_element("L");
    let li = tree.new_element("LI");
    tree.insert_child(grandparent, idx, l)?;
    tree.add_child(l, li)?;
    tree.add_child(li, lbody)?;
    Ok(FixOutcome::Applied)
}

pub(crate) fn change_p_to_lbl(
    ctx: &mut DocContext,
    li: ObjId,
    p: ObjId,
) -> Result<FixOutcome, FixError> {
    {
        let Some(tree) = ctx.doc().struct_tree() else {
            return Ok(FixOutcome::Skipped);
        };
        match mapped_role(tree, p) {
            Some("Lbl") => return Ok(FixOutcome::AlreadyApplied),
            Some("P") => {}
            _ => return Ok(FixOutcome::Skipped),
        }
        if parent_of(tree, p) != Some(li) {
            return Ok(FixOutcome::Skipped);
        }
    }
    let Some(tree) = ctx.doc_mut().struct_tree_mut() else {
        return Ok(FixOutcome::Skipped);
    };
    tree.set_role(p, "Lbl")?;
    Ok(FixOutcome::Applied)
}

/// How many of `children` are still children of `parent`
enum Presence {
    All,
    None,
    Partial,
}

fn presence(tree: &StructTree, parent: ObjId, children: &[ObjId]) -> Presence {
    let kids = tree.kids(parent);
    let present = children.iter().filter(|c| kids.contains(c)).count();
    if present == children.len() {
        Presence::All
    } else if present == 0 {
        Presence::None
    } else {
        Presence::Partial
    }
}

/// Wrap alternating `Lbl X` pairs into `LI` elements. When `X` is already
/// `LBody` it lands directly under the `LI`; otherwise it is wrapped in a
/// fresh `LBody` first.
pub(crate) fn wrap_pairs_in_li(
    ctx: &mut DocContext,
    parent: ObjId,
    children: &[ObjId],
    second_role: &str,
) -> Result<FixOutcome, FixError> {
    if children.len() < 2 || children.len() % 2 != 0 {
        return Ok(FixOutcome::Skipped);
    }
    {
        let Some(tree) = ctx.doc().struct_tree() else {
            return Ok(FixOutcome::Skipped);
        };
        match presence(tree, parent, children) {
            Presence::None => return Ok(FixOutcome::AlreadyApplied),
            Presence::Partial => return Ok(FixOutcome::Skipped),
            Presence::All => {}
        }
        for pair in children.chunks(2) {
            if mapped_role(tree, pair[0]) != Some("Lbl")
                || mapped_role(tree, pair[1]) != Some(second_role)
            {
                return Ok(FixOutcome::Skipped);
            }
        }
    }

    let Some(tree) = ctx.doc_mut().struct_tree_mut() else {
        return Ok(FixOutcome::Skipped);
    };
    for pair in children.chunks(2) {
        let (lbl, body) = (pair[0], pair[1]);
        let Some(idx) = kid_position(tree, parent, lbl) else {
            continue;
        };
        let li = tree.new_element("LI");
        tree.remove_child(parent, lbl);
        tree.remove_child(parent, body);
        tree.insert_child(parent, idx, li)?;
        tree.add_child(li, lbl)?;
        if second_role == "LBody" {
            tree.add_child(li, body)?;
        } else {
            let lbody = tree.new_element("LBody");
            tree.add_child(li, lbody)?;
            tree.add_child(lbody, body)?;
        }
    }
    Ok(FixOutcome::Applied)
}

/// Turn a paragraph holding only links into a list: the `P` becomes `L`
/// and each link is wrapped as `LI > LBody > Link`.
pub(crate) fn listify_paragraph_of_links(
    ctx: &mut DocContext,
    paragraph: ObjId,
    links: &[ObjId],
) -> Result<FixOutcome, FixError> {
    {
        let Some(tree) = ctx.doc().struct_tree() else {
            return Ok(FixOutcome::Skipped);
        };
        match mapped_role(tree, paragraph) {
            Some("L") => return Ok(FixOutcome::AlreadyApplied),
            Some("P") => {}
            _ => return Ok(FixOutcome::Skipped),
        }
        match presence(tree, paragraph, links) {
            Presence::All => {}
            _ => return Ok(FixOutcome::Skipped),
        }
    }

    let Some(tree) = ctx.doc_mut().struct_tree_mut() else {
        return Ok(FixOutcome::Skipped);
    };
    tree.set_role(paragraph, "L")?;
    for &link in links {
        let Some(idx) = kid_position(tree, paragraph, link) else {
            continue;
        };
        let li = tree.new_element("LI");
        let lbody = tree.new_element("LBody");
        tree.remove_child(paragraph, link);
        tree.insert_child(paragraph, idx, li)?;
        tree.add_child(li, lbody)?;
        tree.add_child(lbody, link)?;
    }
    Ok(FixOutcome::Applied)
}

/// Wrap a run of paragraphs as list items. Inside an existing `L` the
/// items are wrapped in place; elsewhere a new `L` is created at the run's
/// position and the items move into it.
pub(crate) fn wrap_paragraph_run_in_list(
    ctx: &mut DocContext,
    parent: ObjId,
    run: &[ObjId],
) -> Result<FixOutcome, FixError> {
    if run.is_empty() {
        return Ok(FixOutcome::Skipped);
    }
    let parent_is_list = {
        let Some(tree) = ctx.doc().struct_tree() else {
            return Ok(FixOutcome::Skipped);
        };
        match presence(tree, parent, run) {
            Presence::None => return Ok(FixOutcome::AlreadyApplied),
            Presence::Partial => return Ok(FixOutcome::Skipped),
            Presence::All => {}
        }
        if run.iter().any(|&p| mapped_role(tree, p) != Some("P")) {
            return Ok(FixOutcome::Skipped);
        }
        mapped_role(tree, parent) == Some("L")
    };

    let Some(tree) = ctx.doc_mut().struct_tree_mut() else {
        return Ok(FixOutcome::Skipped);
    };

    let list = if parent_is_list {
        parent
    } else {
        let Some(idx) = kid_position(tree, parent, run[0]) else {
            return Ok(FixOutcome::Skipped);
        };
        let l = tree.new_element("L");
        tree.insert_child(parent, idx, l)?;
        l
    };

    for &p in run {
        let li = tree.new_element("LI");
        let lbody = tree.new_element("LBody");
        if parent_is_list {
            let Some(idx) = kid_position(tree, parent, p) else {
                continue;
            };
            tree.remove_child(parent, p);
            tree.insert_child(parent, idx, li)?;
        } else {
            tree.remove_child(parent, p);
            tree.add_child(list, li)?;
        }
        tree.add_child(li, lbody)?;
        tree.add_child(lbody, p)?;
    }
    Ok(FixOutcome::Applied)
}

/// Gather raw marked-content kids that sit on the bullet's line into a new
/// `LBody` next to them.
pub(crate) fn wrap_bullet_aligned_kids(
    ctx: &mut DocContext,
    parent: ObjId,
    kids: &[ObjId],
) -> Result<FixOutcome, FixError> {
    if kids.is_empty() {
        return Ok(FixOutcome::Skipped);
    }
    let idx = {
        let Some(tree) = ctx.doc().struct_tree() else {
            return Ok(FixOutcome::Skipped);
        };
        match presence(tree, parent, kids) {
            Presence::None => return Ok(FixOutcome::AlreadyApplied),
            Presence::Partial => return Ok(FixOutcome::Skipped),
            Presence::All => {}
        }
        match kid_position(tree, parent, kids[0]) {
            Some(idx) => idx,
            None => return Ok(FixOutcome::Skipped),
        }
    };

    let Some(tree) = ctx.doc_mut().struct_tree_mut() else {
        return Ok(FixOutcome::Skipped);
    };
    tree.normalize_k_array(parent)?.retain(|k| !kids.contains(k));
    let lbody = tree.new_element("LBody");
    tree.insert_child(parent, idx, lbody)?;
    for &kid in kids {
        if tree.is_element(kid) {
            tree.add_child(lbody, kid)?;
        } else {
            // Raw array manipulation is the only way to move a leaf
            tree.normalize_k_array(lbody)?.push(kid);
        }
    }
    Ok(FixOutcome::Applied)
}

pub(crate) fn change_role(
    ctx: &mut DocContext,
    element: ObjId,
    to: &str,
) -> Result<FixOutcome, FixError> {
    {
        let Some(tree) = ctx.doc().struct_tree() else {
            return Ok(FixOutcome::Skipped);
        };
        match mapped_role(tree, element) {
            Some(role) if role == to => return Ok(FixOutcome::AlreadyApplied),
            Some(_) => {}
            None => return Ok(FixOutcome::Skipped),
        }
    }
    let Some(tree) = ctx.doc_mut().struct_tree_mut() else {
        return Ok(FixOutcome::Skipped);
    };
    tree.set_role(element, to)?;
    Ok(FixOutcome::Applied)
}
