//! Document-level fixes: metadata setup, link tagging, ligature remapping

use crate::{DocContext, FixError, FixOutcome};
use doc_container::{mapped_role, struct_kids, ObjId, StructNode, TabOrder};

pub(crate) fn set_language(ctx: &mut DocContext, lang: &str) -> Result<FixOutcome, FixError> {
    let info = &mut ctx.doc_mut().info;
    if info.language.as_deref().is_some_and(|l| !l.is_empty()) {
        return Ok(FixOutcome::AlreadyApplied);
    }
    info.language = Some(lang.to_string());
    Ok(FixOutcome::Applied)
}

pub(crate) fn set_tagged_marker(ctx: &mut DocContext) -> Result<FixOutcome, FixError> {
    let info = &mut ctx.doc_mut().info;
    if info.marked_tagged {
        return Ok(FixOutcome::AlreadyApplied);
    }
    info.marked_tagged = true;
    Ok(FixOutcome::Applied)
}

pub(crate) fn set_tab_order(ctx: &mut DocContext, pages: &[u32]) -> Result<FixOutcome, FixError> {
    let mut changed = false;
    for &page_no in pages {
        if let Some(page) = ctx.doc_mut().page_mut(page_no) {
            if page.tab_order != TabOrder::Structure {
                page.tab_order = TabOrder::Structure;
                changed = true;
            }
        }
    }
    Ok(if changed {
        FixOutcome::Applied
    } else {
        FixOutcome::AlreadyApplied
    })
}

pub(crate) fn set_ua_identifier(ctx: &mut DocContext, part: u32) -> Result<FixOutcome, FixError> {
    let info = &mut ctx.doc_mut().info;
    if info.ua_part == Some(part) {
        return Ok(FixOutcome::AlreadyApplied);
    }
    info.ua_part = Some(part);
    Ok(FixOutcome::Applied)
}

/// Move a sibling marked-content reference into an empty `Link` element
pub(crate) fn move_mcr_into_link(
    ctx: &mut DocContext,
    link: ObjId,
    parent: ObjId,
    mcr: ObjId,
) -> Result<FixOutcome, FixError> {
    {
        let Some(tree) = ctx.doc().struct_tree() else {
            return Ok(FixOutcome::Skipped);
        };
        if !tree.contains(link) || !tree.contains(mcr) {
            return Ok(FixOutcome::Skipped);
        }
        if tree.kids(link).contains(&mcr) {
            return Ok(FixOutcome::AlreadyApplied);
        }
        if !tree.kids(parent).contains(&mcr) {
            return Ok(FixOutcome::Skipped);
        }
    }
    let Some(tree) = ctx.doc_mut().struct_tree_mut() else {
        return Ok(FixOutcome::Skipped);
    };
    // Leaves carry no parent back-link; raw array moves are the contract
    tree.normalize_k_array(parent)?.retain(|&k| k != mcr);
    tree.normalize_k_array(link)?.push(mcr);
    Ok(FixOutcome::Applied)
}

/// Wrap an unmarked link annotation in a fresh `Link` element holding an
/// object reference and, when the geometry resolves one, the overlapping
/// text span.
pub(crate) fn create_link_tag(
    ctx: &mut DocContext,
    page_no: u32,
    annot: ObjId,
) -> Result<FixOutcome, FixError> {
    let rect = {
        let Some(page) = ctx.doc().page(page_no) else {
            return Ok(FixOutcome::Skipped);
        };
        match page.annotation(annot) {
            Some(a) => a.rect,
            None => return Ok(FixOutcome::Skipped),
        }
    };

    let (attach_to, already_tagged) = {
        let Some(tree) = ctx.doc().struct_tree() else {
            return Ok(FixOutcome::Skipped);
        };
        let already = tree.node_ids().any(|id| {
            matches!(tree.get(id), Some(StructNode::Objr { annot: a, .. }) if *a == annot)
        });
        (attachment_parent(tree, page_no), already)
    };
    if already_tagged {
        return Ok(FixOutcome::AlreadyApplied);
    }

    // Prefer the text span whose box overlaps the annotation rectangle
    let mcid = {
        let bounds = ctx.page_bounds(page_no);
        let mut candidates: Vec<u32> = bounds
            .iter()
            .filter(|(_, r)| r.overlaps(&rect))
            .map(|(&m, _)| m)
            .collect();
        candidates.sort_unstable();
        candidates.first().copied()
    };

    let Some(tree) = ctx.doc_mut().struct_tree_mut() else {
        return Ok(FixOutcome::Skipped);
    };
    let link = tree.new_element("Link");
    tree.set_page(link, Some(page_no))?;
    tree.add_child(attach_to.unwrap_or(tree.root()), link)?;
    let objr = tree.new_objr(page_no, annot);
    tree.normalize_k_array(link)?.push(objr);
    if let Some(mcid) = mcid {
        let mcr = tree.new_mcr(page_no, mcid);
        tree.normalize_k_array(link)?.push(mcr);
    }
    Ok(FixOutcome::Applied)
}

/// Where a fresh Link element for `page_no` belongs: the page's Part when
/// the document is page-organized, else the Document element, else root.
fn attachment_parent(tree: &doc_container::StructTree, page_no: u32) -> Option<ObjId> {
    let document = struct_kids(tree, tree.root())
        .into_iter()
        .find(|&k| mapped_role(tree, k) == Some("Document"))?;
    let part = struct_kids(tree, document).into_iter().find(|&k| {
        mapped_role(tree, k) == Some("Part")
            && tree.element(k).map(|e| e.page == Some(page_no)).unwrap_or(false)
    });
    part.or(Some(document))
}

/// Point ligature codes at their canonical multi-character expansions
pub(crate) fn remap_ligatures(
    ctx: &mut DocContext,
    font: &str,
    mappings: &[(u16, String)],
) -> Result<FixOutcome, FixError> {
    let Some(font) = ctx.doc_mut().fonts.get_mut(font) else {
        return Ok(FixOutcome::Skipped);
    };
    let mut changed = false;
    for (code, text) in mappings {
        if font.decode(*code) != Some(text.as_str()) {
            font.remap(*code, text.clone());
            changed = true;
        }
    }
    Ok(if changed {
        FixOutcome::Applied
    } else {
        FixOutcome::AlreadyApplied
    })
}
