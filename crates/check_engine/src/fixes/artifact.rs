//! Artifact conversion
//!
//! Rewrites every `BDC` opening owned by the subtree into `/Artifact BMC`,
//! removes annotations its object references point to, and detaches the
//! subtree. All page rewrites are computed before any is committed, so a
//! missing MCID leaves the document byte-for-byte unmodified.

use crate::{DocContext, FixError, FixOutcome};
use doc_container::{content, mcrs_in_subtree, objrs_in_subtree, ContainerError, ObjId};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

pub(crate) fn convert_to_artifact(
    ctx: &mut DocContext,
    element: ObjId,
) -> Result<FixOutcome, FixError> {
    let (by_page, objrs) = {
        let Some(tree) = ctx.doc().struct_tree() else {
            return Ok(FixOutcome::Skipped);
        };
        let Ok(elem) = tree.element(element) else {
            // Already detached and dropped by an earlier application
            return Ok(FixOutcome::AlreadyApplied);
        };
        if elem.parent.is_none() {
            return Ok(FixOutcome::AlreadyApplied);
        }

        let mut by_page: BTreeMap<u32, BTreeSet<u32>> = BTreeMap::new();
        for (page, mcid) in mcrs_in_subtree(tree, element) {
            by_page.entry(page).or_default().insert(mcid);
        }
        (by_page, objrs_in_subtree(tree, element))
    };

    // Rewrite all affected pages up front; commit only when every MCID
    // was located on its expected page.
    let mut rewritten: Vec<(u32, Vec<u8>)> = Vec::new();
    for (page_no, mcids) in &by_page {
        let page = ctx
            .doc()
            .page(*page_no)
            .ok_or(ContainerError::PageNotFound(*page_no))?;
        let (bytes, count) =
            content::artifact_mcids(&page.content, *page_no, mcids, &page.properties)?;
        debug!(page = page_no, count, "artifacted marked-content sections");
        rewritten.push((*page_no, bytes));
    }

    for (page_no, bytes) in rewritten {
        ctx.doc_mut().require_page_mut(page_no)?.content = bytes;
        ctx.invalidate_bounds(page_no);
    }

    // Remove annotations referenced from inside the subtree
    for (page_no, annot_id) in objrs {
        if let Some(page) = ctx.doc_mut().page_mut(page_no) {
            if let Some(target) = page.annotation(annot_id).cloned() {
                page.remove_matching_annotations(&target);
            }
        }
    }

    if let Some(tree) = ctx.doc_mut().struct_tree_mut() {
        tree.remove_subtree(element);
    }
    Ok(FixOutcome::Applied)
}
