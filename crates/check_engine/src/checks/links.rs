//! Link structure checks

use crate::{
    DocContext, Fix, Issue, IssueList, IssueType, Location, Severity, StructTreeCheck,
    StructTreeContext,
};
use doc_container::{has_mcr_descendant, parent_of, ObjId, StructNode};

pub const EMPTY_LINK: &str = "empty-link";
pub const PARAGRAPH_OF_LINKS: &str = "paragraph-of-links";

/// A `Link` holding only the annotation reference reads as nothing. When a
/// sibling marked-content span overlaps the annotation rectangle, it is
/// the link text and can be pulled inside.
#[derive(Default)]
pub struct EmptyLinkTag {
    issues: IssueList,
}

impl EmptyLinkTag {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StructTreeCheck for EmptyLinkTag {
    fn name(&self) -> &'static str {
        EMPTY_LINK
    }

    fn enter_element(&mut self, ctx: &StructTreeContext<'_>, dc: &DocContext) -> bool {
        if ctx.role != "Link" {
            return true;
        }
        let Some(tree) = dc.doc().struct_tree() else {
            return true;
        };

        let objr = tree.kids(ctx.node).iter().find_map(|&k| match tree.get(k) {
            Some(StructNode::Objr { page, annot }) => Some((*page, *annot)),
            _ => None,
        });
        let Some((page_no, annot)) = objr else {
            return true;
        };
        if has_mcr_descendant(tree, ctx.node) {
            return true;
        }

        let mut issue = Issue::new(
            IssueType::EmptyLinkTag,
            Severity::Warning,
            Location::element(ctx.node, &ctx.role, dc.page_number_of(ctx.node), &ctx.path),
            "link tag has no marked content, only the annotation reference",
        );

        if let Some(fix) = find_overlapping_sibling(ctx.node, page_no, annot, dc) {
            issue = issue.with_fix(fix);
        }
        self.issues.push(issue);
        true
    }

    fn take_issues(&mut self) -> IssueList {
        std::mem::take(&mut self.issues)
    }
}

/// A sibling MCR whose bounding box overlaps the link annotation's rect
fn find_overlapping_sibling(
    link: ObjId,
    page_no: u32,
    annot: ObjId,
    dc: &DocContext,
) -> Option<Fix> {
    let tree = dc.doc().struct_tree()?;
    let rect = dc.doc().page(page_no)?.annotation(annot)?.rect;
    let parent = parent_of(tree, link)?;

    let mcr = tree.kids(parent).iter().find(|&&k| match tree.get(k) {
        Some(StructNode::Mcr { page, mcid }) => dc
            .mcid_bounds(*page, *mcid)
            .is_some_and(|b| b.overlaps(&rect)),
        _ => false,
    })?;

    Some(Fix::MoveMcrIntoLink {
        link,
        parent,
        mcr: *mcr,
    })
}

/// A paragraph whose children are all links is a navigation list in
/// disguise.
#[derive(Default)]
pub struct ParagraphOfLinks {
    issues: IssueList,
}

impl ParagraphOfLinks {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StructTreeCheck for ParagraphOfLinks {
    fn name(&self) -> &'static str {
        PARAGRAPH_OF_LINKS
    }

    fn enter_element(&mut self, ctx: &StructTreeContext<'_>, dc: &DocContext) -> bool {
        if ctx.role != "P" {
            return true;
        }
        let Some(tree) = dc.doc().struct_tree() else {
            return true;
        };

        let all_links = ctx.struct_children.len() >= 2
            && ctx.struct_children.iter().all(|(_, role)| role == "Link")
            // No loose marked content besides the links
            && tree.kids(ctx.node).len() == ctx.struct_children.len();

        if all_links {
            let links: Vec<ObjId> = ctx.struct_children.iter().map(|(id, _)| *id).collect();
            self.issues.push(
                Issue::new(
                    IssueType::ParagraphOfLinks,
                    Severity::Warning,
                    Location::element(ctx.node, &ctx.role, dc.page_number_of(ctx.node), &ctx.path),
                    format!("paragraph holds only {} links", links.len()),
                )
                .with_fix(Fix::ListifyParagraphOfLinks {
                    paragraph: ctx.node,
                    links,
                }),
            );
        }
        true
    }

    fn take_issues(&mut self) -> IssueList {
        std::mem::take(&mut self.issues)
    }
}
