//! The fix model
//!
//! Fixes are a closed set of variants with dispatch in one place; adding a
//! new fix means adding a variant and its match arms. Every fix revalidates
//! its target before acting: a tree already in the target shape is a no-op,
//! a vanished target is skipped and the issue stays open.

use crate::{fixes, DocContext, FixError};
use doc_container::{is_descendant_of, mapped_role, ObjId};

/// What applying a fix did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixOutcome {
    /// The tree/document was mutated
    Applied,
    /// The target was already in the fix's target shape
    AlreadyApplied,
    /// The target vanished or became ambiguous; nothing was done and the
    /// issue is left open
    Skipped,
}

/// A candidate structural or document mutation attached to an issue
#[derive(Debug, Clone, PartialEq)]
pub enum Fix {
    // Document setup
    WrapInDocument,
    SetDocumentLanguage { lang: String },
    SetTaggedMarker,
    SetTabOrder { pages: Vec<u32> },
    SetUaIdentifier { part: u32 },
    // Artifacting
    ConvertToArtifact { element: ObjId },
    // Nesting
    FlattenNesting { chain: Vec<ObjId> },
    // Page organization
    SetupPageParts,
    // Structural single-child
    WrapInLi { parent: ObjId, child: ObjId },
    WrapInLBody { parent: ObjId, child: ObjId },
    TreatLblFigureAsBullet { lbl: ObjId, figure: ObjId },
    ExtractLBodyToList { paragraph: ObjId, lbody: ObjId },
    ChangePToLbl { li: ObjId, p: ObjId },
    // Structural multi-child
    WrapPairsOfLblPInLi { parent: ObjId, children: Vec<ObjId> },
    WrapPairsOfLblLBodyInLi { parent: ObjId, children: Vec<ObjId> },
    ListifyParagraphOfLinks { paragraph: ObjId, links: Vec<ObjId> },
    WrapParagraphRunInList { parent: ObjId, run: Vec<ObjId> },
    WrapBulletAlignedKidsInLBody { parent: ObjId, kids: Vec<ObjId> },
    // Link tagging
    MoveMcrIntoLink { link: ObjId, parent: ObjId, mcr: ObjId },
    CreateLinkTag { page: u32, annot: ObjId },
    // Cosmetic
    RemapLigatures { font: String, mappings: Vec<(u16, String)> },
    ChangeRole { element: ObjId, to: String },
}

impl Fix {
    /// Application order: lower runs first, ties break by insertion order
    pub fn priority(&self) -> u32 {
        match self {
            Fix::WrapInDocument
            | Fix::SetDocumentLanguage { .. }
            | Fix::SetTaggedMarker
            | Fix::SetTabOrder { .. }
            | Fix::SetUaIdentifier { .. } => 10,
            Fix::ConvertToArtifact { .. } => 12,
            Fix::FlattenNesting { .. } => 15,
            Fix::SetupPageParts => 18,
            Fix::WrapInLi { .. }
            | Fix::WrapInLBody { .. }
            | Fix::TreatLblFigureAsBullet { .. }
            | Fix::ExtractLBodyToList { .. }
            | Fix::ChangePToLbl { .. }
            | Fix::WrapPairsOfLblPInLi { .. }
            | Fix::WrapPairsOfLblLBodyInLi { .. }
            | Fix::ListifyParagraphOfLinks { .. }
            | Fix::WrapParagraphRunInList { .. }
            | Fix::WrapBulletAlignedKidsInLBody { .. } => 20,
            Fix::MoveMcrIntoLink { .. } | Fix::CreateLinkTag { .. } => 22,
            Fix::RemapLigatures { .. } => 22,
            Fix::ChangeRole { .. } => 24,
        }
    }

    /// Label used to group fixes in the summary report
    pub fn group_label(&self) -> &'static str {
        match self {
            Fix::WrapInDocument
            | Fix::SetDocumentLanguage { .. }
            | Fix::SetTaggedMarker
            | Fix::SetTabOrder { .. }
            | Fix::SetUaIdentifier { .. } => "document-setup",
            Fix::ConvertToArtifact { .. } => "artifact",
            Fix::FlattenNesting { .. } => "flatten-nesting",
            Fix::SetupPageParts => "page-parts",
            Fix::WrapInLi { .. }
            | Fix::WrapInLBody { .. }
            | Fix::TreatLblFigureAsBullet { .. }
            | Fix::ExtractLBodyToList { .. }
            | Fix::ChangePToLbl { .. }
            | Fix::WrapPairsOfLblPInLi { .. }
            | Fix::WrapPairsOfLblLBodyInLi { .. }
            | Fix::ListifyParagraphOfLinks { .. }
            | Fix::WrapParagraphRunInList { .. }
            | Fix::WrapBulletAlignedKidsInLBody { .. } => "list-structure",
            Fix::MoveMcrIntoLink { .. } | Fix::CreateLinkTag { .. } => "link-tag",
            Fix::RemapLigatures { .. } => "ligatures",
            Fix::ChangeRole { .. } => "change-role",
        }
    }

    /// Apply the mutation. Idempotent with respect to its own pattern.
    pub fn apply(&self, ctx: &mut DocContext) -> Result<FixOutcome, FixError> {
        match self {
            Fix::WrapInDocument => fixes::structure::wrap_in_document(ctx),
            Fix::SetDocumentLanguage { lang } => fixes::document::set_language(ctx, lang),
            Fix::SetTaggedMarker => fixes::document::set_tagged_marker(ctx),
            Fix::SetTabOrder { pages } => fixes::document::set_tab_order(ctx, pages),
            Fix::SetUaIdentifier { part } => fixes::document::set_ua_identifier(ctx, *part),
            Fix::ConvertToArtifact { element } => fixes::artifact::convert_to_artifact(ctx, *element),
            Fix::FlattenNesting { chain } => fixes::structure::flatten_nesting(ctx, chain),
            Fix::SetupPageParts => fixes::structure::setup_page_parts(ctx),
            Fix::WrapInLi { parent, child } => fixes::structure::wrap_in_li(ctx, *parent, *child),
            Fix::WrapInLBody { parent, child } => {
                fixes::structure::wrap_in_lbody(ctx, *parent, *child)
            }
            Fix::TreatLblFigureAsBullet { lbl, figure } => {
                fixes::structure::treat_lbl_figure_as_bullet(ctx, *lbl, *figure)
            }
            Fix::ExtractLBodyToList { paragraph, lbody } => {
                fixes::structure::extract_lbody_to_list(ctx, *paragraph, *lbody)
            }
            Fix::ChangePToLbl { li, p } => fixes::structure::change_p_to_lbl(ctx, *li, *p),
            Fix::WrapPairsOfLblPInLi { parent, children } => {
                fixes::structure::wrap_pairs_in_li(ctx, *parent, children, "P")
            }
            Fix::WrapPairsOfLblLBodyInLi { parent, children } => {
                fixes::structure::wrap_pairs_in_li(ctx, *parent, children, "LBody")
            }
            Fix::ListifyParagraphOfLinks { paragraph, links } => {
                fixes::structure::listify_paragraph_of_links(ctx, *paragraph, links)
            }
            Fix::WrapParagraphRunInList { parent, run } => {
                fixes::structure::wrap_paragraph_run_in_list(ctx, *parent, run)
            }
            Fix::WrapBulletAlignedKidsInLBody { parent, kids } => {
                fixes::structure::wrap_bullet_aligned_kids(ctx, *parent, kids)
            }
            Fix::MoveMcrIntoLink { link, parent, mcr } => {
                fixes::document::move_mcr_into_link(ctx, *link, *parent, *mcr)
            }
            Fix::CreateLinkTag { page, annot } => {
                fixes::document::create_link_tag(ctx, *page, *annot)
            }
            Fix::RemapLigatures { font, mappings } => {
                fixes::document::remap_ligatures(ctx, font, mappings)
            }
            Fix::ChangeRole { element, to } => fixes::structure::change_role(ctx, *element, to),
        }
    }

    /// Context-free description for logs
    pub fn describe(&self) -> String {
        match self {
            Fix::WrapInDocument => "wrap root content in a Document element".to_string(),
            Fix::SetDocumentLanguage { lang } => format!("set document language to {lang}"),
            Fix::SetTaggedMarker => "mark the document as tagged".to_string(),
            Fix::SetTabOrder { pages } => {
                format!("set structure tab order on {} page(s)", pages.len())
            }
            Fix::SetUaIdentifier { part } => format!("declare PDF/UA part {part} conformance"),
            Fix::ConvertToArtifact { element } => format!("convert {element} to artifact"),
            Fix::FlattenNesting { chain } => {
                format!("flatten a nesting chain of {} wrappers", chain.len())
            }
            Fix::SetupPageParts => "organize content into per-page Part elements".to_string(),
            Fix::WrapInLi { child, .. } => format!("wrap {child} in LI"),
            Fix::WrapInLBody { child, .. } => format!("wrap {child} in LBody"),
            Fix::TreatLblFigureAsBullet { figure, .. } => {
                format!("treat label figure {figure} as a text bullet")
            }
            Fix::ExtractLBodyToList { lbody, .. } => {
                format!("extract {lbody} into a new list")
            }
            Fix::ChangePToLbl { p, .. } => format!("change {p} from P to Lbl"),
            Fix::WrapPairsOfLblPInLi { children, .. } => {
                format!("wrap {} Lbl/P pairs in LI", children.len() / 2)
            }
            Fix::WrapPairsOfLblLBodyInLi { children, .. } => {
                format!("wrap {} Lbl/LBody pairs in LI", children.len() / 2)
            }
            Fix::ListifyParagraphOfLinks { links, .. } => {
                format!("convert a paragraph of {} links to a list", links.len())
            }
            Fix::WrapParagraphRunInList { run, .. } => {
                format!("wrap a run of {} paragraphs in a list", run.len())
            }
            Fix::WrapBulletAlignedKidsInLBody { kids, .. } => {
                format!("wrap {} bullet-aligned kid(s) in LBody", kids.len())
            }
            Fix::MoveMcrIntoLink { link, .. } => {
                format!("move overlapping marked content into {link}")
            }
            Fix::CreateLinkTag { page, annot } => {
                format!("create a Link tag for annotation {annot} on page {page}")
            }
            Fix::RemapLigatures { font, mappings } => {
                format!("remap {} ligature code(s) in font {font}", mappings.len())
            }
            Fix::ChangeRole { element, to } => format!("change role of {element} to {to}"),
        }
    }

    /// Description enriched with page numbers and roles from the context
    pub fn describe_with(&self, ctx: &DocContext) -> String {
        let base = self.describe();
        let target = self.primary_target();
        let Some(target) = target else {
            return base;
        };
        let page = ctx.page_number_of(target);
        let role = ctx
            .doc()
            .struct_tree()
            .and_then(|t| mapped_role(t, target).map(String::from));
        match (role, page) {
            (Some(role), 0) => format!("{base} ({role})"),
            (Some(role), page) => format!("{base} ({role}, page {page})"),
            (None, 0) => base,
            (None, page) => format!("{base} (page {page})"),
        }
    }

    /// Pages a successful application touches, for the report's grouping
    pub fn affected_pages(&self, ctx: &DocContext) -> Vec<u32> {
        match self {
            Fix::SetTabOrder { pages } => pages.clone(),
            Fix::CreateLinkTag { page, .. } => vec![*page],
            Fix::ConvertToArtifact { element } => {
                let Some(tree) = ctx.doc().struct_tree() else {
                    return Vec::new();
                };
                let mut pages: Vec<u32> = doc_container::mcrs_in_subtree(tree, *element)
                    .into_iter()
                    .map(|(page, _)| page)
                    .collect();
                pages.sort_unstable();
                pages.dedup();
                pages
            }
            _ => match self.primary_target().map(|t| ctx.page_number_of(t)) {
                Some(page) if page > 0 => vec![page],
                _ => Vec::new(),
            },
        }
    }

    /// The element whose location best describes this fix
    fn primary_target(&self) -> Option<ObjId> {
        match self {
            Fix::ConvertToArtifact { element } | Fix::ChangeRole { element, .. } => Some(*element),
            Fix::FlattenNesting { chain } => chain.first().copied(),
            Fix::WrapInLi { parent, .. }
            | Fix::WrapInLBody { parent, .. }
            | Fix::WrapPairsOfLblPInLi { parent, .. }
            | Fix::WrapPairsOfLblLBodyInLi { parent, .. }
            | Fix::WrapParagraphRunInList { parent, .. }
            | Fix::WrapBulletAlignedKidsInLBody { parent, .. } => Some(*parent),
            Fix::TreatLblFigureAsBullet { lbl, .. } => Some(*lbl),
            Fix::ExtractLBodyToList { paragraph, .. }
            | Fix::ListifyParagraphOfLinks { paragraph, .. } => Some(*paragraph),
            Fix::MoveMcrIntoLink { link, .. } => Some(*link),
            _ => None,
        }
    }

    /// Parent plus targeted children, for multi-child restructurings
    fn multi_children(&self) -> Option<(ObjId, &[ObjId])> {
        match self {
            Fix::WrapPairsOfLblPInLi { parent, children }
            | Fix::WrapPairsOfLblLBodyInLi { parent, children } => Some((*parent, children)),
            Fix::ListifyParagraphOfLinks { paragraph, links } => Some((*paragraph, links)),
            Fix::WrapParagraphRunInList { parent, run } => Some((*parent, run)),
            Fix::WrapBulletAlignedKidsInLBody { parent, kids } => Some((*parent, kids)),
            _ => None,
        }
    }

    /// Parent plus targeted child, for single-child restructurings
    fn single_child(&self) -> Option<(ObjId, ObjId)> {
        match self {
            Fix::WrapInLi { parent, child } | Fix::WrapInLBody { parent, child } => {
                Some((*parent, *child))
            }
            Fix::TreatLblFigureAsBullet { lbl, figure } => Some((*lbl, *figure)),
            Fix::ExtractLBodyToList { paragraph, lbody } => Some((*paragraph, *lbody)),
            Fix::ChangePToLbl { li, p } => Some((*li, *p)),
            _ => None,
        }
    }

    /// Whether this fix, successfully applied, renders `other` redundant.
    /// The engine then resolves the other issue with a "skipped" note
    /// instead of applying or failing it.
    pub fn invalidates(&self, other: &Fix, ctx: &DocContext) -> bool {
        // Artifacting a subtree covers artifacting (or restructuring) any
        // node inside it
        if let Fix::ConvertToArtifact { element } = self {
            if let Some(tree) = ctx.doc().struct_tree() {
                let mut targets: Vec<ObjId> = Vec::new();
                if let Fix::ConvertToArtifact { element: other_el } = other {
                    targets.push(*other_el);
                }
                if let Some((parent, children)) = other.multi_children() {
                    targets.push(parent);
                    targets.extend(children);
                }
                if let Some((parent, child)) = other.single_child() {
                    targets.push(parent);
                    targets.push(child);
                }
                return targets
                    .iter()
                    .any(|&t| t == *element || is_descendant_of(tree, t, *element));
            }
            return false;
        }

        // A multi-child restructuring covers per-child fixes on the same
        // parent that target any of the same children, and any overlapping
        // multi-child restructuring
        if let Some((parent, children)) = self.multi_children() {
            if let Some((other_parent, other_child)) = other.single_child() {
                return parent == other_parent && children.contains(&other_child);
            }
            if let Some((other_parent, other_children)) = other.multi_children() {
                return parent == other_parent
                    && other_children.iter().any(|c| children.contains(c));
            }
            return false;
        }

        // Overlapping nesting chains collapse together
        if let (Fix::FlattenNesting { chain }, Fix::FlattenNesting { chain: other_chain }) =
            (self, other)
        {
            return chain.iter().any(|n| other_chain.contains(n));
        }

        false
    }

    /// Candidate fix for one disallowed child, keyed on the
    /// (parent role, child role) pair
    pub fn try_single_child(
        parent: ObjId,
        parent_role: &str,
        child: ObjId,
        child_role: &str,
        sibling_roles: &[(ObjId, String)],
    ) -> Option<Fix> {
        match (parent_role, child_role) {
            ("L", "Div" | "P" | "Figure" | "Span" | "LBody") => {
                Some(Fix::WrapInLi { parent, child })
            }
            ("LI", "P") => {
                let roles: Vec<&str> = sibling_roles.iter().map(|(_, r)| r.as_str()).collect();
                if roles == ["P", "LBody"] || roles == ["LBody", "P"] {
                    Some(Fix::ChangePToLbl { li: parent, p: child })
                } else if !roles.contains(&"LBody") {
                    Some(Fix::WrapInLBody { parent, child })
                } else {
                    None
                }
            }
            ("LI", "Div" | "Figure" | "Span") => {
                let has_lbody = sibling_roles.iter().any(|(_, r)| r == "LBody");
                (!has_lbody).then_some(Fix::WrapInLBody { parent, child })
            }
            ("Lbl", "Figure") => Some(Fix::TreatLblFigureAsBullet {
                lbl: parent,
                figure: child,
            }),
            ("P", "LBody") => Some(Fix::ExtractLBodyToList {
                paragraph: parent,
                lbody: child,
            }),
            _ => None,
        }
    }

    /// Candidate parent-scoped fix covering several children at once
    pub fn try_multi_child(
        parent: ObjId,
        parent_role: &str,
        children: &[(ObjId, String)],
    ) -> Option<Fix> {
        let roles: Vec<&str> = children.iter().map(|(_, r)| r.as_str()).collect();
        let ids: Vec<ObjId> = children.iter().map(|(id, _)| *id).collect();
        match parent_role {
            "L" => {
                if alternates(&roles, "Lbl", "P") {
                    Some(Fix::WrapPairsOfLblPInLi {
                        parent,
                        children: ids,
                    })
                } else if alternates(&roles, "Lbl", "LBody") {
                    Some(Fix::WrapPairsOfLblLBodyInLi {
                        parent,
                        children: ids,
                    })
                } else if !roles.is_empty() && roles.iter().all(|r| *r == "P") {
                    Some(Fix::WrapParagraphRunInList { parent, run: ids })
                } else {
                    None
                }
            }
            "P" => {
                if roles.len() >= 2 && roles.iter().all(|r| *r == "Link") {
                    Some(Fix::ListifyParagraphOfLinks {
                        paragraph: parent,
                        links: ids,
                    })
                } else {
                    None
                }
            }
            _ => None,
        }
    }
}

/// Non-empty even-length alternation `a b a b ...`
fn alternates(roles: &[&str], a: &str, b: &str) -> bool {
    !roles.is_empty()
        && roles.len() % 2 == 0
        && roles
            .iter()
            .enumerate()
            .all(|(i, r)| if i % 2 == 0 { *r == a } else { *r == b })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priorities_ascend_by_phase() {
        assert!(Fix::WrapInDocument.priority() < Fix::ConvertToArtifact { element: ObjId(1) }.priority());
        assert!(
            Fix::ConvertToArtifact { element: ObjId(1) }.priority()
                < Fix::FlattenNesting { chain: vec![] }.priority()
        );
        assert!(Fix::FlattenNesting { chain: vec![] }.priority() < Fix::SetupPageParts.priority());
        assert!(
            Fix::SetupPageParts.priority()
                < Fix::WrapInLi {
                    parent: ObjId(1),
                    child: ObjId(2)
                }
                .priority()
        );
        assert!(
            Fix::WrapInLi {
                parent: ObjId(1),
                child: ObjId(2)
            }
            .priority()
                < Fix::CreateLinkTag {
                    page: 1,
                    annot: ObjId(3)
                }
                .priority()
        );
    }

    #[test]
    fn test_try_single_child_pairs() {
        let sib = vec![(ObjId(9), "P".to_string())];
        assert!(matches!(
            Fix::try_single_child(ObjId(1), "L", ObjId(2), "P", &sib),
            Some(Fix::WrapInLi { .. })
        ));
        assert!(matches!(
            Fix::try_single_child(ObjId(1), "LI", ObjId(2), "P", &sib),
            Some(Fix::WrapInLBody { .. })
        ));
        assert!(matches!(
            Fix::try_single_child(ObjId(1), "Lbl", ObjId(2), "Figure", &[]),
            Some(Fix::TreatLblFigureAsBullet { .. })
        ));
        assert!(matches!(
            Fix::try_single_child(ObjId(1), "P", ObjId(2), "LBody", &[]),
            Some(Fix::ExtractLBodyToList { .. })
        ));
        assert!(Fix::try_single_child(ObjId(1), "Table", ObjId(2), "P", &[]).is_none());
    }

    #[test]
    fn test_change_p_to_lbl_needs_exact_sibling_shape() {
        let sib = vec![(ObjId(2), "P".to_string()), (ObjId(3), "LBody".to_string())];
        assert!(matches!(
            Fix::try_single_child(ObjId(1), "LI", ObjId(2), "P", &sib),
            Some(Fix::ChangePToLbl { .. })
        ));
    }

    #[test]
    fn test_try_multi_child_alternation() {
        let kids = vec![
            (ObjId(2), "Lbl".to_string()),
            (ObjId(3), "LBody".to_string()),
            (ObjId(4), "Lbl".to_string()),
            (ObjId(5), "LBody".to_string()),
        ];
        assert!(matches!(
            Fix::try_multi_child(ObjId(1), "L", &kids),
            Some(Fix::WrapPairsOfLblLBodyInLi { .. })
        ));

        let broken = &kids[..3];
        assert!(Fix::try_multi_child(ObjId(1), "L", broken).is_none());

        let all_p: Vec<(ObjId, String)> = (2..5).map(|i| (ObjId(i), "P".to_string())).collect();
        assert!(matches!(
            Fix::try_multi_child(ObjId(1), "L", &all_p),
            Some(Fix::WrapParagraphRunInList { .. })
        ));
    }
}
