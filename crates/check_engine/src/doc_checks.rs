//! Whole-document checks
//!
//! These run after the tree walk and inspect document metadata, pages,
//! annotations, and fonts rather than individual structure elements.

use crate::{DocContext, Fix, Issue, IssueList, IssueType, Location, Severity};
use doc_container::{mapped_role, struct_kids, ObjId, StructNode, TabOrder};
use once_cell::sync::Lazy;

/// A check over the document as a whole
pub trait DocumentCheck {
    fn name(&self) -> &'static str;
    fn check(&self, dc: &DocContext) -> IssueList;
}

/// Ligature presentation forms and their canonical expansions
pub static LIGATURE_EXPANSIONS: Lazy<Vec<(char, &'static str)>> = Lazy::new(|| {
    vec![
        ('\u{FB00}', "ff"),
        ('\u{FB01}', "fi"),
        ('\u{FB02}', "fl"),
        ('\u{FB03}', "ffi"),
        ('\u{FB04}', "ffl"),
        ('\u{FB05}', "ft"),
        ('\u{FB06}', "st"),
    ]
});

/// The document must carry a structure tree at all; without one the whole
/// tag phase is moot.
pub struct StructTreePresence;

impl DocumentCheck for StructTreePresence {
    fn name(&self) -> &'static str {
        "struct-tree"
    }

    fn check(&self, dc: &DocContext) -> IssueList {
        let mut issues = IssueList::new();
        if !dc.doc().has_struct_tree() {
            issues.push(Issue::new(
                IssueType::NoStructTree,
                Severity::Error,
                Location::document(),
                "document has no structure tree",
            ));
        }
        issues
    }
}

/// All content should hang off a single `Document` element
pub struct DocumentRoot;

impl DocumentCheck for DocumentRoot {
    fn name(&self) -> &'static str {
        "document-root"
    }

    fn check(&self, dc: &DocContext) -> IssueList {
        let mut issues = IssueList::new();
        let Some(tree) = dc.doc().struct_tree() else {
            return issues;
        };
        let kids = tree.kids(tree.root());
        let wrapped = kids.len() == 1 && mapped_role(tree, kids[0]) == Some("Document");
        if !wrapped {
            issues.push(
                Issue::new(
                    IssueType::MissingDocumentRoot,
                    Severity::Warning,
                    Location::document(),
                    format!(
                        "structure root holds {} node(s) instead of a single Document element",
                        kids.len()
                    ),
                )
                .with_fix(Fix::WrapInDocument),
            );
        }
        issues
    }
}

/// A missing natural language leaves screen readers guessing
pub struct Language;

impl DocumentCheck for Language {
    fn name(&self) -> &'static str {
        "language"
    }

    fn check(&self, dc: &DocContext) -> IssueList {
        let mut issues = IssueList::new();
        let doc = dc.doc();
        let doc_lang = doc.info.language.as_deref().is_some_and(|l| !l.is_empty());
        let root_lang = doc.struct_tree().is_some_and(|tree| {
            struct_kids(tree, tree.root()).iter().any(|&k| {
                tree.element(k)
                    .ok()
                    .and_then(|e| e.lang.as_deref())
                    .is_some_and(|l| !l.is_empty())
            })
        });
        if !doc_lang && !root_lang {
            issues.push(
                Issue::new(
                    IssueType::MissingLanguage,
                    Severity::Error,
                    Location::document(),
                    "document declares no natural language",
                )
                .with_fix(Fix::SetDocumentLanguage {
                    lang: "en-US".to_string(),
                }),
            );
        }
        issues
    }
}

/// The container-level marker telling consumers the tagging is real
pub struct TaggedMarker;

impl DocumentCheck for TaggedMarker {
    fn name(&self) -> &'static str {
        "tagged-marker"
    }

    fn check(&self, dc: &DocContext) -> IssueList {
        let mut issues = IssueList::new();
        if dc.doc().has_struct_tree() && !dc.doc().info.marked_tagged {
            issues.push(
                Issue::new(
                    IssueType::NotMarkedTagged,
                    Severity::Warning,
                    Location::document(),
                    "document is not marked as tagged",
                )
                .with_fix(Fix::SetTaggedMarker),
            );
        }
        issues
    }
}

/// Pages with annotations should traverse them in structure order
pub struct TabOrderCheck;

impl DocumentCheck for TabOrderCheck {
    fn name(&self) -> &'static str {
        "tab-order"
    }

    fn check(&self, dc: &DocContext) -> IssueList {
        let mut issues = IssueList::new();
        let pages: Vec<u32> = dc
            .doc()
            .pages()
            .iter()
            .filter(|p| !p.annotations.is_empty() && p.tab_order != TabOrder::Structure)
            .map(|p| p.number)
            .collect();
        if let Some(&first) = pages.first() {
            issues.push(
                Issue::new(
                    IssueType::BadTabOrder,
                    Severity::Warning,
                    Location::page(first),
                    format!("{} page(s) do not use structure tab order", pages.len()),
                )
                .with_fix(Fix::SetTabOrder { pages }),
            );
        }
        issues
    }
}

/// Conformance claims are how assistive technology discovers support
pub struct UaConformance;

impl DocumentCheck for UaConformance {
    fn name(&self) -> &'static str {
        "ua-conformance"
    }

    fn check(&self, dc: &DocContext) -> IssueList {
        let mut issues = IssueList::new();
        if dc.doc().info.ua_part.is_none() {
            issues.push(
                Issue::new(
                    IssueType::MissingUaIdentifier,
                    Severity::Warning,
                    Location::document(),
                    "document declares no PDF/UA conformance",
                )
                .with_fix(Fix::SetUaIdentifier { part: 1 }),
            );
        }
        issues
    }
}

/// Link annotations nothing in the structure tree points at
pub struct UnmarkedLinks;

impl DocumentCheck for UnmarkedLinks {
    fn name(&self) -> &'static str {
        "unmarked-links"
    }

    fn check(&self, dc: &DocContext) -> IssueList {
        let mut issues = IssueList::new();
        let Some(tree) = dc.doc().struct_tree() else {
            return issues;
        };
        let referenced: Vec<ObjId> = tree
            .node_ids()
            .filter_map(|id| match tree.get(id) {
                Some(StructNode::Objr { annot, .. }) => Some(*annot),
                _ => None,
            })
            .collect();

        for (page_no, annot) in dc.doc().link_annotations() {
            if !referenced.contains(&annot.id) {
                issues.push(
                    Issue::new(
                        IssueType::UnmarkedLink,
                        Severity::Warning,
                        Location::page(page_no),
                        format!("link annotation {} is not tagged", annot.id),
                    )
                    .with_fix(Fix::CreateLinkTag {
                        page: page_no,
                        annot: annot.id,
                    }),
                );
            }
        }
        issues
    }
}

/// Form widgets in a document that is not supposed to carry forms
pub struct UnexpectedWidgets;

impl DocumentCheck for UnexpectedWidgets {
    fn name(&self) -> &'static str {
        "unexpected-widgets"
    }

    fn check(&self, dc: &DocContext) -> IssueList {
        let mut issues = IssueList::new();
        for page in dc.doc().pages() {
            for annot in page.annotations.iter().filter(|a| a.is_widget()) {
                issues.push(Issue::new(
                    IssueType::UnexpectedWidget,
                    Severity::Warning,
                    Location::page(page.number),
                    format!("unexpected form widget {} on page {}", annot.id, page.number),
                ));
            }
        }
        issues
    }
}

/// Fonts whose extraction maps decode ligature glyphs to presentation
/// forms instead of their character sequences
pub struct LigatureMapping;

impl DocumentCheck for LigatureMapping {
    fn name(&self) -> &'static str {
        "ligatures"
    }

    fn check(&self, dc: &DocContext) -> IssueList {
        let mut issues = IssueList::new();
        let mut names: Vec<&String> = dc.doc().fonts.keys().collect();
        names.sort();

        for name in names {
            let font = &dc.doc().fonts[name];
            let mut mappings: Vec<(u16, String)> = Vec::new();
            for (&code, text) in &font.to_unicode {
                let mut chars = text.chars();
                if let (Some(c), None) = (chars.next(), chars.next()) {
                    if let Some((_, expansion)) =
                        LIGATURE_EXPANSIONS.iter().find(|(lig, _)| *lig == c)
                    {
                        mappings.push((code, expansion.to_string()));
                    }
                }
            }
            if !mappings.is_empty() {
                issues.push(
                    Issue::new(
                        IssueType::BadLigatureMap,
                        Severity::Warning,
                        Location::document(),
                        format!(
                            "font {} ({}) maps {} code(s) to ligature presentation forms",
                            name,
                            font.base_name,
                            mappings.len()
                        ),
                    )
                    .with_fix(Fix::RemapLigatures {
                        font: name.clone(),
                        mappings,
                    }),
                );
            }
        }
        issues
    }
}
