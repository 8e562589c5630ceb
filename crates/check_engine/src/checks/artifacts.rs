//! Decorative content mistagged as structure

use crate::{
    DocContext, Fix, Issue, IssueList, IssueType, Location, Severity, StructTreeCheck,
    StructTreeContext,
};
use doc_container::{content, mcrs_in_subtree, ObjId};
use std::collections::{BTreeSet, HashMap};

pub const NAME: &str = "mistagged-artifact";

/// Fraction of the page height treated as the header/footer band
const BAND_FRACTION: f64 = 0.08;

/// Minimum number of pages the same banded text must repeat on
const MIN_REPEAT_PAGES: usize = 2;

struct Candidate {
    node: ObjId,
    role: String,
    path: String,
    page: u32,
    text: String,
}

/// Flags elements whose marked content lives entirely in the page's
/// header/footer bands and repeats across pages - running heads, folios,
/// and the like. Such elements carry no semantics and should be artifacts.
#[derive(Default)]
pub struct MistaggedArtifact {
    issues: IssueList,
    candidates: Vec<Candidate>,
}

impl MistaggedArtifact {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StructTreeCheck for MistaggedArtifact {
    fn name(&self) -> &'static str {
        NAME
    }

    fn enter_element(&mut self, ctx: &StructTreeContext<'_>, dc: &DocContext) -> bool {
        // Organizational containers are never artifact candidates
        if matches!(ctx.role.as_str(), "Document" | "Part") {
            return true;
        }
        let Some(tree) = dc.doc().struct_tree() else {
            return true;
        };
        let mcrs = mcrs_in_subtree(tree, ctx.node);
        if mcrs.is_empty() {
            return true;
        }

        for &(page_no, mcid) in &mcrs {
            let Some(page) = dc.doc().page(page_no) else {
                return true;
            };
            let Some(bounds) = dc.mcid_bounds(page_no, mcid) else {
                return true;
            };
            let height = page.media_box.height();
            let in_header = bounds.lly >= page.media_box.lly + height * (1.0 - BAND_FRACTION);
            let in_footer = bounds.ury <= page.media_box.lly + height * BAND_FRACTION;
            if !in_header && !in_footer {
                return true;
            }
        }

        let mut text = String::new();
        for &(page_no, mcid) in &mcrs {
            if let Some(page) = dc.doc().page(page_no) {
                text.push_str(&content::extract_text(
                    &page.content,
                    mcid,
                    &dc.doc().fonts,
                    &page.properties,
                ));
            }
        }
        let normalized = normalize(&text);
        if normalized.is_empty() {
            return true;
        }

        self.candidates.push(Candidate {
            node: ctx.node,
            role: ctx.role.clone(),
            path: ctx.path.clone(),
            page: dc.page_number_of(ctx.node),
            text: normalized,
        });
        true
    }

    fn after_traversal(&mut self, dc: &DocContext) {
        let page_count = dc.doc().page_count() as usize;
        let mut pages_by_text: HashMap<&str, BTreeSet<u32>> = HashMap::new();
        for c in &self.candidates {
            pages_by_text.entry(&c.text).or_default().insert(c.page);
        }

        for c in &self.candidates {
            let pages = &pages_by_text[c.text.as_str()];
            let repeats = pages.len() >= MIN_REPEAT_PAGES && pages.len() * 2 >= page_count;
            if repeats {
                self.issues.push(
                    Issue::new(
                        IssueType::MistaggedArtifact,
                        Severity::Warning,
                        Location::element(c.node, &c.role, c.page, &c.path),
                        format!(
                            "decorative content {:?} repeats in the page margin band on {} page(s)",
                            c.text,
                            pages.len()
                        ),
                    )
                    .with_fix(Fix::ConvertToArtifact { element: c.node }),
                );
            }
        }
    }

    fn take_issues(&mut self) -> IssueList {
        std::mem::take(&mut self.issues)
    }
}

/// Fold page numbers together so "Page 1" and "Page 2" repeat-match
fn normalize(text: &str) -> String {
    let folded: String = text
        .trim()
        .chars()
        .map(|c| if c.is_ascii_digit() { '#' } else { c })
        .collect();
    folded.to_lowercase()
}
