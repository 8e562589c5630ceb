//! Figure checks: embedded text and missing alternate text

use crate::{
    DocContext, Fix, Issue, IssueList, IssueType, Location, Severity, StructTreeCheck,
    StructTreeContext,
};
use doc_container::{content, mcrs_in_subtree};

pub const FIGURE_WITH_TEXT: &str = "figure-with-text";
pub const MISSING_ALT_TEXT: &str = "missing-alt-text";

/// Minimum number of word characters before a figure counts as textual
const MIN_TEXT_CHARS: usize = 3;

/// A `Figure` whose marked content decodes to real text is usually a
/// mistagged paragraph or heading.
#[derive(Default)]
pub struct FigureWithText {
    issues: IssueList,
}

impl FigureWithText {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StructTreeCheck for FigureWithText {
    fn name(&self) -> &'static str {
        FIGURE_WITH_TEXT
    }

    fn enter_element(&mut self, ctx: &StructTreeContext<'_>, dc: &DocContext) -> bool {
        if ctx.role != "Figure" {
            return true;
        }
        let Some(tree) = dc.doc().struct_tree() else {
            return true;
        };
        let mut text = String::new();
        for (page_no, mcid) in mcrs_in_subtree(tree, ctx.node) {
            if let Some(page) = dc.doc().page(page_no) {
                text.push_str(&content::extract_text(
                    &page.content,
                    mcid,
                    &dc.doc().fonts,
                    &page.properties,
                ));
            }
        }
        let word_chars = text.chars().filter(|c| c.is_alphanumeric()).count();
        if word_chars >= MIN_TEXT_CHARS {
            self.issues.push(
                Issue::new(
                    IssueType::FigureWithText,
                    Severity::Warning,
                    Location::element(ctx.node, &ctx.role, dc.page_number_of(ctx.node), &ctx.path),
                    format!("figure contains extractable text {:?}", text.trim()),
                )
                .with_fix(Fix::ChangeRole {
                    element: ctx.node,
                    to: "P".to_string(),
                }),
            );
        }
        true
    }

    fn take_issues(&mut self) -> IssueList {
        std::mem::take(&mut self.issues)
    }
}

/// A `Figure` with neither alternate nor actual text is silent for
/// assistive technology. Informational; alternate text cannot be invented.
#[derive(Default)]
pub struct MissingAltText {
    issues: IssueList,
}

impl MissingAltText {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StructTreeCheck for MissingAltText {
    fn name(&self) -> &'static str {
        MISSING_ALT_TEXT
    }

    fn enter_element(&mut self, ctx: &StructTreeContext<'_>, dc: &DocContext) -> bool {
        if ctx.role != "Figure" {
            return true;
        }
        let Some(tree) = dc.doc().struct_tree() else {
            return true;
        };
        let Ok(elem) = tree.element(ctx.node) else {
            return true;
        };
        let has_alt = elem.alt.as_deref().is_some_and(|a| !a.is_empty());
        let has_actual = elem.actual_text.as_deref().is_some_and(|a| !a.is_empty());
        if !has_alt && !has_actual {
            self.issues.push(Issue::new(
                IssueType::MissingAltText,
                Severity::Info,
                Location::element(ctx.node, &ctx.role, dc.page_number_of(ctx.node), &ctx.path),
                "figure has no alternate or actual text",
            ));
        }
        true
    }

    fn take_issues(&mut self) -> IssueList {
        std::mem::take(&mut self.issues)
    }
}
