//! Per-page Part organization

use crate::{
    DocContext, Fix, Issue, IssueList, IssueType, Location, Severity, StructTreeCheck,
};
use doc_container::{mapped_role, struct_kids};

pub const NAME: &str = "page-parts";

/// Detects that the document's immediate children do not map one-to-one to
/// physical pages via `Part[page=k]` wrappers.
#[derive(Default)]
pub struct MissingPageParts {
    issues: IssueList,
}

impl MissingPageParts {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StructTreeCheck for MissingPageParts {
    fn name(&self) -> &'static str {
        NAME
    }

    fn prerequisites(&self) -> &'static [&'static str] {
        &[super::nesting::NAME]
    }

    fn after_traversal(&mut self, dc: &DocContext) {
        let doc = dc.doc();
        let page_count = doc.page_count();
        if page_count == 0 {
            return;
        }
        let Some(tree) = doc.struct_tree() else {
            return;
        };

        let document = struct_kids(tree, tree.root())
            .into_iter()
            .find(|&k| mapped_role(tree, k) == Some("Document"));

        let organized = document.is_some_and(|document| {
            let kids = tree.kids(document);
            let parts = struct_kids(tree, document);
            kids.len() == parts.len()
                && parts.len() == page_count as usize
                && parts.iter().enumerate().all(|(i, &part)| {
                    mapped_role(tree, part) == Some("Part")
                        && tree
                            .element(part)
                            .map(|e| e.page == Some(i as u32 + 1))
                            .unwrap_or(false)
                })
        });

        if !organized {
            self.issues.push(
                Issue::new(
                    IssueType::MissingPageParts,
                    Severity::Warning,
                    Location::document(),
                    format!(
                        "document content is not organized into one Part per page \
                         ({page_count} page(s))"
                    ),
                )
                .with_fix(Fix::SetupPageParts),
            );
        }
    }

    fn take_issues(&mut self) -> IssueList {
        std::mem::take(&mut self.issues)
    }
}
