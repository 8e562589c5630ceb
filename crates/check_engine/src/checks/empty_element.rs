//! Elements with no content at all

use crate::{
    DocContext, Issue, IssueList, IssueType, Location, Severity, StructTreeCheck,
    StructTreeContext,
};

pub const NAME: &str = "empty-element";

/// A structure element with no children of any kind contributes nothing to
/// the reading order. Warning only; whether to delete it is an authoring
/// decision.
#[derive(Default)]
pub struct EmptyElement {
    issues: IssueList,
}

impl EmptyElement {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StructTreeCheck for EmptyElement {
    fn name(&self) -> &'static str {
        NAME
    }

    fn leave_element(&mut self, ctx: &StructTreeContext<'_>, dc: &DocContext) {
        let Some(tree) = dc.doc().struct_tree() else {
            return;
        };
        let Ok(elem) = tree.element(ctx.node) else {
            return;
        };
        let has_replacement_text = elem.actual_text.as_deref().is_some_and(|t| !t.is_empty())
            || elem.alt.as_deref().is_some_and(|t| !t.is_empty());
        if tree.kids(ctx.node).is_empty() && !has_replacement_text {
            self.issues.push(Issue::new(
                IssueType::EmptyElement,
                Severity::Warning,
                Location::element(ctx.node, &ctx.role, dc.page_number_of(ctx.node), &ctx.path),
                format!("{} element has no content", ctx.role),
            ));
        }
    }

    fn take_issues(&mut self) -> IssueList {
        std::mem::take(&mut self.issues)
    }
}
