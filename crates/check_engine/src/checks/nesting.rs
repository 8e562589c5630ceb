//! Needless wrapper nesting

use crate::{
    DocContext, Fix, Issue, IssueList, IssueType, Location, Severity, StructTreeCheck,
    StructTreeContext,
};
use doc_container::{mapped_role, parent_of, struct_kids, ObjId};
use std::collections::HashSet;

pub const NAME: &str = "needless-nesting";

const WRAPPER_ROLES: [&str; 4] = ["Part", "Sect", "Art", "Div"];

fn is_wrapper(role: &str) -> bool {
    WRAPPER_ROLES.contains(&role)
}

/// Detects chains of grouping wrappers where each wrapper's only child is
/// another wrapper, and proposes collapsing the chain. Runs before
/// page-part organization so collapsed wrappers do not get sorted into
/// Parts first.
#[derive(Default)]
pub struct NeedlessNesting {
    issues: IssueList,
    consumed: HashSet<ObjId>,
}

impl NeedlessNesting {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StructTreeCheck for NeedlessNesting {
    fn name(&self) -> &'static str {
        NAME
    }

    fn enter_element(&mut self, ctx: &StructTreeContext<'_>, dc: &DocContext) -> bool {
        if !is_wrapper(&ctx.role) || self.consumed.contains(&ctx.node) {
            return true;
        }
        let Some(tree) = dc.doc().struct_tree() else {
            return true;
        };

        // Only start maximal chains: when the parent is itself a wrapper
        // with this node as its only structural child, this node belongs
        // to the parent's chain
        if let Some(parent) = parent_of(tree, ctx.node) {
            let parent_is_link = mapped_role(tree, parent)
                .map(is_wrapper)
                .unwrap_or(false)
                && struct_kids(tree, parent).len() == 1;
            if parent_is_link {
                return true;
            }
        }

        let mut chain = vec![ctx.node];
        let mut current = ctx.node;
        loop {
            // MCR/OBJR leaves do not count against single-child-ness
            let kids = struct_kids(tree, current);
            if kids.len() != 1 {
                break;
            }
            let kid = kids[0];
            match mapped_role(tree, kid) {
                Some(role) if is_wrapper(role) => {
                    chain.push(kid);
                    current = kid;
                }
                _ => break,
            }
        }

        if chain.len() >= 2 {
            self.consumed.extend(chain.iter().copied());
            let chain_roles: Vec<String> = chain
                .iter()
                .filter_map(|&n| mapped_role(tree, n).map(String::from))
                .collect();
            self.issues.push(
                Issue::new(
                    IssueType::NeedlessNesting,
                    Severity::Warning,
                    Location::element(
                        ctx.node,
                        &ctx.role,
                        dc.page_number_of(ctx.node),
                        &ctx.path,
                    ),
                    format!("needlessly nested wrappers: {}", chain_roles.join(" > ")),
                )
                .with_fix(Fix::FlattenNesting { chain }),
            );
        }
        true
    }

    fn take_issues(&mut self) -> IssueList {
        std::mem::take(&mut self.issues)
    }
}
