//! List-shape checks: decorative bullets and indented paragraph runs

use crate::{
    DocContext, Fix, Issue, IssueList, IssueType, Location, Severity, StructTreeCheck,
    StructTreeContext,
};
use doc_container::{mcrs_in_subtree, ObjId};

pub const MISTAGGED_BULLET: &str = "mistagged-bullet";
pub const LISTLIKE_RUN: &str = "listlike-paragraph-run";

/// Indent relative to the reference sibling that marks a paragraph as
/// list-like, in points
const RUN_INDENT_THRESHOLD: f64 = 10.0;

/// A label whose content is a decorative bullet image
#[derive(Default)]
pub struct MistaggedBulletedList {
    issues: IssueList,
}

impl MistaggedBulletedList {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StructTreeCheck for MistaggedBulletedList {
    fn name(&self) -> &'static str {
        MISTAGGED_BULLET
    }

    fn enter_element(&mut self, ctx: &StructTreeContext<'_>, dc: &DocContext) -> bool {
        if ctx.role != "Lbl" {
            return true;
        }
        if let [(figure, role)] = ctx.struct_children.as_slice() {
            if role == "Figure" {
                self.issues.push(
                    Issue::new(
                        IssueType::MistaggedBullet,
                        Severity::Warning,
                        Location::element(
                            ctx.node,
                            &ctx.role,
                            dc.page_number_of(ctx.node),
                            &ctx.path,
                        ),
                        "list label is a decorative bullet image",
                    )
                    .with_fix(Fix::TreatLblFigureAsBullet {
                        lbl: ctx.node,
                        figure: *figure,
                    }),
                );
            }
        }
        true
    }

    fn take_issues(&mut self) -> IssueList {
        std::mem::take(&mut self.issues)
    }
}

/// Consecutive paragraphs indented well past their surroundings are a
/// visual list that was never tagged as one. The nearest non-run sibling
/// with known geometry acts as the left-margin reference.
#[derive(Default)]
pub struct ListlikeParagraphRun {
    issues: IssueList,
}

impl ListlikeParagraphRun {
    pub fn new() -> Self {
        Self::default()
    }

    fn flush_run(
        &mut self,
        ctx: &StructTreeContext<'_>,
        dc: &DocContext,
        run: &mut Vec<ObjId>,
    ) {
        if run.len() >= 2 {
            self.issues.push(
                Issue::new(
                    IssueType::ListlikeParagraphRun,
                    Severity::Warning,
                    Location::element(ctx.node, &ctx.role, dc.page_number_of(ctx.node), &ctx.path),
                    format!("{} consecutive indented paragraphs read as a list", run.len()),
                )
                .with_fix(Fix::WrapParagraphRunInList {
                    parent: ctx.node,
                    run: std::mem::take(run),
                }),
            );
        } else {
            run.clear();
        }
    }
}

impl StructTreeCheck for ListlikeParagraphRun {
    fn name(&self) -> &'static str {
        LISTLIKE_RUN
    }

    fn leave_element(&mut self, ctx: &StructTreeContext<'_>, dc: &DocContext) {
        // Inside an existing list the indentation is expected
        if ctx.role == "L" || ctx.struct_children.len() < 3 {
            return;
        }

        let mut reference: Option<f64> = None;
        let mut run: Vec<ObjId> = Vec::new();

        for (kid, role) in &ctx.struct_children {
            let left = left_edge(*kid, dc);
            let indented = matches!((role.as_str(), left, reference),
                ("P", Some(left), Some(reference)) if left >= reference + RUN_INDENT_THRESHOLD);

            if indented {
                run.push(*kid);
            } else {
                self.flush_run(ctx, dc, &mut run);
                if let Some(left) = left {
                    reference = Some(left);
                }
            }
        }
        self.flush_run(ctx, dc, &mut run);
    }

    fn take_issues(&mut self) -> IssueList {
        std::mem::take(&mut self.issues)
    }
}

/// Leftmost x of the element's marked content
fn left_edge(node: ObjId, dc: &DocContext) -> Option<f64> {
    let tree = dc.doc().struct_tree()?;
    mcrs_in_subtree(tree, node)
        .into_iter()
        .filter_map(|(page, mcid)| dc.mcid_bounds(page, mcid))
        .map(|r| r.llx)
        .min_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
}
