//! Schema validation of every element against its role's rule

use crate::{
    DocContext, Fix, Issue, IssueList, IssueType, Location, Severity, StructTreeCheck,
    StructTreeContext,
};
use doc_container::{ObjId, StructNode};

/// Vertical slack when matching raw kid geometry against the bullet line
const BULLET_LINE_TOLERANCE: f64 = 2.0;

pub const NAME: &str = "schema-validation";

/// Validates roles, parents, cardinality, allowed children, and the child
/// sequence pattern. Disallowed children get a parent-scoped multi-child
/// fix when one applies, otherwise a per-child fix.
#[derive(Default)]
pub struct SchemaValidation {
    issues: IssueList,
}

impl SchemaValidation {
    pub fn new() -> Self {
        Self::default()
    }

    fn location(&self, ctx: &StructTreeContext<'_>, dc: &DocContext) -> Location {
        Location::element(ctx.node, &ctx.role, dc.page_number_of(ctx.node), &ctx.path)
    }
}

impl StructTreeCheck for SchemaValidation {
    fn name(&self) -> &'static str {
        NAME
    }

    fn enter_element(&mut self, ctx: &StructTreeContext<'_>, dc: &DocContext) -> bool {
        let Some(rule) = ctx.rule else {
            self.issues.push(Issue::new(
                IssueType::UnknownRole,
                Severity::Warning,
                self.location(ctx, dc),
                format!("role {} is not defined in the schema", ctx.role),
            ));
            return true;
        };

        if !rule.allows_parent(&ctx.parent_role) {
            self.issues.push(Issue::new(
                IssueType::WrongParent,
                Severity::Error,
                self.location(ctx, dc),
                format!("{} may not appear under {}", ctx.role, ctx.parent_role),
            ));
        }

        let count = ctx.struct_children.len();
        if let Some(min) = rule.min_children {
            if count < min {
                self.issues.push(Issue::new(
                    IssueType::WrongChildCount,
                    Severity::Error,
                    self.location(ctx, dc),
                    format!("{} has {count} children, expects at least {min}", ctx.role),
                ));
            }
        }
        if let Some(max) = rule.max_children {
            if count > max {
                self.issues.push(Issue::new(
                    IssueType::WrongChildCount,
                    Severity::Error,
                    self.location(ctx, dc),
                    format!("{} has {count} children, expects at most {max}", ctx.role),
                ));
            }
        }

        let child_roles = ctx.child_roles();
        let missing = rule.missing_required(&child_roles);
        let required_missing = !missing.is_empty();
        for role in &missing {
            let mut issue = Issue::new(
                IssueType::WrongChildCount,
                Severity::Warning,
                self.location(ctx, dc),
                format!("{} is missing required child {role}", ctx.role),
            );
            if ctx.role == "LI" && *role == "LBody" {
                if let Some(fix) = try_bullet_aligned_fix(ctx, dc) {
                    issue = issue.with_fix(fix);
                }
            }
            self.issues.push(issue);
        }

        // Disallowed children: one parent-scoped multi-child fix when the
        // shape admits one, attached to the first finding; per-child fixes
        // otherwise.
        let mut multi_created = false;
        for (kid, kid_role) in &ctx.struct_children {
            if rule.allows_child(kid_role) {
                continue;
            }
            let mut issue = Issue::new(
                IssueType::WrongChild,
                Severity::Error,
                self.location(ctx, dc),
                format!("{kid_role} is not an allowed child of {}", ctx.role),
            );
            if !multi_created {
                if let Some(fix) = Fix::try_multi_child(ctx.node, &ctx.role, &ctx.struct_children)
                {
                    issue = issue.with_fix(fix);
                    multi_created = true;
                }
            }
            if !multi_created {
                if let Some(fix) =
                    Fix::try_single_child(ctx.node, &ctx.role, *kid, kid_role, &ctx.struct_children)
                {
                    issue = issue.with_fix(fix);
                }
            }
            self.issues.push(issue);
        }

        // The pattern restates required children; only report it when the
        // required-child finding has not already covered the mismatch
        if !required_missing {
            if let Some(pattern) = ctx.pattern {
                if !pattern.full_match(&child_roles) {
                    self.issues.push(Issue::new(
                        IssueType::WrongChildPattern,
                        Severity::Warning,
                        self.location(ctx, dc),
                        format!(
                            "children of {} ({}) do not match pattern {:?}",
                            ctx.role,
                            child_roles.join(" "),
                            pattern.source(),
                        ),
                    ));
                }
            }
        }

        true
    }

    fn take_issues(&mut self) -> IssueList {
        std::mem::take(&mut self.issues)
    }
}

/// For an `LI` missing its `LBody`: when raw marked-content kids sit on the
/// same line as the label's bullet, they are the list body text and can be
/// gathered into a fresh `LBody`.
fn try_bullet_aligned_fix(ctx: &StructTreeContext<'_>, dc: &DocContext) -> Option<Fix> {
    let tree = dc.doc().struct_tree()?;

    let (lbl, _) = ctx
        .struct_children
        .iter()
        .find(|(_, role)| role == "Lbl")?;
    let (bullet_page, bullet_mcid) = doc_container::mcrs_in_subtree(tree, *lbl).first().copied()?;
    let bullet = dc.mcid_bounds(bullet_page, bullet_mcid)?;

    let raw_kids: Vec<(ObjId, u32, u32)> = tree
        .kids(ctx.node)
        .iter()
        .filter_map(|&k| match tree.get(k) {
            Some(StructNode::Mcr { page, mcid }) => Some((k, *page, *mcid)),
            _ => None,
        })
        .collect();

    let aligned: Vec<ObjId> = raw_kids
        .into_iter()
        .filter(|(_, page, mcid)| {
            dc.mcid_bounds(*page, *mcid)
                .is_some_and(|r| (r.lly - bullet.lly).abs() <= BULLET_LINE_TOLERANCE)
        })
        .map(|(k, _, _)| k)
        .collect();

    (!aligned.is_empty()).then_some(Fix::WrapBulletAlignedKidsInLBody {
        parent: ctx.node,
        kids: aligned,
    })
}
