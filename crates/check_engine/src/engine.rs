//! The check engine
//!
//! Glues the pieces together: instantiates fresh visitors for each run,
//! drives the walker, runs document checks, and applies fixes in priority
//! order with invalidation between them. One engine operates on one
//! document at a time.

use crate::{
    checks, doc_checks, AppliedFix, DocContext, EngineError, Fix, FixOutcome, IssueList, Result,
    StructTreeCheck, StructTreeWalker,
};
use crate::doc_checks::DocumentCheck;
use tag_schema::TagSchema;
use tracing::{debug, warn};

/// Factory entry for one structure-tree check. Visitors are re-created for
/// every run so they never carry state across detections.
pub struct CheckRegistration {
    pub name: &'static str,
    pub prerequisites: &'static [&'static str],
    factory: fn() -> Box<dyn StructTreeCheck>,
}

impl CheckRegistration {
    pub fn new(
        name: &'static str,
        prerequisites: &'static [&'static str],
        factory: fn() -> Box<dyn StructTreeCheck>,
    ) -> Self {
        Self {
            name,
            prerequisites,
            factory,
        }
    }

    pub fn instantiate(&self) -> Box<dyn StructTreeCheck> {
        (self.factory)()
    }
}

/// The full built-in structure-tree check set, in prerequisite order
pub fn default_tree_checks() -> Vec<CheckRegistration> {
    vec![
        CheckRegistration::new("schema-validation", &[], || {
            Box::new(checks::SchemaValidation::new())
        }),
        CheckRegistration::new("needless-nesting", &[], || {
            Box::new(checks::NeedlessNesting::new())
        }),
        CheckRegistration::new("page-parts", &["needless-nesting"], || {
            Box::new(checks::MissingPageParts::new())
        }),
        CheckRegistration::new("mistagged-artifact", &[], || {
            Box::new(checks::MistaggedArtifact::new())
        }),
        CheckRegistration::new("figure-with-text", &[], || {
            Box::new(checks::FigureWithText::new())
        }),
        CheckRegistration::new("missing-alt-text", &[], || {
            Box::new(checks::MissingAltText::new())
        }),
        CheckRegistration::new("empty-link", &[], || Box::new(checks::EmptyLinkTag::new())),
        CheckRegistration::new("mistagged-bullet", &[], || {
            Box::new(checks::MistaggedBulletedList::new())
        }),
        CheckRegistration::new("paragraph-of-links", &[], || {
            Box::new(checks::ParagraphOfLinks::new())
        }),
        CheckRegistration::new("listlike-paragraph-run", &[], || {
            Box::new(checks::ListlikeParagraphRun::new())
        }),
        CheckRegistration::new("empty-element", &[], || {
            Box::new(checks::EmptyElement::new())
        }),
    ]
}

/// The full built-in document check set, in execution order
pub fn default_document_checks() -> Vec<Box<dyn DocumentCheck>> {
    vec![
        Box::new(doc_checks::StructTreePresence),
        Box::new(doc_checks::DocumentRoot),
        Box::new(doc_checks::Language),
        Box::new(doc_checks::TaggedMarker),
        Box::new(doc_checks::TabOrderCheck),
        Box::new(doc_checks::UaConformance),
        Box::new(doc_checks::UnmarkedLinks),
        Box::new(doc_checks::UnexpectedWidgets),
        Box::new(doc_checks::LigatureMapping),
    ]
}

pub struct CheckEngine {
    schema: TagSchema,
    doc_checks: Vec<Box<dyn DocumentCheck>>,
    tree_checks: Vec<CheckRegistration>,
}

impl CheckEngine {
    /// Construction validates every check's prerequisites against the
    /// registration order and fails fast on a violation.
    pub fn new(
        schema: TagSchema,
        doc_checks: Vec<Box<dyn DocumentCheck>>,
        tree_checks: Vec<CheckRegistration>,
    ) -> Result<Self> {
        validate_prerequisites(&tree_checks)?;
        Ok(Self {
            schema,
            doc_checks,
            tree_checks,
        })
    }

    /// Engine with the complete built-in check sets
    pub fn with_default_checks(schema: TagSchema) -> Result<Self> {
        Self::new(schema, default_document_checks(), default_tree_checks())
    }

    pub fn schema(&self) -> &TagSchema {
        &self.schema
    }

    /// One tree walk with all registered visitors, then every document
    /// check in order.
    pub fn detect_issues(&self, ctx: &DocContext) -> IssueList {
        let mut issues = IssueList::new();
        if !self.tree_checks.is_empty() {
            issues.extend(self.run_struct_tree_checks(ctx));
        }
        issues.extend(self.run_document_checks(ctx));
        issues
    }

    /// The structure-tree portion of detection
    pub fn run_struct_tree_checks(&self, ctx: &DocContext) -> IssueList {
        let mut visitors: Vec<Box<dyn StructTreeCheck>> = self
            .tree_checks
            .iter()
            .map(CheckRegistration::instantiate)
            .collect();
        StructTreeWalker::new(&self.schema).walk(ctx, &mut visitors)
    }

    /// The document-check portion of detection
    pub fn run_document_checks(&self, ctx: &DocContext) -> IssueList {
        let mut issues = IssueList::new();
        for check in &self.doc_checks {
            let found = check.check(ctx);
            debug!(check = check.name(), count = found.len(), "document check ran");
            issues.extend(found);
        }
        issues
    }

    /// Run a single structure-tree check in isolation, for tooling and
    /// tests.
    pub fn run_single_check(&self, ctx: &DocContext, check: &CheckRegistration) -> IssueList {
        let mut visitors: Vec<Box<dyn StructTreeCheck>> = vec![check.instantiate()];
        StructTreeWalker::new(&self.schema).walk(ctx, &mut visitors)
    }

    /// Apply the fixes carried by `issues` in ascending priority order
    /// (stable on ties). A fix invalidated by an earlier successful fix is
    /// resolved with a "skipped" note; a failing fix marks its issue
    /// failed and the batch continues. Returns the resolved issues.
    pub fn apply_fixes(&self, ctx: &mut DocContext, issues: &mut IssueList) -> IssueList {
        let mut order: Vec<usize> = (0..issues.len())
            .filter(|&i| {
                issues
                    .get(i)
                    .map(|issue| issue.fix().is_some() && issue.state().is_open())
                    .unwrap_or(false)
            })
            .collect();
        order.sort_by_key(|&i| {
            issues
                .get(i)
                .and_then(|issue| issue.fix())
                .map(Fix::priority)
                .unwrap_or(u32::MAX)
        });

        let mut applied: Vec<Fix> = Vec::new();
        for idx in order {
            let Some(fix) = issues.get(idx).and_then(|i| i.fix()).cloned() else {
                continue;
            };

            if let Some(winner) = applied.iter().find(|a| a.invalidates(&fix, ctx)) {
                let note = format!("skipped: superseded by {}", winner.describe());
                if let Some(issue) = issues.get_mut(idx) {
                    issue.mark_resolved(note);
                }
                continue;
            }

            // Capture location detail before the mutation can detach it
            let description = fix.describe_with(ctx);
            let pages = fix.affected_pages(ctx);

            match fix.apply(ctx) {
                Ok(FixOutcome::Applied) => {
                    debug!(fix = %description, "fix applied");
                    ctx.record.applied.push(AppliedFix {
                        group: fix.group_label().to_string(),
                        description: description.clone(),
                        pages,
                    });
                    if let Some(issue) = issues.get_mut(idx) {
                        issue.mark_resolved(description);
                    }
                    applied.push(fix);
                }
                Ok(FixOutcome::AlreadyApplied) => {
                    if let Some(issue) = issues.get_mut(idx) {
                        issue.mark_resolved(format!("{description}: already in target shape"));
                    }
                    applied.push(fix);
                }
                Ok(FixOutcome::Skipped) => {
                    debug!(fix = %description, "fix target vanished, leaving issue open");
                }
                Err(err) => {
                    warn!(fix = %description, error = %err, "fix failed");
                    if let Some(issue) = issues.get_mut(idx) {
                        issue.mark_failed(format!("{description}: {err}"));
                    }
                }
            }
        }

        ctx.refresh_page_index();
        issues.resolved().into_iter().cloned().collect()
    }
}

/// Every prerequisite must appear strictly earlier in the registration
/// list than its dependent.
fn validate_prerequisites(checks: &[CheckRegistration]) -> Result<()> {
    for (i, check) in checks.iter().enumerate() {
        for &prereq in check.prerequisites {
            let satisfied = checks[..i].iter().any(|c| c.name == prereq);
            if !satisfied {
                return Err(EngineError::PrerequisiteViolation {
                    check: check.name.to_string(),
                    missing: prereq.to_string(),
                });
            }
        }
    }
    Ok(())
}
