//! The processing service

use crate::Result;
use check_engine::doc_checks::DocumentCheck;
use check_engine::{
    default_document_checks, default_tree_checks, CheckEngine, DocContext, IssueList, RunRecord,
};
use doc_container::{ContainerStore, OpenMode, TaggedDocument};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tag_schema::{SchemaWarning, TagSchema};
use tracing::{debug, info};

/// Caller-supplied knobs for one service instance
#[derive(Debug, Clone, Default)]
pub struct ProcessingOptions {
    /// Credential for encrypted inputs
    pub password: Option<String>,
    /// Check names to leave out of the run
    pub skip_checks: HashSet<String>,
}

impl ProcessingOptions {
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn skipping(mut self, check: impl Into<String>) -> Self {
        self.skip_checks.insert(check.into());
        self
    }
}

/// Everything a remediation run produced
#[derive(Debug)]
pub struct ProcessingResult {
    /// Tag issues as originally detected
    pub original_tag: IssueList,
    /// Tag issues resolved by fixes
    pub applied_tag: IssueList,
    /// Tag issues found by re-detection after fixes
    pub remaining_tag: IssueList,
    /// Document issues as originally detected
    pub original_doc: IssueList,
    /// Document issues resolved by fixes
    pub applied_doc: IssueList,
    /// Document issues still open after fixes
    pub remaining_doc: IssueList,
    /// Where the remediated document was written
    pub output_path: PathBuf,
    /// Per-fix application record
    pub record: RunRecord,
    /// Advisory schema findings surfaced in the report preamble
    pub schema_warnings: Vec<SchemaWarning>,
}

/// Serializable counts for quiet/json consumers
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ProcessingSummary {
    pub detected: usize,
    pub resolved: usize,
    pub remaining: usize,
}

impl ProcessingResult {
    pub fn summary(&self) -> ProcessingSummary {
        ProcessingSummary {
            detected: self.original_tag.len() + self.original_doc.len(),
            resolved: self.applied_tag.len() + self.applied_doc.len(),
            remaining: self.remaining_tag.len() + self.remaining_doc.len(),
        }
    }

    /// Summary as one JSON line, for quiet mode and machine consumers
    pub fn summary_json(&self) -> String {
        serde_json::to_string(&self.summary()).unwrap_or_default()
    }
}

/// Phase orchestrator. One service processes one document at a time; the
/// schema is immutable and may be shared between services.
pub struct ProcessingService<S: ContainerStore> {
    store: S,
    schema: TagSchema,
    options: ProcessingOptions,
}

impl<S: ContainerStore> ProcessingService<S> {
    pub fn new(store: S, schema: TagSchema, options: ProcessingOptions) -> Self {
        Self {
            store,
            schema,
            options,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn build_engine(&self) -> Result<CheckEngine> {
        let tree_checks = default_tree_checks()
            .into_iter()
            .filter(|r| !self.options.skip_checks.contains(r.name))
            .collect();
        let doc_checks = default_document_checks()
            .into_iter()
            .filter(|c| !self.options.skip_checks.contains(c.name()))
            .collect();
        Ok(CheckEngine::new(self.schema.clone(), doc_checks, tree_checks)?)
    }

    fn open(&self, path: &Path, mode: OpenMode) -> Result<TaggedDocument> {
        Ok(self
            .store
            .open(path, self.options.password.as_deref(), mode)?)
    }

    /// Detect issues without mutating anything. Document checks run first,
    /// then the structure-tree checks.
    pub fn analyze(&self, input: &Path) -> Result<IssueList> {
        let doc = self.open(input, OpenMode::ReadOnly)?;
        let ctx = DocContext::new(doc);
        let engine = self.build_engine()?;

        let mut issues = engine.run_document_checks(&ctx);
        if ctx.doc().has_struct_tree() {
            issues.extend(engine.run_struct_tree_checks(&ctx));
        }
        info!(count = issues.len(), "analysis complete");
        Ok(issues)
    }

    /// Analyze and write a human-readable report to `sink`
    pub fn report(&self, input: &Path, sink: &mut dyn std::io::Write) -> Result<IssueList> {
        let issues = self.analyze(input)?;
        crate::render_issue_report(sink, &issues, &self.schema.validate_consistency())?;
        Ok(issues)
    }

    /// Detect, fix, re-detect, and write the remediated document.
    ///
    /// The output is written to a temporary `.part` sibling of `output`
    /// first; the temp file is removed on any error.
    pub fn remediate(&self, input: &Path, output: &Path) -> Result<ProcessingResult> {
        let doc = self.open(input, OpenMode::ReadWrite)?;
        let temp_output = temp_path(output);
        let engine = self.build_engine()?;
        let mut ctx = DocContext::new(doc);

        // Detection: document first, then the tag phase unless there is no
        // structure tree to walk
        let mut doc_issues = engine.run_document_checks(&ctx);
        let has_tree = ctx.doc().has_struct_tree();
        let mut tag_issues = if has_tree {
            engine.run_struct_tree_checks(&ctx)
        } else {
            debug!("no structure tree, skipping tag phase");
            IssueList::new()
        };
        let original_tag = tag_issues.clone();
        let original_doc = doc_issues.clone();

        // Fixes: tag-structure first, document-level after
        let applied_tag = engine.apply_fixes(&mut ctx, &mut tag_issues);
        let applied_doc = engine.apply_fixes(&mut ctx, &mut doc_issues);

        // Any applied tag fix warrants a re-detection; the fresh list is
        // what remains
        let remaining_tag = if !applied_tag.is_empty() && ctx.doc().has_struct_tree() {
            engine.run_struct_tree_checks(&ctx)
        } else {
            tag_issues.remaining().into_iter().cloned().collect()
        };
        let remaining_doc: IssueList = doc_issues.remaining().into_iter().cloned().collect();

        let record = ctx.record.clone();
        let doc = ctx.into_doc();
        if let Err(err) = self.store.save(&doc, &temp_output) {
            let _ = self.store.remove(&temp_output);
            return Err(err.into());
        }

        info!(
            applied = applied_tag.len() + applied_doc.len(),
            output = %temp_output.display(),
            "remediation complete"
        );
        Ok(ProcessingResult {
            original_tag,
            applied_tag,
            remaining_tag,
            original_doc,
            applied_doc,
            remaining_doc,
            output_path: temp_output,
            record,
            schema_warnings: self.schema.validate_consistency(),
        })
    }
}

/// Sibling `.part` path the output is staged at
fn temp_path(output: &Path) -> PathBuf {
    let name = output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    output.with_file_name(format!("{name}.part"))
}
