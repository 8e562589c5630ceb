//! Human-readable report rendering

use crate::ProcessingResult;
use check_engine::{AppliedFix, IssueList};
use chrono::Utc;
use doc_container::{mapped_role, struct_kids, StructTree, TaggedDocument};
use std::collections::BTreeSet;
use std::io::{self, Write};
use tag_schema::SchemaWarning;

fn header(w: &mut dyn Write, title: &str) -> io::Result<()> {
    writeln!(w, "{title} - {}", Utc::now().format("%Y-%m-%d %H:%M:%S UTC"))
}

fn write_schema_warnings(w: &mut dyn Write, warnings: &[SchemaWarning]) -> io::Result<()> {
    if warnings.is_empty() {
        return Ok(());
    }
    writeln!(w, "Schema warnings:")?;
    for warning in warnings {
        writeln!(w, "  ! {warning}")?;
    }
    writeln!(w)
}

fn pages_suffix(pages: &BTreeSet<u32>) -> String {
    if pages.is_empty() {
        return String::new();
    }
    let list: Vec<String> = pages.iter().map(u32::to_string).collect();
    format!(" - page(s) {}", list.join(", "))
}

fn write_detected(w: &mut dyn Write, issues: &IssueList) -> io::Result<()> {
    if issues.is_empty() {
        writeln!(w, "No issues detected.")?;
        return Ok(());
    }
    writeln!(w, "Detected issues:")?;
    for (issue_type, group) in issues.by_type() {
        let pages: BTreeSet<u32> = group
            .iter()
            .map(|i| i.location.page)
            .filter(|&p| p > 0)
            .collect();
        writeln!(
            w,
            "  \u{2717} {issue_type} ({}){}",
            group.len(),
            pages_suffix(&pages)
        )?;
    }
    Ok(())
}

fn write_applied(w: &mut dyn Write, applied: &[AppliedFix]) -> io::Result<()> {
    if applied.is_empty() {
        return Ok(());
    }
    writeln!(w, "Applied fixes:")?;
    let mut groups: Vec<&str> = applied.iter().map(|f| f.group.as_str()).collect();
    groups.sort_unstable();
    groups.dedup();
    for group in groups {
        let members: Vec<&AppliedFix> = applied.iter().filter(|f| f.group == group).collect();
        let pages: BTreeSet<u32> = members.iter().flat_map(|f| f.pages.iter().copied()).collect();
        writeln!(
            w,
            "  \u{2713} {group} ({}){}",
            members.len(),
            pages_suffix(&pages)
        )?;
        for member in members {
            writeln!(w, "      {}", member.description)?;
        }
    }
    Ok(())
}

/// Report for an analysis run: detected issues only
pub fn render_issue_report(
    w: &mut dyn Write,
    issues: &IssueList,
    schema_warnings: &[SchemaWarning],
) -> io::Result<()> {
    header(w, "Accessibility audit")?;
    write_schema_warnings(w, schema_warnings)?;
    write_detected(w, issues)?;
    writeln!(w, "Summary: {} detected", issues.len())
}

/// Report for a remediation run: detected, applied, remaining, output path
pub fn render_processing_report(w: &mut dyn Write, result: &ProcessingResult) -> io::Result<()> {
    header(w, "Accessibility remediation")?;
    write_schema_warnings(w, &result.schema_warnings)?;

    let mut detected = result.original_doc.clone();
    detected.extend(result.original_tag.clone());
    write_detected(w, &detected)?;
    write_applied(w, &result.record.applied)?;

    let summary = result.summary();
    writeln!(
        w,
        "Summary: {} detected, {} resolved, {} remaining",
        summary.detected, summary.resolved, summary.remaining
    )?;
    writeln!(w, "Output: {}", result.output_path.display())
}

/// Plain role-tree dump of the document's structure
pub fn render_role_tree(w: &mut dyn Write, doc: &TaggedDocument) -> io::Result<()> {
    let Some(tree) = doc.struct_tree() else {
        return writeln!(w, "(no structure tree)");
    };
    for kid in struct_kids(tree, tree.root()) {
        if let Some(role_tree) = doc_container::to_role_tree(tree, kid) {
            write!(w, "{role_tree}")?;
        }
    }
    Ok(())
}

/// Role-tree dump with object numbers and resolved pages per element
pub fn render_role_tree_detailed(
    w: &mut dyn Write,
    doc: &TaggedDocument,
    ctx: &check_engine::DocContext,
) -> io::Result<()> {
    let Some(tree) = doc.struct_tree() else {
        return writeln!(w, "(no structure tree)");
    };
    for kid in struct_kids(tree, tree.root()) {
        dump_detailed(w, tree, kid, 0, ctx)?;
    }
    Ok(())
}

fn dump_detailed(
    w: &mut dyn Write,
    tree: &StructTree,
    node: doc_container::ObjId,
    depth: usize,
    ctx: &check_engine::DocContext,
) -> io::Result<()> {
    let Some(role) = mapped_role(tree, node) else {
        return Ok(());
    };
    let page = ctx.page_number_of(node);
    writeln!(w, "{}{role} [{node}, page {page}]", "  ".repeat(depth))?;
    for kid in struct_kids(tree, node) {
        dump_detailed(w, tree, kid, depth + 1, ctx)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use check_engine::{Issue, IssueType, Location, Severity};

    #[test]
    fn test_issue_report_groups_and_counts() {
        let mut issues = IssueList::new();
        issues.push(Issue::new(
            IssueType::WrongChild,
            Severity::Error,
            Location::page(1),
            "P under L",
        ));
        issues.push(Issue::new(
            IssueType::WrongChild,
            Severity::Error,
            Location::page(2),
            "P under L",
        ));
        issues.push(Issue::new(
            IssueType::MissingLanguage,
            Severity::Error,
            Location::document(),
            "no language",
        ));

        let mut out = Vec::new();
        render_issue_report(&mut out, &issues, &[]).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("\u{2717} wrong child (2) - page(s) 1, 2"));
        assert!(text.contains("\u{2717} missing language (1)"));
        assert!(text.contains("Summary: 3 detected"));
    }

    #[test]
    fn test_empty_report() {
        let mut out = Vec::new();
        render_issue_report(&mut out, &IssueList::new(), &[]).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("No issues detected."));
    }

    #[test]
    fn test_role_tree_dump() {
        let mut tree = doc_container::StructTree::new();
        let document = tree.new_element("Document");
        let p = tree.new_element("P");
        tree.add_child(tree.root(), document).unwrap();
        tree.add_child(document, p).unwrap();
        let mut doc = TaggedDocument::new();
        doc.set_struct_tree(tree);

        let mut out = Vec::new();
        render_role_tree(&mut out, &doc).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "Document\n  P\n");
    }
}
