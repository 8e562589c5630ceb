//! End-to-end scenarios over the check engine: detection, fix application,
//! re-detection, and the structural invariants every fix must uphold.

use check_engine::checks::{
    MistaggedArtifact, NeedlessNesting, ParagraphOfLinks, SchemaValidation,
};
use check_engine::{
    CheckEngine, CheckRegistration, DocContext, Fix, FixOutcome, IssueType, StructTreeCheck,
};
use doc_container::{to_role_tree, ObjId, Page, StructTree, TaggedDocument};
use tag_schema::{SchemaWarning, TagSchema, DEFAULT_SCHEMA};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn schema_validation_only() -> Vec<CheckRegistration> {
    fn factory() -> Box<dyn StructTreeCheck> {
        Box::new(SchemaValidation::new())
    }
    vec![CheckRegistration::new("schema-validation", &[], factory)]
}

fn context_with_tree(tree: StructTree) -> DocContext {
    let mut doc = TaggedDocument::new();
    doc.add_page(Page::new(1));
    doc.info.marked_tagged = true;
    doc.info.language = Some("en-US".to_string());
    doc.info.ua_part = Some(1);
    doc.set_struct_tree(tree);
    DocContext::new(doc)
}

fn engine(tree_checks: Vec<CheckRegistration>) -> CheckEngine {
    CheckEngine::new(DEFAULT_SCHEMA.clone(), vec![], tree_checks).expect("engine constructs")
}

fn verify_parent_links(tree: &StructTree) {
    for id in tree.node_ids() {
        for &kid in tree.kids(id) {
            if let Some(elem) = tree.get(kid).and_then(|n| n.as_element()) {
                assert_eq!(elem.parent, Some(id), "parent back-link of {kid}");
            }
        }
    }
}

fn role_tree(ctx: &DocContext, at: ObjId) -> String {
    to_role_tree(ctx.doc().struct_tree().expect("tree"), at)
        .expect("role tree")
        .to_string()
}

/// S1: `L > P, P, P` gets per-child wrong-child findings, a parent-scoped
/// run fix, and converges to `L > (LI > LBody > P)*` with a clean
/// re-detection.
#[test]
fn s1_list_of_paragraphs_converges() {
    init_tracing();
    let mut tree = StructTree::new();
    let document = tree.new_element("Document");
    let l = tree.new_element("L");
    tree.add_child(tree.root(), document).unwrap();
    tree.add_child(document, l).unwrap();
    for i in 0..3 {
        let p = tree.new_element("P");
        let mcr = tree.new_mcr(1, i);
        tree.add_child(l, p).unwrap();
        tree.add_child(p, mcr).unwrap();
    }

    let mut ctx = context_with_tree(tree);
    let engine = engine(schema_validation_only());

    let mut issues = engine.run_struct_tree_checks(&ctx);
    let wrong_children: Vec<_> = issues
        .iter()
        .filter(|i| i.issue_type == IssueType::WrongChild)
        .collect();
    assert_eq!(wrong_children.len(), 3);
    // The parent-scoped fix rides on the first finding only
    assert!(matches!(
        wrong_children[0].fix(),
        Some(Fix::WrapParagraphRunInList { .. })
    ));
    assert!(wrong_children[1].fix().is_none());
    assert!(wrong_children[2].fix().is_none());

    let resolved = engine.apply_fixes(&mut ctx, &mut issues);
    assert_eq!(resolved.len(), 1);

    assert_eq!(
        role_tree(&ctx, document),
        "Document\n  L\n    LI\n      LBody\n        P\n    LI\n      LBody\n        P\n    LI\n      LBody\n        P\n"
    );
    verify_parent_links(ctx.doc().struct_tree().unwrap());
    // Structural fixes never touch the role map
    assert!(ctx.doc().struct_tree().unwrap().role_map().is_empty());

    let remaining = engine.run_struct_tree_checks(&ctx);
    assert!(remaining.is_empty(), "re-detect found: {:?}", remaining.iter().map(|i| &i.message).collect::<Vec<_>>());
}

/// S2: `LI > P` gets a WrapInLBody fix yielding `LI > LBody > P`
#[test]
fn s2_li_paragraph_gets_lbody() {
    let mut tree = StructTree::new();
    let document = tree.new_element("Document");
    let l = tree.new_element("L");
    let li = tree.new_element("LI");
    let p = tree.new_element("P");
    let mcr = tree.new_mcr(1, 0);
    tree.add_child(tree.root(), document).unwrap();
    tree.add_child(document, l).unwrap();
    tree.add_child(l, li).unwrap();
    tree.add_child(li, p).unwrap();
    tree.add_child(p, mcr).unwrap();

    let mut ctx = context_with_tree(tree);
    let engine = engine(schema_validation_only());

    let mut issues = engine.run_struct_tree_checks(&ctx);
    assert!(issues
        .iter()
        .any(|i| matches!(i.fix(), Some(Fix::WrapInLBody { .. }))));

    engine.apply_fixes(&mut ctx, &mut issues);
    assert_eq!(
        role_tree(&ctx, document),
        "Document\n  L\n    LI\n      LBody\n        P\n"
    );
    verify_parent_links(ctx.doc().struct_tree().unwrap());
    assert!(engine.run_struct_tree_checks(&ctx).is_empty());
}

/// S3: `LI > Lbl` is a missing-LBody child-count warning with no
/// automatic fix
#[test]
fn s3_li_without_lbody_warns_without_fix() {
    let mut tree = StructTree::new();
    let document = tree.new_element("Document");
    let l = tree.new_element("L");
    let li = tree.new_element("LI");
    let lbl = tree.new_element("Lbl");
    let mcr = tree.new_mcr(1, 0);
    tree.add_child(tree.root(), document).unwrap();
    tree.add_child(document, l).unwrap();
    tree.add_child(l, li).unwrap();
    tree.add_child(li, lbl).unwrap();
    tree.add_child(lbl, mcr).unwrap();

    let ctx = context_with_tree(tree);
    let engine = engine(schema_validation_only());

    let issues = engine.run_struct_tree_checks(&ctx);
    let missing: Vec<_> = issues
        .iter()
        .filter(|i| i.issue_type == IssueType::WrongChildCount)
        .collect();
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0].severity, check_engine::Severity::Warning);
    assert!(missing[0].fix().is_none());
}

/// S4: `L > Lbl, LBody, Lbl, LBody` pairs up into two LIs
#[test]
fn s4_lbl_lbody_pairs_wrap_in_li() {
    let mut tree = StructTree::new();
    let document = tree.new_element("Document");
    let l = tree.new_element("L");
    tree.add_child(tree.root(), document).unwrap();
    tree.add_child(document, l).unwrap();
    for i in 0..2u32 {
        let lbl = tree.new_element("Lbl");
        let lbody = tree.new_element("LBody");
        let m1 = tree.new_mcr(1, i * 2);
        let m2 = tree.new_mcr(1, i * 2 + 1);
        tree.add_child(l, lbl).unwrap();
        tree.add_child(l, lbody).unwrap();
        tree.add_child(lbl, m1).unwrap();
        tree.add_child(lbody, m2).unwrap();
    }

    let mut ctx = context_with_tree(tree);
    let engine = engine(schema_validation_only());

    let mut issues = engine.run_struct_tree_checks(&ctx);
    assert!(issues
        .iter()
        .any(|i| matches!(i.fix(), Some(Fix::WrapPairsOfLblLBodyInLi { .. }))));

    engine.apply_fixes(&mut ctx, &mut issues);
    assert_eq!(
        role_tree(&ctx, document),
        "Document\n  L\n    LI\n      Lbl\n      LBody\n    LI\n      Lbl\n      LBody\n"
    );
    verify_parent_links(ctx.doc().struct_tree().unwrap());
    assert!(engine.run_struct_tree_checks(&ctx).is_empty());
}

/// S5: a paragraph of three links becomes `L > LI > LBody > Link` each
#[test]
fn s5_paragraph_of_links_listified() {
    let mut tree = StructTree::new();
    let document = tree.new_element("Document");
    let p = tree.new_element("P");
    tree.add_child(tree.root(), document).unwrap();
    tree.add_child(document, p).unwrap();
    for _ in 0..3 {
        let link = tree.new_element("Link");
        tree.add_child(p, link).unwrap();
    }

    fn factory() -> Box<dyn StructTreeCheck> {
        Box::new(ParagraphOfLinks::new())
    }
    let mut ctx = context_with_tree(tree);
    let engine = engine(vec![CheckRegistration::new(
        "paragraph-of-links",
        &[],
        factory,
    )]);

    let mut issues = engine.run_struct_tree_checks(&ctx);
    assert_eq!(issues.len(), 1);
    assert!(matches!(
        issues.iter().next().unwrap().fix(),
        Some(Fix::ListifyParagraphOfLinks { .. })
    ));

    engine.apply_fixes(&mut ctx, &mut issues);
    assert_eq!(
        role_tree(&ctx, document),
        "Document\n  L\n    LI\n      LBody\n        Link\n    LI\n      LBody\n        Link\n    LI\n      LBody\n        Link\n"
    );
    verify_parent_links(ctx.doc().struct_tree().unwrap());
    assert!(engine.run_struct_tree_checks(&ctx).is_empty());
}

/// S6: contradictory schema constraints warn on load but the engine still
/// runs detection against the schema as-is
#[test]
fn s6_inconsistent_schema_warns_and_runs() {
    let yaml = "
L:
  allowed_children: [LI]
LI:
  parent_must_be: [L]
  allowed_children: [Lbl]
  required_children: [LBody]
";
    let schema = TagSchema::from_yaml_str(yaml).unwrap();
    let warnings = schema.validate_consistency();
    assert!(warnings.iter().any(|w| matches!(
        w,
        SchemaWarning::RequiredNotAllowed { role, child } if role == "LI" && child == "LBody"
    )));

    let mut tree = StructTree::new();
    let l = tree.new_element("L");
    let li = tree.new_element("LI");
    let lbl = tree.new_element("Lbl");
    tree.add_child(tree.root(), l).unwrap();
    tree.add_child(l, li).unwrap();
    tree.add_child(li, lbl).unwrap();

    let ctx = context_with_tree(tree);
    let engine = CheckEngine::new(schema, vec![], schema_validation_only()).unwrap();
    let issues = engine.run_struct_tree_checks(&ctx);
    assert!(issues
        .iter()
        .any(|i| i.issue_type == IssueType::WrongChildCount));
}

/// Needless nesting collapses `Sect > Sect > P` to `Sect > P`
#[test]
fn needless_nesting_chain_collapses() {
    let mut tree = StructTree::new();
    let document = tree.new_element("Document");
    let outer = tree.new_element("Sect");
    let inner = tree.new_element("Sect");
    let p = tree.new_element("P");
    let mcr = tree.new_mcr(1, 0);
    tree.add_child(tree.root(), document).unwrap();
    tree.add_child(document, outer).unwrap();
    tree.add_child(outer, inner).unwrap();
    tree.add_child(inner, p).unwrap();
    tree.add_child(p, mcr).unwrap();

    fn factory() -> Box<dyn StructTreeCheck> {
        Box::new(NeedlessNesting::new())
    }
    let mut ctx = context_with_tree(tree);
    let engine = engine(vec![CheckRegistration::new("needless-nesting", &[], factory)]);

    let mut issues = engine.run_struct_tree_checks(&ctx);
    assert_eq!(issues.len(), 1);
    assert!(matches!(
        issues.iter().next().unwrap().fix(),
        Some(Fix::FlattenNesting { .. })
    ));

    engine.apply_fixes(&mut ctx, &mut issues);
    assert_eq!(role_tree(&ctx, document), "Document\n  Sect\n    P\n");
    verify_parent_links(ctx.doc().struct_tree().unwrap());
}

/// A marked-content leaf on a chain wrapper neither hides the chain nor
/// gets lost when the chain collapses
#[test]
fn needless_nesting_ignores_and_keeps_leaves() {
    let mut tree = StructTree::new();
    let document = tree.new_element("Document");
    let div = tree.new_element("Div");
    let div_mcr = tree.new_mcr(1, 0);
    let sect = tree.new_element("Sect");
    let p = tree.new_element("P");
    let p_mcr = tree.new_mcr(1, 1);
    tree.add_child(tree.root(), document).unwrap();
    tree.add_child(document, div).unwrap();
    tree.add_child(div, div_mcr).unwrap();
    tree.add_child(div, sect).unwrap();
    tree.add_child(sect, p).unwrap();
    tree.add_child(p, p_mcr).unwrap();

    fn factory() -> Box<dyn StructTreeCheck> {
        Box::new(NeedlessNesting::new())
    }
    let mut ctx = context_with_tree(tree);
    let engine = engine(vec![CheckRegistration::new("needless-nesting", &[], factory)]);

    let mut issues = engine.run_struct_tree_checks(&ctx);
    assert_eq!(issues.len(), 1, "leaf kid must not hide the chain");
    assert!(matches!(
        issues.iter().next().unwrap().fix(),
        Some(Fix::FlattenNesting { .. })
    ));

    engine.apply_fixes(&mut ctx, &mut issues);
    assert!(issues.iter().all(|i| i.state().is_resolved()));
    assert_eq!(role_tree(&ctx, document), "Document\n  Div\n    P\n");

    let tree = ctx.doc().struct_tree().unwrap();
    // The Div keeps its own marked content ahead of the adopted child
    assert_eq!(tree.kids(div), &[div_mcr, p]);
    assert!(!tree.contains(sect));
    verify_parent_links(tree);
}

/// Repeated header content converts to artifacts: content stream rewritten,
/// subtree detached, descendant fix superseded
#[test]
fn mistagged_artifact_rewrites_and_detaches() {
    const HEADER: &[u8] =
        b"/H1 << /MCID 0 >> BDC\nBT /F1 10 Tf 50 780 Td (Running Head) Tj ET\nEMC\n";

    let mut doc = TaggedDocument::new();
    let mut tree = StructTree::new();
    let document = tree.new_element("Document");
    tree.add_child(tree.root(), document).unwrap();

    let mut divs = Vec::new();
    for page_no in 1..=2u32 {
        let mut page = Page::new(page_no);
        page.content = HEADER.to_vec();
        doc.add_page(page);

        let div = tree.new_element("Div");
        let h1 = tree.new_element("H1");
        let mcr = tree.new_mcr(page_no, 0);
        tree.add_child(document, div).unwrap();
        tree.add_child(div, h1).unwrap();
        tree.add_child(h1, mcr).unwrap();
        divs.push(div);
    }
    doc.info.marked_tagged = true;
    doc.info.language = Some("en-US".to_string());
    doc.info.ua_part = Some(1);
    doc.set_struct_tree(tree);

    fn factory() -> Box<dyn StructTreeCheck> {
        Box::new(MistaggedArtifact::new())
    }
    let mut ctx = DocContext::new(doc);
    let engine = engine(vec![CheckRegistration::new(
        "mistagged-artifact",
        &[],
        factory,
    )]);

    let mut issues = engine.run_struct_tree_checks(&ctx);
    // Both the Div and its H1 qualify on each page
    assert!(issues.len() >= 2);

    engine.apply_fixes(&mut ctx, &mut issues);

    // Ancestor fixes applied; descendant fixes find their subtree already
    // gone and resolve as no-ops
    assert!(issues.iter().all(|i| i.state().is_resolved()));

    for page in ctx.doc().pages() {
        let text = String::from_utf8_lossy(&page.content);
        assert!(text.contains("/Artifact BMC"), "page {} content: {text}", page.number);
        assert!(!text.contains("BDC"));
        assert!(text.contains("EMC"));
    }
    let tree = ctx.doc().struct_tree().unwrap();
    for div in divs {
        assert!(!tree.contains(div));
    }
    assert!(engine.run_struct_tree_checks(&ctx).is_empty());
}

/// A per-child fix is resolved as superseded once the parent-scoped fix
/// covering the same children has applied
#[test]
fn superseded_fix_resolves_with_skip_note() {
    use check_engine::{Issue, IssueList, Location, Severity};

    let mut tree = StructTree::new();
    let document = tree.new_element("Document");
    let l = tree.new_element("L");
    tree.add_child(tree.root(), document).unwrap();
    tree.add_child(document, l).unwrap();
    let mut ps = Vec::new();
    for _ in 0..2 {
        let p = tree.new_element("P");
        tree.add_child(l, p).unwrap();
        ps.push(p);
    }

    let mut ctx = context_with_tree(tree);
    let engine = engine(schema_validation_only());

    let mut issues = IssueList::new();
    issues.push(
        Issue::new(
            IssueType::WrongChild,
            Severity::Error,
            Location::document(),
            "P is not an allowed child of L",
        )
        .with_fix(Fix::WrapParagraphRunInList {
            parent: l,
            run: ps.clone(),
        }),
    );
    issues.push(
        Issue::new(
            IssueType::WrongChild,
            Severity::Error,
            Location::document(),
            "P is not an allowed child of L",
        )
        .with_fix(Fix::WrapInLi {
            parent: l,
            child: ps[1],
        }),
    );

    engine.apply_fixes(&mut ctx, &mut issues);
    let states: Vec<_> = issues.iter().map(|i| i.state().clone()).collect();
    assert!(states[0].is_resolved());
    assert!(states[1]
        .note()
        .is_some_and(|n| n.contains("skipped: superseded")));
}

/// Property 3: applying a fix twice equals applying it once
#[test]
fn fixes_are_idempotent() {
    let mut tree = StructTree::new();
    let document = tree.new_element("Document");
    let l = tree.new_element("L");
    let li = tree.new_element("LI");
    let p = tree.new_element("P");
    tree.add_child(tree.root(), document).unwrap();
    tree.add_child(document, l).unwrap();
    tree.add_child(l, li).unwrap();
    tree.add_child(li, p).unwrap();

    let mut ctx = context_with_tree(tree);
    let fix = Fix::WrapInLBody { parent: li, child: p };

    assert_eq!(fix.apply(&mut ctx).unwrap(), FixOutcome::Applied);
    let after_first = role_tree(&ctx, document);

    assert_eq!(fix.apply(&mut ctx).unwrap(), FixOutcome::AlreadyApplied);
    assert_eq!(role_tree(&ctx, document), after_first);
    verify_parent_links(ctx.doc().struct_tree().unwrap());
}

/// Property 4: a fix invalidated by an applied fix is a no-op afterwards
#[test]
fn invalidation_is_sound() {
    let mut tree = StructTree::new();
    let document = tree.new_element("Document");
    let l = tree.new_element("L");
    tree.add_child(tree.root(), document).unwrap();
    tree.add_child(document, l).unwrap();
    let mut ps = Vec::new();
    for _ in 0..2 {
        let p = tree.new_element("P");
        tree.add_child(l, p).unwrap();
        ps.push(p);
    }

    let mut ctx = context_with_tree(tree);
    let multi = Fix::WrapParagraphRunInList {
        parent: l,
        run: ps.clone(),
    };
    let single = Fix::WrapInLi {
        parent: l,
        child: ps[0],
    };

    assert!(multi.invalidates(&single, &ctx));
    assert_eq!(multi.apply(&mut ctx).unwrap(), FixOutcome::Applied);
    // The superseded fix no longer finds its target in place
    let outcome = single.apply(&mut ctx).unwrap();
    assert_ne!(outcome, FixOutcome::Applied);
    verify_parent_links(ctx.doc().struct_tree().unwrap());
}

/// The document-setup fixes run before structural ones and are idempotent
#[test]
fn document_setup_and_page_parts() {
    let mut tree = StructTree::new();
    let sect = tree.new_element("Sect");
    let p = tree.new_element("P");
    let mcr = tree.new_mcr(2, 0);
    tree.add_child(tree.root(), sect).unwrap();
    tree.add_child(sect, p).unwrap();
    tree.add_child(p, mcr).unwrap();

    let mut doc = TaggedDocument::new();
    doc.add_page(Page::new(1));
    doc.add_page(Page::new(2));
    doc.set_struct_tree(tree);
    let mut ctx = DocContext::new(doc);

    assert_eq!(Fix::WrapInDocument.apply(&mut ctx).unwrap(), FixOutcome::Applied);
    assert_eq!(Fix::SetupPageParts.apply(&mut ctx).unwrap(), FixOutcome::Applied);
    assert_eq!(
        Fix::SetupPageParts.apply(&mut ctx).unwrap(),
        FixOutcome::AlreadyApplied
    );

    let tree = ctx.doc().struct_tree().unwrap();
    let root_kids = tree.kids(tree.root());
    assert_eq!(root_kids.len(), 1);
    let document = root_kids[0];
    let parts = doc_container::struct_kids(tree, document);
    assert_eq!(parts.len(), 2);
    // The Sect resolved to page 2 through its MCR and moved into Part 2
    assert_eq!(tree.element(parts[1]).unwrap().page, Some(2));
    assert_eq!(doc_container::struct_kids(tree, parts[1]).len(), 1);
    assert!(doc_container::struct_kids(tree, parts[0]).is_empty());
    verify_parent_links(tree);
}
