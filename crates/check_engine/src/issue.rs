//! Issues and the issue list

use crate::Fix;
use doc_container::ObjId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// What kind of problem an issue reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueType {
    // Structure-tree checks
    UnknownRole,
    WrongParent,
    WrongChildCount,
    WrongChild,
    WrongChildPattern,
    NeedlessNesting,
    MissingPageParts,
    MistaggedArtifact,
    FigureWithText,
    MissingAltText,
    EmptyLinkTag,
    MistaggedBullet,
    ParagraphOfLinks,
    ListlikeParagraphRun,
    EmptyElement,
    // Document checks
    NoStructTree,
    MissingDocumentRoot,
    MissingLanguage,
    NotMarkedTagged,
    BadTabOrder,
    MissingUaIdentifier,
    UnmarkedLink,
    UnexpectedWidget,
    BadLigatureMap,
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            IssueType::UnknownRole => "unknown role",
            IssueType::WrongParent => "wrong parent",
            IssueType::WrongChildCount => "wrong child count",
            IssueType::WrongChild => "wrong child",
            IssueType::WrongChildPattern => "wrong child pattern",
            IssueType::NeedlessNesting => "needless nesting",
            IssueType::MissingPageParts => "missing page parts",
            IssueType::MistaggedArtifact => "mistagged artifact",
            IssueType::FigureWithText => "figure with text",
            IssueType::MissingAltText => "missing alternate text",
            IssueType::EmptyLinkTag => "empty link tag",
            IssueType::MistaggedBullet => "mistagged bullet",
            IssueType::ParagraphOfLinks => "paragraph of links",
            IssueType::ListlikeParagraphRun => "list-like paragraph run",
            IssueType::EmptyElement => "empty element",
            IssueType::NoStructTree => "no structure tree",
            IssueType::MissingDocumentRoot => "missing document root",
            IssueType::MissingLanguage => "missing language",
            IssueType::NotMarkedTagged => "not marked tagged",
            IssueType::BadTabOrder => "tab order not structure",
            IssueType::MissingUaIdentifier => "missing UA identifier",
            IssueType::UnmarkedLink => "unmarked link",
            IssueType::UnexpectedWidget => "unexpected widget",
            IssueType::BadLigatureMap => "badly mapped ligature",
        };
        f.write_str(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => f.write_str("info"),
            Severity::Warning => f.write_str("warning"),
            Severity::Error => f.write_str("error"),
        }
    }
}

/// Where in the document an issue was found
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// The owning structure element, when the issue is tree-scoped
    pub element: Option<ObjId>,
    /// Mapped role of the owning element
    pub role: Option<String>,
    /// 1-based page number, 0 when unresolvable
    pub page: u32,
    /// Role path breadcrumb, e.g. `/Document[1].L[7].LI[9]`
    pub path: Option<String>,
}

impl Location {
    pub fn document() -> Self {
        Self::default()
    }

    pub fn element(element: ObjId, role: impl Into<String>, page: u32, path: impl Into<String>) -> Self {
        Self {
            element: Some(element),
            role: Some(role.into()),
            page,
            path: Some(path.into()),
        }
    }

    pub fn page(page: u32) -> Self {
        Self {
            page,
            ..Self::default()
        }
    }
}

/// Lifecycle of an issue. Transitions are monotonic: once an issue leaves
/// `Open` it never returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "state", content = "note")]
pub enum IssueState {
    Open,
    Resolved(String),
    Failed(String),
    Skipped(String),
}

impl IssueState {
    pub fn is_open(&self) -> bool {
        matches!(self, IssueState::Open)
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, IssueState::Resolved(_))
    }

    pub fn note(&self) -> Option<&str> {
        match self {
            IssueState::Open => None,
            IssueState::Resolved(n) | IssueState::Failed(n) | IssueState::Skipped(n) => Some(n),
        }
    }
}

/// One detected problem, optionally carrying a candidate fix
#[derive(Debug, Clone)]
pub struct Issue {
    pub issue_type: IssueType,
    pub severity: Severity,
    pub location: Location,
    pub message: String,
    fix: Option<Fix>,
    state: IssueState,
}

impl Issue {
    pub fn new(
        issue_type: IssueType,
        severity: Severity,
        location: Location,
        message: impl Into<String>,
    ) -> Self {
        Self {
            issue_type,
            severity,
            location,
            message: message.into(),
            fix: None,
            state: IssueState::Open,
        }
    }

    pub fn with_fix(mut self, fix: Fix) -> Self {
        self.fix = Some(fix);
        self
    }

    pub fn fix(&self) -> Option<&Fix> {
        self.fix.as_ref()
    }

    pub fn state(&self) -> &IssueState {
        &self.state
    }

    /// Mark resolved with a human-readable note. No-op unless open.
    pub fn mark_resolved(&mut self, note: impl Into<String>) {
        if self.state.is_open() {
            self.state = IssueState::Resolved(note.into());
        }
    }

    /// Mark failed. No-op unless open.
    pub fn mark_failed(&mut self, note: impl Into<String>) {
        if self.state.is_open() {
            self.state = IssueState::Failed(note.into());
        }
    }

    /// Mark skipped. No-op unless open.
    pub fn mark_skipped(&mut self, note: impl Into<String>) {
        if self.state.is_open() {
            self.state = IssueState::Skipped(note.into());
        }
    }
}

/// Ordered list of issues with grouping helpers
#[derive(Debug, Clone, Default)]
pub struct IssueList {
    issues: Vec<Issue>,
}

impl IssueList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, issue: Issue) {
        self.issues.push(issue);
    }

    pub fn extend(&mut self, other: IssueList) {
        self.issues.extend(other.issues);
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Issue> {
        self.issues.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Issue> {
        self.issues.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Issue> {
        self.issues.get_mut(index)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Issue> {
        self.issues.iter_mut()
    }

    /// Issues that were resolved (including those superseded by another fix)
    pub fn resolved(&self) -> Vec<&Issue> {
        self.issues.iter().filter(|i| i.state().is_resolved()).collect()
    }

    /// Issues still open or failed
    pub fn remaining(&self) -> Vec<&Issue> {
        self.issues
            .iter()
            .filter(|i| !i.state().is_resolved())
            .collect()
    }

    /// Group by issue type, first occurrence order within each group
    pub fn by_type(&self) -> BTreeMap<IssueType, Vec<&Issue>> {
        let mut map: BTreeMap<IssueType, Vec<&Issue>> = BTreeMap::new();
        for issue in &self.issues {
            map.entry(issue.issue_type).or_default().push(issue);
        }
        map
    }

    /// Group issues carrying fixes by the fix's group label
    pub fn by_fix_group(&self) -> BTreeMap<String, Vec<&Issue>> {
        let mut map: BTreeMap<String, Vec<&Issue>> = BTreeMap::new();
        for issue in &self.issues {
            if let Some(fix) = issue.fix() {
                map.entry(fix.group_label().to_string())
                    .or_default()
                    .push(issue);
            }
        }
        map
    }

    pub fn into_vec(self) -> Vec<Issue> {
        self.issues
    }
}

impl FromIterator<Issue> for IssueList {
    fn from_iter<T: IntoIterator<Item = Issue>>(iter: T) -> Self {
        Self {
            issues: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a IssueList {
    type Item = &'a Issue;
    type IntoIter = std::slice::Iter<'a, Issue>;

    fn into_iter(self) -> Self::IntoIter {
        self.issues.iter()
    }
}
