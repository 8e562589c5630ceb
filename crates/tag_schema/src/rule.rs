//! Per-role schema rules

use serde::{Deserialize, Serialize};

/// Constraints for one role. Absent fields are unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rule {
    /// Roles the element's parent must have
    pub parent_must_be: Option<Vec<String>>,
    /// Roles admitted as structure children
    pub allowed_children: Option<Vec<String>>,
    /// Roles that must appear among the children
    pub required_children: Option<Vec<String>>,
    pub min_children: Option<usize>,
    pub max_children: Option<usize>,
    /// Pattern the child-role sequence must match
    pub child_pattern: Option<String>,
}

impl Rule {
    /// Whether `role` may appear as a child under this rule
    pub fn allows_child(&self, role: &str) -> bool {
        match &self.allowed_children {
            Some(allowed) => allowed.iter().any(|r| r == role),
            None => true,
        }
    }

    /// Whether `role` may be the parent under this rule
    pub fn allows_parent(&self, role: &str) -> bool {
        match &self.parent_must_be {
            Some(parents) => parents.iter().any(|r| r == role),
            None => true,
        }
    }

    /// Required children absent from `child_roles`
    pub fn missing_required<'a, S: AsRef<str>>(&'a self, child_roles: &[S]) -> Vec<&'a str> {
        match &self.required_children {
            Some(required) => required
                .iter()
                .filter(|r| !child_roles.iter().any(|c| c.as_ref() == r.as_str()))
                .map(String::as_str)
                .collect(),
            None => Vec::new(),
        }
    }

    /// True when every field is unconstrained
    pub fn is_unconstrained(&self) -> bool {
        self.parent_must_be.is_none()
            && self.allowed_children.is_none()
            && self.required_children.is_none()
            && self.min_children.is_none()
            && self.max_children.is_none()
            && self.child_pattern.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unconstrained_allows_everything() {
        let rule = Rule::default();
        assert!(rule.allows_child("P"));
        assert!(rule.allows_parent("Document"));
        assert!(rule.missing_required(&["P"]).is_empty());
        assert!(rule.is_unconstrained());
    }

    #[test]
    fn test_missing_required() {
        let rule = Rule {
            required_children: Some(vec!["LBody".to_string()]),
            ..Rule::default()
        };
        assert_eq!(rule.missing_required(&["Lbl"]), vec!["LBody"]);
        assert!(rule.missing_required(&["Lbl", "LBody"]).is_empty());
    }
}
