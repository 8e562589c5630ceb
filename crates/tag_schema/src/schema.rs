//! The role catalog

use crate::{Pattern, Result, Rule, SchemaError};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::path::Path;
use tracing::debug;

/// Advisory finding from schema consistency validation. Warnings never fail
/// loading; the engine runs against an inconsistent schema as-is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaWarning {
    /// `child` requires parent `parent`, but `parent` does not list `child`
    /// among its allowed children
    AsymmetricParent { child: String, parent: String },
    /// A required child is not an allowed child
    RequiredNotAllowed { role: String, child: String },
    MinGreaterThanMax { role: String, min: usize, max: usize },
    RequiredExceedsMax {
        role: String,
        required: usize,
        max: usize,
    },
    MinWithNoAllowed { role: String, min: usize },
    RequiredWithNoAllowed { role: String },
    /// A child pattern failed to compile and is ignored
    BadPattern { role: String, message: String },
}

impl fmt::Display for SchemaWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaWarning::AsymmetricParent { child, parent } => write!(
                f,
                "{child} requires parent {parent}, but {parent} does not allow {child} as a child"
            ),
            SchemaWarning::RequiredNotAllowed { role, child } => {
                write!(f, "{role} requires child {child} but does not allow it")
            }
            SchemaWarning::MinGreaterThanMax { role, min, max } => {
                write!(f, "{role}: min_children {min} exceeds max_children {max}")
            }
            SchemaWarning::RequiredExceedsMax {
                role,
                required,
                max,
            } => write!(
                f,
                "{role}: {required} required children exceed max_children {max}"
            ),
            SchemaWarning::MinWithNoAllowed { role, min } => write!(
                f,
                "{role}: min_children {min} with an empty allowed_children set"
            ),
            SchemaWarning::RequiredWithNoAllowed { role } => write!(
                f,
                "{role}: required_children with an empty allowed_children set"
            ),
            SchemaWarning::BadPattern { role, message } => {
                write!(f, "{role}: child_pattern ignored: {message}")
            }
        }
    }
}

/// In-memory role catalog. Immutable after load; shared freely.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TagSchema {
    rules: BTreeMap<String, Rule>,
    #[serde(skip)]
    patterns: HashMap<String, Pattern>,
    #[serde(skip)]
    pattern_warnings: Vec<SchemaWarning>,
}

impl TagSchema {
    /// Build from an explicit rule set
    pub fn from_rules(rules: BTreeMap<String, Rule>) -> Self {
        let mut schema = Self {
            rules,
            patterns: HashMap::new(),
            pattern_warnings: Vec::new(),
        };
        schema.populate_missing_roles();
        schema.compile_patterns();
        schema
    }

    /// Parse the declarative `role -> rule` mapping
    pub fn from_yaml_str(source: &str) -> Result<Self> {
        let rules: BTreeMap<String, Rule> = serde_yaml::from_str(source)?;
        Ok(Self::from_rules(rules))
    }

    /// Load a schema file
    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path).map_err(|source| SchemaError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&source)
    }

    pub fn rule(&self, role: &str) -> Option<&Rule> {
        self.rules.get(role)
    }

    pub fn contains_role(&self, role: &str) -> bool {
        self.rules.contains_key(role)
    }

    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// The compiled child pattern for a role, if it has a valid one
    pub fn compiled_pattern(&self, role: &str) -> Option<&Pattern> {
        self.patterns.get(role)
    }

    /// Add an empty rule for every role mentioned in some rule but not
    /// defined, so lookups and consistency validation see a closed world.
    pub fn populate_missing_roles(&mut self) {
        let mut mentioned: BTreeSet<String> = BTreeSet::new();
        for rule in self.rules.values() {
            for list in [
                &rule.parent_must_be,
                &rule.allowed_children,
                &rule.required_children,
            ]
            .into_iter()
            .flatten()
            {
                mentioned.extend(list.iter().cloned());
            }
            if let Some(pattern) = &rule.child_pattern {
                if let Ok(compiled) = Pattern::compile(pattern) {
                    mentioned.extend(compiled.atoms().iter().map(|a| a.to_string()));
                }
            }
        }
        for role in mentioned {
            if !self.rules.contains_key(&role) {
                debug!(%role, "populating schema rule for mentioned role");
                self.rules.insert(role, Rule::default());
            }
        }
    }

    fn compile_patterns(&mut self) {
        self.patterns.clear();
        self.pattern_warnings.clear();
        for (role, rule) in &self.rules {
            if let Some(source) = &rule.child_pattern {
                match Pattern::compile(source) {
                    Ok(pattern) => {
                        self.patterns.insert(role.clone(), pattern);
                    }
                    Err(err) => self.pattern_warnings.push(SchemaWarning::BadPattern {
                        role: role.clone(),
                        message: err.to_string(),
                    }),
                }
            }
        }
    }

    /// Check the rule set for asymmetric or contradictory constraints.
    /// Purely advisory; loading never fails on these.
    pub fn validate_consistency(&self) -> Vec<SchemaWarning> {
        let mut warnings = self.pattern_warnings.clone();

        for (role, rule) in &self.rules {
            // 1. Asymmetric parent_must_be
            if let Some(parents) = &rule.parent_must_be {
                for parent in parents {
                    if let Some(parent_rule) = self.rules.get(parent) {
                        if !parent_rule.allows_child(role) {
                            warnings.push(SchemaWarning::AsymmetricParent {
                                child: role.clone(),
                                parent: parent.clone(),
                            });
                        }
                    }
                }
            }

            // 2. Required child not allowed
            if let Some(required) = &rule.required_children {
                for child in required {
                    if !rule.allows_child(child) {
                        warnings.push(SchemaWarning::RequiredNotAllowed {
                            role: role.clone(),
                            child: child.clone(),
                        });
                    }
                }
            }

            // 3. min > max
            if let (Some(min), Some(max)) = (rule.min_children, rule.max_children) {
                if min > max {
                    warnings.push(SchemaWarning::MinGreaterThanMax {
                        role: role.clone(),
                        min,
                        max,
                    });
                }
            }

            // 4. more required children than max
            if let (Some(required), Some(max)) = (&rule.required_children, rule.max_children) {
                if required.len() > max {
                    warnings.push(SchemaWarning::RequiredExceedsMax {
                        role: role.clone(),
                        required: required.len(),
                        max,
                    });
                }
            }

            let allowed_empty = rule
                .allowed_children
                .as_ref()
                .is_some_and(|a| a.is_empty());

            // 5. min > 0 with nothing allowed
            if let Some(min) = rule.min_children {
                if min > 0 && allowed_empty {
                    warnings.push(SchemaWarning::MinWithNoAllowed {
                        role: role.clone(),
                        min,
                    });
                }
            }

            // 6. required children with nothing allowed
            if rule.required_children.is_some() && allowed_empty {
                warnings.push(SchemaWarning::RequiredWithNoAllowed { role: role.clone() });
            }
        }

        warnings
    }
}

/// The schema used when no schema file is supplied
pub static DEFAULT_SCHEMA: Lazy<TagSchema> = Lazy::new(|| {
    TagSchema::from_yaml_str(include_str!("../tagschema-default.yaml"))
        .expect("built-in schema parses")
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schema_loads_clean() {
        let schema = &*DEFAULT_SCHEMA;
        assert!(schema.contains_role("L"));
        assert!(schema.contains_role("LI"));
        // Mentioned-only roles were populated
        assert!(schema.contains_role("StructTreeRoot"));
        assert!(schema.validate_consistency().is_empty());
        assert!(schema.compiled_pattern("LI").is_some());
    }

    #[test]
    fn test_list_rules_shape() {
        let schema = &*DEFAULT_SCHEMA;
        let li = schema.rule("LI").unwrap();
        assert!(li.allows_parent("L"));
        assert!(!li.allows_parent("P"));
        assert!(li.allows_child("LBody"));
        assert!(!li.allows_child("P"));
        assert_eq!(li.missing_required(&["Lbl"]), vec!["LBody"]);
    }

    #[test]
    fn test_asymmetric_parent_warning() {
        let yaml = "
L:
  allowed_children: [LI]
Lbl:
  parent_must_be: [L]
";
        let schema = TagSchema::from_yaml_str(yaml).unwrap();
        let warnings = schema.validate_consistency();
        assert!(warnings.contains(&SchemaWarning::AsymmetricParent {
            child: "Lbl".to_string(),
            parent: "L".to_string(),
        }));
    }

    #[test]
    fn test_contradictory_cardinality_warnings() {
        let yaml = "
A:
  min_children: 3
  max_children: 1
B:
  required_children: [X, Y]
  max_children: 1
C:
  allowed_children: []
  min_children: 1
D:
  allowed_children: []
  required_children: [X]
";
        let schema = TagSchema::from_yaml_str(yaml).unwrap();
        let warnings = schema.validate_consistency();
        assert!(warnings.iter().any(|w| matches!(
            w,
            SchemaWarning::MinGreaterThanMax { role, min: 3, max: 1 } if role == "A"
        )));
        assert!(warnings.iter().any(|w| matches!(
            w,
            SchemaWarning::RequiredExceedsMax { role, required: 2, max: 1 } if role == "B"
        )));
        assert!(warnings.iter().any(|w| matches!(
            w,
            SchemaWarning::MinWithNoAllowed { role, min: 1 } if role == "C"
        )));
        assert!(warnings
            .iter()
            .any(|w| matches!(w, SchemaWarning::RequiredWithNoAllowed { role } if role == "D")));
    }

    #[test]
    fn test_required_not_allowed_warning() {
        let yaml = "
LI:
  allowed_children: [Lbl]
  required_children: [LBody]
";
        let schema = TagSchema::from_yaml_str(yaml).unwrap();
        let warnings = schema.validate_consistency();
        assert!(warnings.contains(&SchemaWarning::RequiredNotAllowed {
            role: "LI".to_string(),
            child: "LBody".to_string(),
        }));
    }

    #[test]
    fn test_bad_pattern_is_advisory() {
        let yaml = "
L:
  child_pattern: \"(LI\"
";
        let schema = TagSchema::from_yaml_str(yaml).unwrap();
        assert!(schema.compiled_pattern("L").is_none());
        assert!(schema
            .validate_consistency()
            .iter()
            .any(|w| matches!(w, SchemaWarning::BadPattern { role, .. } if role == "L")));
    }

    #[test]
    fn test_load_error_kinds() {
        let err = TagSchema::load(Path::new("/nonexistent/schema.yaml")).unwrap_err();
        assert!(matches!(err, SchemaError::Io { .. }));

        let err = TagSchema::from_yaml_str(": not yaml : [").unwrap_err();
        assert!(matches!(err, SchemaError::Parse(_)));
    }
}
