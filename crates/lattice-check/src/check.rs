//! The check report.

use std::collections::BTreeMap;
use std::fmt;

use lattice_core::CoreError;
use serde::Serialize;
use thiserror::Error;

/// Why a field is incorrect.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
pub enum Violation {
    #[error("value is required")]
    Required,

    #[error("not an integer: {0}")]
    NotInteger(String),

    #[error("not a boolean: {0}")]
    NotBoolean(String),

    #[error("{0}")]
    InvalidScore(String),

    #[error("does not match {pattern}")]
    Pattern { pattern: String },

    #[error("not one of the allowed choices")]
    NotAChoice,

    #[error("{0}")]
    Rule(String),
}

impl From<CoreError> for Violation {
    fn from(err: CoreError) -> Self {
        Violation::InvalidScore(err.to_string())
    }
}

/// A field whose live value differs from the saved one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldChange {
    pub name: String,
    pub old: String,
    pub new: String,
}

impl fmt::Display for FieldChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {:?} -> {:?}", self.name, self.old, self.new)
    }
}

/// Outcome of checking one object's editable fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Check {
    /// Incorrect field names in declaration order.
    pub incorrect: Vec<String>,
    pub changed: Vec<FieldChange>,
    /// The object has never been committed.
    pub new_resource: bool,
    violations: BTreeMap<String, Violation>,
}

impl Check {
    pub fn new(new_resource: bool) -> Self {
        Self {
            new_resource,
            ..Self::default()
        }
    }

    pub fn add_incorrect(&mut self, name: &str, violation: Violation) {
        if !self.violations.contains_key(name) {
            self.incorrect.push(name.to_string());
        }
        self.violations.insert(name.to_string(), violation);
    }

    pub fn add_changed(&mut self, name: &str, old: &str, new: &str) {
        self.changed.push(FieldChange {
            name: name.to_string(),
            old: old.to_string(),
            new: new.to_string(),
        });
    }

    pub fn violation(&self, name: &str) -> Option<&Violation> {
        self.violations.get(name)
    }

    pub fn is_correct(&self) -> bool {
        self.incorrect.is_empty()
    }

    /// A new object always counts as changed.
    pub fn has_changes(&self) -> bool {
        self.new_resource || !self.changed.is_empty()
    }

    pub fn can_commit(&self) -> bool {
        self.is_correct() && self.has_changes()
    }

    pub fn is_changed(&self, name: &str) -> bool {
        self.changed.iter().any(|c| c.name == name)
    }

    /// Fold another object's report into this one, prefixing its field
    /// names with `scope/`.
    pub fn merge_scoped(&mut self, scope: &str, other: Check) {
        for name in &other.incorrect {
            if let Some(violation) = other.violations.get(name) {
                self.add_incorrect(&format!("{scope}/{name}"), violation.clone());
            }
        }
        for change in other.changed {
            self.changed.push(FieldChange {
                name: format!("{scope}/{}", change.name),
                ..change
            });
        }
        self.new_resource |= other.new_resource;
    }
}
