//! Where field values come from.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Live and saved values of one object's fields.
pub trait FieldSource: Send + Sync {
    /// Identity of the object the fields belong to. Cached verdicts are
    /// never shared between objects with different ids.
    fn object_id(&self) -> &str;

    /// Value currently entered, if any.
    fn live_value(&self, name: &str) -> Option<String>;

    /// Value last committed, if any.
    fn saved_value(&self, name: &str) -> Option<String>;

    /// The object has never been committed.
    fn is_new(&self) -> bool;
}

/// Map-backed [`FieldSource`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldValues {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub live: BTreeMap<String, String>,
    #[serde(default)]
    pub saved: BTreeMap<String, String>,
    #[serde(default)]
    pub new: bool,
}

impl FieldValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Values that are both live and saved.
    pub fn committed(values: BTreeMap<String, String>) -> Self {
        Self {
            live: values.clone(),
            saved: values,
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_live(mut self, name: &str, value: &str) -> Self {
        self.live.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_saved(mut self, name: &str, value: &str) -> Self {
        self.saved.insert(name.to_string(), value.to_string());
        self
    }

    pub fn as_new(mut self) -> Self {
        self.new = true;
        self
    }

    pub fn set_live(&mut self, name: &str, value: &str) {
        self.live.insert(name.to_string(), value.to_string());
    }
}

impl FieldSource for FieldValues {
    fn object_id(&self) -> &str {
        &self.id
    }

    fn live_value(&self, name: &str) -> Option<String> {
        self.live.get(name).cloned()
    }

    fn saved_value(&self, name: &str) -> Option<String> {
        self.saved.get(name).cloned()
    }

    fn is_new(&self) -> bool {
        self.new
    }
}
