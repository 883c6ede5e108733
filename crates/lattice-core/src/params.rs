//! Parameter metadata.
//!
//! Every editable field of a resource or constraint is described by a
//! [`ParamMeta`]: its default, descriptions, whether it is required or
//! advanced, an optional regexp, a list of possible choices and the
//! access level needed to edit it. Renderers consult the default to
//! suppress unchanged values; the field checker consults the rest.

use std::collections::HashMap;

use regex::Regex;

use crate::error::{CoreError, CoreResult};
use crate::score::Score;

/// Value type of a parameter, used for type validation and comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParamType {
    #[default]
    String,
    Integer,
    Boolean,
    Score,
}

/// Minimum access level required to edit a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum AccessType {
    /// Editable by any operator.
    #[default]
    Operator,
    /// Editable by administrators only.
    Admin,
    /// Never editable.
    Never,
}

/// Metadata for a single parameter.
#[derive(Debug, Clone)]
pub struct ParamMeta {
    pub name: String,
    pub default: Option<String>,
    pub short_desc: String,
    pub long_desc: String,
    pub required: bool,
    pub advanced: bool,
    pub regexp: Option<Regex>,
    pub choices: Vec<String>,
    /// Only values from `choices` are accepted.
    pub strict_choices: bool,
    pub access: AccessType,
    pub param_type: ParamType,
    /// Sub-block this parameter renders into (e.g. `net`), if any.
    pub section: Option<String>,
}

impl ParamMeta {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            default: None,
            short_desc: name.to_string(),
            long_desc: String::new(),
            required: false,
            advanced: false,
            regexp: None,
            choices: Vec::new(),
            strict_choices: false,
            access: AccessType::default(),
            param_type: ParamType::default(),
            section: None,
        }
    }

    pub fn with_default(mut self, default: &str) -> Self {
        self.default = Some(default.to_string());
        self
    }

    pub fn with_desc(mut self, short: &str, long: &str) -> Self {
        self.short_desc = short.to_string();
        self.long_desc = long.to_string();
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn advanced(mut self) -> Self {
        self.advanced = true;
        self
    }

    pub fn with_type(mut self, param_type: ParamType) -> Self {
        self.param_type = param_type;
        self
    }

    pub fn with_access(mut self, access: AccessType) -> Self {
        self.access = access;
        self
    }

    pub fn in_section(mut self, section: &str) -> Self {
        self.section = Some(section.to_string());
        self
    }

    /// Offer `choices`; when `strict`, any other value is incorrect.
    pub fn with_choices<I, S>(mut self, choices: I, strict: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.choices = choices.into_iter().map(Into::into).collect();
        self.strict_choices = strict;
        self
    }

    /// Attach a regexp the whole value must match.
    pub fn with_regexp(mut self, pattern: &str) -> CoreResult<Self> {
        let anchored = format!("^(?:{pattern})$");
        let re = Regex::new(&anchored).map_err(|e| CoreError::InvalidPattern {
            name: self.name.clone(),
            reason: e.to_string(),
        })?;
        self.regexp = Some(re);
        Ok(self)
    }

    /// Whether two textual values mean the same thing for this parameter.
    ///
    /// Booleans compare by truth value (`yes` == `true`), scores by their
    /// parsed value (`inf` == `INFINITY`), everything else textually after
    /// trimming.
    pub fn same_value(&self, a: &str, b: &str) -> bool {
        let (a, b) = (a.trim(), b.trim());
        match self.param_type {
            ParamType::Boolean => match (parse_bool(a), parse_bool(b)) {
                (Some(x), Some(y)) => x == y,
                _ => a == b,
            },
            ParamType::Score => match (Score::parse(a), Score::parse(b)) {
                (Ok(x), Ok(y)) => x == y,
                _ => a == b,
            },
            ParamType::Integer => match (a.parse::<i64>(), b.parse::<i64>()) {
                (Ok(x), Ok(y)) => x == y,
                _ => a == b,
            },
            ParamType::String => a == b,
        }
    }

    /// Whether `value` equals this parameter's default.
    ///
    /// A parameter without a default treats the empty value as default.
    pub fn is_default(&self, value: &str) -> bool {
        match &self.default {
            Some(default) => self.same_value(value, default),
            None => value.trim().is_empty(),
        }
    }
}

/// Interpret common boolean spellings.
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

/// Read-only source of parameter metadata.
pub trait ParamProvider: Send + Sync {
    /// Metadata for `name`, if declared.
    fn param(&self, name: &str) -> Option<&ParamMeta>;

    /// Declared parameter names in declaration order.
    fn param_names(&self) -> Vec<&str>;

    fn default_value(&self, name: &str) -> Option<&str> {
        self.param(name).and_then(|p| p.default.as_deref())
    }
}

/// In-memory parameter catalog preserving declaration order.
#[derive(Debug, Clone, Default)]
pub struct ParamCatalog {
    params: Vec<ParamMeta>,
    index: HashMap<String, usize>,
}

impl ParamCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a parameter. Redeclaring a name replaces its metadata but
    /// keeps its original position.
    pub fn declare(&mut self, meta: ParamMeta) -> &mut Self {
        match self.index.get(&meta.name) {
            Some(&i) => self.params[i] = meta,
            None => {
                self.index.insert(meta.name.clone(), self.params.len());
                self.params.push(meta);
            }
        }
        self
    }

    pub fn with(mut self, meta: ParamMeta) -> Self {
        self.declare(meta);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParamMeta> {
        self.params.iter()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

impl ParamProvider for ParamCatalog {
    fn param(&self, name: &str) -> Option<&ParamMeta> {
        self.index.get(name).map(|&i| &self.params[i])
    }

    fn param_names(&self) -> Vec<&str> {
        self.params.iter().map(|p| p.name.as_str()).collect()
    }
}
