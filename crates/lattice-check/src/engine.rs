//! The field check engine.
//!
//! Every check evaluates `incorrect` over all declared fields. A check
//! triggered by an edit to one field re-validates that field and reuses
//! the cached verdict of every other field whose value, and the values
//! its rules read, have not moved since it was last validated. A full
//! check re-validates everything and refreshes the cache.
//!
//! ```text
//! cache: (object id, field) ─▶ { value, rule inputs, verdict }
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use lattice_core::params::parse_bool;
use lattice_core::{ParamMeta, ParamProvider, ParamType, Score};
use parking_lot::Mutex;
use tracing::debug;

use crate::check::{Check, Violation};
use crate::source::FieldSource;

/// Business-rule validator for one field. Gets the value under test and
/// the whole source, so rules can relate fields to each other.
pub type Rule = Arc<dyn Fn(&str, &dyn FieldSource) -> Result<(), String> + Send + Sync>;

struct RuleEntry {
    /// Other fields the rule looks at.
    reads: Vec<String>,
    rule: Rule,
}

#[derive(Debug, Clone)]
struct CachedVerdict {
    value: String,
    inputs: Vec<String>,
    violation: Option<Violation>,
}

type CacheKey = (String, String);

pub struct FieldCheckEngine {
    catalog: Arc<dyn ParamProvider>,
    rules: HashMap<String, Vec<RuleEntry>>,
    cache: Mutex<HashMap<CacheKey, CachedVerdict>>,
}

impl FieldCheckEngine {
    pub fn new(catalog: Arc<dyn ParamProvider>) -> Self {
        Self {
            catalog,
            rules: HashMap::new(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Register a business rule for `field` that looks at `field` only.
    /// Rules run after the built-in validators pass, in registration order.
    pub fn add_rule(&mut self, field: &str, rule: Rule) {
        self.add_rule_reading(field, &[], rule);
    }

    /// Register a business rule for `field` that also reads `reads`.
    /// A cached verdict for `field` is dropped when any of them moves.
    pub fn add_rule_reading(&mut self, field: &str, reads: &[&str], rule: Rule) {
        self.rules.entry(field.to_string()).or_default().push(RuleEntry {
            reads: reads.iter().map(|r| r.to_string()).collect(),
            rule,
        });
    }

    pub fn with_rule<F>(self, field: &str, rule: F) -> Self
    where
        F: Fn(&str, &dyn FieldSource) -> Result<(), String> + Send + Sync + 'static,
    {
        self.with_rule_reading(field, &[], rule)
    }

    pub fn with_rule_reading<F>(mut self, field: &str, reads: &[&str], rule: F) -> Self
    where
        F: Fn(&str, &dyn FieldSource) -> Result<(), String> + Send + Sync + 'static,
    {
        self.add_rule_reading(field, reads, Arc::new(rule));
        self
    }

    pub fn catalog(&self) -> &dyn ParamProvider {
        self.catalog.as_ref()
    }

    /// Check every field, re-validating all of them.
    pub fn check(&self, source: &dyn FieldSource) -> Check {
        self.run(source, None)
    }

    /// Check every field after an edit to `touched`.
    ///
    /// `touched` is always re-validated; other fields reuse their cached
    /// verdict when neither their value nor any value their rules read
    /// has changed since it was computed.
    pub fn check_touched(&self, source: &dyn FieldSource, touched: &str) -> Check {
        self.run(source, Some(touched))
    }

    /// Drop every cached verdict.
    pub fn clear_cache(&self) {
        self.cache.lock().clear();
    }

    /// Drop the cached verdicts of `object_id` and of every object scoped
    /// under it (`object_id/…`).
    pub fn forget(&self, object_id: &str) {
        let scoped = format!("{object_id}/");
        self.cache
            .lock()
            .retain(|(object, _), _| object != object_id && !object.starts_with(&scoped));
    }

    fn run(&self, source: &dyn FieldSource, touched: Option<&str>) -> Check {
        let mut check = Check::new(source.is_new());
        let mut reused = 0usize;
        let names = self.catalog.param_names();
        let object = source.object_id();

        for name in &names {
            let Some(meta) = self.catalog.param(name) else { continue };
            let live = self.live_value(name, source);
            let inputs = self.rule_inputs(name, source);
            let key = (object.to_string(), name.to_string());

            let cached = match touched {
                Some(t) if t != *name => self
                    .cache
                    .lock()
                    .get(&key)
                    .filter(|c| c.value == live && c.inputs == inputs)
                    .map(|c| c.violation.clone()),
                _ => None,
            };
            let violation = match cached {
                Some(v) => {
                    reused += 1;
                    v
                }
                None => {
                    let v = self.validate(meta, &live, source);
                    self.cache.lock().insert(
                        key,
                        CachedVerdict {
                            value: live.clone(),
                            inputs,
                            violation: v.clone(),
                        },
                    );
                    v
                }
            };
            if let Some(v) = violation {
                check.add_incorrect(name, v);
            }

            let fallback = meta.default.clone().unwrap_or_default();
            let saved = source.saved_value(name).unwrap_or(fallback);
            if !meta.same_value(&live, &saved) {
                check.add_changed(name, &saved, &live);
            }
        }

        debug!(
            object,
            fields = names.len(),
            reused,
            incorrect = check.incorrect.len(),
            changed = check.changed.len(),
            touched = ?touched,
            "fields checked"
        );
        check
    }

    /// Live value of `name`, falling back to its default.
    fn live_value(&self, name: &str, source: &dyn FieldSource) -> String {
        source
            .live_value(name)
            .or_else(|| self.catalog.default_value(name).map(str::to_string))
            .unwrap_or_default()
    }

    /// Current values of every field the rules of `name` read.
    fn rule_inputs(&self, name: &str, source: &dyn FieldSource) -> Vec<String> {
        self.rules
            .get(name)
            .into_iter()
            .flatten()
            .flat_map(|entry| entry.reads.iter())
            .map(|read| self.live_value(read, source))
            .collect()
    }

    /// Run every validator for one value, uncached.
    pub fn validate_field(&self, name: &str, value: &str, source: &dyn FieldSource) -> Option<Violation> {
        let meta = self.catalog.param(name)?;
        self.validate(meta, value, source)
    }

    fn validate(&self, meta: &ParamMeta, value: &str, source: &dyn FieldSource) -> Option<Violation> {
        let value = value.trim();
        if value.is_empty() {
            if meta.required {
                return Some(Violation::Required);
            }
        } else if let Some(v) = builtin_violation(meta, value) {
            return Some(v);
        }

        self.rules
            .get(&meta.name)
            .into_iter()
            .flatten()
            .find_map(|entry| (entry.rule)(value, source).err())
            .map(Violation::Rule)
    }
}

fn builtin_violation(meta: &ParamMeta, value: &str) -> Option<Violation> {
    match meta.param_type {
        ParamType::Integer if value.parse::<i64>().is_err() => {
            return Some(Violation::NotInteger(value.to_string()));
        }
        ParamType::Boolean if parse_bool(value).is_none() => {
            return Some(Violation::NotBoolean(value.to_string()));
        }
        ParamType::Score => {
            if let Err(err) = Score::parse(value) {
                return Some(err.into());
            }
        }
        _ => {}
    }
    if let Some(regexp) = &meta.regexp {
        if !regexp.is_match(value) {
            return Some(Violation::Pattern {
                pattern: regexp.as_str().to_string(),
            });
        }
    }
    if meta.strict_choices && !meta.choices.iter().any(|c| meta.same_value(c, value)) {
        return Some(Violation::NotAChoice);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::FieldValues;
    use lattice_core::ParamCatalog;

    fn engine() -> FieldCheckEngine {
        let catalog = ParamCatalog::new()
            .with(ParamMeta::new("name").required())
            .with(ParamMeta::new("port").with_type(ParamType::Integer).with_default("7788"))
            .with(ParamMeta::new("score").with_type(ParamType::Score))
            .with(ParamMeta::new("protocol").with_default("C").with_choices(["A", "B", "C"], true))
            .with(
                ParamMeta::new("device")
                    .with_regexp("/dev/drbd[0-9]+")
                    .unwrap(),
            );
        FieldCheckEngine::new(Arc::new(catalog))
    }

    #[test]
    fn clean_committed_values_are_unchanged() {
        let values = FieldValues::new()
            .with_live("name", "r0")
            .with_saved("name", "r0");
        let check = engine().check(&values);
        assert!(check.is_correct(), "{check:?}");
        assert!(!check.has_changes());
    }

    #[test]
    fn missing_required_is_incorrect() {
        let check = engine().check(&FieldValues::new().as_new());
        assert_eq!(check.incorrect, vec!["name".to_string()]);
        assert_eq!(check.violation("name"), Some(&Violation::Required));
        assert!(!check.can_commit());
    }

    #[test]
    fn type_regexp_and_choice_violations() {
        let values = FieldValues::new()
            .with_live("name", "r0")
            .with_live("port", "77x")
            .with_live("score", "lots")
            .with_live("protocol", "D")
            .with_live("device", "/dev/sdb");
        let check = engine().check(&values);
        assert_eq!(check.incorrect, vec!["port", "score", "protocol", "device"]);
        assert!(matches!(check.violation("score"), Some(Violation::InvalidScore(_))));
        assert!(matches!(check.violation("device"), Some(Violation::Pattern { .. })));
    }

    #[test]
    fn change_compares_against_saved_then_default() {
        let values = FieldValues::new()
            .with_live("name", "r0")
            .with_saved("name", "r0")
            .with_live("port", "7789")
            .with_live("score", "inf")
            .with_saved("score", "INFINITY");
        let check = engine().check(&values);
        assert_eq!(check.changed.len(), 1);
        assert_eq!(check.changed[0].name, "port");
        assert_eq!(check.changed[0].old, "7788");
        assert_eq!(check.changed[0].new, "7789");
    }

    #[test]
    fn business_rule_runs_after_builtins() {
        let engine = engine().with_rule("port", |value, _| match value.parse::<u16>() {
            Ok(p) if p >= 1024 => Ok(()),
            _ => Err("port must be unprivileged".to_string()),
        });
        let values = FieldValues::new().with_live("name", "r0").with_live("port", "80");
        let check = engine.check(&values);
        assert_eq!(
            check.violation("port"),
            Some(&Violation::Rule("port must be unprivileged".into()))
        );
    }

    #[test]
    fn validate_field_ignores_undeclared() {
        let values = FieldValues::new();
        assert_eq!(engine().validate_field("nope", "x", &values), None);
        assert_eq!(
            engine().validate_field("port", "x", &values),
            Some(Violation::NotInteger("x".into()))
        );
    }
}
