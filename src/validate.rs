//! Semantic validation of cast result nodes: allow-lists, contradictions and rules.

use crate::error::ArgError;
use crate::model::{ArgResult, OptKind};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Predicate over a node and all of its siblings (the node included).
pub type RuleFn = dyn Fn(&ArgResult, &[ArgResult]) -> bool + Send + Sync;

/// Registry of named rules that `rules` fields refer to.
#[derive(Clone, Default)]
pub struct RuleRegistry {
    rules: HashMap<String, Arc<RuleFn>>,
}

impl fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.rules.keys().collect();
        names.sort();
        f.debug_struct("RuleRegistry").field("names", &names).finish()
    }
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a named rule.
    pub fn with<F>(mut self, name: &str, rule: F) -> Self
    where
        F: Fn(&ArgResult, &[ArgResult]) -> bool + Send + Sync + 'static,
    {
        self.rules.insert(name.to_string(), Arc::new(rule));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.rules.contains_key(name)
    }

    /// Run every check over one level of siblings.
    ///
    /// Checks run one after another (`only`, `contradicts`, `rules`), each
    /// over all siblings in order. Values are never changed.
    pub fn validate(&self, siblings: &[ArgResult], errs: &mut Vec<ArgError>) {
        check_only(siblings, errs);
        check_contradicts(siblings, errs);
        self.check_rules(siblings, errs);
    }

    fn check_rules(&self, siblings: &[ArgResult], errs: &mut Vec<ArgError>) {
        for arg in siblings {
            let Some(opt) = &arg.opt else { continue };
            let Some(rules) = &opt.rules else { continue };

            let rule = match rules {
                Value::String(name) => self.rules.get(name).map(|rule| (name, rule)),
                _ => None,
            };
            match rule {
                Some((name, rule)) => {
                    if !rule(arg, siblings) {
                        errs.push(ArgError::FalseRules {
                            key: opt.key.clone(),
                            rule: name.clone(),
                        });
                    }
                }
                None => errs.push(ArgError::WrongRulesType {
                    key: opt.key.clone(),
                    found: rules.clone(),
                }),
            }
        }
    }
}

/// Report every cast value missing from its node's allow-list.
pub fn check_only(siblings: &[ArgResult], errs: &mut Vec<ArgError>) {
    for arg in siblings {
        let Some(opt) = &arg.opt else { continue };
        let Some(only) = &opt.only else { continue };
        if matches!(opt.kind, OptKind::Flag { .. }) {
            continue;
        }
        let Some(values) = arg.scalars() else { continue };

        for value in values.iter().filter(|value| !only.contains(value)) {
            errs.push(ArgError::NotAllowedValue {
                key: opt.key.clone(),
                value: value.clone(),
                only: only.clone(),
            });
        }
    }
}

/// Report nodes that will have values alongside a sibling they contradict.
///
/// Only nodes that will have values themselves are checked, so a malformed
/// `contradicts` on an unused option goes unnoticed.
pub fn check_contradicts(siblings: &[ArgResult], errs: &mut Vec<ArgError>) {
    for (index, arg) in siblings.iter().enumerate() {
        let Some(opt) = &arg.opt else { continue };
        let Some(contradicts) = &opt.contradicts else { continue };
        if !arg.will_have_values() {
            continue;
        }

        let Some(keys) = contradicted_keys(contradicts) else {
            errs.push(ArgError::WrongContradictsType {
                key: opt.key.clone(),
                found: contradicts.clone(),
            });
            continue;
        };

        let mut conflicts: Vec<String> = Vec::new();
        for (other_index, other) in siblings.iter().enumerate() {
            let Some(other_key) = other.key() else { continue };
            if other_index == index || !keys.contains(&other_key) || !other.will_have_values() {
                continue;
            }
            if !conflicts.iter().any(|key| key == other_key) {
                conflicts.push(other_key.to_string());
            }
        }

        if !conflicts.is_empty() {
            errs.push(ArgError::ContradictionDetected {
                key: opt.key.clone(),
                conflicts,
            });
        }
    }
}

fn contradicted_keys(contradicts: &Value) -> Option<Vec<&str>> {
    contradicts
        .as_array()?
        .iter()
        .map(Value::as_str)
        .collect::<Option<Vec<_>>>()
}
