//! Casting of raw token values into typed JSON values.

use crate::error::ArgError;
use crate::model::{ArgResult, Values};
use serde::Deserialize;
use serde_json::{Number, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Function turning a raw token into a typed value, `None` if it does not conform.
pub type CastFn = dyn Fn(&str) -> Option<Value> + Send + Sync;

/// Registry mapping type tags to cast functions.
#[derive(Clone)]
pub struct TypeRegistry {
    casters: HashMap<String, Arc<CastFn>>,
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut tags: Vec<&String> = self.casters.keys().collect();
        tags.sort();
        f.debug_struct("TypeRegistry").field("tags", &tags).finish()
    }
}

impl Default for TypeRegistry {
    /// The `string`, `number` and `bool` tags.
    fn default() -> Self {
        Self::empty()
            .with("string", |raw| Some(Value::String(raw.to_string())))
            .with("number", cast_number)
            .with("bool", cast_bool)
    }
}

impl TypeRegistry {
    /// A registry without any tags.
    pub fn empty() -> Self {
        Self {
            casters: HashMap::new(),
        }
    }

    /// Register (or replace) the cast function of a tag.
    pub fn with<F>(mut self, tag: &str, cast: F) -> Self
    where
        F: Fn(&str) -> Option<Value> + Send + Sync + 'static,
    {
        self.casters.insert(tag.to_string(), Arc::new(cast));
        self
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.casters.contains_key(tag)
    }

    /// Cast the scalar values of one result node.
    ///
    /// Values that fail to cast are kept as raw strings and reported.
    /// Flags, unclaimed tokens and subcommands are returned unchanged.
    pub fn cast(&self, mut arg: ArgResult, errs: &mut Vec<ArgError>) -> ArgResult {
        let (Some(opt), Some(types), Some(Values::Scalars(values))) =
            (&arg.opt, &arg.types, &mut arg.values)
        else {
            return arg;
        };

        for (value, ty) in values.iter_mut().zip(types) {
            let Value::String(raw) = value else {
                continue;
            };
            let Some(cast) = self.casters.get(ty) else {
                trace!(key = %opt.key, ty = %ty, "no caster registered, keeping raw value");
                continue;
            };
            match cast(raw) {
                Some(typed) => *value = typed,
                None => errs.push(ArgError::CastFailure {
                    key: opt.key.clone(),
                    value: raw.clone(),
                    ty: ty.clone(),
                }),
            }
        }

        arg
    }
}

/// Integers stay integers so they compare equal to integer JSON literals.
fn cast_number(raw: &str) -> Option<Value> {
    if let Ok(int) = raw.parse::<i64>() {
        return Some(Value::from(int));
    }
    if let Ok(uint) = raw.parse::<u64>() {
        return Some(Value::from(uint));
    }
    raw.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
}

fn cast_bool(raw: &str) -> Option<Value> {
    match raw {
        "true" => Some(Value::Bool(true)),
        "false" => Some(Value::Bool(false)),
        _ => None,
    }
}

/// Alternative spellings of booleans, rewritten to `"true"` and `"false"`
/// before casting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BoolAliases {
    #[serde(default, rename = "true")]
    pub truthy: Vec<String>,
    #[serde(default, rename = "false")]
    pub falsy: Vec<String>,
}

/// Type tag affected by [`BoolAliases`].
const BOOL_TYPE: &str = "bool";

impl BoolAliases {
    pub fn new(truthy: &[&str], falsy: &[&str]) -> Self {
        Self {
            truthy: truthy.iter().map(|s| s.to_string()).collect(),
            falsy: falsy.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Rewrite the `bool`-typed values and default values of one result node.
    pub fn broaden(&self, mut arg: ArgResult) -> ArgResult {
        let Some(types) = arg.types.clone() else {
            return arg;
        };

        if let Some(Values::Scalars(values)) = &mut arg.values {
            self.rewrite(values, &types);
        }
        if let Some(defaults) = arg.opt.as_mut().and_then(|opt| opt.default_values.as_mut()) {
            self.rewrite(defaults, &types);
        }
        arg
    }

    fn rewrite(&self, values: &mut [Value], types: &[String]) {
        for (value, ty) in values.iter_mut().zip(types) {
            if ty != BOOL_TYPE {
                continue;
            }
            let Value::String(raw) = value else {
                continue;
            };
            if self.truthy.contains(raw) {
                *value = Value::String("true".to_string());
            } else if self.falsy.contains(raw) {
                *value = Value::String("false".to_string());
            }
        }
    }
}
