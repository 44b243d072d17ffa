//! Option-tree specifications as authored, before verification.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;

/// Errors that can occur while reading a specification.
#[derive(Debug, Error)]
pub enum SpecError {
    #[error("failed to parse JSON spec: {0}")]
    ParseError(#[from] serde_json::Error),
}

/// A structural field that may be missing, `null`, of the wrong shape, or valid.
///
/// The verifier treats "absent" and "null" differently, so a plain
/// `Option<T>` is not enough here.
#[derive(Debug, Clone, PartialEq)]
pub enum Field<T> {
    /// The field was not given at all.
    Absent,
    /// The field was given as `null`.
    Null,
    /// The field was given but could not be read as `T`.
    Malformed(Value),
    /// The field holds a well-typed value.
    Present(T),
}

impl<T> Default for Field<T> {
    fn default() -> Self {
        Field::Absent
    }
}

impl<T> Field<T> {
    pub fn is_absent(&self) -> bool {
        matches!(self, Field::Absent)
    }

    pub fn present(&self) -> Option<&T> {
        match self {
            Field::Present(value) => Some(value),
            _ => None,
        }
    }
}

impl<T> From<T> for Field<T> {
    fn from(value: T) -> Self {
        Field::Present(value)
    }
}

impl<'de, T> Deserialize<'de> for Field<T>
where
    T: DeserializeOwned,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // Missing fields never reach this point: `#[serde(default)]` yields `Absent`.
        let value = Value::deserialize(deserializer)?;
        if value.is_null() {
            return Ok(Field::Null);
        }
        match serde_json::from_value::<T>(value.clone()) {
            Ok(parsed) => Ok(Field::Present(parsed)),
            Err(_) => Ok(Field::Malformed(value)),
        }
    }
}

impl<T> Serialize for Field<T>
where
    T: Serialize,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Field::Absent | Field::Null => serializer.serialize_none(),
            Field::Malformed(value) => value.serialize(serializer),
            Field::Present(value) => value.serialize(serializer),
        }
    }
}

/// One node of an authored option tree.
///
/// The shape of the node decides what it is:
/// - `opts` given: a command (root) or subcommand (child with `args`)
/// - `args` given: a named option; `types: []` is a flag, no `types` is variadic
/// - neither: a positional argument
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptionSpec {
    /// Identifier of the node
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub key: Field<String>,
    /// Trigger tokens (e.g. `-a`, `--answer`)
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub args: Field<Vec<String>>,
    /// Type tags of the values following a trigger
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub types: Field<Vec<String>>,
    /// Children of a command or subcommand
    #[serde(default, skip_serializing_if = "Field::is_absent")]
    pub opts: Field<Vec<OptionSpec>>,
    /// Allow-list of cast values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub only: Option<Vec<Value>>,
    /// Name of a registered rule
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules: Option<Value>,
    /// Keys of siblings that must not receive values alongside this one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contradicts: Option<Value>,
    /// Values the caller will fall back to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_values: Option<Vec<Value>>,
    /// Description, only used for presentation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desc: Option<String>,
}

impl OptionSpec {
    /// Parse a JSON string into an OptionSpec.
    pub fn from_json(json: &str) -> Result<OptionSpec, SpecError> {
        let spec: OptionSpec = serde_json::from_str(json)?;
        Ok(spec)
    }

    /// A top-level command holding `opts`.
    pub fn command(key: &str, opts: Vec<OptionSpec>) -> Self {
        Self {
            key: key.to_string().into(),
            opts: opts.into(),
            ..Self::default()
        }
    }

    /// A nested command triggered by one of `args`.
    pub fn subcommand(key: &str, args: &[&str], opts: Vec<OptionSpec>) -> Self {
        Self {
            args: to_strings(args).into(),
            ..Self::command(key, opts)
        }
    }

    pub fn flag(key: &str, args: &[&str]) -> Self {
        Self::option(key, args, &[])
    }

    /// A named option taking one value per entry in `types`.
    pub fn option(key: &str, args: &[&str], types: &[&str]) -> Self {
        Self {
            key: key.to_string().into(),
            args: to_strings(args).into(),
            types: to_strings(types).into(),
            ..Self::default()
        }
    }

    /// A named option taking every value up to the next trigger.
    pub fn variadic(key: &str, args: &[&str]) -> Self {
        Self {
            key: key.to_string().into(),
            args: to_strings(args).into(),
            ..Self::default()
        }
    }

    /// A positional argument; `None` makes it variadic.
    pub fn positional(key: &str, types: Option<&[&str]>) -> Self {
        Self {
            key: key.to_string().into(),
            types: types.map(to_strings).map(Field::Present).unwrap_or_default(),
            ..Self::default()
        }
    }

    pub fn with_only(mut self, only: Vec<Value>) -> Self {
        self.only = Some(only);
        self
    }

    pub fn with_rules(mut self, rule: &str) -> Self {
        self.rules = Some(Value::String(rule.to_string()));
        self
    }

    pub fn with_contradicts(mut self, keys: &[&str]) -> Self {
        self.contradicts = Some(Value::from(to_strings(keys)));
        self
    }

    pub fn with_default_values(mut self, values: Vec<Value>) -> Self {
        self.default_values = Some(values);
        self
    }

    pub fn with_desc(mut self, desc: &str) -> Self {
        self.desc = Some(desc.to_string());
        self
    }

    /// JSON snapshot of this node, used as diagnostic info in errors.
    pub(crate) fn snapshot(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
