//! Errors accumulated while verifying specifications and parsing arguments.

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use serde_json::{json, Value};
use std::fmt;
use thiserror::Error;

/// Taxonomy tag of an [`ArgError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorCode {
    InvalidKey,
    InvalidArgs,
    InvalidOpts,
    InvalidTypes,
    CommandExpected,
    OptionExpected,
    PosArgExpected,
    SubcommandExpected,
    InvalidNestedCommand,
    UnknownCommandLineOptionType,
    MissingValue,
    CastFailure,
    NotAllowedValue,
    ContradictionDetected,
    WrongContradictsType,
    FalseRules,
    WrongRulesType,
    UnknownOption,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// An error recorded during a parse.
///
/// Errors are data: every stage appends to a shared list and keeps going.
/// Structural errors carry a JSON snapshot of the offending node.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ArgError {
    #[error("invalid key: must be a non-empty string without whitespace")]
    InvalidKey { node: Value },

    #[error("invalid args: must be a list of non-empty strings without whitespace")]
    InvalidArgs { node: Value },

    #[error("invalid opts: must be a list of options")]
    InvalidOpts { node: Value },

    #[error("invalid types: must be a list of type names")]
    InvalidTypes { node: Value },

    #[error("a command was expected")]
    CommandExpected { node: Value },

    #[error("an option was expected")]
    OptionExpected { node: Value },

    #[error("a positional argument was expected")]
    PosArgExpected { node: Value },

    #[error("a subcommand was expected")]
    SubcommandExpected { node: Value },

    #[error("nested commands must have args to be triggered by")]
    InvalidNestedCommand { node: Value },

    #[error("node is neither a command, an option nor a positional argument")]
    UnknownCommandLineOptionType { node: Value },

    #[error("{key} expects {expected} value(s) but got {found}")]
    MissingValue {
        key: String,
        expected: usize,
        found: usize,
    },

    #[error("cannot cast '{value}' of {key} to {ty}")]
    CastFailure {
        key: String,
        value: String,
        ty: String,
    },

    #[error("value {value} of {key} is not one of {}", json_list(.only))]
    NotAllowedValue {
        key: String,
        value: Value,
        only: Vec<Value>,
    },

    #[error("{key} cannot be combined with {}", comma_list(.conflicts))]
    ContradictionDetected { key: String, conflicts: Vec<String> },

    #[error("contradicts of {key} must be a list of keys, found {found}")]
    WrongContradictsType { key: String, found: Value },

    #[error("rule '{rule}' of {key} is not satisfied")]
    FalseRules { key: String, rule: String },

    #[error("rules of {key} must name a registered rule, found {found}")]
    WrongRulesType { key: String, found: Value },

    #[error("unknown option: {token}")]
    UnknownOption { token: String },
}

fn json_list(values: &[Value]) -> String {
    Value::from(values.to_vec()).to_string()
}

fn comma_list(keys: &[String]) -> String {
    keys.join(", ")
}

impl ArgError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ArgError::InvalidKey { .. } => ErrorCode::InvalidKey,
            ArgError::InvalidArgs { .. } => ErrorCode::InvalidArgs,
            ArgError::InvalidOpts { .. } => ErrorCode::InvalidOpts,
            ArgError::InvalidTypes { .. } => ErrorCode::InvalidTypes,
            ArgError::CommandExpected { .. } => ErrorCode::CommandExpected,
            ArgError::OptionExpected { .. } => ErrorCode::OptionExpected,
            ArgError::PosArgExpected { .. } => ErrorCode::PosArgExpected,
            ArgError::SubcommandExpected { .. } => ErrorCode::SubcommandExpected,
            ArgError::InvalidNestedCommand { .. } => ErrorCode::InvalidNestedCommand,
            ArgError::UnknownCommandLineOptionType { .. } => {
                ErrorCode::UnknownCommandLineOptionType
            }
            ArgError::MissingValue { .. } => ErrorCode::MissingValue,
            ArgError::CastFailure { .. } => ErrorCode::CastFailure,
            ArgError::NotAllowedValue { .. } => ErrorCode::NotAllowedValue,
            ArgError::ContradictionDetected { .. } => ErrorCode::ContradictionDetected,
            ArgError::WrongContradictsType { .. } => ErrorCode::WrongContradictsType,
            ArgError::FalseRules { .. } => ErrorCode::FalseRules,
            ArgError::WrongRulesType { .. } => ErrorCode::WrongRulesType,
            ArgError::UnknownOption { .. } => ErrorCode::UnknownOption,
        }
    }

    /// Diagnostic details of the error as a JSON object.
    pub fn info(&self) -> Value {
        match self {
            ArgError::InvalidKey { node }
            | ArgError::InvalidArgs { node }
            | ArgError::InvalidOpts { node }
            | ArgError::InvalidTypes { node }
            | ArgError::CommandExpected { node }
            | ArgError::OptionExpected { node }
            | ArgError::PosArgExpected { node }
            | ArgError::SubcommandExpected { node }
            | ArgError::InvalidNestedCommand { node }
            | ArgError::UnknownCommandLineOptionType { node } => json!({ "node": node }),
            ArgError::MissingValue {
                key,
                expected,
                found,
            } => json!({ "key": key, "expected": expected, "found": found }),
            ArgError::CastFailure { key, value, ty } => {
                json!({ "key": key, "value": value, "type": ty })
            }
            ArgError::NotAllowedValue { key, value, only } => {
                json!({ "key": key, "value": value, "only": only })
            }
            ArgError::ContradictionDetected { key, conflicts } => {
                json!({ "key": key, "contradicts": conflicts })
            }
            ArgError::WrongContradictsType { key, found }
            | ArgError::WrongRulesType { key, found } => json!({ "key": key, "found": found }),
            ArgError::FalseRules { key, rule } => json!({ "key": key, "rule": rule }),
            ArgError::UnknownOption { token } => json!({ "token": token }),
        }
    }
}

impl Serialize for ArgError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("ArgError", 3)?;
        state.serialize_field("code", &self.code())?;
        state.serialize_field("msg", &self.to_string())?;
        state.serialize_field("info", &self.info())?;
        state.end()
    }
}
