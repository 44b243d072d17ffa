//! argtree - declarative, tree-shaped command-line argument parsing.
//!
//! This library verifies an option tree (commands, flags, typed options,
//! positional arguments and subcommands), matches argument tokens against
//! it, casts the matched values and validates them. Errors are collected
//! rather than raised, so one bad option never hides problems with another.

pub mod cast;
pub mod error;
pub mod matcher;
pub mod model;
pub mod parser;
pub mod spec;
pub mod validate;
pub mod verify;

pub use cast::{BoolAliases, TypeRegistry};
pub use error::{ArgError, ErrorCode};
pub use matcher::{match_argv, match_level, Dispatch, Matched, MatchedLevel};
pub use model::{ArgResult, Command, Opt, OptKind, Values};
pub use parser::{parse_args, Input, Parsed, Parser, Settings, SettingsError};
pub use spec::{Field, OptionSpec, SpecError};
pub use validate::RuleRegistry;
pub use verify::{verify, Verified};
