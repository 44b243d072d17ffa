//! The parsing pipeline: verify, match, then cast and validate level by level.

use crate::cast::{BoolAliases, TypeRegistry};
use crate::error::ArgError;
use crate::matcher::{match_level, Dispatch, MatchedLevel};
use crate::model::{ArgResult, Command, Opt, Values};
use crate::spec::OptionSpec;
use crate::validate::RuleRegistry;
use crate::verify::{verify, Verified};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, debug_span};

/// Errors that can occur while reading parser settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to parse JSON settings: {0}")]
    ParseError(#[from] serde_json::Error),
}

/// Behaviour switches of a [`Parser`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Report unclaimed tokens as `UnknownOption` errors
    #[serde(default)]
    pub strict: bool,
    /// Alternative spellings of `true` and `false` for `bool` values
    #[serde(default)]
    pub bool_aliases: Option<BoolAliases>,
}

impl Settings {
    /// Parse a JSON string into Settings.
    pub fn from_json(json: &str) -> Result<Settings, SettingsError> {
        let settings: Settings = serde_json::from_str(json)?;
        Ok(settings)
    }
}

/// Tokens to parse, along with errors collected before parsing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Input {
    pub errs: Vec<ArgError>,
    pub argv: Vec<String>,
}

impl Input {
    pub fn new(argv: Vec<String>) -> Self {
        Self {
            errs: Vec::new(),
            argv,
        }
    }

    /// The arguments of the current process, without the program name.
    pub fn from_env() -> Self {
        Self::new(std::env::args().skip(1).collect())
    }
}

impl From<Vec<String>> for Input {
    fn from(argv: Vec<String>) -> Self {
        Self::new(argv)
    }
}

impl From<&[String]> for Input {
    fn from(argv: &[String]) -> Self {
        Self::new(argv.to_vec())
    }
}

/// Outcome of a parse: every error found, and the result tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Parsed {
    pub errs: Vec<ArgError>,
    pub args: Vec<ArgResult>,
}

impl Parsed {
    pub fn is_ok(&self) -> bool {
        self.errs.is_empty()
    }
}

/// A reusable parser holding type casters, rules and settings.
///
/// Parsing is a pure function of the specification and the tokens; a
/// parser can be shared between threads.
#[derive(Debug, Clone, Default)]
pub struct Parser {
    types: TypeRegistry,
    rules: RuleRegistry,
    settings: Settings,
}

impl Parser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Register a cast function for a type tag.
    pub fn with_type<F>(mut self, tag: &str, cast: F) -> Self
    where
        F: Fn(&str) -> Option<Value> + Send + Sync + 'static,
    {
        self.types = self.types.with(tag, cast);
        self
    }

    /// Register a rule that `rules` fields can name.
    pub fn with_rule<F>(mut self, name: &str, rule: F) -> Self
    where
        F: Fn(&ArgResult, &[ArgResult]) -> bool + Send + Sync + 'static,
    {
        self.rules = self.rules.with(name, rule);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Parse tokens against a specification.
    ///
    /// Errors come in this order: input errors, verification errors, then
    /// level by level (a command before its subcommand) the matching,
    /// casting and validation errors of that level, then unknown options
    /// in strict mode.
    pub fn parse(&self, spec: &OptionSpec, input: impl Into<Input>) -> Parsed {
        let Input { mut errs, argv } = input.into();

        let Verified {
            errs: verify_errs,
            command,
        } = verify(spec);
        let span = debug_span!(
            "parse",
            command = ?command.as_ref().and_then(|command| command.key.as_deref()),
            tokens = argv.len()
        );
        let _guard = span.enter();
        errs.extend(verify_errs);

        let opts = command.as_ref().map(Command::children).unwrap_or_default();
        let args = self.process_level(opts, &argv, &mut errs);

        if self.settings.strict {
            report_unclaimed(&args, &mut errs);
        }

        debug!(errors = errs.len(), "parsed arguments");
        Parsed { errs, args }
    }

    /// Match, cast and validate one level, descending into a triggered
    /// subcommand. The subcommand's errors follow this level's.
    fn process_level(
        &self,
        opts: &[Opt],
        argv: &[String],
        errs: &mut Vec<ArgError>,
    ) -> Vec<ArgResult> {
        let MatchedLevel {
            errs: match_errs,
            opts: mut level,
            dispatch,
        } = match_level(opts, argv);
        errs.extend(match_errs);

        let mut nested_errs = Vec::new();
        if let Some(Dispatch { index, argv }) = dispatch {
            if let Some(sub) = level.get_mut(index) {
                let children = sub.opt.as_ref().map(Opt::children).unwrap_or_default();
                let nested = self.process_level(children, &argv, &mut nested_errs);
                sub.values = Some(Values::Nested(nested));
            }
        }

        let level: Vec<ArgResult> = level
            .into_iter()
            .map(|arg| match &self.settings.bool_aliases {
                Some(aliases) => aliases.broaden(arg),
                None => arg,
            })
            .map(|arg| self.types.cast(arg, errs))
            .collect();

        self.rules.validate(&level, errs);
        errs.extend(nested_errs);

        level
    }
}

/// Parse with the default casters, no rules and default settings.
pub fn parse_args(spec: &OptionSpec, argv: &[String]) -> Parsed {
    Parser::default().parse(spec, argv)
}

fn report_unclaimed(args: &[ArgResult], errs: &mut Vec<ArgError>) {
    for arg in args {
        if arg.is_unclaimed() {
            for value in arg.scalars().unwrap_or_default() {
                errs.push(ArgError::UnknownOption {
                    token: value.as_str().map_or_else(|| value.to_string(), str::to_string),
                });
            }
        } else if let Some(nested) = arg.nested() {
            report_unclaimed(nested, errs);
        }
    }
}
