//! Structural verification of option trees.
//!
//! Invalid children are pruned and reported; their valid siblings are kept.

use crate::error::ArgError;
use crate::model::{Command, Opt, OptKind};
use crate::spec::{Field, OptionSpec};
use tracing::debug;

/// Outcome of verifying a specification.
#[derive(Debug, Clone, PartialEq)]
pub struct Verified {
    pub errs: Vec<ArgError>,
    /// The verified tree; `None` if the root itself is malformed.
    pub command: Option<Command>,
}

impl Verified {
    /// Verified children of the root, empty for a malformed root.
    pub fn opts(&self) -> &[Opt] {
        self.command
            .as_ref()
            .map(Command::children)
            .unwrap_or_default()
    }
}

/// Verify a root command and all of its descendants.
///
/// A root missing its `key` or `opts` is reported but kept as given, so
/// verifying the returned tree again yields the same result.
pub fn verify(spec: &OptionSpec) -> Verified {
    let node = spec.snapshot();
    let mut errs = Vec::new();
    let mut own = Vec::new();
    let mut expected = false;

    let key = match &spec.key {
        Field::Absent => {
            expected = true;
            None
        }
        Field::Present(key) if is_valid_key(key) => Some(key.clone()),
        _ => {
            own.push(ArgError::InvalidKey { node: node.clone() });
            None
        }
    };

    let children = match &spec.opts {
        Field::Absent => {
            expected = true;
            None
        }
        Field::Present(children) => Some(children.as_slice()),
        _ => {
            own.push(ArgError::InvalidOpts { node: node.clone() });
            None
        }
    };

    if expected || !own.is_empty() {
        errs.push(ArgError::CommandExpected { node });
    }

    if !own.is_empty() {
        errs.extend(own);
        debug!(errors = errs.len(), "rejected malformed command");
        return Verified {
            errs,
            command: None,
        };
    }

    let opts = children.map(|children| verify_children(children, &mut errs));

    debug!(
        key = ?key,
        opts = opts.as_ref().map_or(0, Vec::len),
        errors = errs.len(),
        "verified command"
    );

    Verified {
        errs,
        command: Some(Command {
            key,
            opts,
            desc: spec.desc.clone(),
        }),
    }
}

/// Verify siblings, hoisting their errors and dropping the invalid ones.
fn verify_children(children: &[OptionSpec], errs: &mut Vec<ArgError>) -> Vec<Opt> {
    let mut opts = Vec::with_capacity(children.len());
    for child in children {
        match verify_child(child, errs) {
            Some(opt) => opts.push(opt),
            None => debug!(node = %child.snapshot(), "pruned invalid option"),
        }
    }
    opts
}

fn verify_child(spec: &OptionSpec, errs: &mut Vec<ArgError>) -> Option<Opt> {
    if !spec.opts.is_absent() {
        if has_triggers(&spec.args) {
            verify_subcommand(spec, errs)
        } else {
            errs.push(ArgError::InvalidNestedCommand {
                node: spec.snapshot(),
            });
            None
        }
    } else if has_triggers(&spec.args) {
        verify_option(spec, errs)
    } else if !spec.key.is_absent() || !spec.types.is_absent() {
        verify_positional(spec, errs)
    } else {
        errs.push(ArgError::UnknownCommandLineOptionType {
            node: spec.snapshot(),
        });
        None
    }
}

fn verify_subcommand(spec: &OptionSpec, errs: &mut Vec<ArgError>) -> Option<Opt> {
    let node = spec.snapshot();
    let mut own = Vec::new();

    let key = checked_key(spec, &node, &mut own);
    let args = checked_args(spec, &node, &mut own);
    let children = match &spec.opts {
        Field::Present(children) => Some(children),
        _ => {
            own.push(ArgError::InvalidOpts { node: node.clone() });
            None
        }
    };

    match (key, args, children) {
        (Some(key), Some(args), Some(children)) if own.is_empty() => {
            let opts = verify_children(children, errs);
            Some(with_constraints(
                Opt::new(&key, OptKind::Subcommand { args, opts }),
                spec,
            ))
        }
        _ => {
            errs.push(ArgError::SubcommandExpected { node });
            errs.extend(own);
            None
        }
    }
}

fn verify_option(spec: &OptionSpec, errs: &mut Vec<ArgError>) -> Option<Opt> {
    let node = spec.snapshot();
    let mut own = Vec::new();

    let key = checked_key(spec, &node, &mut own);
    let args = checked_args(spec, &node, &mut own);
    let types = match &spec.types {
        Field::Absent => Some(None),
        Field::Present(types) => Some(Some(types.clone())),
        Field::Null | Field::Malformed(_) => {
            own.push(ArgError::InvalidTypes { node: node.clone() });
            None
        }
    };

    match (key, args, types) {
        (Some(key), Some(args), Some(types)) if own.is_empty() => {
            let kind = match types {
                None => OptKind::Variadic { args },
                Some(types) if types.is_empty() => OptKind::Flag { args },
                Some(mut types) if types.len() == 1 => OptKind::Primitive {
                    args,
                    ty: types.remove(0),
                },
                Some(types) => OptKind::Array { args, types },
            };
            Some(with_constraints(Opt::new(&key, kind), spec))
        }
        _ => {
            errs.push(ArgError::OptionExpected { node });
            errs.extend(own);
            None
        }
    }
}

fn verify_positional(spec: &OptionSpec, errs: &mut Vec<ArgError>) -> Option<Opt> {
    let node = spec.snapshot();
    let mut own = Vec::new();

    let key = checked_key(spec, &node, &mut own);
    let types = match &spec.types {
        Field::Absent => Some(None),
        Field::Present(types) if !types.is_empty() => Some(Some(types.clone())),
        _ => {
            own.push(ArgError::InvalidTypes { node: node.clone() });
            None
        }
    };

    match (key, types) {
        (Some(key), Some(types)) if own.is_empty() => Some(with_constraints(
            Opt::new(&key, OptKind::Positional { types }),
            spec,
        )),
        _ => {
            errs.push(ArgError::PosArgExpected { node });
            errs.extend(own);
            None
        }
    }
}

fn checked_key(
    spec: &OptionSpec,
    node: &serde_json::Value,
    own: &mut Vec<ArgError>,
) -> Option<String> {
    match &spec.key {
        Field::Present(key) if is_valid_key(key) => Some(key.clone()),
        _ => {
            own.push(ArgError::InvalidKey { node: node.clone() });
            None
        }
    }
}

fn checked_args(
    spec: &OptionSpec,
    node: &serde_json::Value,
    own: &mut Vec<ArgError>,
) -> Option<Vec<String>> {
    match &spec.args {
        Field::Present(args) if !args.is_empty() && args.iter().all(|a| is_valid_token(a)) => {
            Some(args.clone())
        }
        _ => {
            own.push(ArgError::InvalidArgs { node: node.clone() });
            None
        }
    }
}

fn with_constraints(mut opt: Opt, spec: &OptionSpec) -> Opt {
    opt.only = spec.only.clone();
    opt.rules = spec.rules.clone();
    opt.contradicts = spec.contradicts.clone();
    opt.default_values = spec.default_values.clone();
    opt.desc = spec.desc.clone();
    opt
}

/// `args` counts as given unless it is missing or an empty list.
fn has_triggers(args: &Field<Vec<String>>) -> bool {
    match args {
        Field::Absent => false,
        Field::Present(args) => !args.is_empty(),
        Field::Null | Field::Malformed(_) => true,
    }
}

fn is_valid_key(key: &str) -> bool {
    is_valid_token(key)
}

fn is_valid_token(token: &str) -> bool {
    !token.is_empty() && !token.chars().any(char::is_whitespace)
}
