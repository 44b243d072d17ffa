//! Verified option trees and the result trees produced by parsing.

use crate::spec::{Field, OptionSpec};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use serde_json::Value;

/// Value recorded for a flag that was present.
pub const FLAG_PRESENT: u8 = 1;

/// Type tag assumed for values of variadic options and unclaimed tokens.
pub const INFERRED_TYPE: &str = "string";

/// The root of a verified option tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Command {
    /// `None` when the root has no key
    pub key: Option<String>,
    /// `None` when the root has no opts
    pub opts: Option<Vec<Opt>>,
    pub desc: Option<String>,
}

impl Command {
    pub fn children(&self) -> &[Opt] {
        self.opts.as_deref().unwrap_or_default()
    }
}

/// A verified child node.
#[derive(Debug, Clone, PartialEq)]
pub struct Opt {
    pub key: String,
    pub kind: OptKind,
    pub only: Option<Vec<Value>>,
    pub rules: Option<Value>,
    pub contradicts: Option<Value>,
    pub default_values: Option<Vec<Value>>,
    pub desc: Option<String>,
}

/// What a verified node is, with only the fields that shape needs.
#[derive(Debug, Clone, PartialEq)]
pub enum OptKind {
    /// Presence only (`types: []`)
    Flag { args: Vec<String> },
    /// One typed value
    Primitive { args: Vec<String>, ty: String },
    /// A fixed number (two or more) of typed values
    Array { args: Vec<String>, types: Vec<String> },
    /// Every value up to the next trigger
    Variadic { args: Vec<String> },
    /// Consumed by position; `None` takes every value up to the next trigger
    Positional { types: Option<Vec<String>> },
    /// A nested grammar taking over the remaining tokens
    Subcommand { args: Vec<String>, opts: Vec<Opt> },
}

impl OptKind {
    /// Short lowercase name of the shape.
    pub fn name(&self) -> &'static str {
        match self {
            OptKind::Flag { .. } => "flag",
            OptKind::Primitive { .. } => "primitive",
            OptKind::Array { .. } => "array",
            OptKind::Variadic { .. } => "variadic",
            OptKind::Positional { .. } => "positional",
            OptKind::Subcommand { .. } => "subcommand",
        }
    }
}

impl Opt {
    /// Build a node with no constraints attached.
    pub fn new(key: &str, kind: OptKind) -> Self {
        Self {
            key: key.to_string(),
            kind,
            only: None,
            rules: None,
            contradicts: None,
            default_values: None,
            desc: None,
        }
    }

    /// Trigger tokens; empty for positional arguments.
    pub fn args(&self) -> &[String] {
        match &self.kind {
            OptKind::Flag { args }
            | OptKind::Primitive { args, .. }
            | OptKind::Array { args, .. }
            | OptKind::Variadic { args }
            | OptKind::Subcommand { args, .. } => args,
            OptKind::Positional { .. } => &[],
        }
    }

    /// Children of a subcommand; empty for every other shape.
    pub fn children(&self) -> &[Opt] {
        match &self.kind {
            OptKind::Subcommand { opts, .. } => opts,
            _ => &[],
        }
    }

    pub fn is_positional(&self) -> bool {
        matches!(self.kind, OptKind::Positional { .. })
    }

    pub fn is_triggered_by(&self, token: &str) -> bool {
        self.args().iter().any(|arg| arg == token)
    }

    /// Declared types, `None` for variadics and subcommands.
    pub fn declared_types(&self) -> Option<Vec<String>> {
        match &self.kind {
            OptKind::Flag { .. } => Some(Vec::new()),
            OptKind::Primitive { ty, .. } => Some(vec![ty.clone()]),
            OptKind::Array { types, .. } => Some(types.clone()),
            OptKind::Positional { types } => types.clone(),
            OptKind::Variadic { .. } | OptKind::Subcommand { .. } => None,
        }
    }
}

impl From<&Opt> for OptionSpec {
    fn from(opt: &Opt) -> Self {
        let mut spec = OptionSpec {
            key: opt.key.clone().into(),
            only: opt.only.clone(),
            rules: opt.rules.clone(),
            contradicts: opt.contradicts.clone(),
            default_values: opt.default_values.clone(),
            desc: opt.desc.clone(),
            ..OptionSpec::default()
        };
        match &opt.kind {
            OptKind::Flag { args } => {
                spec.args = args.clone().into();
                spec.types = Field::Present(Vec::new());
            }
            OptKind::Primitive { args, ty } => {
                spec.args = args.clone().into();
                spec.types = vec![ty.clone()].into();
            }
            OptKind::Array { args, types } => {
                spec.args = args.clone().into();
                spec.types = types.clone().into();
            }
            OptKind::Variadic { args } => {
                spec.args = args.clone().into();
            }
            OptKind::Positional { types } => {
                if let Some(types) = types {
                    spec.types = types.clone().into();
                }
            }
            OptKind::Subcommand { args, opts } => {
                spec.args = args.clone().into();
                spec.opts = opts.iter().map(OptionSpec::from).collect::<Vec<_>>().into();
            }
        }
        spec
    }
}

impl From<&Command> for OptionSpec {
    fn from(command: &Command) -> Self {
        OptionSpec {
            key: command.key.clone().map_or(Field::Absent, Field::Present),
            opts: command.opts.as_ref().map_or(Field::Absent, |opts| {
                Field::Present(opts.iter().map(OptionSpec::from).collect())
            }),
            desc: command.desc.clone(),
            ..OptionSpec::default()
        }
    }
}

/// Values attached to a result node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Values {
    /// Raw tokens before casting, typed values after
    Scalars(Vec<Value>),
    /// Results of a subcommand's children
    Nested(Vec<ArgResult>),
}

/// One node of a result tree.
#[derive(Debug, Clone, PartialEq)]
pub struct ArgResult {
    /// The node that matched, `None` for an unclaimed token
    pub opt: Option<Opt>,
    /// Effective type tags of `values`
    pub types: Option<Vec<String>>,
    /// `None` when nothing matched this node
    pub values: Option<Values>,
}

impl ArgResult {
    /// A node echoed back without values.
    pub fn unmatched(opt: &Opt) -> Self {
        Self {
            opt: Some(opt.clone()),
            types: opt.declared_types(),
            values: None,
        }
    }

    /// A passthrough entry for a token no node claimed.
    pub fn unclaimed(token: &str) -> Self {
        Self {
            opt: None,
            types: None,
            values: Some(Values::Scalars(vec![Value::String(token.to_string())])),
        }
    }

    pub fn key(&self) -> Option<&str> {
        self.opt.as_ref().map(|opt| opt.key.as_str())
    }

    pub fn is_unclaimed(&self) -> bool {
        self.opt.is_none()
    }

    pub fn scalars(&self) -> Option<&[Value]> {
        match &self.values {
            Some(Values::Scalars(values)) => Some(values),
            _ => None,
        }
    }

    pub fn nested(&self) -> Option<&[ArgResult]> {
        match &self.values {
            Some(Values::Nested(results)) => Some(results),
            _ => None,
        }
    }

    /// Find a direct child of a subcommand result by key.
    pub fn child(&self, key: &str) -> Option<&ArgResult> {
        self.nested()?.iter().find(|arg| arg.key() == Some(key))
    }

    /// Whether this node matched values or carries defaults.
    pub fn will_have_values(&self) -> bool {
        self.values.is_some()
            || self
                .opt
                .as_ref()
                .is_some_and(|opt| opt.default_values.is_some())
    }
}

impl Serialize for ArgResult {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(None)?;
        if let Some(opt) = &self.opt {
            map.serialize_entry("key", &opt.key)?;
            map.serialize_entry("kind", opt.kind.name())?;
            if !opt.args().is_empty() {
                map.serialize_entry("args", opt.args())?;
            }
        }
        if let Some(types) = &self.types {
            map.serialize_entry("types", types)?;
        }
        if let Some(values) = &self.values {
            map.serialize_entry("values", values)?;
        }
        if let Some(defaults) = self.opt.as_ref().and_then(|opt| opt.default_values.as_ref()) {
            map.serialize_entry("default_values", defaults)?;
        }
        map.end()
    }
}

/// Find a result by key among siblings.
pub fn find<'a>(args: &'a [ArgResult], key: &str) -> Option<&'a ArgResult> {
    args.iter().find(|arg| arg.key() == Some(key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(s: &[&str]) -> Vec<String> {
        s.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_args_of_positional_is_empty() {
        let opt = Opt::new("input", OptKind::Positional { types: None });
        assert!(opt.args().is_empty());
        assert!(opt.is_positional());
        assert!(!opt.is_triggered_by("input"));
    }

    #[test]
    fn test_is_triggered_by_any_alias() {
        let opt = Opt::new(
            "verbose",
            OptKind::Flag {
                args: args(&["-v", "--verbose"]),
            },
        );
        assert!(opt.is_triggered_by("-v"));
        assert!(opt.is_triggered_by("--verbose"));
        assert!(!opt.is_triggered_by("-V"));
    }

    #[test]
    fn test_declared_types() {
        let flag = Opt::new(
            "f",
            OptKind::Flag {
                args: args(&["-f"]),
            },
        );
        assert_eq!(flag.declared_types(), Some(vec![]));

        let prim = Opt::new(
            "p",
            OptKind::Primitive {
                args: args(&["-p"]),
                ty: "number".to_string(),
            },
        );
        assert_eq!(prim.declared_types(), Some(args(&["number"])));

        let var = Opt::new(
            "v",
            OptKind::Variadic {
                args: args(&["-v"]),
            },
        );
        assert_eq!(var.declared_types(), None);
    }

    #[test]
    fn test_opt_to_spec() {
        let opt = Opt::new(
            "pair",
            OptKind::Array {
                args: args(&["-p"]),
                types: args(&["number", "string"]),
            },
        );
        let spec = OptionSpec::from(&opt);
        assert_eq!(
            spec,
            OptionSpec::option("pair", &["-p"], &["number", "string"])
        );

        let pos = Opt::new("rest", OptKind::Positional { types: None });
        assert_eq!(OptionSpec::from(&pos), OptionSpec::positional("rest", None));
    }

    #[test]
    fn test_command_to_spec_keeps_missing_fields_missing() {
        let command = Command {
            key: None,
            opts: Some(vec![Opt::new("rest", OptKind::Positional { types: None })]),
            desc: None,
        };
        let spec = OptionSpec::from(&command);
        assert!(spec.key.is_absent());
        assert_eq!(
            spec.opts,
            Field::Present(vec![OptionSpec::positional("rest", None)])
        );

        let command = Command {
            key: Some("cmd".to_string()),
            ..Command::default()
        };
        let spec = OptionSpec::from(&command);
        assert_eq!(spec.key, Field::Present("cmd".to_string()));
        assert!(spec.opts.is_absent());
        assert!(command.children().is_empty());
    }

    #[test]
    fn test_will_have_values() {
        let mut opt = Opt::new(
            "a",
            OptKind::Flag {
                args: args(&["-a"]),
            },
        );
        assert!(!ArgResult::unmatched(&opt).will_have_values());

        opt.default_values = Some(vec![json!(1)]);
        assert!(ArgResult::unmatched(&opt).will_have_values());

        assert!(ArgResult::unclaimed("x").will_have_values());
    }

    #[test]
    fn test_serialize_result() {
        let opt = Opt::new(
            "answer",
            OptKind::Primitive {
                args: args(&["-a"]),
                ty: "number".to_string(),
            },
        );
        let result = ArgResult {
            values: Some(Values::Scalars(vec![json!(42)])),
            ..ArgResult::unmatched(&opt)
        };
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({
                "key": "answer",
                "kind": "primitive",
                "args": ["-a"],
                "types": ["number"],
                "values": [42]
            })
        );
    }

    #[test]
    fn test_serialize_unclaimed() {
        let result = ArgResult::unclaimed("stray");
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"values": ["stray"]})
        );
    }

    #[test]
    fn test_child_lookup() {
        let inner = Opt::new(
            "v",
            OptKind::Flag {
                args: args(&["-v"]),
            },
        );
        let sub = Opt::new(
            "init",
            OptKind::Subcommand {
                args: args(&["init"]),
                opts: vec![inner.clone()],
            },
        );
        let result = ArgResult {
            values: Some(Values::Nested(vec![ArgResult::unmatched(&inner)])),
            ..ArgResult::unmatched(&sub)
        };
        assert!(result.child("v").is_some());
        assert!(result.child("w").is_none());
        assert!(result.scalars().is_none());
    }
}
