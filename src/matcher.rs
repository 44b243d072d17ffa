//! Matching of argument tokens against a verified option tree.

use crate::error::ArgError;
use crate::model::{ArgResult, Opt, OptKind, Values, FLAG_PRESENT, INFERRED_TYPE};
use serde_json::Value;
use tracing::{debug, trace};

/// Result of matching tokens against a command and its subcommands.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Matched {
    pub errs: Vec<ArgError>,
    /// Unclaimed tokens first, then one entry per option in declaration order
    pub opts: Vec<ArgResult>,
}

/// Result of matching tokens against one command level only.
///
/// A triggered subcommand is recorded with empty nested values; the tokens
/// it takes over are returned in `dispatch` for the caller to match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchedLevel {
    pub errs: Vec<ArgError>,
    pub opts: Vec<ArgResult>,
    pub dispatch: Option<Dispatch>,
}

/// A subcommand triggered at some level and the tokens after its trigger.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    /// Position of the subcommand in [`MatchedLevel::opts`]
    pub index: usize,
    pub argv: Vec<String>,
}

/// Match `argv` against the children of a command.
///
/// Subcommands take over every token after their trigger. Tokens that
/// neither trigger a named option nor fill a positional slot are passed
/// through as unclaimed entries. Errors of every level are collected,
/// a command's before its subcommand's.
pub fn match_argv(opts: &[Opt], argv: &[String]) -> Matched {
    let MatchedLevel {
        mut errs,
        opts: mut results,
        dispatch,
    } = match_level(opts, argv);

    if let Some(Dispatch { index, argv }) = dispatch {
        if let Some(sub) = results.get_mut(index) {
            let children = sub.opt.as_ref().map(Opt::children).unwrap_or_default();
            let nested = match_argv(children, &argv);
            errs.extend(nested.errs);
            sub.values = Some(Values::Nested(nested.opts));
        }
    }

    Matched {
        errs,
        opts: results,
    }
}

/// Match `argv` against the children of a command without descending
/// into a triggered subcommand.
pub fn match_level(opts: &[Opt], argv: &[String]) -> MatchedLevel {
    let mut matcher = Matcher::new(opts);
    matcher.run(argv);
    matcher.finish(argv)
}

/// Internal matcher state for one command level.
struct Matcher<'a> {
    opts: &'a [Opt],
    results: Vec<ArgResult>,
    unclaimed: Vec<ArgResult>,
    errs: Vec<ArgError>,
    positionals: Vec<usize>,
    positional_index: usize,
    /// Triggered subcommand and the position of its first token
    dispatch: Option<(usize, usize)>,
}

impl<'a> Matcher<'a> {
    fn new(opts: &'a [Opt]) -> Self {
        Self {
            opts,
            results: opts.iter().map(ArgResult::unmatched).collect(),
            unclaimed: Vec::new(),
            errs: Vec::new(),
            positionals: opts
                .iter()
                .enumerate()
                .filter(|(_, opt)| opt.is_positional())
                .map(|(index, _)| index)
                .collect(),
            positional_index: 0,
            dispatch: None,
        }
    }

    fn run(&mut self, argv: &[String]) {
        let mut cursor = 0;

        while cursor < argv.len() {
            let token = &argv[cursor];

            if let Some(index) = self.find_named(token) {
                trace!(token = %token, key = %self.opts[index].key, "matched trigger");
                cursor = self.consume_named(index, argv, cursor + 1);
            } else if let Some(&index) = self.positionals.get(self.positional_index) {
                trace!(token = %token, key = %self.opts[index].key, "matched position");
                self.positional_index += 1;
                cursor = self.consume_positional(index, argv, cursor);
            } else {
                trace!(token = %token, "unclaimed token");
                self.unclaimed.push(ArgResult::unclaimed(token));
                cursor += 1;
            }
        }
    }

    fn finish(self, argv: &[String]) -> MatchedLevel {
        let matched = self.results.iter().filter(|r| r.values.is_some()).count();
        debug!(
            options = self.results.len(),
            matched,
            unclaimed = self.unclaimed.len(),
            errors = self.errs.len(),
            "matched command level"
        );

        let offset = self.unclaimed.len();
        let dispatch = self.dispatch.map(|(index, start)| Dispatch {
            index: offset + index,
            argv: argv[start..].to_vec(),
        });

        let mut opts = self.unclaimed;
        opts.extend(self.results);
        MatchedLevel {
            errs: self.errs,
            opts,
            dispatch,
        }
    }

    /// The first named option in declaration order triggered by `token`.
    fn find_named(&self, token: &str) -> Option<usize> {
        self.opts.iter().position(|opt| opt.is_triggered_by(token))
    }

    /// Consume the values of a named option; returns the new cursor.
    fn consume_named(&mut self, index: usize, argv: &[String], start: usize) -> usize {
        let opts = self.opts;
        let opt = &opts[index];
        match &opt.kind {
            OptKind::Flag { .. } => {
                self.set(index, Some(Vec::new()), vec![Value::from(FLAG_PRESENT)]);
                start
            }
            OptKind::Primitive { .. } | OptKind::Array { .. } => {
                self.consume_fixed(index, argv, start)
            }
            OptKind::Variadic { .. } => self.consume_variadic(index, argv, start),
            OptKind::Subcommand { .. } => {
                self.results[index].values = Some(Values::Nested(Vec::new()));
                self.dispatch = Some((index, start));
                argv.len()
            }
            // Positional arguments have no triggers.
            OptKind::Positional { .. } => start,
        }
    }

    fn consume_positional(&mut self, index: usize, argv: &[String], start: usize) -> usize {
        let opts = self.opts;
        match &opts[index].kind {
            OptKind::Positional { types: Some(_) } => self.consume_fixed(index, argv, start),
            _ => self.consume_variadic(index, argv, start),
        }
    }

    /// Take exactly as many tokens as there are declared types.
    fn consume_fixed(&mut self, index: usize, argv: &[String], start: usize) -> usize {
        let opts = self.opts;
        let opt = &opts[index];
        let types = opt.declared_types().unwrap_or_default();
        let end = (start + types.len()).min(argv.len());
        let values = strings(&argv[start..end]);

        if values.len() < types.len() {
            self.errs.push(ArgError::MissingValue {
                key: opt.key.clone(),
                expected: types.len(),
                found: values.len(),
            });
        }

        self.set(index, Some(types), values);
        end
    }

    /// Take tokens until the next one that triggers a named option.
    fn consume_variadic(&mut self, index: usize, argv: &[String], start: usize) -> usize {
        let end = argv[start..]
            .iter()
            .position(|token| self.find_named(token).is_some())
            .map_or(argv.len(), |offset| start + offset);
        let values = strings(&argv[start..end]);
        let types = vec![INFERRED_TYPE.to_string(); values.len()];

        self.set(index, Some(types), values);
        end
    }

    /// Record values; a repeated option replaces what it matched before.
    fn set(&mut self, index: usize, types: Option<Vec<String>>, values: Vec<Value>) {
        let result = &mut self.results[index];
        result.types = types;
        result.values = Some(Values::Scalars(values));
    }
}

fn strings(tokens: &[String]) -> Vec<Value> {
    tokens.iter().cloned().map(Value::String).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::spec::OptionSpec;
    use crate::verify::verify;
    use serde_json::json;

    fn args(s: &[&str]) -> Vec<String> {
        s.iter().map(|s| s.to_string()).collect()
    }

    fn opts(specs: Vec<OptionSpec>) -> Vec<Opt> {
        let verified = verify(&OptionSpec::command("opt", specs));
        assert!(verified.errs.is_empty(), "{:?}", verified.errs);
        verified.opts().to_vec()
    }

    fn scalars(result: &ArgResult) -> Vec<Value> {
        result.scalars().unwrap().to_vec()
    }

    #[test]
    fn test_empty_command_and_argv() {
        let res = match_argv(&[], &[]);
        assert!(res.errs.is_empty());
        assert!(res.opts.is_empty());
    }

    #[test]
    fn test_unmatched_options_are_echoed() {
        let opts = opts(vec![OptionSpec::positional("arc", None)]);
        let res = match_argv(&opts, &[]);
        assert_eq!(res.opts, vec![ArgResult::unmatched(&opts[0])]);
        assert!(res.opts[0].values.is_none());
    }

    #[test]
    fn test_unknown_token_on_empty_command() {
        let res = match_argv(&[], &args(&["unknown"]));
        assert!(res.errs.is_empty());
        assert_eq!(res.opts, vec![ArgResult::unclaimed("unknown")]);
    }

    #[test]
    fn test_rest_values_come_first() {
        let opts = opts(vec![OptionSpec::flag("arc", &["-a"])]);
        let res = match_argv(&opts, &args(&["unknown"]));
        assert_eq!(
            res.opts,
            vec![ArgResult::unclaimed("unknown"), ArgResult::unmatched(&opts[0])]
        );
    }

    #[test]
    fn test_flag_option() {
        let opts = opts(vec![OptionSpec::flag("arc", &["-a"])]);
        let res = match_argv(&opts, &args(&["-a"]));
        assert_eq!(scalars(&res.opts[0]), vec![json!(1)]);
        assert_eq!(res.opts[0].types, Some(vec![]));
    }

    #[test]
    fn test_primitive_option() {
        let opts = opts(vec![OptionSpec::option("arc", &["-a"], &["A"])]);
        let res = match_argv(&opts, &args(&["-a", "1"]));
        assert!(res.errs.is_empty());
        assert_eq!(scalars(&res.opts[0]), vec![json!("1")]);
    }

    #[test]
    fn test_array_option() {
        let opts = opts(vec![OptionSpec::option("arc", &["-a"], &["A", "B"])]);
        let res = match_argv(&opts, &args(&["-a", "1", "2"]));
        assert_eq!(scalars(&res.opts[0]), vec![json!("1"), json!("2")]);
        assert_eq!(res.opts[0].types, Some(args(&["A", "B"])));
    }

    #[test]
    fn test_typed_option_consumes_triggers_literally() {
        let opts = opts(vec![
            OptionSpec::option("arc", &["-a"], &["A"]),
            OptionSpec::flag("bar", &["-b"]),
        ]);
        let res = match_argv(&opts, &args(&["-a", "-b"]));
        assert_eq!(scalars(&res.opts[0]), vec![json!("-b")]);
        assert!(res.opts[1].values.is_none());
    }

    #[test]
    fn test_missing_trailing_values() {
        let opts = opts(vec![OptionSpec::option("arc", &["-a"], &["A", "B"])]);
        let res = match_argv(&opts, &args(&["-a", "1"]));
        assert_eq!(scalars(&res.opts[0]), vec![json!("1")]);
        assert_eq!(
            res.errs,
            vec![ArgError::MissingValue {
                key: "arc".to_string(),
                expected: 2,
                found: 1
            }]
        );
    }

    #[test]
    fn test_variadic_option() {
        let opts = opts(vec![OptionSpec::variadic("arc", &["-a"])]);
        let res = match_argv(&opts, &args(&["-a", "1", "2", "3"]));
        assert_eq!(
            scalars(&res.opts[0]),
            vec![json!("1"), json!("2"), json!("3")]
        );
        assert_eq!(res.opts[0].types, Some(args(&["string", "string", "string"])));
    }

    #[test]
    fn test_variadic_option_stops_at_next_trigger() {
        let opts = opts(vec![
            OptionSpec::variadic("arc", &["-a"]),
            OptionSpec::flag("bar", &["-b"]),
        ]);
        let res = match_argv(&opts, &args(&["-a", "1", "2", "-b"]));
        assert_eq!(scalars(&res.opts[0]), vec![json!("1"), json!("2")]);
        assert_eq!(scalars(&res.opts[1]), vec![json!(1)]);
    }

    #[test]
    fn test_variadic_option_without_values() {
        let opts = opts(vec![OptionSpec::variadic("arc", &["-a"])]);
        let res = match_argv(&opts, &args(&["-a"]));
        assert_eq!(scalars(&res.opts[0]), Vec::<Value>::new());
        assert_eq!(res.opts[0].types, Some(vec![]));
    }

    #[test]
    fn test_primitive_positional() {
        let opts = opts(vec![OptionSpec::positional("arc", Some(&["A"]))]);
        let res = match_argv(&opts, &args(&["1"]));
        assert_eq!(scalars(&res.opts[0]), vec![json!("1")]);
    }

    #[test]
    fn test_array_positional() {
        let opts = opts(vec![OptionSpec::positional("arc", Some(&["A", "B"]))]);
        let res = match_argv(&opts, &args(&["1", "2"]));
        assert_eq!(scalars(&res.opts[0]), vec![json!("1"), json!("2")]);
    }

    #[test]
    fn test_variadic_positional() {
        let opts = opts(vec![OptionSpec::positional("arc", None)]);
        let res = match_argv(&opts, &args(&["1", "2", "3"]));
        assert_eq!(
            scalars(&res.opts[0]),
            vec![json!("1"), json!("2"), json!("3")]
        );
        assert_eq!(res.opts[0].types, Some(args(&["string", "string", "string"])));
    }

    #[test]
    fn test_positionals_fill_in_order() {
        let opts = opts(vec![
            OptionSpec::positional("first", Some(&["A"])),
            OptionSpec::flag("verbose", &["-v"]),
            OptionSpec::positional("second", Some(&["A"])),
        ]);
        let res = match_argv(&opts, &args(&["a", "-v", "b", "c"]));
        assert_eq!(res.opts[0], ArgResult::unclaimed("c"));
        assert_eq!(scalars(&res.opts[1]), vec![json!("a")]);
        assert_eq!(scalars(&res.opts[2]), vec![json!(1)]);
        assert_eq!(scalars(&res.opts[3]), vec![json!("b")]);
    }

    #[test]
    fn test_first_declared_trigger_wins() {
        let opts = opts(vec![
            OptionSpec::option("answer", &["-a", "--answer"], &["number"]),
            OptionSpec::option("answerStr", &["-a", "--answer"], &["string"]),
        ]);
        let res = match_argv(&opts, &args(&["-a", "42"]));
        assert_eq!(scalars(&res.opts[0]), vec![json!("42")]);
        assert!(res.opts[1].values.is_none());
    }

    #[test]
    fn test_repeated_option_keeps_last_values() {
        let opts = opts(vec![OptionSpec::option("arc", &["-a"], &["A"])]);
        let res = match_argv(&opts, &args(&["-a", "1", "-a", "2"]));
        assert_eq!(scalars(&res.opts[0]), vec![json!("2")]);
    }

    #[test]
    fn test_subcommand_without_tokens() {
        let opts = opts(vec![OptionSpec::subcommand("Arc", &["Arc"], vec![])]);
        let res = match_argv(&opts, &args(&["Arc"]));
        assert_eq!(res.opts[0].nested(), Some(&[][..]));
    }

    #[test]
    fn test_subcommand_takes_over_remaining_tokens() {
        let opts = opts(vec![
            OptionSpec::subcommand(
                "Arc",
                &["Arc"],
                vec![
                    OptionSpec::option("arc", &["-a"], &["A"]),
                    OptionSpec::positional("bar", None),
                ],
            ),
            OptionSpec::positional("cat", None),
            OptionSpec::flag("verbose", &["-v"]),
        ]);
        let res = match_argv(&opts, &args(&["Arc", "-a", "1", "-v"]));

        let nested = res.opts[0].nested().unwrap();
        assert_eq!(scalars(&nested[0]), vec![json!("1")]);
        assert_eq!(scalars(&nested[1]), vec![json!("-v")]);
        assert!(res.opts[1].values.is_none());
        assert!(res.opts[2].values.is_none());
    }

    #[test]
    fn test_tokens_before_subcommand_stay_at_parent() {
        let opts = opts(vec![
            OptionSpec::flag("verbose", &["-v"]),
            OptionSpec::subcommand("init", &["init"], vec![OptionSpec::flag("v", &["-v"])]),
        ]);
        let res = match_argv(&opts, &args(&["-v", "init", "-v"]));
        assert_eq!(scalars(&res.opts[0]), vec![json!(1)]);
        let nested = res.opts[1].nested().unwrap();
        assert_eq!(scalars(&nested[0]), vec![json!(1)]);
    }

    #[test]
    fn test_nested_errors_are_passed_on() {
        let opts = opts(vec![OptionSpec::subcommand(
            "init",
            &["init"],
            vec![OptionSpec::option("name", &["--name"], &["string"])],
        )]);
        let res = match_argv(&opts, &args(&["init", "--name"]));
        assert_eq!(
            res.errs.iter().map(ArgError::code).collect::<Vec<_>>(),
            vec![ErrorCode::MissingValue]
        );
    }

    #[test]
    fn test_level_leaves_subcommand_tokens_for_the_caller() {
        let opts = opts(vec![
            OptionSpec::flag("verbose", &["-v"]),
            OptionSpec::subcommand(
                "init",
                &["init"],
                vec![OptionSpec::option("name", &["--name"], &["string"])],
            ),
        ]);
        let res = match_level(&opts, &args(&["stray", "-v", "init", "--name"]));

        assert!(res.errs.is_empty());
        assert_eq!(
            res.dispatch,
            Some(Dispatch {
                index: 2,
                argv: args(&["--name"]),
            })
        );
        assert_eq!(res.opts[2].key(), Some("init"));
        assert_eq!(res.opts[2].nested(), Some(&[][..]));
    }

    #[test]
    fn test_level_without_subcommand_has_no_dispatch() {
        let opts = opts(vec![OptionSpec::flag("verbose", &["-v"])]);
        let res = match_level(&opts, &args(&["-v"]));
        assert_eq!(res.dispatch, None);
    }
}
