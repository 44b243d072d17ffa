//! argtree - verify option trees and parse arguments against them.

use anyhow::{Context, Result};
use argtree::{ArgError, OptionSpec, Parsed, Parser as ArgParser, Settings, Verified};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

/// Declarative, tree-shaped argument parsing.
#[derive(Parser, Debug)]
#[command(name = "argtree", version, about, disable_help_subcommand = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Verify an option tree and print the verified tree
    Verify {
        #[command(flatten)]
        spec: SpecSource,
    },

    /// Parse arguments against an option tree and print the result tree
    Parse {
        #[command(flatten)]
        spec: SpecSource,

        /// JSON parser settings
        #[arg(long)]
        settings: Option<String>,

        /// Report unclaimed arguments as errors (overrides settings)
        #[arg(long)]
        strict: bool,

        /// Arguments to parse
        #[arg(last = true)]
        args: Vec<String>,
    },
}

/// Where the JSON option tree comes from.
#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct SpecSource {
    /// JSON option tree
    #[arg(long)]
    spec: Option<String>,

    /// File holding the JSON option tree
    #[arg(long)]
    spec_file: Option<PathBuf>,
}

impl SpecSource {
    fn load(&self) -> Result<OptionSpec> {
        let json = match (&self.spec, &self.spec_file) {
            (Some(json), _) => json.clone(),
            (None, Some(path)) => std::fs::read_to_string(path)
                .with_context(|| format!("failed to read spec file {}", path.display()))?,
            (None, None) => anyhow::bail!("either --spec or --spec-file is required"),
        };
        OptionSpec::from_json(&json).context("failed to parse spec JSON")
    }
}

#[derive(Serialize)]
struct VerifyOutput<'a> {
    errs: &'a [ArgError],
    #[serde(skip_serializing_if = "Option::is_none")]
    command: Option<OptionSpec>,
}

impl<'a> VerifyOutput<'a> {
    fn new(verified: &'a Verified) -> Self {
        Self {
            errs: &verified.errs,
            command: verified.command.as_ref().map(OptionSpec::from),
        }
    }
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let ok = match cli.command {
        Commands::Verify { spec } => {
            let spec = spec.load()?;
            let verified = argtree::verify(&spec);
            info!(errors = verified.errs.len(), "verified spec");
            print_json(&VerifyOutput::new(&verified))?;
            verified.errs.is_empty()
        }
        Commands::Parse {
            spec,
            settings,
            strict,
            args,
        } => {
            let spec = spec.load()?;
            let settings = effective_settings(settings.as_deref(), strict)?;
            let parsed: Parsed = ArgParser::new().with_settings(settings).parse(&spec, args);
            info!(errors = parsed.errs.len(), "parsed arguments");
            print_json(&parsed)?;
            parsed.is_ok()
        }
    };

    Ok(if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Settings from JSON, with `--strict` taking priority.
fn effective_settings(json: Option<&str>, strict: bool) -> Result<Settings> {
    let mut settings = match json {
        Some(json) => Settings::from_json(json).context("failed to parse settings JSON")?,
        None => Settings::default(),
    };
    if strict {
        settings.strict = true;
    }
    Ok(settings)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{}", json);
    Ok(())
}
