use anyhow::{Result, bail};
use clap::Parser;
use serde_json::Value;
use std::path::PathBuf;

use crate::registry::{OptionBag, is_local};

/// Collection used when the generator argument carries no collection name.
pub const DEFAULT_COLLECTION: &str = "standard";

/// Staged change-application engine for code generators.
#[derive(Parser)]
#[command(name = "stagehand", version, about, long_about = None)]
pub struct Cli {
    /// Generator to run, as [COLLECTION:]GENERATOR.
    pub generator: Option<String>,

    /// Show what would be done without writing to disk.
    /// Defaults to true when debug mode is in effect.
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub dry_run: Option<bool>,

    /// Overwrite files that would otherwise be a conflict.
    #[arg(long)]
    pub force: bool,

    /// Debug mode. Defaults to true when the collection is a local path
    /// (turn off with --debug=false).
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub debug: Option<bool>,

    /// Show more information.
    #[arg(long)]
    pub verbose: bool,

    /// List all generators of the collection, by name.
    #[arg(long)]
    pub list_generators: bool,

    /// Emit structured JSON events to stdout.
    #[arg(long)]
    pub json: bool,

    /// Working directory the pipeline operates on.
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// Directory containing named recipe collections.
    #[arg(long, default_value = "collections")]
    pub collections_root: PathBuf,

    /// Print the JSON Schema for recipe manifests and exit.
    #[arg(long)]
    pub recipe_schema: bool,

    /// Options forwarded verbatim to the generator, as key=value pairs.
    #[arg(last = true)]
    pub options: Vec<String>,
}

impl Cli {
    /// Effective debug flag: explicit value, else true for local
    /// collection paths.
    pub fn effective_debug(&self, collection: &str) -> bool {
        self.debug.unwrap_or_else(|| is_local(collection))
    }

    /// Effective dry-run flag: explicit value, else the debug default.
    pub fn effective_dry_run(&self, debug: bool) -> bool {
        self.dry_run.unwrap_or(debug)
    }
}

/// Parsed [COLLECTION:]GENERATOR argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorSpec {
    pub collection: String,
    pub generator: String,
}

/// Split a [COLLECTION:]GENERATOR argument. A bare name selects the
/// default collection; an empty side of the `:` is a usage error.
pub fn parse_generator_spec(spec: &str) -> Result<GeneratorSpec> {
    if spec.is_empty() {
        bail!("expected [COLLECTION:]GENERATOR");
    }
    match spec.split_once(':') {
        Some((collection, generator)) => {
            if collection.is_empty() || generator.is_empty() {
                bail!("expected [COLLECTION:]GENERATOR, got \"{spec}\"");
            }
            Ok(GeneratorSpec {
                collection: collection.to_string(),
                generator: generator.to_string(),
            })
        }
        None => Ok(GeneratorSpec {
            collection: DEFAULT_COLLECTION.to_string(),
            generator: spec.to_string(),
        }),
    }
}

/// Parse key=value pass-through options into a generator option bag.
/// A bare key becomes `true`; values parse as bool or integer when they
/// look like one, and stay strings otherwise.
pub fn parse_options(pairs: &[String]) -> OptionBag {
    let mut bag = OptionBag::new();
    for pair in pairs {
        let (key, value) = match pair.split_once('=') {
            Some((key, raw)) => (key, coerce(raw)),
            None => (pair.as_str(), Value::Bool(true)),
        };
        bag.insert(key.to_string(), value);
    }
    bag
}

fn coerce(raw: &str) -> Value {
    if let Ok(flag) = raw.parse::<bool>() {
        return Value::Bool(flag);
    }
    if let Ok(number) = raw.parse::<i64>() {
        return Value::Number(number.into());
    }
    Value::String(raw.to_string())
}
