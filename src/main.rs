//! `stagehand` - staged change-application engine for code generators.
//!
//! See `README.md` for user documentation and `DESIGN.md` for architecture.

use clap::Parser;

use stagehand::cli::{self, Cli};
use stagehand::engine::{self, RunArgs};
use stagehand::exit_codes::exit;

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.recipe_schema {
        println!("{}", stagehand::model::generate_schema());
        std::process::exit(exit::SUCCESS);
    }

    let Some(raw_spec) = cli.generator.as_deref() else {
        eprintln!("error: missing [COLLECTION:]GENERATOR argument (see --help)");
        std::process::exit(exit::RESOLUTION_FAILURE);
    };
    let spec = match cli::parse_generator_spec(raw_spec) {
        Ok(spec) => spec,
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(exit::RESOLUTION_FAILURE);
        }
    };

    let debug = cli.effective_debug(&spec.collection);
    let dry_run = cli.effective_dry_run(debug);
    let options = cli::parse_options(&cli.options);

    let args = RunArgs {
        collection: spec.collection,
        generator: spec.generator,
        options,
        root: cli.root,
        collections_root: cli.collections_root,
        dry_run,
        force: cli.force,
        debug,
        json: cli.json,
        list_generators: cli.list_generators,
    };

    let code = match engine::run(args) {
        Ok(code) => code,
        Err(err) => {
            // Debug mode trades brevity for the full error chain.
            if debug {
                eprintln!("An error occurred:\n{err:?}");
            } else {
                eprintln!("{err}");
            }
            exit::OPERATIONAL_FAILURE
        }
    };
    std::process::exit(code);
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}
