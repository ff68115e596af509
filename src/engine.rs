use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::{debug, error};
use uuid::Uuid;

use crate::exit_codes::exit;
use crate::registry::{DirectoryRegistry, Generator, OptionBag, Registry, ResolutionError};
use crate::reporter::Reporter;
use crate::sink::{DryRunSink, FileSystemSink};
use crate::tasks::{TaskContext, TaskRunner};

/// Everything one pipeline invocation needs. Built by the CLI layer.
pub struct RunArgs {
    pub collection: String,
    pub generator: String,
    /// Pass-through options forwarded verbatim to the generator.
    pub options: OptionBag,
    /// Working directory the pipeline operates on.
    pub root: PathBuf,
    /// Directory containing named recipe collections.
    pub collections_root: PathBuf,
    pub dry_run: bool,
    pub force: bool,
    pub debug: bool,
    pub json: bool,
    /// List the collection's generators instead of running the pipeline.
    pub list_generators: bool,
}

/// Terminal state of one pipeline run. Derived, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineResult {
    pub committed: bool,
    pub had_error: bool,
    pub nothing_done: bool,
}

/// Run one invocation end to end with the default registry and task
/// runner, and return the process exit code.
pub fn run(args: RunArgs) -> Result<i32> {
    let registry = DirectoryRegistry::new(args.collections_root.clone());
    let runner = TaskRunner::with_builtins();
    run_with(&args, &registry, &runner)
}

/// Run one invocation with caller-supplied registry and task runner.
pub fn run_with(args: &RunArgs, registry: &dyn Registry, runner: &TaskRunner) -> Result<i32> {
    // Resolution happens before the pipeline starts; its failures get
    // their own exit code.
    let collection = match registry.resolve(&args.collection) {
        Ok(collection) => collection,
        Err(err) => {
            error!("{err:#}");
            return Ok(exit::RESOLUTION_FAILURE);
        }
    };

    if args.list_generators {
        for name in collection.generator_names() {
            println!("{}", name);
        }
        return Ok(exit::SUCCESS);
    }

    let generator = match collection.create(&args.generator) {
        Ok(generator) => generator,
        Err(err) if err.downcast_ref::<ResolutionError>().is_some() => {
            error!("{err:#}");
            return Ok(exit::RESOLUTION_FAILURE);
        }
        Err(err) => return Err(err.context("failed to load generator")),
    };

    let result = run_pipeline(args, generator.as_ref(), runner)?;
    if result.had_error {
        Ok(exit::CONFLICT_FAILURE)
    } else {
        Ok(exit::SUCCESS)
    }
}

/// The pipeline proper: invoke -> optimize -> preview -> commit decision ->
/// post-tasks. Strictly sequential; each stage returns a typed result the
/// next one consumes.
pub fn run_pipeline(
    args: &RunArgs,
    generator: &dyn Generator,
    runner: &TaskRunner,
) -> Result<PipelineResult> {
    let run_id = Uuid::new_v4();
    debug!(
        %run_id,
        collection = %args.collection,
        generator = %args.generator,
        "invoking generator"
    );

    // Invoke: the generator stages its actions into a fresh tree.
    let output = generator
        .invoke(&args.options, &args.root)
        .context("generator failed")?;

    // Optimize before touching the filesystem; hitting it is the costly
    // part.
    let staged = output.tree.actions().len();
    let tree = output.tree.optimize();
    debug!(%run_id, staged, optimized = tree.actions().len(), "tree optimized");

    // Preview: evaluate everything, collect conflicts, mutate nothing.
    let mut reporter = Reporter::new(args.json);
    let preview = DryRunSink::new(&args.root, args.force).commit(&tree, &mut reporter)?;

    if !preview.had_error {
        reporter.flush();
    }
    if preview.nothing_done && !args.json {
        println!("Nothing to be done.");
    }

    // Commit only when asked to, when the preview came back clean, and
    // when there is anything to commit at all.
    let mut had_error = preview.had_error;
    let mut committed = false;
    if !args.dry_run && !preview.had_error && !preview.nothing_done {
        let commit = FileSystemSink::new(&args.root, args.force)
            .commit(&tree)
            .context("commit failed")?;
        had_error |= commit.had_error;
        committed = !commit.had_error;
    }

    // Post-tasks run unconditionally after the commit decision; executors
    // receive whether anything was actually committed and act accordingly.
    let ctx = TaskContext {
        root: &args.root,
        dry_run: !committed,
    };
    runner.execute_all(&output.tasks, &ctx)?;

    Ok(PipelineResult {
        committed,
        had_error,
        nothing_done: preview.nothing_done,
    })
}
