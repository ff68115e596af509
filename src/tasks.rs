use anyhow::{Context, Result, bail};
use std::collections::BTreeMap;
use std::path::Path;
use std::process::Command;
use thiserror::Error;
use tracing::info;

use crate::model::TaskRequest;

/// Context handed to every task executor.
#[derive(Debug, Clone, Copy)]
pub struct TaskContext<'a> {
    /// Working directory the pipeline ran in.
    pub root: &'a Path,
    /// True when nothing was committed (dry run or conflicted preview).
    /// Executors are expected to skip side effects and only report what
    /// they would have done.
    pub dry_run: bool,
}

/// A requested task kind with no registered executor.
#[derive(Debug, Error)]
#[error("no executor registered for task kind \"{0}\"")]
pub struct UnregisteredTask(pub String);

/// Executes one kind of post-commit task.
pub trait TaskExecutor {
    fn execute(&self, request: &TaskRequest, ctx: &TaskContext) -> Result<()>;
}

/// Ordered execution of the tasks a generator queued.
///
/// Tasks run sequentially in queue order; later tasks may depend on the
/// side effects of earlier ones (dependency installation before repository
/// initialization, for instance).
pub struct TaskRunner {
    executors: BTreeMap<String, Box<dyn TaskExecutor>>,
}

impl TaskRunner {
    /// Runner with no registered executors.
    pub fn new() -> Self {
        Self {
            executors: BTreeMap::new(),
        }
    }

    /// Runner with the builtin executors registered.
    pub fn with_builtins() -> Self {
        let mut runner = Self::new();
        runner.register("install_packages", Box::new(InstallPackages));
        runner.register("init_repository", Box::new(InitRepository));
        runner
    }

    pub fn register(&mut self, kind: &str, executor: Box<dyn TaskExecutor>) {
        self.executors.insert(kind.to_string(), executor);
    }

    /// Execute every queued task, in order. An unregistered kind or a
    /// failing executor is fatal to the run.
    pub fn execute_all(&self, queue: &[TaskRequest], ctx: &TaskContext) -> Result<()> {
        for request in queue {
            let executor = self
                .executors
                .get(request.kind())
                .ok_or_else(|| UnregisteredTask(request.kind().to_string()))?;
            executor
                .execute(request, ctx)
                .with_context(|| format!("task \"{}\" failed", request.kind()))?;
        }
        Ok(())
    }
}

impl Default for TaskRunner {
    fn default() -> Self {
        Self::new()
    }
}

/// Installs project dependencies with the requested package manager.
pub struct InstallPackages;

impl TaskExecutor for InstallPackages {
    fn execute(&self, request: &TaskRequest, ctx: &TaskContext) -> Result<()> {
        let TaskRequest::InstallPackages { manager } = request else {
            bail!("install_packages executor received a {} task", request.kind());
        };
        if ctx.dry_run {
            info!("would run `{} install` in {}", manager, ctx.root.display());
            return Ok(());
        }
        let program = which::which(manager)
            .with_context(|| format!("package manager not found: {manager}"))?;
        info!("running `{} install`", manager);
        let status = Command::new(program)
            .arg("install")
            .current_dir(ctx.root)
            .status()
            .with_context(|| format!("failed to run `{manager} install`"))?;
        if !status.success() {
            bail!("`{manager} install` exited with {status}");
        }
        Ok(())
    }
}

/// Initializes a version-control repository in the working directory.
pub struct InitRepository;

impl TaskExecutor for InitRepository {
    fn execute(&self, request: &TaskRequest, ctx: &TaskContext) -> Result<()> {
        if !matches!(request, TaskRequest::InitRepository) {
            bail!("init_repository executor received a {} task", request.kind());
        }
        if ctx.dry_run {
            info!("would run `git init` in {}", ctx.root.display());
            return Ok(());
        }
        let program = which::which("git").context("git not found")?;
        info!("running `git init`");
        let status = Command::new(program)
            .arg("init")
            .current_dir(ctx.root)
            .status()
            .context("failed to run `git init`")?;
        if !status.success() {
            bail!("`git init` exited with {status}");
        }
        Ok(())
    }
}
