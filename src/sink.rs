use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::events::{ConflictKind, Event};
use crate::model::Action;
use crate::reporter::Reporter;
use crate::resolve;
use crate::tree::Tree;

/// Aggregate outcome of pushing a tree through a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SinkOutcome {
    /// At least one conflict event was produced.
    pub had_error: bool,
    /// Zero events were produced (the tree staged nothing).
    pub nothing_done: bool,
}

/// Evaluate one action against the real filesystem, without mutating it.
///
/// `force` downgrades a create on an existing path to an update; it never
/// suppresses a missing-file conflict.
fn evaluate(root: &Path, force: bool, action: &Action) -> Result<Event> {
    let event = match action {
        Action::Create { path, content } => {
            let target = resolve::resolve_path(root, path)?;
            if target.exists() {
                if force {
                    Event::Update {
                        path: path.clone(),
                        size: content.len() as u64,
                    }
                } else {
                    Event::Error {
                        path: path.clone(),
                        description: ConflictKind::AlreadyExists,
                    }
                }
            } else {
                Event::Create {
                    path: path.clone(),
                    size: content.len() as u64,
                }
            }
        }
        Action::Update { path, content } => {
            let target = resolve::resolve_path(root, path)?;
            if target.exists() {
                Event::Update {
                    path: path.clone(),
                    size: content.len() as u64,
                }
            } else {
                Event::Error {
                    path: path.clone(),
                    description: ConflictKind::DoesNotExist,
                }
            }
        }
        Action::Delete { path } => {
            let target = resolve::resolve_path(root, path)?;
            if target.exists() {
                Event::Delete { path: path.clone() }
            } else {
                Event::Error {
                    path: path.clone(),
                    description: ConflictKind::DoesNotExist,
                }
            }
        }
        Action::Rename { from, to } => {
            let source = resolve::resolve_path(root, from)?;
            let target = resolve::resolve_path(root, to)?;
            if !source.exists() {
                Event::Error {
                    path: from.clone(),
                    description: ConflictKind::DoesNotExist,
                }
            } else if target.exists() {
                Event::Error {
                    path: to.clone(),
                    description: ConflictKind::AlreadyExists,
                }
            } else {
                Event::Rename {
                    from: from.clone(),
                    to: to.clone(),
                }
            }
        }
    };
    Ok(event)
}

/// Simulates a tree against the real filesystem without mutating it.
///
/// Every action is evaluated, conflicts included: a conflict is reported
/// and the simulation moves on so the caller sees the full picture.
/// Evaluating the same tree twice against an unmodified filesystem yields
/// an identical event sequence.
pub struct DryRunSink {
    root: PathBuf,
    force: bool,
}

impl DryRunSink {
    pub fn new(root: impl Into<PathBuf>, force: bool) -> Self {
        Self {
            root: root.into(),
            force,
        }
    }

    /// Evaluate every staged action in order, streaming events to the
    /// reporter as they are produced.
    pub fn commit(&self, tree: &Tree, reporter: &mut Reporter) -> Result<SinkOutcome> {
        let mut had_error = false;
        let mut count = 0usize;
        for action in tree.actions() {
            let event = evaluate(&self.root, self.force, action)?;
            had_error |= event.is_error();
            count += 1;
            reporter.record(event);
        }
        debug!(events = count, had_error, "dry-run evaluation finished");
        Ok(SinkOutcome {
            had_error,
            nothing_done: count == 0,
        })
    }
}

/// Applies a tree to the real filesystem.
///
/// Conflict checks are re-derived exactly as the dry-run sink derives them,
/// so a clean preview and a commit against an unmodified filesystem never
/// diverge. A conflicted action is skipped, not applied. There is no
/// rollback: an I/O failure surfaces as an error and leaves earlier actions
/// applied.
pub struct FileSystemSink {
    root: PathBuf,
    force: bool,
}

impl FileSystemSink {
    pub fn new(root: impl Into<PathBuf>, force: bool) -> Self {
        Self {
            root: root.into(),
            force,
        }
    }

    /// Apply every staged action in order.
    pub fn commit(&self, tree: &Tree) -> Result<SinkOutcome> {
        let mut had_error = false;
        let mut count = 0usize;
        for action in tree.actions() {
            let event = evaluate(&self.root, self.force, action)?;
            if let Event::Error { path, description } = &event {
                // Only reachable when the filesystem changed between the
                // preview and this commit.
                warn!(
                    "skipping conflicted action: {} {}",
                    path.display(),
                    description.describe()
                );
                had_error = true;
            } else {
                self.apply(action)?;
            }
            count += 1;
        }
        Ok(SinkOutcome {
            had_error,
            nothing_done: count == 0,
        })
    }

    fn apply(&self, action: &Action) -> Result<()> {
        match action {
            Action::Create { path, content } | Action::Update { path, content } => {
                let target = resolve::resolve_path(&self.root, path)?;
                create_parent_dirs(&target)?;
                fs::write(&target, content)
                    .with_context(|| format!("failed to write {}", target.display()))?;
            }
            Action::Delete { path } => {
                let target = resolve::resolve_path(&self.root, path)?;
                fs::remove_file(&target)
                    .with_context(|| format!("failed to delete {}", target.display()))?;
            }
            Action::Rename { from, to } => {
                let source = resolve::resolve_path(&self.root, from)?;
                let target = resolve::resolve_path(&self.root, to)?;
                create_parent_dirs(&target)?;
                fs::rename(&source, &target).with_context(|| {
                    format!(
                        "failed to rename {} to {}",
                        source.display(),
                        target.display()
                    )
                })?;
            }
        }
        Ok(())
    }
}

fn create_parent_dirs(target: &Path) -> Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Action;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn staged(root: &Path, actions: Vec<Action>) -> Tree {
        let mut tree = Tree::new(root);
        for action in actions {
            tree.stage(action);
        }
        tree
    }

    #[test]
    fn preview_reports_create_conflict_and_continues() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("taken.txt"), "occupied").unwrap();
        let tree = staged(
            dir.path(),
            vec![
                Action::Create {
                    path: "taken.txt".into(),
                    content: "x".into(),
                },
                Action::Create {
                    path: "free.txt".into(),
                    content: "y".into(),
                },
            ],
        );

        let mut reporter = Reporter::new(false);
        let outcome = DryRunSink::new(dir.path(), false)
            .commit(&tree, &mut reporter)
            .unwrap();

        assert!(outcome.had_error);
        assert!(!outcome.nothing_done);
        assert_eq!(
            reporter.events(),
            &[
                Event::Error {
                    path: PathBuf::from("taken.txt"),
                    description: ConflictKind::AlreadyExists,
                },
                Event::Create {
                    path: PathBuf::from("free.txt"),
                    size: 1,
                },
            ]
        );
        // The filesystem is untouched.
        assert!(!dir.path().join("free.txt").exists());
    }

    #[test]
    fn preview_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "A").unwrap();
        let tree = staged(
            dir.path(),
            vec![
                Action::Update {
                    path: "a.txt".into(),
                    content: "AA".into(),
                },
                Action::Delete {
                    path: "missing.txt".into(),
                },
                Action::Create {
                    path: "b.txt".into(),
                    content: "B".into(),
                },
            ],
        );

        let sink = DryRunSink::new(dir.path(), false);
        let mut first = Reporter::new(false);
        let mut second = Reporter::new(false);
        sink.commit(&tree, &mut first).unwrap();
        sink.commit(&tree, &mut second).unwrap();
        assert_eq!(first.events(), second.events());
    }

    #[test]
    fn force_downgrades_create_to_update() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("taken.txt"), "old").unwrap();
        let tree = staged(
            dir.path(),
            vec![Action::Create {
                path: "taken.txt".into(),
                content: "new".into(),
            }],
        );

        let mut reporter = Reporter::new(false);
        let outcome = DryRunSink::new(dir.path(), true)
            .commit(&tree, &mut reporter)
            .unwrap();
        assert!(!outcome.had_error);
        assert_eq!(
            reporter.events(),
            &[Event::Update {
                path: PathBuf::from("taken.txt"),
                size: 3,
            }]
        );

        FileSystemSink::new(dir.path(), true).commit(&tree).unwrap();
        assert_eq!(
            fs::read_to_string(dir.path().join("taken.txt")).unwrap(),
            "new"
        );
    }

    #[test]
    fn force_does_not_suppress_missing_file_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        let tree = staged(
            dir.path(),
            vec![Action::Update {
                path: "missing.txt".into(),
                content: "x".into(),
            }],
        );
        let mut reporter = Reporter::new(false);
        let outcome = DryRunSink::new(dir.path(), true)
            .commit(&tree, &mut reporter)
            .unwrap();
        assert!(outcome.had_error);
    }

    #[test]
    fn rename_destination_conflict_survives_force() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.txt"), "A").unwrap();
        fs::write(dir.path().join("b.txt"), "B").unwrap();
        let tree = staged(
            dir.path(),
            vec![Action::Rename {
                from: "a.txt".into(),
                to: "b.txt".into(),
            }],
        );
        let mut reporter = Reporter::new(false);
        let outcome = DryRunSink::new(dir.path(), true)
            .commit(&tree, &mut reporter)
            .unwrap();
        assert!(outcome.had_error);
        assert_eq!(
            reporter.events(),
            &[Event::Error {
                path: PathBuf::from("b.txt"),
                description: ConflictKind::AlreadyExists,
            }]
        );
    }

    #[test]
    fn commit_applies_all_action_kinds() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("update-me.txt"), "old").unwrap();
        fs::write(dir.path().join("delete-me.txt"), "gone").unwrap();
        fs::write(dir.path().join("move-me.txt"), "payload").unwrap();
        let tree = staged(
            dir.path(),
            vec![
                Action::Create {
                    path: "nested/new.txt".into(),
                    content: "fresh".into(),
                },
                Action::Update {
                    path: "update-me.txt".into(),
                    content: "new".into(),
                },
                Action::Delete {
                    path: "delete-me.txt".into(),
                },
                Action::Rename {
                    from: "move-me.txt".into(),
                    to: "moved/here.txt".into(),
                },
            ],
        );

        let outcome = FileSystemSink::new(dir.path(), false).commit(&tree).unwrap();
        assert!(!outcome.had_error);
        assert_eq!(
            fs::read_to_string(dir.path().join("nested/new.txt")).unwrap(),
            "fresh"
        );
        assert_eq!(
            fs::read_to_string(dir.path().join("update-me.txt")).unwrap(),
            "new"
        );
        assert!(!dir.path().join("delete-me.txt").exists());
        assert!(!dir.path().join("move-me.txt").exists());
        assert_eq!(
            fs::read_to_string(dir.path().join("moved/here.txt")).unwrap(),
            "payload"
        );
    }

    #[test]
    fn escaping_path_is_a_hard_error() {
        let dir = tempfile::tempdir().unwrap();
        let tree = staged(
            dir.path(),
            vec![Action::Create {
                path: "../escape.txt".into(),
                content: "x".into(),
            }],
        );
        let mut reporter = Reporter::new(false);
        let result = DryRunSink::new(dir.path(), false).commit(&tree, &mut reporter);
        assert!(result.is_err());
    }
}
