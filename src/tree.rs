use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::model::Action;

/// Virtual overlay of staged actions over a base filesystem snapshot.
///
/// Staging never touches disk. The read view folds the staged actions in
/// insertion order over the base snapshot rooted at `root`, answering "what
/// would this path contain if everything staged so far were applied". A
/// tree is exclusively owned by the pipeline invocation that created it and
/// is discarded at the end of the run.
#[derive(Debug, Clone)]
pub struct Tree {
    root: PathBuf,
    actions: Vec<Action>,
}

/// Effective overlay state for one path.
enum Slot {
    Contents(String),
    Deleted,
}

impl Tree {
    /// Empty tree over the base snapshot at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            actions: Vec::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Append an action to the overlay.
    pub fn stage(&mut self, action: Action) {
        self.actions.push(action);
    }

    /// Staged actions, in insertion (or post-optimization) order.
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Effective content of `path` with all staged actions applied.
    pub fn read(&self, path: &Path) -> Option<String> {
        match self.fold().remove(path) {
            Some(Slot::Contents(content)) => Some(content),
            Some(Slot::Deleted) => None,
            None => self.read_base(path),
        }
    }

    /// Whether `path` would exist with all staged actions applied.
    pub fn exists(&self, path: &Path) -> bool {
        match self.fold().get(path) {
            Some(Slot::Contents(_)) => true,
            Some(Slot::Deleted) => false,
            None => self.root.join(path).is_file(),
        }
    }

    fn read_base(&self, path: &Path) -> Option<String> {
        std::fs::read_to_string(self.root.join(path)).ok()
    }

    /// Fold the staged actions into per-path overlay state.
    fn fold(&self) -> HashMap<PathBuf, Slot> {
        let mut overlay: HashMap<PathBuf, Slot> = HashMap::new();
        for action in &self.actions {
            match action {
                Action::Create { path, content } | Action::Update { path, content } => {
                    overlay.insert(path.clone(), Slot::Contents(content.clone()));
                }
                Action::Delete { path } => {
                    overlay.insert(path.clone(), Slot::Deleted);
                }
                Action::Rename { from, to } => {
                    let carried = match overlay.insert(from.clone(), Slot::Deleted) {
                        Some(Slot::Contents(content)) => Some(content),
                        Some(Slot::Deleted) => None,
                        None => self.read_base(from),
                    };
                    if let Some(content) = carried {
                        overlay.insert(to.clone(), Slot::Contents(content));
                    }
                }
            }
        }
        overlay
    }

    /// Produce an equivalent tree with a shorter-or-equal action sequence.
    ///
    /// Merges and cancellations:
    /// - Create(p, _) then Update(p, c) collapses to Create(p, c).
    /// - Create(p, _) then Delete(p) cancels both.
    /// - Update(p, _) then Update(p, c) collapses to Update(p, c).
    /// - Rename chains (a -> b, b -> c) collapse to Rename(a -> c); a chain
    ///   that returns to its origin cancels entirely.
    ///
    /// Net effects are preserved: the logical order of actions on any one
    /// path never changes. Calling this again on its own output is a no-op.
    #[must_use]
    pub fn optimize(self) -> Tree {
        let Tree { root, actions } = self;
        // Merged-away actions leave a hole; surviving actions keep their
        // original relative order.
        let mut slots: Vec<Option<Action>> = Vec::with_capacity(actions.len());
        // Pending Create/Update slot per path.
        let mut writers: HashMap<PathBuf, usize> = HashMap::new();
        // Pending rename chain slot, keyed by current destination.
        let mut renames: HashMap<PathBuf, usize> = HashMap::new();

        for action in actions {
            match action {
                Action::Create { path, content } => {
                    // A write to a rename chain's current name ends the
                    // chain; collapsing across it would reorder effects on
                    // that path.
                    renames.remove(&path);
                    writers.insert(path.clone(), slots.len());
                    slots.push(Some(Action::Create { path, content }));
                }
                Action::Update { path, content } => {
                    renames.remove(&path);
                    if let Some(&slot) = writers.get(&path) {
                        // Collapse into the pending write, keeping its kind.
                        match &mut slots[slot] {
                            Some(
                                Action::Create { content: pending, .. }
                                | Action::Update { content: pending, .. },
                            ) => *pending = content,
                            _ => {}
                        }
                    } else {
                        writers.insert(path.clone(), slots.len());
                        slots.push(Some(Action::Update { path, content }));
                    }
                }
                Action::Delete { path } => {
                    renames.remove(&path);
                    match writers.remove(&path) {
                        Some(slot)
                            if matches!(slots[slot], Some(Action::Create { .. })) =>
                        {
                            // Create followed by Delete nets out to nothing.
                            slots[slot] = None;
                        }
                        _ => slots.push(Some(Action::Delete { path })),
                    }
                }
                Action::Rename { from, to } => {
                    if from == to {
                        continue;
                    }
                    // Writes on either side of a rename must not merge
                    // across it.
                    writers.remove(&from);
                    writers.remove(&to);
                    if let Some(slot) = renames.remove(&from) {
                        slots[slot] = match slots[slot].take() {
                            Some(Action::Rename { from: origin, .. }) if origin == to => {
                                // Chain returned to its origin: net no-op.
                                None
                            }
                            Some(Action::Rename { from: origin, .. }) => {
                                renames.insert(to.clone(), slot);
                                Some(Action::Rename { from: origin, to })
                            }
                            other => other,
                        };
                    } else {
                        renames.insert(to.clone(), slots.len());
                        slots.push(Some(Action::Rename { from, to }));
                    }
                }
            }
        }

        Tree {
            root,
            actions: slots.into_iter().flatten().collect(),
        }
    }
}
