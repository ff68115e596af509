use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Conflict class attached to an error event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    /// A create (or rename destination) collided with an existing file.
    AlreadyExists,
    /// An update, delete, or rename source referenced a missing file.
    DoesNotExist,
}

impl ConflictKind {
    pub fn describe(self) -> &'static str {
        match self {
            ConflictKind::AlreadyExists => "already exists",
            ConflictKind::DoesNotExist => "does not exist",
        }
    }
}

/// Structured event emitted while a sink evaluates a tree.
///
/// Events form an append-only ordered log for one tree evaluation; they are
/// never mutated after emission.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    Create { path: PathBuf, size: u64 },
    Update { path: PathBuf, size: u64 },
    Delete { path: PathBuf },
    Rename { from: PathBuf, to: PathBuf },
    Error { path: PathBuf, description: ConflictKind },
}

impl Event {
    /// Whether this event marks the run as conflicted.
    pub fn is_error(&self) -> bool {
        matches!(self, Event::Error { .. })
    }
}
