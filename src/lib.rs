//! Staged change-application engine for code generators.
//!
//! A generator stages file actions into a virtual [`tree::Tree`], the tree
//! is optimized, previewed against the real filesystem by the dry-run sink,
//! committed by the filesystem sink only when the preview came back clean,
//! and any post-tasks the generator queued run afterwards.

pub mod cli;
pub mod engine;
pub mod events;
pub mod exit_codes;
pub mod model;
pub mod registry;
pub mod reporter;
pub mod resolve;
pub mod sink;
pub mod tasks;
pub mod tree;
