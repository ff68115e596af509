use anyhow::Result;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A single staged filesystem mutation.
///
/// Actions are intents: staging one never touches disk. Paths are
/// POSIX-style and relative to the root the pipeline runs in.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Create a new file with the given content.
    Create { path: PathBuf, content: String },
    /// Replace the content of an existing file (full replacement, not a diff).
    Update { path: PathBuf, content: String },
    /// Delete an existing file.
    Delete { path: PathBuf },
    /// Rename an existing file.
    Rename { from: PathBuf, to: PathBuf },
}

/// A declarative generator recipe.
///
/// Recipes are the manifest format consumed by recipe collections: a
/// description, the actions to stage (paths and contents may contain
/// `{{key}}` placeholders resolved against the option bag), and the
/// post-commit tasks to queue.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Recipe {
    /// Human-readable description of what the generator produces.
    #[serde(default)]
    pub description: String,
    /// Actions to stage, in order.
    pub actions: Vec<Action>,
    /// Post-commit tasks to queue, in order.
    #[serde(default)]
    pub tasks: Vec<TaskRequest>,
}

/// A post-commit task queued by a generator.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum TaskRequest {
    /// Install project dependencies with a package manager.
    InstallPackages {
        /// Package manager executable, e.g. "npm" or "pnpm".
        #[serde(default = "default_package_manager")]
        manager: String,
    },
    /// Initialize a version-control repository in the working directory.
    InitRepository,
}

fn default_package_manager() -> String {
    "npm".to_string()
}

impl TaskRequest {
    /// Stable kind name used for executor registration and lookup.
    pub fn kind(&self) -> &'static str {
        match self {
            TaskRequest::InstallPackages { .. } => "install_packages",
            TaskRequest::InitRepository => "init_repository",
        }
    }
}

/// Generate the JSON Schema for recipe manifests.
pub fn generate_schema() -> String {
    let schema = schemars::schema_for!(Recipe);
    serde_json::to_string_pretty(&schema).expect("failed to serialize schema")
}

/// Load a recipe from a JSON file.
pub fn load_recipe(path: &Path) -> Result<Recipe> {
    let file = std::fs::File::open(path)?;
    let reader = std::io::BufReader::new(file);
    let recipe = serde_json::from_reader(reader)?;
    Ok(recipe)
}

/// Parse a recipe from a JSON string.
pub fn from_json(json: &str) -> Result<Recipe> {
    let recipe = serde_json::from_str(json)?;
    Ok(recipe)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_recipe_with_all_action_kinds() {
        let recipe = from_json(
            r#"{
                "description": "demo",
                "actions": [
                    { "action": "create", "path": "a.txt", "content": "A" },
                    { "action": "update", "path": "b.txt", "content": "B" },
                    { "action": "delete", "path": "c.txt" },
                    { "action": "rename", "from": "d.txt", "to": "e.txt" }
                ],
                "tasks": [
                    { "task": "install_packages" },
                    { "task": "init_repository" }
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(recipe.actions.len(), 4);
        assert_eq!(recipe.tasks.len(), 2);
        assert_eq!(recipe.tasks[0].kind(), "install_packages");
        match &recipe.tasks[0] {
            TaskRequest::InstallPackages { manager } => assert_eq!(manager, "npm"),
            other => panic!("unexpected task: {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_action_kind() {
        let result = from_json(
            r#"{ "actions": [ { "action": "truncate", "path": "a.txt" } ] }"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn tasks_default_to_empty() {
        let recipe = from_json(r#"{ "actions": [] }"#).unwrap();
        assert!(recipe.tasks.is_empty());
        assert!(recipe.description.is_empty());
    }

    #[test]
    fn schema_generation() {
        let schema = generate_schema();
        assert!(schema.contains("$schema"));
        assert!(schema.contains("Recipe"));
    }
}
