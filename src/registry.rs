use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::model::{self, Action, Recipe, TaskRequest};
use crate::tree::Tree;

/// Option bag forwarded verbatim from the command line to the generator.
pub type OptionBag = Map<String, Value>;

/// Failure to resolve a named collection or generator.
///
/// Resolution happens before the pipeline starts and maps to its own exit
/// code, distinct from pipeline failures.
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("unknown collection: \"{0}\"")]
    UnknownCollection(String),
    #[error("unknown generator \"{generator}\" in collection \"{collection}\"")]
    UnknownGenerator {
        collection: String,
        generator: String,
    },
}

/// Everything one generator invocation produces: the staged tree and the
/// post-tasks it queued.
pub struct GeneratorOutput {
    pub tree: Tree,
    pub tasks: Vec<TaskRequest>,
}

/// A resolved generator, callable with an option bag and a base snapshot
/// root. The pipeline treats it as an opaque producer.
pub trait Generator {
    fn description(&self) -> &str;
    fn invoke(&self, options: &OptionBag, root: &Path) -> Result<GeneratorOutput>;
}

/// A named set of generators.
pub trait Collection {
    fn name(&self) -> &str;
    /// Generator names, sorted.
    fn generator_names(&self) -> Vec<String>;
    fn create(&self, generator: &str) -> Result<Box<dyn Generator>>;
}

/// Resolves collection names to collections. The pipeline only needs this
/// capability; how collections are packaged and discovered is up to the
/// host wiring.
pub trait Registry {
    fn resolve(&self, collection: &str) -> Result<Box<dyn Collection>>;
}

/// Whether a collection name refers to a local recipe directory rather
/// than an installed collection.
pub fn is_local(collection: &str) -> bool {
    collection.starts_with('.') || collection.starts_with('/')
}

/// Directory-backed registry: a local path is itself a recipe directory;
/// any other name is looked up as a subdirectory of the collections root.
pub struct DirectoryRegistry {
    collections_root: PathBuf,
}

impl DirectoryRegistry {
    pub fn new(collections_root: impl Into<PathBuf>) -> Self {
        Self {
            collections_root: collections_root.into(),
        }
    }
}

impl Registry for DirectoryRegistry {
    fn resolve(&self, collection: &str) -> Result<Box<dyn Collection>> {
        let dir = if is_local(collection) {
            PathBuf::from(collection)
        } else {
            self.collections_root.join(collection)
        };
        if !dir.is_dir() {
            return Err(ResolutionError::UnknownCollection(collection.to_string()).into());
        }
        Ok(Box::new(RecipeCollection::new(collection, dir)))
    }
}

/// Collection backed by a directory of `<generator>.json` recipe manifests.
pub struct RecipeCollection {
    name: String,
    dir: PathBuf,
}

impl RecipeCollection {
    pub fn new(name: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            dir: dir.into(),
        }
    }

    fn recipe_path(&self, generator: &str) -> PathBuf {
        self.dir.join(format!("{generator}.json"))
    }
}

impl Collection for RecipeCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn generator_names(&self) -> Vec<String> {
        let mut names: Vec<String> = walkdir::WalkDir::new(&self.dir)
            .max_depth(1)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| {
                let path = entry.path();
                if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                    return None;
                }
                path.file_stem()
                    .and_then(|stem| stem.to_str())
                    .map(str::to_owned)
            })
            .collect();
        names.sort();
        names
    }

    fn create(&self, generator: &str) -> Result<Box<dyn Generator>> {
        let path = self.recipe_path(generator);
        if !path.is_file() {
            return Err(ResolutionError::UnknownGenerator {
                collection: self.name.clone(),
                generator: generator.to_string(),
            }
            .into());
        }
        let recipe = model::load_recipe(&path)
            .with_context(|| format!("failed to load recipe {}", path.display()))?;
        Ok(Box::new(RecipeGenerator { recipe }))
    }
}

/// Generator that stages the actions a recipe declares, substituting
/// `{{key}}` placeholders from the option bag into paths and contents.
pub struct RecipeGenerator {
    recipe: Recipe,
}

impl RecipeGenerator {
    pub fn new(recipe: Recipe) -> Self {
        Self { recipe }
    }
}

impl Generator for RecipeGenerator {
    fn description(&self) -> &str {
        &self.recipe.description
    }

    fn invoke(&self, options: &OptionBag, root: &Path) -> Result<GeneratorOutput> {
        let mut tree = Tree::new(root);
        for action in &self.recipe.actions {
            tree.stage(substitute_action(action, options)?);
        }
        Ok(GeneratorOutput {
            tree,
            tasks: self.recipe.tasks.clone(),
        })
    }
}

fn substitute_action(action: &Action, options: &OptionBag) -> Result<Action> {
    let path = |p: &Path| -> Result<PathBuf> {
        // Recipe paths come from JSON strings, so they are valid UTF-8.
        let raw = p.to_str().context("non-UTF-8 path in recipe")?;
        Ok(PathBuf::from(substitute(raw, options)?))
    };
    Ok(match action {
        Action::Create { path: p, content } => Action::Create {
            path: path(p)?,
            content: substitute(content, options)?,
        },
        Action::Update { path: p, content } => Action::Update {
            path: path(p)?,
            content: substitute(content, options)?,
        },
        Action::Delete { path: p } => Action::Delete { path: path(p)? },
        Action::Rename { from, to } => Action::Rename {
            from: path(from)?,
            to: path(to)?,
        },
    })
}

/// Replace every `{{key}}` placeholder with the matching option value.
/// A placeholder with no matching option is a generator error.
fn substitute(template: &str, options: &OptionBag) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            anyhow::bail!("unterminated placeholder in template");
        };
        let key = after[..end].trim();
        let value = options
            .get(key)
            .with_context(|| format!("missing option for placeholder {{{{{key}}}}}"))?;
        out.push_str(&value_to_string(value));
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    Ok(out)
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
