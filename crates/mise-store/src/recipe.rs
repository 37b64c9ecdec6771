//! Recipe definition storage.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use mise_config::RecipeDef;
use tokio::fs;
use tokio::sync::RwLock;

use crate::StoreError;

/// Source of recipe definitions.
#[async_trait]
pub trait RecipeStore: Send + Sync {
  /// Get a recipe definition by id.
  async fn get_recipe(&self, recipe_id: &str) -> Result<RecipeDef, StoreError>;

  /// Save a recipe definition, replacing any previous version.
  async fn put_recipe(&self, recipe: &RecipeDef) -> Result<(), StoreError>;

  /// List the ids of all stored recipes, sorted.
  async fn list_recipes(&self) -> Result<Vec<String>, StoreError>;
}

/// In-memory recipe store.
#[derive(Debug, Clone, Default)]
pub struct MemoryRecipeStore {
  recipes: Arc<RwLock<HashMap<String, RecipeDef>>>,
}

impl MemoryRecipeStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Build a store holding the given recipes.
  pub fn with_recipes(recipes: impl IntoIterator<Item = RecipeDef>) -> Self {
    let recipes = recipes.into_iter().map(|r| (r.id.clone(), r)).collect();
    Self {
      recipes: Arc::new(RwLock::new(recipes)),
    }
  }
}

#[async_trait]
impl RecipeStore for MemoryRecipeStore {
  async fn get_recipe(&self, recipe_id: &str) -> Result<RecipeDef, StoreError> {
    self
      .recipes
      .read()
      .await
      .get(recipe_id)
      .cloned()
      .ok_or_else(|| StoreError::NotFound(recipe_id.to_string()))
  }

  async fn put_recipe(&self, recipe: &RecipeDef) -> Result<(), StoreError> {
    self
      .recipes
      .write()
      .await
      .insert(recipe.id.clone(), recipe.clone());
    Ok(())
  }

  async fn list_recipes(&self) -> Result<Vec<String>, StoreError> {
    let mut ids: Vec<String> = self.recipes.read().await.keys().cloned().collect();
    ids.sort();
    Ok(ids)
  }
}

/// Filesystem-based recipe store.
///
/// Recipes are stored one JSON document per recipe:
/// ```text
/// {root}/
/// ├── product-shots.json
/// └── launch-video.json
/// ```
pub struct FsRecipeStore {
  root: PathBuf,
}

impl FsRecipeStore {
  /// Create a new filesystem store at the given root path.
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  /// Get the root directory of the store.
  pub fn root(&self) -> &Path {
    &self.root
  }

  fn recipe_path(&self, recipe_id: &str) -> Result<PathBuf, StoreError> {
    if recipe_id.is_empty() || recipe_id.contains(['/', '\\']) || recipe_id.starts_with('.') {
      return Err(StoreError::NotFound(recipe_id.to_string()));
    }
    Ok(self.root.join(format!("{}.json", recipe_id)))
  }
}

#[async_trait]
impl RecipeStore for FsRecipeStore {
  async fn get_recipe(&self, recipe_id: &str) -> Result<RecipeDef, StoreError> {
    let path = self.recipe_path(recipe_id)?;
    let content = match fs::read_to_string(&path).await {
      Ok(content) => content,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
        return Err(StoreError::NotFound(recipe_id.to_string()));
      }
      Err(e) => return Err(e.into()),
    };
    Ok(serde_json::from_str(&content)?)
  }

  async fn put_recipe(&self, recipe: &RecipeDef) -> Result<(), StoreError> {
    let path = self.recipe_path(&recipe.id)?;
    fs::create_dir_all(&self.root).await?;
    let content = serde_json::to_string_pretty(recipe)?;
    fs::write(&path, content).await?;
    Ok(())
  }

  async fn list_recipes(&self) -> Result<Vec<String>, StoreError> {
    let mut entries = match fs::read_dir(&self.root).await {
      Ok(entries) => entries,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
      Err(e) => return Err(e.into()),
    };

    let mut ids = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
      let path = entry.path();
      if path.extension().and_then(|e| e.to_str()) != Some("json") {
        continue;
      }
      if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
        ids.push(stem.to_string());
      }
    }
    ids.sort();
    Ok(ids)
  }
}
