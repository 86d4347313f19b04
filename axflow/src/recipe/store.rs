use super::types::Recipe;
use crate::errors::AutomationError;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// Where recipe definitions come from.
pub trait RecipeStore: Send + Sync {
    /// Every decodable recipe, sorted by name.
    fn list_recipes(&self) -> Result<Vec<Recipe>, AutomationError>;

    /// The named recipe, or `None` when there is no such recipe.
    fn load_recipe(&self, name: &str) -> Result<Option<Recipe>, AutomationError>;
}

/// Recipes held in memory; used by tests and embedders that build recipes
/// in code.
#[derive(Debug, Default)]
pub struct InMemoryRecipeStore {
    recipes: Mutex<BTreeMap<String, Recipe>>,
}

impl InMemoryRecipeStore {
    pub fn new(recipes: impl IntoIterator<Item = Recipe>) -> Self {
        Self {
            recipes: Mutex::new(recipes.into_iter().map(|r| (r.name.clone(), r)).collect()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, Recipe>> {
        self.recipes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add or replace a recipe.
    pub fn insert(&self, recipe: Recipe) {
        self.lock().insert(recipe.name.clone(), recipe);
    }

    pub fn remove(&self, name: &str) -> bool {
        self.lock().remove(name).is_some()
    }
}

impl RecipeStore for InMemoryRecipeStore {
    fn list_recipes(&self) -> Result<Vec<Recipe>, AutomationError> {
        Ok(self.lock().values().cloned().collect())
    }

    fn load_recipe(&self, name: &str) -> Result<Option<Recipe>, AutomationError> {
        Ok(self.lock().get(name).cloned())
    }
}

/// One `<name>.json` file per recipe in a directory.
#[derive(Debug, Clone)]
pub struct DirectoryRecipeStore {
    dir: PathBuf,
}

impl DirectoryRecipeStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, AutomationError> {
        let trimmed = name.trim();
        if trimmed.is_empty()
            || trimmed.contains(['/', '\\'])
            || trimmed.starts_with('.')
        {
            return Err(AutomationError::InvalidArgument(format!(
                "Invalid recipe name '{name}'"
            )));
        }
        Ok(self.dir.join(format!("{trimmed}.json")))
    }

    /// Write `recipe` as pretty JSON, replacing any existing file.
    pub fn save(&self, recipe: &Recipe) -> Result<PathBuf, AutomationError> {
        recipe.validate()?;
        let path = self.path_for(&recipe.name)?;
        fs::create_dir_all(&self.dir)?;
        fs::write(&path, recipe.to_json_pretty()?)?;
        info!("saved recipe '{}' to {}", recipe.name, path.display());
        Ok(path)
    }

    /// Remove the recipe file. Returns whether there was one.
    pub fn delete(&self, name: &str) -> Result<bool, AutomationError> {
        let path = self.path_for(name)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Decode and validate `json`, then save it. Returns the recipe name.
    pub fn import_json(&self, json: &str) -> Result<String, AutomationError> {
        let recipe = Recipe::from_json(json)?;
        self.save(&recipe)?;
        Ok(recipe.name)
    }
}

impl RecipeStore for DirectoryRecipeStore {
    fn list_recipes(&self) -> Result<Vec<Recipe>, AutomationError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("recipe directory {} does not exist", self.dir.display());
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut recipes = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let decoded = fs::read_to_string(&path)
                .map_err(AutomationError::from)
                .and_then(|raw| Recipe::from_json(&raw));
            match decoded {
                Ok(recipe) => recipes.push(recipe),
                Err(e) => warn!("Failed to decode recipe '{}': {}", path.display(), e),
            }
        }
        recipes.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(recipes)
    }

    fn load_recipe(&self, name: &str) -> Result<Option<Recipe>, AutomationError> {
        let path = self.path_for(name)?;
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("Recipe '{}' not found at {}", name, path.display());
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };
        Recipe::from_json(&raw).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::{RecipeStep, StepAction};

    fn press_tab(name: &str) -> Recipe {
        Recipe::new(
            name,
            vec![RecipeStep::new(
                1,
                StepAction::Press {
                    key: "tab".into(),
                    modifiers: None,
                    app: None,
                },
            )],
        )
    }

    #[test]
    fn test_in_memory_store() {
        let store = InMemoryRecipeStore::new([press_tab("b"), press_tab("a")]);
        let names: Vec<_> = store
            .list_recipes()
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["a", "b"]);
        assert!(store.load_recipe("a").unwrap().is_some());
        assert!(store.remove("a"));
        assert!(store.load_recipe("a").unwrap().is_none());
    }

    #[test]
    fn test_rejects_path_like_names() {
        let store = DirectoryRecipeStore::new("/tmp/recipes");
        assert!(store.load_recipe("../secrets").is_err());
        assert!(store.load_recipe("a/b").is_err());
        assert!(store.load_recipe(" ").is_err());
    }
}
