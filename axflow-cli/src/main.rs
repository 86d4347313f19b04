//! axflow CLI
//!
//! Manage recipe files and replay them against a captured UI tree.
//!
//! Usage:
//!   axflow recipes list                          # Every recipe in the store
//!   axflow recipes show gmail-send               # One recipe as JSON
//!   axflow recipes validate ./gmail-send.json    # Load-time checks only
//!   axflow recipes import ./gmail-send.json      # Validate and copy into the store
//!   axflow run gmail-send --snapshot tree.json -p to=ann@example.com
//!   axflow find --snapshot tree.json "role:button|name:Send"

use anyhow::{bail, Context, Result};
use axflow::platforms::MemoryEngine;
use axflow::recipe::{DirectoryRecipeStore, RecipeStore};
use axflow::{Automation, AutomationConfig, Locator, Recipe};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "axflow")]
#[command(about = "Recipe-driven UI automation over accessibility trees")]
struct Cli {
    /// Directory holding one <name>.json file per recipe (default: ~/.axflow/recipes)
    #[clap(long, global = true, env = "AXFLOW_RECIPES_DIR")]
    recipes_dir: Option<PathBuf>,

    /// JSON file with timing and limit overrides
    #[clap(long, global = true, env = "AXFLOW_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum RecipeCommands {
    /// List stored recipes
    List,
    /// Print one recipe as JSON
    Show { name: String },
    /// Decode and validate a recipe file without storing it
    Validate { file: PathBuf },
    /// Validate a recipe file and add it to the store
    Import { file: PathBuf },
    /// Remove a recipe from the store
    Delete { name: String },
}

#[derive(Subcommand)]
enum Commands {
    /// Recipe store commands
    #[command(subcommand)]
    Recipes(RecipeCommands),
    /// Run a stored recipe (or a recipe file) against a tree snapshot
    Run {
        /// Recipe name, or a path to a recipe .json file
        recipe: String,

        /// Tree snapshot (JSON) to run against
        #[clap(long, short)]
        snapshot: PathBuf,

        /// Parameter values as key=value
        #[clap(long = "param", short = 'p', value_parser = parse_key_val)]
        params: Vec<(String, String)>,

        /// Keep settle delays (off by default for snapshots)
        #[clap(long)]
        real_timing: bool,
    },
    /// Search a tree snapshot with a selector such as "#compose" or "role:button|name:Send"
    Find {
        selector: String,

        #[clap(long, short)]
        snapshot: PathBuf,

        /// Application to search (default: the frontmost one)
        #[clap(long)]
        app: Option<String>,

        /// Semantic depth budget override
        #[clap(long)]
        depth: Option<usize>,
    },
}

fn parse_key_val(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("invalid parameter '{raw}': expected key=value")),
    }
}

fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
    let filter = std::env::var("LOG_LEVEL")
        .ok()
        .and_then(|level| tracing_subscriber::EnvFilter::try_new(level).ok())
        .or_else(|| tracing_subscriber::EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| "info".into());
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

fn recipes_dir(cli: &Cli) -> Result<PathBuf> {
    if let Some(dir) = &cli.recipes_dir {
        return Ok(dir.clone());
    }
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".axflow").join("recipes"))
}

fn load_config(path: Option<&Path>, real_timing: bool) -> Result<AutomationConfig> {
    let config = match path {
        Some(path) => AutomationConfig::from_json_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None if real_timing => AutomationConfig::default(),
        None => AutomationConfig::immediate(),
    };
    Ok(config.apply_env_overrides())
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn read_recipe_file(path: &Path) -> Result<Recipe> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(Recipe::from_json(&raw)?)
}

fn recipe_command(store: &DirectoryRecipeStore, command: RecipeCommands) -> Result<()> {
    match command {
        RecipeCommands::List => {
            let listing: Vec<_> = store
                .list_recipes()?
                .into_iter()
                .map(|r| {
                    json!({
                        "name": r.name,
                        "description": r.description,
                        "app": r.app,
                        "steps": r.steps.len(),
                        "params": r.params.keys().collect::<Vec<_>>(),
                    })
                })
                .collect();
            print_json(&listing)
        }
        RecipeCommands::Show { name } => match store.load_recipe(&name)? {
            Some(recipe) => print_json(&recipe),
            None => bail!("Recipe '{}' not found in {}", name, store.dir().display()),
        },
        RecipeCommands::Validate { file } => {
            let recipe = read_recipe_file(&file)?;
            print_json(&json!({
                "valid": true,
                "name": recipe.name,
                "steps": recipe.steps.len(),
            }))
        }
        RecipeCommands::Import { file } => {
            let recipe = read_recipe_file(&file)?;
            let path = store.save(&recipe)?;
            info!("imported '{}'", recipe.name);
            print_json(&json!({ "imported": recipe.name, "path": path }))
        }
        RecipeCommands::Delete { name } => {
            let deleted = store.delete(&name)?;
            print_json(&json!({ "deleted": deleted, "name": name }))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let store = DirectoryRecipeStore::new(recipes_dir(&cli)?);
    debug!("recipe store at {}", store.dir().display());
    let config_path = cli.config.clone();

    match cli.command {
        Commands::Recipes(command) => recipe_command(&store, command),
        Commands::Run {
            recipe,
            snapshot,
            params,
            real_timing,
        } => {
            let config = load_config(config_path.as_deref(), real_timing)?;
            let engine = MemoryEngine::from_json_file(&snapshot)?;
            let automation = Automation::with_config(Arc::new(engine), config)?
                .with_store(Arc::new(store.clone()));
            let values: HashMap<String, String> = params.into_iter().collect();

            let report = if recipe.ends_with(".json") && Path::new(&recipe).is_file() {
                let recipe = read_recipe_file(Path::new(&recipe))?;
                automation.run(&recipe, &values).await
            } else {
                automation.run_recipe(&recipe, &values).await?
            };
            print_json(&report)?;
            if !report.success {
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Find {
            selector,
            snapshot,
            app,
            depth,
        } => {
            let config = load_config(config_path.as_deref(), false)?;
            let engine = MemoryEngine::from_json_file(&snapshot)?;
            let automation = Automation::with_config(Arc::new(engine), config)?;
            let locator = Locator::from(selector.as_str());
            let found = automation.find_elements(&locator, app.as_deref(), depth)?;
            print_json(&found)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_val() {
        assert_eq!(
            parse_key_val("to=ann@example.com").unwrap(),
            ("to".to_string(), "ann@example.com".to_string())
        );
        assert_eq!(parse_key_val("q=a=b").unwrap().1, "a=b");
        assert!(parse_key_val("=x").is_err());
        assert!(parse_key_val("novalue").is_err());
    }

    #[test]
    fn test_cli_parses_run() {
        let cli = Cli::try_parse_from([
            "axflow", "run", "gmail-send", "--snapshot", "tree.json", "-p", "to=a@b.c",
        ])
        .unwrap();
        match cli.command {
            Commands::Run { recipe, params, .. } => {
                assert_eq!(recipe, "gmail-send");
                assert_eq!(params, vec![("to".to_string(), "a@b.c".to_string())]);
            }
            _ => panic!("expected run"),
        }
    }
}
