//! UI automation over a live accessibility tree.
//!
//! Searches a deep, constantly changing element tree under a semantic-depth
//! budget, performs actions native-first with synthetic fallback and
//! readback verification, polls for asynchronous state changes, and replays
//! parameterized recipes that compose all three.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

pub mod actions;
pub mod cache;
pub mod config;
pub mod context;
pub mod element;
pub mod errors;
pub mod keys;
pub mod locator;
pub mod platforms;
pub mod recipe;
pub mod roles;
pub mod search;
#[cfg(test)]
mod tests;
pub mod wait;

pub use actions::{ActionExecutor, ActionMethod, ActionOutcome, ActionRequest, ActionTarget};
pub use cache::ResolutionCache;
pub use config::AutomationConfig;
pub use element::{ElementSummary, Point, Rect, UIElement, UIElementAttributes};
pub use errors::{AutomationError, ErrorKind};
pub use locator::Locator;
pub use platforms::{AccessibilityEngine, MemoryEngine};
pub use recipe::{Recipe, RecipeRunner, RecipeStore, RunReport};
pub use search::{ElementSearcher, SearchBudget};
pub use wait::{ConditionPoller, WaitCondition, WaitOutcome, WaitRequest};

use recipe::InMemoryRecipeStore;

/// The main entry point: one engine, one set of caches, one recipe store.
pub struct Automation {
    engine: Arc<dyn AccessibilityEngine>,
    config: Arc<AutomationConfig>,
    cache: Arc<ResolutionCache>,
    executor: ActionExecutor,
    poller: ConditionPoller,
    runner: RecipeRunner,
    store: Arc<dyn RecipeStore>,
}

impl Automation {
    /// Default configuration and an empty in-memory recipe store.
    pub fn new(engine: Arc<dyn AccessibilityEngine>) -> Result<Self, AutomationError> {
        Self::with_config(engine, AutomationConfig::default())
    }

    #[instrument(skip(engine, config))]
    pub fn with_config(
        engine: Arc<dyn AccessibilityEngine>,
        config: AutomationConfig,
    ) -> Result<Self, AutomationError> {
        config.validate()?;
        let budget = config.limits.search_budget()?;
        let config = Arc::new(config);
        let cache = Arc::new(ResolutionCache::new(
            Duration::from_millis(config.limits.node_cache_ttl_ms),
            Duration::from_millis(config.limits.path_hint_ttl_ms),
        ));
        let searcher = ElementSearcher::new(budget, cache.clone());
        let executor = ActionExecutor::new(engine.clone(), searcher, config.clone());
        let poller = ConditionPoller::new(engine.clone(), config.clone());
        let runner = RecipeRunner::new(
            engine.clone(),
            executor.clone(),
            poller.clone(),
            config.clone(),
        );
        Ok(Self {
            engine,
            config,
            cache,
            executor,
            poller,
            runner,
            store: Arc::new(InMemoryRecipeStore::default()),
        })
    }

    /// Use `store` for [`Automation::run_recipe`] and the listing calls.
    pub fn with_store(mut self, store: Arc<dyn RecipeStore>) -> Self {
        self.store = store;
        self
    }

    pub fn engine(&self) -> &Arc<dyn AccessibilityEngine> {
        &self.engine
    }

    pub fn config(&self) -> &AutomationConfig {
        &self.config
    }

    /// Load `name` from the store and run it.
    ///
    /// Only a missing recipe (or a store failure) is an `Err`; everything
    /// that goes wrong during the run is inside the report.
    #[instrument(skip(self, params))]
    pub async fn run_recipe(
        &self,
        name: &str,
        params: &HashMap<String, String>,
    ) -> Result<RunReport, AutomationError> {
        let recipe = match self.store.load_recipe(name)? {
            Some(recipe) => recipe,
            None => {
                let available: Vec<String> = self
                    .store
                    .list_recipes()
                    .map(|all| all.into_iter().map(|r| r.name).collect())
                    .unwrap_or_default();
                return Err(AutomationError::RecipeNotFound(if available.is_empty() {
                    format!("'{name}'")
                } else {
                    format!("'{name}'. Available recipes: {}", available.join(", "))
                }));
            }
        };
        Ok(self.run(&recipe, params).await)
    }

    /// Run a recipe that did not come from the store.
    pub async fn run(&self, recipe: &Recipe, params: &HashMap<String, String>) -> RunReport {
        let evicted = self.cache.evict_expired();
        if evicted > 0 {
            debug!("evicted {} expired cache entries", evicted);
        }
        self.runner.run(recipe, params).await
    }

    /// One direct action, with focus saved before and restored after.
    pub async fn perform_action(
        &self,
        request: &ActionRequest,
    ) -> Result<ActionOutcome, AutomationError> {
        self.executor.perform(request).await
    }

    pub async fn wait_for(&self, request: &WaitRequest) -> WaitOutcome {
        self.poller.wait_for(request).await
    }

    /// Summaries of every node matching `locator` in `app` (or the frontmost
    /// app). `depth` overrides the semantic depth budget.
    #[instrument(skip(self, locator), fields(locator = %locator))]
    pub fn find_elements(
        &self,
        locator: &Locator,
        app: Option<&str>,
        depth: Option<usize>,
    ) -> Result<Vec<ElementSummary>, AutomationError> {
        let root = self.engine.application_root(app)?;
        let searcher = match depth {
            Some(depth) => ElementSearcher::new(
                (*self.executor.searcher().budget()).with_semantic_depth(depth),
                self.cache.clone(),
            ),
            None => self.executor.searcher().clone(),
        };
        Ok(searcher
            .resolve(locator, &root)
            .iter()
            .map(ElementSummary::from)
            .collect())
    }

    pub fn list_recipes(&self) -> Result<Vec<Recipe>, AutomationError> {
        self.store.list_recipes()
    }

    pub fn load_recipe(&self, name: &str) -> Result<Option<Recipe>, AutomationError> {
        self.store.load_recipe(name)
    }

    /// Drop every cached node and path hint.
    pub fn invalidate_caches(&self) {
        self.cache.invalidate_all();
    }
}
