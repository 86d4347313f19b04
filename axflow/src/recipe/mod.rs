//! Declarative, parameterized workflows: definitions, storage and the runner.

mod engine;
mod store;
mod substitute;
mod types;

pub use engine::{RecipeRunner, RunReport, StepResult};
pub use store::{DirectoryRecipeStore, InMemoryRecipeStore, RecipeStore};
pub use substitute::{is_template, placeholders, substitute};
pub use types::{
    FailurePolicy, ParamDef, ParamType, Preconditions, Recipe, RecipeStep, StepAction, WaitSpec,
    SCHEMA_VERSION,
};
