use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::actions::ActionMethod;

#[derive(Error, Debug)]
pub enum AutomationError {
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Action failed via {method}: {detail}")]
    ActionFailed { method: ActionMethod, detail: String },

    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("Missing required parameter: '{name}' ({description})")]
    MissingParameter { name: String, description: String },

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Invalid recipe definition at step {step_id}: {reason}")]
    InvalidDefinition { step_id: u32, reason: String },

    #[error("Invalid recipe: {0}")]
    InvalidRecipe(String),

    #[error("Recipe not found: {0}")]
    RecipeNotFound(String),

    #[error("Platform-specific error: {0}")]
    PlatformError(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Plain-data tag for an [`AutomationError`], carried inside run reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ElementNotFound,
    ActionFailed,
    PreconditionFailed,
    MissingParameter,
    Timeout,
    InvalidDefinition,
    RecipeNotFound,
    Platform,
    InvalidArgument,
    Internal,
}

impl AutomationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AutomationError::ElementNotFound(_) => ErrorKind::ElementNotFound,
            AutomationError::ActionFailed { .. } => ErrorKind::ActionFailed,
            AutomationError::PreconditionFailed(_) => ErrorKind::PreconditionFailed,
            AutomationError::MissingParameter { .. } => ErrorKind::MissingParameter,
            AutomationError::Timeout(_) => ErrorKind::Timeout,
            AutomationError::InvalidDefinition { .. } | AutomationError::InvalidRecipe(_) => {
                ErrorKind::InvalidDefinition
            }
            AutomationError::RecipeNotFound(_) => ErrorKind::RecipeNotFound,
            AutomationError::PlatformError(_)
            | AutomationError::UnsupportedOperation(_)
            | AutomationError::Io(_) => ErrorKind::Platform,
            AutomationError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            AutomationError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn invalid_step(step_id: u32, reason: impl Into<String>) -> Self {
        AutomationError::InvalidDefinition {
            step_id,
            reason: reason.into(),
        }
    }
}
