//! Native-first, synthetic-fallback action execution with readback verification.
//!
//! Every action walks the same path: locate the target, try the native
//! accessibility operation, verify, and fall back to synthetic input when the
//! native path is unavailable, fails, or is not reflected in the tree.

mod click;
mod focus;
mod keyboard;
mod scroll;
mod typing;

pub use focus::FocusGuard;

use crate::config::AutomationConfig;
use crate::context;
use crate::element::{Point, ScrollDirection, UIElement};
use crate::errors::AutomationError;
use crate::keys::{Key, KeyCombo, Modifier};
use crate::locator::Locator;
use crate::platforms::{AccessibilityEngine, MouseButton};
use crate::search::ElementSearcher;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Which path ultimately carried out an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionMethod {
    Native,
    Synthetic,
    Coordinate,
}

impl fmt::Display for ActionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ActionMethod::Native => "native",
            ActionMethod::Synthetic => "synthetic",
            ActionMethod::Coordinate => "coordinate",
        })
    }
}

/// What an action is aimed at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionTarget {
    Element(Locator),
    Point(Point),
    /// A human-readable label. Text entry scores candidate fields by it;
    /// other actions search for it by name.
    Named(String),
}

impl fmt::Display for ActionTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionTarget::Element(locator) => write!(f, "{locator}"),
            ActionTarget::Point(point) => write!(f, "{point}"),
            ActionTarget::Named(name) => write!(f, "'{name}'"),
        }
    }
}

fn default_click_count() -> u32 {
    1
}

/// One direct action request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ActionRequest {
    Click {
        target: ActionTarget,
        #[serde(default)]
        button: MouseButton,
        #[serde(default = "default_click_count")]
        count: u32,
        #[serde(default)]
        app: Option<String>,
    },
    Type {
        text: String,
        #[serde(default)]
        target: Option<ActionTarget>,
        #[serde(default)]
        clear: bool,
        #[serde(default)]
        app: Option<String>,
    },
    Press {
        key: Key,
        #[serde(default)]
        modifiers: Vec<Modifier>,
        #[serde(default)]
        app: Option<String>,
    },
    Hotkey {
        combo: KeyCombo,
        #[serde(default)]
        app: Option<String>,
    },
    Focus {
        app: String,
        #[serde(default)]
        window: Option<String>,
    },
    Scroll {
        direction: ScrollDirection,
        #[serde(default)]
        amount: Option<u32>,
        #[serde(default)]
        point: Option<Point>,
        #[serde(default)]
        app: Option<String>,
    },
}

impl ActionRequest {
    pub fn kind(&self) -> &'static str {
        match self {
            ActionRequest::Click { .. } => "click",
            ActionRequest::Type { .. } => "type",
            ActionRequest::Press { .. } => "press",
            ActionRequest::Hotkey { .. } => "hotkey",
            ActionRequest::Focus { .. } => "focus",
            ActionRequest::Scroll { .. } => "scroll",
        }
    }
}

/// Result of a successful action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub action: String,
    pub method: ActionMethod,
    pub success: bool,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub readback: Option<String>,
}

impl ActionOutcome {
    fn new(action: &str, method: ActionMethod, detail: impl Into<String>) -> Self {
        Self {
            action: action.to_string(),
            method,
            success: true,
            detail: detail.into(),
            target: None,
            readback: None,
        }
    }

    fn on(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }
}

pub(crate) fn action_failed(method: ActionMethod, detail: impl Into<String>) -> AutomationError {
    AutomationError::ActionFailed {
        method,
        detail: detail.into(),
    }
}

/// Short human label for logs and outcomes.
pub(crate) fn describe(element: &UIElement) -> String {
    let attrs = element.attributes();
    match attrs.display_name() {
        Some(name) => format!("{} '{}'", attrs.role, name),
        None => attrs.role.clone(),
    }
}

pub(crate) async fn settle(ms: u64) {
    if ms > 0 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

/// Runs actions against an engine.
#[derive(Clone)]
pub struct ActionExecutor {
    engine: Arc<dyn AccessibilityEngine>,
    searcher: ElementSearcher,
    config: Arc<AutomationConfig>,
}

impl ActionExecutor {
    pub fn new(
        engine: Arc<dyn AccessibilityEngine>,
        searcher: ElementSearcher,
        config: Arc<AutomationConfig>,
    ) -> Self {
        Self {
            engine,
            searcher,
            config,
        }
    }

    pub fn searcher(&self) -> &ElementSearcher {
        &self.searcher
    }

    /// Perform one top-level action. Focus is saved before and restored
    /// after, whatever the outcome. A focus request is the exception: moving
    /// focus is its whole effect.
    #[instrument(skip(self, request), fields(action = request.kind()))]
    pub async fn perform(&self, request: &ActionRequest) -> Result<ActionOutcome, AutomationError> {
        let _focus = (!matches!(request, ActionRequest::Focus { .. }))
            .then(|| FocusGuard::save(self.engine.as_ref()));
        self.dispatch(request).await
    }

    /// Perform an action inside a caller-managed focus scope (recipe runs).
    pub(crate) async fn dispatch(
        &self,
        request: &ActionRequest,
    ) -> Result<ActionOutcome, AutomationError> {
        match request {
            ActionRequest::Click {
                target,
                button,
                count,
                app,
            } => self.click(target, *button, *count, app.as_deref()).await,
            ActionRequest::Type {
                text,
                target,
                clear,
                app,
            } => {
                self.type_text(text, target.as_ref(), *clear, app.as_deref())
                    .await
            }
            ActionRequest::Press {
                key,
                modifiers,
                app,
            } => self.press(*key, modifiers, app.as_deref()).await,
            ActionRequest::Hotkey { combo, app } => self.hotkey(combo, app.as_deref()).await,
            ActionRequest::Focus { app, window } => {
                self.focus_application(app, window.as_deref()).await
            }
            ActionRequest::Scroll {
                direction,
                amount,
                point,
                app,
            } => {
                self.scroll(*direction, *amount, *point, app.as_deref())
                    .await
            }
        }
    }

    /// Resolve a locator for an action: the focused window's web content
    /// first, then the whole application tree.
    pub(crate) fn locate(
        &self,
        locator: &Locator,
        app: Option<&str>,
    ) -> Result<UIElement, AutomationError> {
        if let Some(area) = context::web_area(
            self.engine.as_ref(),
            app,
            self.config.limits.web_area_search_depth,
        ) {
            if let Some(element) = self.searcher.resolve_first(locator, &area) {
                return Ok(element);
            }
            debug!("{} not in web content, searching full tree", locator);
        }
        let root = self.engine.application_root(app)?;
        self.searcher
            .resolve_first(locator, &root)
            .ok_or_else(|| not_found(&locator.to_string()))
    }

    /// Resolve a label to the best text-entry field.
    pub(crate) fn locate_field(
        &self,
        name: &str,
        app: Option<&str>,
    ) -> Result<UIElement, AutomationError> {
        let root = match context::web_area(
            self.engine.as_ref(),
            app,
            self.config.limits.web_area_search_depth,
        ) {
            Some(area) => area,
            None => match self.engine.focused_window(app)? {
                Some(window) => window,
                None => self.engine.application_root(app)?,
            },
        };
        self.searcher
            .find_editable_field(name, &root, &self.engine.displays())
            .ok_or_else(|| not_found(&format!("field '{name}'")))
    }

    /// Activate `app` (when given) and let it settle. Activation problems
    /// are logged; the synthetic input that follows reports the real failure.
    pub(crate) async fn bring_to_front(&self, app: Option<&str>) {
        let Some(name) = app else {
            return;
        };
        let handle = match self.engine.running_applications() {
            Ok(apps) => apps.into_iter().find(|a| a.matches(name)),
            Err(e) => {
                warn!("could not list applications to focus '{}': {}", name, e);
                None
            }
        };
        match handle {
            Some(handle) => {
                if let Err(e) = self.engine.activate_application(&handle) {
                    warn!("failed to activate '{}': {}", handle, e);
                }
            }
            None => warn!("application '{}' not running; input goes to the frontmost app", name),
        }
        settle(self.config.timing.app_focus_delay_ms).await;
    }
}

fn not_found(what: &str) -> AutomationError {
    AutomationError::ElementNotFound(format!(
        "No element matches {what}. Try a shorter name fragment, drop the role filter, or inspect the tree with find_elements."
    ))
}
