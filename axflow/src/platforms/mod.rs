use crate::element::{Point, Rect, ScrollDirection, UIElement};
use crate::errors::AutomationError;
use crate::keys::{Key, Modifier};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub mod memory;

pub use memory::{InputEvent, MemoryEngine, MemorySnapshot, NativeSetValue, NodeBehavior, UINode};

/// A running application as seen by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppHandle {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
}

impl AppHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pid: None,
        }
    }

    /// Case-insensitive name containment, the way users refer to apps.
    pub fn matches(&self, name: &str) -> bool {
        self.name.to_lowercase().contains(&name.to_lowercase())
    }
}

impl fmt::Display for AppHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.pid {
            Some(pid) => write!(f, "{} (pid {pid})", self.name),
            None => f.write_str(&self.name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MouseButton {
    #[default]
    Left,
    Right,
    Middle,
}

impl std::str::FromStr for MouseButton {
    type Err = AutomationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "left" => Ok(MouseButton::Left),
            "right" => Ok(MouseButton::Right),
            "middle" => Ok(MouseButton::Middle),
            other => Err(AutomationError::InvalidArgument(format!(
                "Unknown mouse button '{other}'. Use left, right, or middle."
            ))),
        }
    }
}

/// The tree access layer every platform backend implements.
///
/// Methods are synchronous and may be slow; callers treat results as
/// snapshots that can already be stale when they return.
pub trait AccessibilityEngine: Send + Sync {
    /// Root element of the named application, or of the frontmost one.
    fn application_root(&self, app: Option<&str>) -> Result<UIElement, AutomationError>;

    /// Focused (or main) window of the named application, or of the frontmost one.
    fn focused_window(&self, app: Option<&str>) -> Result<Option<UIElement>, AutomationError>;

    /// Get all running applications
    fn running_applications(&self) -> Result<Vec<AppHandle>, AutomationError>;

    fn frontmost_application(&self) -> Option<AppHandle>;

    fn activate_application(&self, app: &AppHandle) -> Result<(), AutomationError>;

    /// Frames of the attached displays.
    fn displays(&self) -> Vec<Rect>;

    fn synthetic_click(
        &self,
        point: Point,
        button: MouseButton,
        count: u32,
    ) -> Result<(), AutomationError>;

    fn synthetic_type(&self, text: &str, per_char_delay: Duration) -> Result<(), AutomationError>;

    fn synthetic_key(&self, key: Key, modifiers: &[Modifier]) -> Result<(), AutomationError>;

    /// Release any modifier state left behind by a key combination.
    fn clear_modifiers(&self) -> Result<(), AutomationError>;

    fn synthetic_scroll(
        &self,
        point: Option<Point>,
        direction: ScrollDirection,
        amount: u32,
    ) -> Result<(), AutomationError>;

    /// Enable downcasting to concrete engine types
    fn as_any(&self) -> &dyn std::any::Any;
}
