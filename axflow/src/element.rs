use crate::errors::AutomationError;
use crate::roles;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::instrument;

/// Settable attribute holding a node's editable value.
pub const ATTR_VALUE: &str = "value";
/// Settable attribute holding keyboard focus.
pub const ATTR_FOCUSED: &str = "focused";

/// Default action of a node (click/invoke).
pub const ACTION_PRESS: &str = "press";
/// Bring a window to the front of its application.
pub const ACTION_RAISE: &str = "raise";

/// A point in global screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.0}, {:.0})", self.x, self.y)
    }
}

/// Screen rectangle of a node or display.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x
            && point.x < self.x + self.width
            && point.y >= self.y
            && point.y < self.y + self.height
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }

    /// Hidden or placeholder elements often report 0x0 or 1x1 frames.
    pub fn is_degenerate(&self) -> bool {
        self.width <= 1.0 || self.height <= 1.0
    }
}

/// Value written through [`UIElementImpl::set_attribute`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Text(String),
}

/// Attributes of a UI element, read in a single pass.
#[derive(Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UIElementAttributes {
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", alias = "domId")]
    pub dom_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", alias = "domClass")]
    pub dom_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounds: Option<Rect>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focused: Option<bool>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub settable: Vec<String>,
}

impl fmt::Debug for UIElementAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug_struct = f.debug_struct("UIElementAttributes");
        debug_struct.field("role", &self.role);

        // Only show fields that carry content
        if let Some(ref name) = self.name {
            debug_struct.field("name", name);
        }
        if let Some(ref title) = self.title {
            debug_struct.field("title", title);
        }
        if let Some(ref value) = self.value {
            debug_struct.field("value", value);
        }
        if let Some(ref description) = self.description {
            debug_struct.field("description", description);
        }
        if let Some(ref identifier) = self.identifier {
            debug_struct.field("identifier", identifier);
        }
        if let Some(ref dom_id) = self.dom_id {
            debug_struct.field("dom_id", dom_id);
        }
        if let Some(ref bounds) = self.bounds {
            debug_struct.field("bounds", bounds);
        }
        debug_struct.finish()
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

impl UIElementAttributes {
    /// Label a user would read for this node: name, then title, then description.
    pub fn display_name(&self) -> Option<&str> {
        non_empty(&self.name)
            .or_else(|| non_empty(&self.title))
            .or_else(|| non_empty(&self.description))
    }

    /// Whether the node shows anything of its own (name, title, value or description).
    pub fn has_semantic_content(&self) -> bool {
        non_empty(&self.name).is_some()
            || non_empty(&self.title).is_some()
            || non_empty(&self.value).is_some()
            || non_empty(&self.description).is_some()
    }

    /// Own label fields in match order: name, title, value, description, identifier.
    pub fn label_fields(&self) -> impl Iterator<Item = &str> {
        [
            &self.name,
            &self.title,
            &self.value,
            &self.description,
            &self.identifier,
        ]
        .into_iter()
        .filter_map(non_empty)
    }

    /// Case-insensitive substring match of `query_lower` against the label fields.
    /// `query_lower` must already be lowercased.
    pub fn label_contains(&self, query_lower: &str) -> bool {
        self.label_fields()
            .any(|field| field.to_lowercase().contains(query_lower))
    }

    pub fn is_settable(&self, attribute: &str) -> bool {
        self.settable.iter().any(|a| a == attribute)
    }

    /// Disabled or zero-sized elements can't receive synthetic input.
    pub fn is_actionable(&self) -> bool {
        self.enabled != Some(false) && self.bounds.is_some_and(|b| !b.is_degenerate())
    }

    pub fn is_editable(&self) -> bool {
        roles::is_editable(&self.role)
    }
}

/// Interface for platform-specific element implementations.
pub trait UIElementImpl: Send + Sync + Debug {
    /// Identity of the underlying node; two handles to the same node share it.
    fn object_id(&self) -> usize;
    fn attributes(&self) -> UIElementAttributes;
    fn children(&self) -> Result<Vec<UIElement>, AutomationError>;
    fn invoke_action(&self, action: &str) -> Result<(), AutomationError>;
    fn set_attribute(&self, name: &str, value: AttributeValue) -> Result<(), AutomationError>;
    fn scroll(&self, direction: ScrollDirection, amount: u32) -> Result<(), AutomationError>;

    /// Fresh read of the value attribute, bypassing any platform cache.
    fn read_value(&self) -> Option<String> {
        self.attributes().value
    }
}

/// Represents a UI element in a running application.
///
/// Handles are transient: they are valid for one resolve-act-verify cycle and
/// must not be kept across recipe steps since the tree mutates underneath.
#[derive(Debug, Clone)]
pub struct UIElement {
    inner: Arc<dyn UIElementImpl>,
}

impl UIElement {
    /// Create a new UI element from a platform-specific implementation
    pub fn new(inner: Arc<dyn UIElementImpl>) -> Self {
        Self { inner }
    }

    pub fn object_id(&self) -> usize {
        self.inner.object_id()
    }

    /// Get the element's role (e.g., "button", "text-field")
    pub fn role(&self) -> String {
        self.inner.attributes().role
    }

    /// Get all attributes of the element
    pub fn attributes(&self) -> UIElementAttributes {
        self.inner.attributes()
    }

    /// Get child elements
    pub fn children(&self) -> Result<Vec<UIElement>, AutomationError> {
        self.inner.children()
    }

    pub fn bounds(&self) -> Option<Rect> {
        self.inner.attributes().bounds
    }

    /// Invoke the element's default action
    #[instrument(level = "debug", skip(self))]
    pub fn press(&self) -> Result<(), AutomationError> {
        self.inner.invoke_action(ACTION_PRESS)
    }

    pub fn invoke_action(&self, action: &str) -> Result<(), AutomationError> {
        self.inner.invoke_action(action)
    }

    /// Focus this element
    pub fn focus(&self) -> Result<(), AutomationError> {
        self.inner
            .set_attribute(ATTR_FOCUSED, AttributeValue::Bool(true))
    }

    /// Write the value attribute directly
    #[instrument(level = "debug", skip(self, value))]
    pub fn set_value(&self, value: &str) -> Result<(), AutomationError> {
        self.inner
            .set_attribute(ATTR_VALUE, AttributeValue::Text(value.to_string()))
    }

    pub fn read_value(&self) -> Option<String> {
        self.inner.read_value()
    }

    pub fn scroll(&self, direction: ScrollDirection, amount: u32) -> Result<(), AutomationError> {
        self.inner.scroll(direction, amount)
    }
}

impl PartialEq for UIElement {
    fn eq(&self, other: &Self) -> bool {
        self.inner.object_id() == other.inner.object_id()
    }
}

impl Eq for UIElement {}

impl std::hash::Hash for UIElement {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.inner.object_id().hash(state);
    }
}

/// Scroll direction shared by native and synthetic scrolling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
    Up,
    Down,
    Left,
    Right,
}

impl std::str::FromStr for ScrollDirection {
    type Err = AutomationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "up" => Ok(ScrollDirection::Up),
            "down" => Ok(ScrollDirection::Down),
            "left" => Ok(ScrollDirection::Left),
            "right" => Ok(ScrollDirection::Right),
            other => Err(AutomationError::InvalidArgument(format!(
                "Unknown scroll direction '{other}'. Use up, down, left, or right."
            ))),
        }
    }
}

impl fmt::Display for ScrollDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ScrollDirection::Up => "up",
            ScrollDirection::Down => "down",
            ScrollDirection::Left => "left",
            ScrollDirection::Right => "right",
        };
        f.write_str(s)
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let mut out: String = text.chars().take(max).collect();
        out.push_str("...");
        out
    }
}

/// Serializable summary of a node, returned by element queries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ElementSummary {
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dom_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounds: Option<Rect>,
    pub editable: bool,
}

const SUMMARY_VALUE_LIMIT: usize = 500;

impl From<&UIElement> for ElementSummary {
    fn from(element: &UIElement) -> Self {
        let attrs = element.attributes();
        Self {
            editable: attrs.is_editable(),
            name: attrs.display_name().map(str::to_string),
            value: attrs
                .value
                .as_deref()
                .map(|v| truncate_chars(v, SUMMARY_VALUE_LIMIT)),
            description: attrs.description,
            identifier: attrs.identifier,
            dom_id: attrs.dom_id,
            bounds: attrs.bounds,
            role: attrs.role,
        }
    }
}

pub(crate) fn truncate_for_report(text: &str, max: usize) -> String {
    truncate_chars(text, max)
}
