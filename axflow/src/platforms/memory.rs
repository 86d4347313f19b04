//! In-process engine backed by a captured UI tree.
//!
//! Trees are described with [`UINode`] (JSON-serializable) and mutated through
//! the same primitives a live platform exposes. Per-node [`NodeBehavior`]
//! switches reproduce applications that ignore or reject native operations.

use crate::element::{
    AttributeValue, Point, Rect, ScrollDirection, UIElement, UIElementAttributes, UIElementImpl,
    ACTION_PRESS, ACTION_RAISE, ATTR_FOCUSED, ATTR_VALUE,
};
use crate::errors::AutomationError;
use crate::keys::{Key, KeyCombo, Modifier};
use crate::platforms::{AccessibilityEngine, AppHandle, MouseButton};
use crate::roles;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;

/// How a node reacts to a native set-value request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NativeSetValue {
    /// Store the value.
    #[default]
    Apply,
    /// Report success but keep the old value (common in web content).
    Ignore,
    /// Report an error.
    Fail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeBehavior {
    pub native_press: bool,
    pub native_set_value: NativeSetValue,
    pub native_scroll: bool,
}

impl Default for NodeBehavior {
    fn default() -> Self {
        Self {
            native_press: true,
            native_set_value: NativeSetValue::Apply,
            native_scroll: true,
        }
    }
}

impl NodeBehavior {
    fn is_default(&self) -> bool {
        *self == NodeBehavior::default()
    }
}

/// Serializable tree node used to build a [`MemoryEngine`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UINode {
    #[serde(flatten)]
    pub attributes: UIElementAttributes,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<UINode>,
    #[serde(default, skip_serializing_if = "NodeBehavior::is_default")]
    pub behavior: NodeBehavior,
}

impl UINode {
    pub fn new(role: impl Into<String>) -> Self {
        Self {
            attributes: UIElementAttributes {
                role: role.into(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.attributes.name = Some(name.into());
        self
    }

    pub fn titled(mut self, title: impl Into<String>) -> Self {
        self.attributes.title = Some(title.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.attributes.value = Some(value.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.attributes.description = Some(description.into());
        self
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.attributes.identifier = Some(identifier.into());
        self
    }

    pub fn with_dom_id(mut self, dom_id: impl Into<String>) -> Self {
        self.attributes.dom_id = Some(dom_id.into());
        self
    }

    pub fn with_dom_class(mut self, dom_class: impl Into<String>) -> Self {
        self.attributes.dom_class = Some(dom_class.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.attributes.url = Some(url.into());
        self
    }

    pub fn with_bounds(mut self, x: f64, y: f64, width: f64, height: f64) -> Self {
        self.attributes.bounds = Some(Rect::new(x, y, width, height));
        self
    }

    pub fn disabled(mut self) -> Self {
        self.attributes.enabled = Some(false);
        self
    }

    /// Mark value and focus as settable.
    pub fn editable(mut self) -> Self {
        for attr in [ATTR_VALUE, ATTR_FOCUSED] {
            if !self.attributes.is_settable(attr) {
                self.attributes.settable.push(attr.to_string());
            }
        }
        self
    }

    pub fn with_behavior(mut self, behavior: NodeBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn child(mut self, child: UINode) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = UINode>) -> Self {
        self.children.extend(children);
        self
    }
}

/// A captured desktop: applications (each an application-role [`UINode`]),
/// which one is frontmost, and the display layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemorySnapshot {
    pub applications: Vec<UINode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frontmost: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub displays: Vec<Rect>,
}

/// Every primitive the engine received, in order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum InputEvent {
    NativePress { target: String },
    NativeSetValue { target: String, value: String },
    NativeScroll { target: String, direction: ScrollDirection, amount: u32 },
    Click { point: Point, button: MouseButton, count: u32, target: Option<String> },
    Type { text: String },
    Key { combo: String },
    ClearModifiers,
    Scroll { point: Option<Point>, direction: ScrollDirection, amount: u32 },
    Activate { app: String },
    Raise { target: String },
}

/// Node ids are unique across every engine in the process.
static NEXT_NODE_ID: AtomicUsize = AtomicUsize::new(1);

#[derive(Debug)]
struct NodeSlot {
    id: usize,
    attrs: UIElementAttributes,
    children: Vec<usize>,
    behavior: NodeBehavior,
    removed: bool,
}

#[derive(Debug, Default)]
struct TreeState {
    nodes: Vec<NodeSlot>,
    /// (app root, currently raised window)
    apps: Vec<(usize, Option<usize>)>,
    frontmost: Option<usize>,
    focused: Option<usize>,
    select_all: bool,
    held_modifiers: Vec<Modifier>,
    events: Vec<InputEvent>,
    /// Activation requests that report success without changing the frontmost app.
    ignored_activations: u32,
}

impl TreeState {
    fn insert(&mut self, node: UINode) -> usize {
        let index = self.nodes.len();
        self.nodes.push(NodeSlot {
            id: NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed),
            attrs: node.attributes,
            children: Vec::new(),
            behavior: node.behavior,
            removed: false,
        });
        let children: Vec<usize> = node.children.into_iter().map(|c| self.insert(c)).collect();
        self.nodes[index].children = children;
        index
    }

    fn live_children(&self, index: usize) -> Vec<usize> {
        self.nodes[index]
            .children
            .iter()
            .copied()
            .filter(|c| !self.nodes[*c].removed)
            .collect()
    }

    fn label(&self, index: usize) -> String {
        let attrs = &self.nodes[index].attrs;
        attrs
            .display_name()
            .map(str::to_string)
            .unwrap_or_else(|| attrs.role.clone())
    }

    fn app_name(&self, app: usize) -> String {
        self.label(self.apps[app].0)
    }

    fn find_app(&self, name: &str) -> Option<usize> {
        let needle = name.to_lowercase();
        let exact = (0..self.apps.len()).find(|&i| self.app_name(i).to_lowercase() == needle);
        exact.or_else(|| {
            (0..self.apps.len()).find(|&i| self.app_name(i).to_lowercase().contains(&needle))
        })
    }

    fn window_of(&self, app: usize) -> Option<usize> {
        let (root, raised) = self.apps[app];
        if let Some(w) = raised.filter(|w| !self.nodes[*w].removed) {
            return Some(w);
        }
        self.live_children(root)
            .into_iter()
            .find(|c| roles::is_window(&self.nodes[*c].attrs.role))
    }

    fn hit_test(&self, index: usize, point: Point) -> Option<usize> {
        let slot = &self.nodes[index];
        if let Some(bounds) = slot.attrs.bounds {
            if !bounds.contains(point) {
                return None;
            }
        }
        for child in self.live_children(index).into_iter().rev() {
            if let Some(hit) = self.hit_test(child, point) {
                return Some(hit);
            }
        }
        slot.attrs.bounds.map(|_| index)
    }

    fn set_focus(&mut self, target: Option<usize>) {
        if let Some(previous) = self.focused {
            self.nodes[previous].attrs.focused = None;
        }
        if let Some(index) = target {
            self.nodes[index].attrs.focused = Some(true);
        }
        self.focused = target;
        self.select_all = false;
    }

    fn walk_matching<F: Fn(&UIElementAttributes) -> bool>(&self, predicate: &F) -> Vec<usize> {
        (0..self.nodes.len())
            .filter(|i| !self.nodes[*i].removed && predicate(&self.nodes[*i].attrs))
            .collect()
    }
}

fn lock(state: &Mutex<TreeState>) -> MutexGuard<'_, TreeState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug)]
struct MemoryElement {
    state: Arc<Mutex<TreeState>>,
    index: usize,
}

impl MemoryElement {
    fn handle(state: &Arc<Mutex<TreeState>>, index: usize) -> UIElement {
        UIElement::new(Arc::new(MemoryElement {
            state: state.clone(),
            index,
        }))
    }

    fn detached(&self, state: &TreeState) -> Result<(), AutomationError> {
        if state.nodes[self.index].removed {
            Err(AutomationError::PlatformError(format!(
                "Element '{}' is no longer in the tree",
                state.label(self.index)
            )))
        } else {
            Ok(())
        }
    }
}

impl UIElementImpl for MemoryElement {
    fn object_id(&self) -> usize {
        lock(&self.state).nodes[self.index].id
    }

    fn attributes(&self) -> UIElementAttributes {
        lock(&self.state).nodes[self.index].attrs.clone()
    }

    fn children(&self) -> Result<Vec<UIElement>, AutomationError> {
        let state = lock(&self.state);
        self.detached(&state)?;
        Ok(state
            .live_children(self.index)
            .into_iter()
            .map(|c| MemoryElement::handle(&self.state, c))
            .collect())
    }

    fn invoke_action(&self, action: &str) -> Result<(), AutomationError> {
        let mut state = lock(&self.state);
        self.detached(&state)?;
        let target = state.label(self.index);
        match action {
            ACTION_PRESS => {
                if !state.nodes[self.index].behavior.native_press {
                    return Err(AutomationError::UnsupportedOperation(format!(
                        "'{target}' does not support press"
                    )));
                }
                state.events.push(InputEvent::NativePress { target });
                Ok(())
            }
            ACTION_RAISE => {
                let app = state
                    .apps
                    .iter()
                    .position(|(root, _)| state.nodes[*root].children.contains(&self.index));
                match app {
                    Some(app) => {
                        state.apps[app].1 = Some(self.index);
                        state.events.push(InputEvent::Raise { target });
                        Ok(())
                    }
                    None => Err(AutomationError::UnsupportedOperation(format!(
                        "'{target}' is not a window"
                    ))),
                }
            }
            other => Err(AutomationError::UnsupportedOperation(format!(
                "Action '{other}' is not supported by '{target}'"
            ))),
        }
    }

    fn set_attribute(&self, name: &str, value: AttributeValue) -> Result<(), AutomationError> {
        let mut state = lock(&self.state);
        self.detached(&state)?;
        let target = state.label(self.index);
        match (name, value) {
            (ATTR_FOCUSED, AttributeValue::Bool(focus)) => {
                state.set_focus(focus.then_some(self.index));
                Ok(())
            }
            (ATTR_VALUE, AttributeValue::Text(text)) => {
                let slot = &mut state.nodes[self.index];
                if !slot.attrs.is_settable(ATTR_VALUE) {
                    return Err(AutomationError::UnsupportedOperation(format!(
                        "value of '{target}' is not settable"
                    )));
                }
                match slot.behavior.native_set_value {
                    NativeSetValue::Apply => slot.attrs.value = Some(text.clone()),
                    NativeSetValue::Ignore => {}
                    NativeSetValue::Fail => {
                        return Err(AutomationError::PlatformError(format!(
                            "set value rejected by '{target}'"
                        )))
                    }
                }
                state.events.push(InputEvent::NativeSetValue {
                    target,
                    value: text,
                });
                Ok(())
            }
            (other, value) => Err(AutomationError::UnsupportedOperation(format!(
                "Cannot set '{other}' to {value:?} on '{target}'"
            ))),
        }
    }

    fn scroll(&self, direction: ScrollDirection, amount: u32) -> Result<(), AutomationError> {
        let mut state = lock(&self.state);
        self.detached(&state)?;
        let target = state.label(self.index);
        if !state.nodes[self.index].behavior.native_scroll {
            return Err(AutomationError::UnsupportedOperation(format!(
                "'{target}' does not support native scrolling"
            )));
        }
        state.events.push(InputEvent::NativeScroll {
            target,
            direction,
            amount,
        });
        Ok(())
    }
}

/// Engine over an in-memory tree. Cloning shares the same tree.
#[derive(Debug, Clone)]
pub struct MemoryEngine {
    state: Arc<Mutex<TreeState>>,
    displays: Vec<Rect>,
}

impl MemoryEngine {
    /// One engine per set of application trees; the first app is frontmost.
    pub fn new(applications: Vec<UINode>) -> Self {
        Self::from_snapshot(MemorySnapshot {
            applications,
            ..Default::default()
        })
    }

    pub fn from_snapshot(snapshot: MemorySnapshot) -> Self {
        let mut state = TreeState::default();
        for app in snapshot.applications {
            let root = state.insert(app);
            state.apps.push((root, None));
        }
        state.frontmost = match snapshot.frontmost.as_deref() {
            Some(name) => state.find_app(name),
            None if state.apps.is_empty() => None,
            None => Some(0),
        };
        let displays = if snapshot.displays.is_empty() {
            vec![Rect::new(0.0, 0.0, 1920.0, 1080.0)]
        } else {
            snapshot.displays
        };
        Self {
            state: Arc::new(Mutex::new(state)),
            displays,
        }
    }

    /// Load a [`MemorySnapshot`] from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, AutomationError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let snapshot: MemorySnapshot = serde_json::from_str(&raw).map_err(|e| {
            AutomationError::InvalidArgument(format!(
                "Invalid tree snapshot {}: {e}",
                path.as_ref().display()
            ))
        })?;
        Ok(Self::from_snapshot(snapshot))
    }

    pub fn with_displays(mut self, displays: Vec<Rect>) -> Self {
        self.displays = displays;
        self
    }

    pub fn events(&self) -> Vec<InputEvent> {
        lock(&self.state).events.clone()
    }

    pub fn clear_events(&self) {
        lock(&self.state).events.clear();
    }

    pub fn held_modifiers(&self) -> Vec<Modifier> {
        lock(&self.state).held_modifiers.clone()
    }

    /// The next `count` activations succeed but leave the frontmost app as it is.
    pub fn ignore_activations(&self, count: u32) {
        lock(&self.state).ignored_activations = count;
    }

    pub fn set_frontmost(&self, app: &str) -> bool {
        let mut state = lock(&self.state);
        match state.find_app(app) {
            Some(index) => {
                state.frontmost = Some(index);
                true
            }
            None => false,
        }
    }

    /// Attributes of every live node the predicate accepts.
    pub fn find_attributes<F>(&self, predicate: F) -> Vec<UIElementAttributes>
    where
        F: Fn(&UIElementAttributes) -> bool,
    {
        let state = lock(&self.state);
        state
            .walk_matching(&predicate)
            .into_iter()
            .map(|i| state.nodes[i].attrs.clone())
            .collect()
    }

    /// Mutate every live node the predicate accepts; returns how many changed.
    pub fn update_where<F, M>(&self, predicate: F, mut mutate: M) -> usize
    where
        F: Fn(&UIElementAttributes) -> bool,
        M: FnMut(&mut UIElementAttributes),
    {
        let mut state = lock(&self.state);
        let hits = state.walk_matching(&predicate);
        for i in &hits {
            mutate(&mut state.nodes[*i].attrs);
        }
        hits.len()
    }

    /// Detach every live node the predicate accepts (with its subtree).
    pub fn remove_where<F>(&self, predicate: F) -> usize
    where
        F: Fn(&UIElementAttributes) -> bool,
    {
        let mut state = lock(&self.state);
        let hits = state.walk_matching(&predicate);
        for i in &hits {
            state.nodes[*i].removed = true;
            if state.focused == Some(*i) {
                state.focused = None;
            }
        }
        hits.len()
    }

    /// Append `node` under the first live node the predicate accepts.
    pub fn append_child_where<F>(&self, predicate: F, node: UINode) -> bool
    where
        F: Fn(&UIElementAttributes) -> bool,
    {
        let mut state = lock(&self.state);
        let Some(parent) = state.walk_matching(&predicate).into_iter().next() else {
            return false;
        };
        let child = state.insert(node);
        state.nodes[parent].children.push(child);
        true
    }

    fn app_index(state: &TreeState, app: Option<&str>) -> Result<usize, AutomationError> {
        match app {
            Some(name) => state.find_app(name).ok_or_else(|| {
                AutomationError::ElementNotFound(format!("Application '{name}' is not running"))
            }),
            None => state
                .frontmost
                .ok_or_else(|| AutomationError::ElementNotFound("No frontmost application".into())),
        }
    }
}

impl AccessibilityEngine for MemoryEngine {
    fn application_root(&self, app: Option<&str>) -> Result<UIElement, AutomationError> {
        let state = lock(&self.state);
        let index = Self::app_index(&state, app)?;
        Ok(MemoryElement::handle(&self.state, state.apps[index].0))
    }

    fn focused_window(&self, app: Option<&str>) -> Result<Option<UIElement>, AutomationError> {
        let state = lock(&self.state);
        let index = Self::app_index(&state, app)?;
        Ok(state
            .window_of(index)
            .map(|w| MemoryElement::handle(&self.state, w)))
    }

    fn running_applications(&self) -> Result<Vec<AppHandle>, AutomationError> {
        let state = lock(&self.state);
        Ok((0..state.apps.len())
            .map(|i| AppHandle {
                name: state.app_name(i),
                pid: Some(1000 + i as u32),
            })
            .collect())
    }

    fn frontmost_application(&self) -> Option<AppHandle> {
        let state = lock(&self.state);
        state.frontmost.map(|i| AppHandle {
            name: state.app_name(i),
            pid: Some(1000 + i as u32),
        })
    }

    fn activate_application(&self, app: &AppHandle) -> Result<(), AutomationError> {
        let mut state = lock(&self.state);
        let index = state.find_app(&app.name).ok_or_else(|| {
            AutomationError::PlatformError(format!("Cannot activate '{}': not running", app.name))
        })?;
        state.events.push(InputEvent::Activate {
            app: app.name.clone(),
        });
        if state.ignored_activations > 0 {
            state.ignored_activations -= 1;
            debug!("activation of {} ignored", app.name);
            return Ok(());
        }
        state.frontmost = Some(index);
        Ok(())
    }

    fn displays(&self) -> Vec<Rect> {
        self.displays.clone()
    }

    fn synthetic_click(
        &self,
        point: Point,
        button: MouseButton,
        count: u32,
    ) -> Result<(), AutomationError> {
        let mut state = lock(&self.state);
        let hit = match state.frontmost {
            Some(app) => {
                let root = state.apps[app].0;
                state.hit_test(root, point)
            }
            None => None,
        };
        debug!("synthetic click at {} hit {:?}", point, hit);
        if let Some(index) = hit {
            if state.nodes[index].attrs.is_settable(ATTR_FOCUSED) || state.nodes[index].attrs.is_editable() {
                state.set_focus(Some(index));
            }
        }
        let target = hit.map(|i| state.label(i));
        state.events.push(InputEvent::Click {
            point,
            button,
            count,
            target,
        });
        Ok(())
    }

    fn synthetic_type(&self, text: &str, _per_char_delay: Duration) -> Result<(), AutomationError> {
        let mut state = lock(&self.state);
        state.events.push(InputEvent::Type {
            text: text.to_string(),
        });
        if let Some(index) = state.focused {
            let replace = state.select_all;
            let slot = &mut state.nodes[index];
            if slot.attrs.is_editable() {
                let current = if replace {
                    String::new()
                } else {
                    slot.attrs.value.clone().unwrap_or_default()
                };
                slot.attrs.value = Some(format!("{current}{text}"));
            }
            state.select_all = false;
        }
        Ok(())
    }

    fn synthetic_key(&self, key: Key, modifiers: &[Modifier]) -> Result<(), AutomationError> {
        let mut state = lock(&self.state);
        let combo = KeyCombo {
            key,
            modifiers: modifiers.to_vec(),
        };
        state.events.push(InputEvent::Key {
            combo: combo.to_string(),
        });
        // A real keyboard leaves the modifiers down until explicitly released.
        state.held_modifiers = modifiers.to_vec();

        let primary = modifiers.contains(&Modifier::Command) || modifiers.contains(&Modifier::Control);
        match key {
            Key::Char('a') if primary => state.select_all = true,
            Key::Delete => {
                if let Some(index) = state.focused {
                    let select_all = state.select_all;
                    let value = state.nodes[index].attrs.value.get_or_insert_with(String::new);
                    if select_all {
                        value.clear();
                    } else {
                        value.pop();
                    }
                }
                state.select_all = false;
            }
            _ => {}
        }
        Ok(())
    }

    fn clear_modifiers(&self) -> Result<(), AutomationError> {
        let mut state = lock(&self.state);
        state.held_modifiers.clear();
        state.events.push(InputEvent::ClearModifiers);
        Ok(())
    }

    fn synthetic_scroll(
        &self,
        point: Option<Point>,
        direction: ScrollDirection,
        amount: u32,
    ) -> Result<(), AutomationError> {
        lock(&self.state).events.push(InputEvent::Scroll {
            point,
            direction,
            amount,
        });
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mail_app() -> UINode {
        UINode::new("application").named("Mail").child(
            UINode::new("window").titled("Inbox").with_children([
                UINode::new("button")
                    .named("Compose")
                    .with_bounds(10.0, 10.0, 80.0, 30.0),
                UINode::new("text-field")
                    .named("Subject")
                    .with_bounds(10.0, 60.0, 300.0, 24.0)
                    .editable(),
            ]),
        )
    }

    #[test]
    fn test_snapshot_json_round_trip_builds_tree() {
        let json = serde_json::to_string(&MemorySnapshot {
            applications: vec![mail_app()],
            frontmost: Some("Mail".into()),
            displays: vec![],
        })
        .unwrap();
        let snapshot: MemorySnapshot = serde_json::from_str(&json).unwrap();
        let engine = MemoryEngine::from_snapshot(snapshot);
        let window = engine.focused_window(None).unwrap().unwrap();
        assert_eq!(window.attributes().title.as_deref(), Some("Inbox"));
        assert_eq!(window.children().unwrap().len(), 2);
    }

    #[test]
    fn test_click_focuses_field_and_typing_appends() {
        let engine = MemoryEngine::new(vec![mail_app()]);
        engine
            .synthetic_click(Point::new(20.0, 70.0), MouseButton::Left, 1)
            .unwrap();
        engine.synthetic_type("Hi", Duration::ZERO).unwrap();
        engine.synthetic_type(" there", Duration::ZERO).unwrap();
        let fields = engine.find_attributes(|a| a.name.as_deref() == Some("Subject"));
        assert_eq!(fields[0].value.as_deref(), Some("Hi there"));
    }

    #[test]
    fn test_select_all_then_delete_clears_value() {
        let engine = MemoryEngine::new(vec![mail_app()]);
        engine.update_where(
            |a| a.name.as_deref() == Some("Subject"),
            |a| a.value = Some("old".into()),
        );
        engine
            .synthetic_click(Point::new(20.0, 70.0), MouseButton::Left, 1)
            .unwrap();
        engine.synthetic_key(Key::Char('a'), &[Modifier::Command]).unwrap();
        assert_eq!(engine.held_modifiers(), vec![Modifier::Command]);
        engine.clear_modifiers().unwrap();
        engine.synthetic_key(Key::Delete, &[]).unwrap();
        let fields = engine.find_attributes(|a| a.name.as_deref() == Some("Subject"));
        assert_eq!(fields[0].value.as_deref(), Some(""));
        assert!(engine.held_modifiers().is_empty());
    }

    #[test]
    fn test_ignored_set_value_keeps_old_value() {
        let engine = MemoryEngine::new(vec![UINode::new("application").named("Web").child(
            UINode::new("text-field")
                .named("Search")
                .editable()
                .with_behavior(NodeBehavior {
                    native_set_value: NativeSetValue::Ignore,
                    ..Default::default()
                }),
        )]);
        let root = engine.application_root(Some("web")).unwrap();
        let field = root.children().unwrap().remove(0);
        field.set_value("rust").unwrap();
        assert_eq!(field.read_value(), None);
    }

    #[test]
    fn test_removed_nodes_disappear_from_children() {
        let engine = MemoryEngine::new(vec![mail_app()]);
        assert_eq!(engine.remove_where(|a| a.name.as_deref() == Some("Compose")), 1);
        let window = engine.focused_window(Some("Mail")).unwrap().unwrap();
        assert_eq!(window.children().unwrap().len(), 1);
    }

    #[test]
    fn test_node_ids_unique_across_engines() {
        let first = MemoryEngine::new(vec![mail_app()]);
        let second = MemoryEngine::new(vec![mail_app()]);
        let ids = |engine: &MemoryEngine| -> Vec<usize> {
            let window = engine.focused_window(None).unwrap().unwrap();
            let mut ids = vec![window.object_id()];
            ids.extend(window.children().unwrap().iter().map(|c| c.object_id()));
            ids
        };
        let (a, b) = (ids(&first), ids(&second));
        assert!(a.iter().all(|id| !b.contains(id)), "{a:?} vs {b:?}");

        let again = first.focused_window(None).unwrap().unwrap();
        assert_eq!(again.object_id(), a[0]);
    }

    #[test]
    fn test_ignored_activation_keeps_frontmost() {
        let engine = MemoryEngine::new(vec![
            mail_app(),
            UINode::new("application").named("Notes"),
        ]);
        engine.ignore_activations(1);
        let notes = AppHandle {
            name: "Notes".into(),
            pid: None,
        };
        engine.activate_application(&notes).unwrap();
        assert_eq!(engine.frontmost_application().unwrap().name, "Mail");
        engine.activate_application(&notes).unwrap();
        assert_eq!(engine.frontmost_application().unwrap().name, "Notes");
    }
}
