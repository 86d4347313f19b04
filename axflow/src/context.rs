//! Read-only views of the current window state: URL, title and the
//! diagnostic snapshot attached to failed runs.

use crate::element::UIElement;
use crate::platforms::AccessibilityEngine;
use crate::roles;
use crate::search::find_structural;
use serde::{Deserialize, Serialize};
use tracing::debug;

const FOCUSED_ELEMENT_DEPTH: usize = 15;

/// What was on screen when something went wrong. Every field is best effort.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextSnapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focused_element: Option<String>,
}

impl ContextSnapshot {
    pub fn is_empty(&self) -> bool {
        self.app.is_none() && self.window.is_none() && self.url.is_none()
    }
}

fn focused_window(engine: &dyn AccessibilityEngine, app: Option<&str>) -> Option<UIElement> {
    match engine.focused_window(app) {
        Ok(window) => window,
        Err(e) => {
            debug!("no focused window for {:?}: {}", app, e);
            None
        }
    }
}

/// The web content root of the focused window, if it hosts one.
pub fn web_area(
    engine: &dyn AccessibilityEngine,
    app: Option<&str>,
    max_depth: usize,
) -> Option<UIElement> {
    let window = focused_window(engine, app)?;
    find_structural(&window, max_depth, |attrs| roles::is_web_area(&attrs.role))
}

/// URL shown by the focused window's web area (or the window itself).
pub fn current_url(
    engine: &dyn AccessibilityEngine,
    app: Option<&str>,
    web_area_depth: usize,
) -> Option<String> {
    let window = focused_window(engine, app)?;
    find_structural(&window, web_area_depth, |attrs| roles::is_web_area(&attrs.role))
        .and_then(|area| area.attributes().url)
        .or_else(|| window.attributes().url)
}

pub fn current_title(engine: &dyn AccessibilityEngine, app: Option<&str>) -> Option<String> {
    let attrs = focused_window(engine, app)?.attributes();
    attrs.title.or(attrs.name)
}

/// Capture app, window, URL and focused element. Failures leave fields empty
/// and are never reported.
pub fn capture(
    engine: &dyn AccessibilityEngine,
    app: Option<&str>,
    web_area_depth: usize,
) -> ContextSnapshot {
    let app_name = match app {
        Some(name) => Some(name.to_string()),
        None => engine.frontmost_application().map(|a| a.name),
    };
    let window = focused_window(engine, app);
    let focused_element = window.as_ref().and_then(|w| {
        find_structural(w, FOCUSED_ELEMENT_DEPTH, |attrs| attrs.focused == Some(true)).map(|e| {
            let attrs = e.attributes();
            match attrs.display_name() {
                Some(name) => format!("{} '{}'", attrs.role, name),
                None => attrs.role.clone(),
            }
        })
    });
    ContextSnapshot {
        app: app_name,
        window: window.and_then(|w| {
            let attrs = w.attributes();
            attrs.title.or(attrs.name)
        }),
        url: current_url(engine, app, web_area_depth),
        focused_element,
    }
}
