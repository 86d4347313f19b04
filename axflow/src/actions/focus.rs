use super::{action_failed, settle, ActionExecutor, ActionMethod, ActionOutcome};
use crate::element::ACTION_RAISE;
use crate::errors::AutomationError;
use crate::platforms::{AccessibilityEngine, AppHandle};
use crate::roles;
use tracing::{debug, info, warn};

const ACTIVATION_ATTEMPTS: u32 = 2;

/// Remembers the frontmost application and re-activates it on drop.
///
/// One guard per top-level operation: a direct action, or a whole recipe run.
pub struct FocusGuard<'a> {
    engine: &'a dyn AccessibilityEngine,
    saved: Option<AppHandle>,
}

impl<'a> FocusGuard<'a> {
    pub fn save(engine: &'a dyn AccessibilityEngine) -> Self {
        let saved = engine.frontmost_application();
        debug!("saved focus: {:?}", saved.as_ref().map(|a| a.name.as_str()));
        Self { engine, saved }
    }

    pub fn saved(&self) -> Option<&AppHandle> {
        self.saved.as_ref()
    }
}

impl Drop for FocusGuard<'_> {
    fn drop(&mut self) {
        let Some(saved) = self.saved.take() else {
            return;
        };
        let current = self.engine.frontmost_application();
        if current.as_ref().map(|a| &a.name) == Some(&saved.name) {
            return;
        }
        match self.engine.activate_application(&saved) {
            Ok(()) => debug!("restored focus to {}", saved),
            Err(e) => warn!("could not restore focus to {}: {}", saved, e),
        }
    }
}

impl ActionExecutor {
    /// Bring an application (and optionally one of its windows) to the front.
    pub(crate) async fn focus_application(
        &self,
        app: &str,
        window: Option<&str>,
    ) -> Result<ActionOutcome, AutomationError> {
        let running = self.engine.running_applications()?;
        let handle = running.iter().find(|a| a.matches(app)).cloned().ok_or_else(|| {
            let names: Vec<&str> = running.iter().map(|a| a.name.as_str()).collect();
            AutomationError::ElementNotFound(format!(
                "Application '{app}' is not running. Running applications: {}",
                names.join(", ")
            ))
        })?;

        let mut last_error = None;
        let mut activated = false;
        for attempt in 1..=ACTIVATION_ATTEMPTS {
            match self.engine.activate_application(&handle) {
                Ok(()) => {
                    activated = true;
                    settle(self.config.timing.app_focus_delay_ms).await;
                    if self.is_frontmost(&handle) {
                        break;
                    }
                    warn!("{} is not frontmost after activation attempt {}", handle, attempt);
                }
                Err(e) => {
                    warn!("activation attempt {} for {} failed: {}", attempt, handle, e);
                    last_error = Some(e);
                    settle(self.config.timing.app_focus_delay_ms).await;
                }
            }
        }
        if !activated {
            let reason = last_error.map(|e| e.to_string()).unwrap_or_default();
            return Err(action_failed(
                ActionMethod::Native,
                format!("could not activate '{}': {reason}", handle.name),
            ));
        }

        if let Some(title) = window {
            let needle = title.to_lowercase();
            let root = self.engine.application_root(Some(&handle.name))?;
            let target = root.children()?.into_iter().find(|child| {
                let attrs = child.attributes();
                roles::is_window(&attrs.role)
                    && attrs
                        .title
                        .as_deref()
                        .or(attrs.name.as_deref())
                        .is_some_and(|t| t.to_lowercase().contains(&needle))
            });
            let target = target.ok_or_else(|| {
                AutomationError::ElementNotFound(format!(
                    "No window titled '{title}' in {}",
                    handle.name
                ))
            })?;
            target
                .invoke_action(ACTION_RAISE)
                .map_err(|e| action_failed(ActionMethod::Native, format!("raise window '{title}': {e}")))?;
            settle(self.config.timing.focus_element_ms).await;
        }

        let verified = self.is_frontmost(&handle);
        let detail = if verified {
            format!("'{}' is frontmost", handle.name)
        } else {
            format!("activated '{}' but it does not report frontmost", handle.name)
        };
        info!("{}", detail);
        Ok(ActionOutcome::new("focus", ActionMethod::Native, detail).on(handle.name))
    }

    fn is_frontmost(&self, app: &AppHandle) -> bool {
        self.engine
            .frontmost_application()
            .is_some_and(|front| front.name == app.name)
    }
}
