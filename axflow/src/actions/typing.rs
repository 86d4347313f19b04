use super::{action_failed, describe, settle, ActionExecutor, ActionMethod, ActionOutcome, ActionTarget};
use crate::element::{truncate_for_report, UIElement, ATTR_VALUE};
use crate::errors::AutomationError;
use crate::keys::{Key, KeyCombo, Modifier};
use crate::locator::Locator;
use crate::platforms::MouseButton;
use tracing::{debug, info, warn};

/// Characters of the requested text that must show up in the readback.
const VERIFY_PREFIX_CHARS: usize = 10;

fn verification_prefix(text: &str) -> String {
    text.chars().take(VERIFY_PREFIX_CHARS).collect()
}

fn readback_matches(readback: Option<&str>, prefix: &str) -> bool {
    prefix.is_empty() || readback.is_some_and(|r| r.contains(prefix))
}

/// Only name-based locators go through field scoring; anything more
/// specific is resolved as given.
fn field_name(locator: &Locator) -> Option<&str> {
    match locator {
        Locator {
            dom_id: None,
            identifier: None,
            role: None,
            dom_class: None,
            name_contains: Some(name),
        } => Some(name.as_str()),
        _ => None,
    }
}

impl ActionExecutor {
    pub(crate) async fn type_text(
        &self,
        text: &str,
        target: Option<&ActionTarget>,
        clear: bool,
        app: Option<&str>,
    ) -> Result<ActionOutcome, AutomationError> {
        let element = match target {
            None => {
                self.bring_to_front(app).await;
                self.type_synthetic(text, clear, ActionMethod::Synthetic).await?;
                return Ok(ActionOutcome::new(
                    "type",
                    ActionMethod::Synthetic,
                    format!("typed {} characters at the current focus", text.chars().count()),
                ));
            }
            Some(ActionTarget::Point(point)) => {
                self.bring_to_front(app).await;
                self.engine
                    .synthetic_click(*point, MouseButton::Left, 1)
                    .map_err(|e| action_failed(ActionMethod::Coordinate, e.to_string()))?;
                settle(self.config.timing.synthetic_click_ms).await;
                self.type_synthetic(text, clear, ActionMethod::Coordinate).await?;
                return Ok(ActionOutcome::new(
                    "type",
                    ActionMethod::Coordinate,
                    format!("typed {} characters at {point}", text.chars().count()),
                ));
            }
            Some(ActionTarget::Named(name)) => self.locate_field(name, app)?,
            Some(ActionTarget::Element(locator)) => match field_name(locator) {
                Some(name) => self.locate_field(name, app)?,
                None => self.locate(locator, app)?,
            },
        };
        self.type_into(&element, text, clear, app).await
    }

    async fn type_into(
        &self,
        element: &UIElement,
        text: &str,
        clear: bool,
        app: Option<&str>,
    ) -> Result<ActionOutcome, AutomationError> {
        let label = describe(element);
        let prefix = verification_prefix(text);
        let truncation = self.config.limits.readback_truncation;

        if element.attributes().is_settable(ATTR_VALUE) {
            match self.set_value_natively(element, text, clear).await {
                Ok(readback) if readback_matches(readback.as_deref(), &prefix) => {
                    debug!("native set-value verified on {}", label);
                    let mut outcome =
                        ActionOutcome::new("type", ActionMethod::Native, "set value and verified")
                            .on(label);
                    outcome.readback = readback.map(|r| truncate_for_report(&r, truncation));
                    return Ok(outcome);
                }
                Ok(readback) => info!(
                    "set-value on {} not reflected (readback {:?}), falling back to click-then-type",
                    label, readback
                ),
                Err(e) => warn!("set-value on {} failed ({}), falling back to click-then-type", label, e),
            }
        }

        self.bring_to_front(app).await;
        self.focus_for_typing(element).await;
        self.type_synthetic(text, clear, ActionMethod::Synthetic).await?;
        settle(self.config.timing.readback_ms).await;

        let readback = element.read_value();
        if readback_matches(readback.as_deref(), &prefix) {
            let mut outcome = ActionOutcome::new("type", ActionMethod::Synthetic, "typed and verified")
                .on(label);
            outcome.readback = readback.map(|r| truncate_for_report(&r, truncation));
            Ok(outcome)
        } else {
            Err(action_failed(
                ActionMethod::Synthetic,
                format!(
                    "typed into {label} but readback {:?} does not contain {:?}",
                    readback.map(|r| truncate_for_report(&r, truncation)),
                    prefix
                ),
            ))
        }
    }

    /// Focus, optionally clear, set the value, and read it straight back.
    async fn set_value_natively(
        &self,
        element: &UIElement,
        text: &str,
        clear: bool,
    ) -> Result<Option<String>, AutomationError> {
        let timing = &self.config.timing;
        if let Err(e) = element.focus() {
            debug!("focus before set-value failed: {}", e);
        }
        settle(timing.focus_element_ms).await;
        if clear {
            element.set_value("")?;
            settle(timing.clear_field_ms).await;
        }
        element.set_value(text)?;
        settle(timing.set_value_ms).await;
        Ok(element.read_value())
    }

    /// Put the caret in `element`: click it when it has a usable frame,
    /// otherwise ask for focus directly.
    async fn focus_for_typing(&self, element: &UIElement) {
        let timing = &self.config.timing;
        let attrs = element.attributes();
        if let (Some(bounds), true) = (attrs.bounds, attrs.is_actionable()) {
            match self
                .engine
                .synthetic_click(bounds.center(), MouseButton::Left, 1)
            {
                Ok(()) => {
                    settle(timing.synthetic_click_ms).await;
                    return;
                }
                Err(e) => debug!("click to focus failed: {}", e),
            }
        }
        if let Err(e) = element.focus() {
            debug!("focus attribute rejected: {}", e);
        }
        settle(timing.focus_element_ms).await;
    }

    /// Select-all + delete on whatever has keyboard focus.
    pub(crate) async fn clear_focused(&self, method: ActionMethod) -> Result<(), AutomationError> {
        let select_all = KeyCombo {
            key: Key::Char('a'),
            modifiers: vec![Modifier::primary()],
        };
        self.send_combo(&select_all, method)?;
        settle(self.config.timing.clear_field_ms).await;
        self.engine
            .synthetic_key(Key::Delete, &[])
            .map_err(|e| action_failed(method, format!("clear field: {e}")))?;
        settle(self.config.timing.clear_field_ms).await;
        Ok(())
    }

    async fn type_synthetic(
        &self,
        text: &str,
        clear: bool,
        method: ActionMethod,
    ) -> Result<(), AutomationError> {
        if clear {
            self.clear_focused(method).await?;
        }
        self.engine
            .synthetic_type(text, crate::config::Timing::ms(self.config.timing.type_char_delay_ms))
            .map_err(|e| action_failed(method, format!("synthetic typing: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verification_prefix_is_ten_chars() {
        assert_eq!(verification_prefix("Hello, wonderful world"), "Hello, won");
        assert_eq!(verification_prefix("héllo"), "héllo");
        assert!(readback_matches(Some("xx Hello, wonderful"), "Hello, won"));
        assert!(!readback_matches(None, "Hello"));
        assert!(readback_matches(None, ""));
    }

    #[test]
    fn test_only_plain_name_locators_use_field_scoring() {
        assert_eq!(field_name(&Locator::name_contains("To")), Some("To"));
        assert_eq!(field_name(&Locator::from("role:text-field|name:To")), None);
        assert_eq!(field_name(&Locator::dom_id("to")), None);
    }
}
