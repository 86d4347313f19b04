use super::{action_failed, describe, settle, ActionExecutor, ActionMethod, ActionOutcome, ActionTarget};
use crate::element::UIElement;
use crate::errors::AutomationError;
use crate::locator::Locator;
use crate::platforms::MouseButton;
use tracing::{debug, warn};

impl ActionExecutor {
    pub(crate) async fn click(
        &self,
        target: &ActionTarget,
        button: MouseButton,
        count: u32,
        app: Option<&str>,
    ) -> Result<ActionOutcome, AutomationError> {
        let count = count.max(1);
        let locator = match target {
            ActionTarget::Point(point) => {
                self.bring_to_front(app).await;
                self.engine
                    .synthetic_click(*point, button, count)
                    .map_err(|e| action_failed(ActionMethod::Coordinate, e.to_string()))?;
                settle(self.config.timing.synthetic_click_ms).await;
                return Ok(ActionOutcome::new(
                    "click",
                    ActionMethod::Coordinate,
                    format!("clicked at {point}"),
                ));
            }
            ActionTarget::Element(locator) => locator.clone(),
            ActionTarget::Named(name) => Locator::name_contains(name.as_str()),
        };
        let element = self.locate(&locator, app)?;
        self.click_element(&element, button, count, app).await
    }

    async fn click_element(
        &self,
        element: &UIElement,
        button: MouseButton,
        count: u32,
        app: Option<&str>,
    ) -> Result<ActionOutcome, AutomationError> {
        let label = describe(element);

        // Native press only stands in for a single left click.
        let mut native_error = None;
        if button == MouseButton::Left && count == 1 {
            match element.press() {
                Ok(()) => {
                    settle(self.config.timing.native_reaction_ms).await;
                    debug!("native press on {}", label);
                    return Ok(
                        ActionOutcome::new("click", ActionMethod::Native, "invoked default action")
                            .on(label),
                    );
                }
                Err(e) => {
                    warn!("native press on {} failed ({}), falling back to synthetic click", label, e);
                    native_error = Some(e.to_string());
                }
            }
        }

        let attrs = element.attributes();
        let center = match attrs.bounds {
            Some(bounds) if attrs.is_actionable() => bounds.center(),
            _ => {
                return Err(action_failed(
                    ActionMethod::Synthetic,
                    format!(
                        "{label} is not actionable (disabled or without a usable frame){}",
                        native_error
                            .map(|e| format!("; native press: {e}"))
                            .unwrap_or_default()
                    ),
                ))
            }
        };

        self.bring_to_front(app).await;
        self.engine
            .synthetic_click(center, button, count)
            .map_err(|e| action_failed(ActionMethod::Synthetic, format!("click on {label}: {e}")))?;
        settle(self.config.timing.synthetic_click_ms).await;

        Ok(ActionOutcome::new(
            "click",
            ActionMethod::Synthetic,
            format!("{button:?} click x{count} at {center}").to_lowercase(),
        )
        .on(label))
    }
}
