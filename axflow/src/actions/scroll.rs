use super::{action_failed, describe, settle, ActionExecutor, ActionMethod, ActionOutcome};
use crate::element::{Point, ScrollDirection};
use crate::errors::AutomationError;
use crate::roles;
use crate::search::find_structural;
use tracing::{debug, warn};

impl ActionExecutor {
    pub(crate) async fn scroll(
        &self,
        direction: ScrollDirection,
        amount: Option<u32>,
        point: Option<Point>,
        app: Option<&str>,
    ) -> Result<ActionOutcome, AutomationError> {
        let amount = amount.unwrap_or(self.config.limits.default_scroll_amount);

        if let Some(point) = point {
            self.bring_to_front(app).await;
            self.engine
                .synthetic_scroll(Some(point), direction, amount)
                .map_err(|e| action_failed(ActionMethod::Coordinate, e.to_string()))?;
            return Ok(ActionOutcome::new(
                "scroll",
                ActionMethod::Coordinate,
                format!("scrolled {direction} by {amount} at {point}"),
            ));
        }

        let window = match self.engine.focused_window(app) {
            Ok(window) => window,
            Err(e) => {
                debug!("no window to scroll natively: {}", e);
                None
            }
        };

        let mut aim = window.as_ref().and_then(|w| w.bounds()).map(|b| b.center());
        if let Some(window) = &window {
            let scrollable = find_structural(
                window,
                self.config.limits.scrollable_search_depth,
                |attrs| roles::is_scrollable(&attrs.role),
            );
            if let Some(area) = scrollable {
                let label = describe(&area);
                match area.scroll(direction, amount) {
                    Ok(()) => {
                        return Ok(ActionOutcome::new(
                            "scroll",
                            ActionMethod::Native,
                            format!("scrolled {direction} by {amount}"),
                        )
                        .on(label));
                    }
                    Err(e) => {
                        warn!("native scroll on {} failed ({}), using synthetic scroll", label, e);
                        if let Some(bounds) = area.bounds() {
                            aim = Some(bounds.center());
                        }
                    }
                }
            }
        }

        self.bring_to_front(app).await;
        self.engine
            .synthetic_scroll(aim, direction, amount)
            .map_err(|e| action_failed(ActionMethod::Synthetic, e.to_string()))?;
        settle(self.config.timing.synthetic_click_ms).await;
        Ok(ActionOutcome::new(
            "scroll",
            ActionMethod::Synthetic,
            format!("scrolled {direction} by {amount}"),
        ))
    }
}
