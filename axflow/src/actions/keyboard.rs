use super::{action_failed, settle, ActionExecutor, ActionMethod, ActionOutcome};
use crate::errors::AutomationError;
use crate::keys::{Key, KeyCombo, Modifier};
use tracing::warn;

impl ActionExecutor {
    pub(crate) async fn press(
        &self,
        key: Key,
        modifiers: &[Modifier],
        app: Option<&str>,
    ) -> Result<ActionOutcome, AutomationError> {
        if !modifiers.is_empty() {
            let combo = KeyCombo {
                key,
                modifiers: modifiers.to_vec(),
            };
            return self.hotkey(&combo, app).await;
        }
        self.bring_to_front(app).await;
        self.engine
            .synthetic_key(key, &[])
            .map_err(|e| action_failed(ActionMethod::Synthetic, format!("press {key}: {e}")))?;
        settle(self.config.timing.hotkey_process_ms).await;
        Ok(ActionOutcome::new(
            "press",
            ActionMethod::Synthetic,
            format!("pressed {key}"),
        ))
    }

    pub(crate) async fn hotkey(
        &self,
        combo: &KeyCombo,
        app: Option<&str>,
    ) -> Result<ActionOutcome, AutomationError> {
        self.bring_to_front(app).await;
        self.send_combo(combo, ActionMethod::Synthetic)?;
        settle(self.config.timing.modifier_clear_ms + self.config.timing.hotkey_process_ms).await;
        Ok(ActionOutcome::new(
            "hotkey",
            ActionMethod::Synthetic,
            format!("pressed {combo}"),
        ))
    }

    /// Dispatch a combination and release modifiers in the same call, before
    /// any settle delay can let the host see them as still held.
    pub(crate) fn send_combo(
        &self,
        combo: &KeyCombo,
        method: ActionMethod,
    ) -> Result<(), AutomationError> {
        let sent = self.engine.synthetic_key(combo.key, &combo.modifiers);
        if let Err(e) = self.engine.clear_modifiers() {
            warn!("failed to clear modifiers after {}: {}", combo, e);
        }
        sent.map_err(|e| action_failed(method, format!("hotkey {combo}: {e}")))
    }
}
