//! Timing and limit knobs shared by search, actions, the poller and recipes.

use crate::errors::AutomationError;
use crate::search::SearchBudget;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// Settle delays, in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timing {
    pub app_focus_delay_ms: u64,
    pub native_reaction_ms: u64,
    pub synthetic_click_ms: u64,
    pub modifier_clear_ms: u64,
    pub hotkey_process_ms: u64,
    pub type_char_delay_ms: u64,
    pub set_value_ms: u64,
    pub clear_field_ms: u64,
    pub focus_element_ms: u64,
    pub readback_ms: u64,
    pub recipe_focus_delay_ms: u64,
    pub default_poll_interval_ms: u64,
    pub default_wait_timeout_ms: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            app_focus_delay_ms: 200,
            native_reaction_ms: 300,
            synthetic_click_ms: 150,
            modifier_clear_ms: 10,
            hotkey_process_ms: 200,
            type_char_delay_ms: 10,
            set_value_ms: 150,
            clear_field_ms: 50,
            focus_element_ms: 100,
            readback_ms: 150,
            recipe_focus_delay_ms: 300,
            default_poll_interval_ms: 500,
            default_wait_timeout_ms: 10_000,
        }
    }
}

impl Timing {
    /// No settle delays at all. Poll interval and wait timeout keep their defaults.
    pub fn immediate() -> Self {
        Self {
            app_focus_delay_ms: 0,
            native_reaction_ms: 0,
            synthetic_click_ms: 0,
            modifier_clear_ms: 0,
            hotkey_process_ms: 0,
            type_char_delay_ms: 0,
            set_value_ms: 0,
            clear_field_ms: 0,
            focus_element_ms: 0,
            readback_ms: 0,
            recipe_focus_delay_ms: 0,
            ..Self::default()
        }
    }

    pub fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }
}

/// Search budgets and traversal ceilings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    pub semantic_depth_budget: usize,
    pub max_results: usize,
    pub max_candidates_scanned: usize,
    pub dom_id_depth: usize,
    pub wait_element_search_depth: usize,
    pub scrollable_search_depth: usize,
    pub web_area_search_depth: usize,
    pub readback_truncation: usize,
    pub default_scroll_amount: u32,
    pub node_cache_ttl_ms: u64,
    pub path_hint_ttl_ms: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            semantic_depth_budget: 25,
            max_results: 50,
            max_candidates_scanned: 100,
            dom_id_depth: 50,
            wait_element_search_depth: 15,
            scrollable_search_depth: 5,
            web_area_search_depth: 10,
            readback_truncation: 200,
            default_scroll_amount: 3,
            node_cache_ttl_ms: 2_000,
            path_hint_ttl_ms: 10_000,
        }
    }
}

impl Limits {
    pub fn search_budget(&self) -> Result<SearchBudget, AutomationError> {
        SearchBudget::new(
            self.semantic_depth_budget,
            self.max_results,
            self.max_candidates_scanned,
        )
        .map(|b| b.with_dom_id_depth(self.dom_id_depth))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomationConfig {
    pub timing: Timing,
    pub limits: Limits,
    /// Browser consulted by `url_contains` preconditions that don't name an app.
    pub default_browser: String,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            timing: Timing::default(),
            limits: Limits::default(),
            default_browser: "Google Chrome".to_string(),
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("Ignoring {}={:?}: not a valid value", name, raw);
            None
        }
    }
}

impl AutomationConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, AutomationError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config: AutomationConfig = serde_json::from_str(&raw).map_err(|e| {
            AutomationError::InvalidArgument(format!("Invalid config {}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay `AXFLOW_*` environment variables onto this config.
    pub fn apply_env_overrides(mut self) -> Self {
        if let Some(v) = env_parse("AXFLOW_SEMANTIC_DEPTH") {
            self.limits.semantic_depth_budget = v;
        }
        if let Some(v) = env_parse("AXFLOW_MAX_RESULTS") {
            self.limits.max_results = v;
        }
        if let Some(v) = env_parse("AXFLOW_MAX_SCANNED") {
            self.limits.max_candidates_scanned = v;
        }
        if let Some(v) = env_parse("AXFLOW_POLL_INTERVAL_MS") {
            self.timing.default_poll_interval_ms = v;
        }
        if let Ok(browser) = std::env::var("AXFLOW_DEFAULT_BROWSER") {
            if !browser.trim().is_empty() {
                self.default_browser = browser.trim().to_string();
            }
        }
        debug!("Effective config: {:?}", self);
        self
    }

    pub fn validate(&self) -> Result<(), AutomationError> {
        self.limits.search_budget().map(|_| ())
    }

    /// Default settings with every settle delay removed.
    pub fn immediate() -> Self {
        Self {
            timing: Timing::immediate(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: AutomationConfig =
            serde_json::from_str(r#"{"limits": {"semantic_depth_budget": 12}}"#).unwrap();
        assert_eq!(config.limits.semantic_depth_budget, 12);
        assert_eq!(config.limits.max_results, 50);
        assert_eq!(config.timing.native_reaction_ms, 300);
        assert_eq!(config.default_browser, "Google Chrome");
    }

    #[test]
    fn test_results_above_scan_cap_rejected() {
        let mut config = AutomationConfig::default();
        config.limits.max_results = 500;
        assert!(matches!(
            config.validate(),
            Err(AutomationError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_immediate_zeroes_settle_delays_only() {
        let timing = Timing::immediate();
        assert_eq!(timing.native_reaction_ms, 0);
        assert_eq!(timing.recipe_focus_delay_ms, 0);
        assert_eq!(timing.default_poll_interval_ms, 500);
    }
}
