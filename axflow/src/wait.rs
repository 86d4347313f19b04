//! Bounded polling for asynchronous UI state changes.

use crate::config::AutomationConfig;
use crate::context;
use crate::element::UIElementAttributes;
use crate::errors::AutomationError;
use crate::platforms::AccessibilityEngine;
use crate::roles;
use crate::search::find_structural;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WaitCondition {
    #[serde(alias = "url_contains")]
    UrlContains,
    #[serde(alias = "title_contains")]
    TitleContains,
    #[serde(alias = "element_exists")]
    ElementExists,
    #[serde(alias = "element_gone")]
    ElementGone,
    #[serde(alias = "url_changed")]
    UrlChanged,
    #[serde(alias = "title_changed")]
    TitleChanged,
    Delay,
}

impl WaitCondition {
    /// Conditions whose predicate compares against a caller-supplied value.
    pub fn needs_value(self) -> bool {
        matches!(
            self,
            WaitCondition::UrlContains
                | WaitCondition::TitleContains
                | WaitCondition::ElementExists
                | WaitCondition::ElementGone
        )
    }

    fn is_change(self) -> bool {
        matches!(self, WaitCondition::UrlChanged | WaitCondition::TitleChanged)
    }
}

impl fmt::Display for WaitCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WaitCondition::UrlContains => "urlContains",
            WaitCondition::TitleContains => "titleContains",
            WaitCondition::ElementExists => "elementExists",
            WaitCondition::ElementGone => "elementGone",
            WaitCondition::UrlChanged => "urlChanged",
            WaitCondition::TitleChanged => "titleChanged",
            WaitCondition::Delay => "delay",
        })
    }
}

impl std::str::FromStr for WaitCondition {
    type Err = AutomationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(serde_json::Value::String(s.to_string())).map_err(|_| {
            AutomationError::InvalidArgument(format!(
                "Unknown wait condition '{s}'. Expected one of: urlContains, titleContains, elementExists, elementGone, urlChanged, titleChanged, delay"
            ))
        })
    }
}

/// One wait. Times are in seconds; absent values use the configured defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitRequest {
    pub condition: WaitCondition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app: Option<String>,
    #[serde(default, alias = "timeoutSeconds", skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<f64>,
    #[serde(
        default,
        alias = "pollIntervalSeconds",
        skip_serializing_if = "Option::is_none"
    )]
    pub poll_interval_seconds: Option<f64>,
}

impl WaitRequest {
    pub fn new(condition: WaitCondition) -> Self {
        Self {
            condition,
            value: None,
            app: None,
            timeout_seconds: None,
            poll_interval_seconds: None,
        }
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn app(mut self, app: impl Into<String>) -> Self {
        self.app = Some(app.into());
        self
    }

    pub fn timeout(mut self, seconds: f64) -> Self {
        self.timeout_seconds = Some(seconds);
        self
    }

    pub fn poll_interval(mut self, seconds: f64) -> Self {
        self.poll_interval_seconds = Some(seconds);
        self
    }

    fn describe(&self) -> String {
        match self.value.as_deref() {
            Some(value) => format!("{} '{}'", self.condition, value),
            None => self.condition.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitOutcome {
    pub met: bool,
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WaitOutcome {
    fn met(started: Instant) -> Self {
        Self {
            met: true,
            elapsed_ms: started.elapsed().as_millis() as u64,
            error: None,
        }
    }

    fn failed(started: Instant, error: String) -> Self {
        Self {
            met: false,
            elapsed_ms: started.elapsed().as_millis() as u64,
            error: Some(error),
        }
    }

    /// `Timeout` when the condition was not met.
    pub fn into_result(self) -> Result<(), AutomationError> {
        if self.met {
            Ok(())
        } else {
            Err(AutomationError::Timeout(
                self.error.unwrap_or_else(|| "condition not met".to_string()),
            ))
        }
    }
}

/// Seconds from plain data; negative or non-finite values become `fallback`.
fn seconds_or(seconds: Option<f64>, fallback: Duration) -> Duration {
    match seconds {
        Some(s) if s.is_finite() && s >= 0.0 => Duration::from_secs_f64(s),
        _ => fallback,
    }
}

/// Label match for element conditions. Values of body-text nodes are
/// ignored so that document text mentioning the query does not count as
/// a control with that label.
fn labelled(attrs: &UIElementAttributes, needle: &str) -> bool {
    let own = [&attrs.name, &attrs.title, &attrs.description, &attrs.identifier];
    if own
        .into_iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(needle))
    {
        return true;
    }
    !roles::is_text_content(&attrs.role)
        && attrs
            .value
            .as_deref()
            .is_some_and(|v| v.to_lowercase().contains(needle))
}

/// Polls window and tree state until a condition holds or a deadline passes.
#[derive(Clone)]
pub struct ConditionPoller {
    engine: Arc<dyn AccessibilityEngine>,
    config: Arc<AutomationConfig>,
}

impl ConditionPoller {
    pub fn new(engine: Arc<dyn AccessibilityEngine>, config: Arc<AutomationConfig>) -> Self {
        Self { engine, config }
    }

    /// Wait for `request.condition`. Never returns early on timeout: a
    /// failed wait takes at least the full timeout.
    #[instrument(skip(self, request), fields(condition = %request.condition))]
    pub async fn wait_for(&self, request: &WaitRequest) -> WaitOutcome {
        let started = Instant::now();
        let timing = &self.config.timing;
        let timeout = seconds_or(
            request.timeout_seconds,
            Duration::from_millis(timing.default_wait_timeout_ms),
        );
        let interval = seconds_or(
            request.poll_interval_seconds,
            Duration::from_millis(timing.default_poll_interval_ms),
        );

        if request.condition == WaitCondition::Delay {
            tokio::time::sleep(timeout).await;
            return WaitOutcome::met(started);
        }

        let needle = request
            .value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_lowercase);
        if request.condition.needs_value() && needle.is_none() {
            return WaitOutcome::failed(
                started,
                format!("Condition {} requires a value", request.condition),
            );
        }
        let needle = needle.unwrap_or_default();
        let app = request.app.as_deref();

        let baseline = if request.condition.is_change() {
            let observed = self.observe(request.condition, app);
            debug!("baseline for {}: {:?}", request.condition, observed);
            observed
        } else {
            None
        };

        let deadline = started + timeout;
        let mut polls = 0u32;
        loop {
            polls += 1;
            if self.check(request.condition, &needle, baseline.as_deref(), app) {
                debug!("{} met after {} polls", request.describe(), polls);
                return WaitOutcome::met(started);
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            tokio::time::sleep(interval.min(deadline - now)).await;
        }

        WaitOutcome::failed(
            started,
            format!(
                "Timed out after {:.1}s waiting for {}",
                started.elapsed().as_secs_f64(),
                request.describe()
            ),
        )
    }

    fn observe(&self, condition: WaitCondition, app: Option<&str>) -> Option<String> {
        let engine = self.engine.as_ref();
        match condition {
            WaitCondition::UrlContains | WaitCondition::UrlChanged => {
                context::current_url(engine, app, self.config.limits.web_area_search_depth)
            }
            WaitCondition::TitleContains | WaitCondition::TitleChanged => {
                context::current_title(engine, app)
            }
            _ => None,
        }
    }

    fn element_present(&self, needle: &str, app: Option<&str>) -> bool {
        let root = match self.engine.application_root(app) {
            Ok(root) => root,
            Err(e) => {
                debug!("no tree to poll: {}", e);
                return false;
            }
        };
        find_structural(
            &root,
            self.config.limits.wait_element_search_depth,
            |attrs| labelled(attrs, needle),
        )
        .is_some()
    }

    fn check(
        &self,
        condition: WaitCondition,
        needle: &str,
        baseline: Option<&str>,
        app: Option<&str>,
    ) -> bool {
        match condition {
            WaitCondition::UrlContains | WaitCondition::TitleContains => self
                .observe(condition, app)
                .is_some_and(|current| current.to_lowercase().contains(needle)),
            WaitCondition::UrlChanged | WaitCondition::TitleChanged => {
                self.observe(condition, app).as_deref() != baseline
            }
            WaitCondition::ElementExists => self.element_present(needle, app),
            WaitCondition::ElementGone => !self.element_present(needle, app),
            WaitCondition::Delay => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platforms::{MemoryEngine, UINode};

    fn mail_app() -> MemoryEngine {
        MemoryEngine::new(vec![UINode::new("application").named("Mail").child(
            UINode::new("window").titled("Inbox").with_children([
                UINode::new("button").named("Send"),
                UINode::new("static-text").with_value("Press Submit to continue"),
            ]),
        )])
    }

    fn poller(engine: MemoryEngine) -> ConditionPoller {
        ConditionPoller::new(Arc::new(engine), Arc::new(AutomationConfig::immediate()))
    }

    #[tokio::test]
    async fn test_missing_value_fails_without_polling() {
        let poller = poller(mail_app());
        let outcome = poller
            .wait_for(&WaitRequest::new(WaitCondition::ElementExists).timeout(5.0))
            .await;
        assert!(!outcome.met);
        assert!(outcome.elapsed_ms < 1000);
        assert!(outcome.error.unwrap_or_default().contains("requires a value"));
    }

    #[tokio::test]
    async fn test_title_contains_met_immediately() {
        let poller = poller(mail_app());
        let outcome = poller
            .wait_for(&WaitRequest::new(WaitCondition::TitleContains).value("inbox"))
            .await;
        assert!(outcome.met, "{outcome:?}");
    }

    #[tokio::test]
    async fn test_body_text_does_not_count_as_element() {
        let poller = poller(mail_app());
        let outcome = poller
            .wait_for(
                &WaitRequest::new(WaitCondition::ElementExists)
                    .value("Submit")
                    .timeout(0.1)
                    .poll_interval(0.02),
            )
            .await;
        assert!(!outcome.met);
        assert!(outcome.elapsed_ms >= 100);
        assert!(outcome.error.unwrap_or_default().starts_with("Timed out after"));
    }

    #[tokio::test]
    async fn test_element_gone_after_removal() {
        let engine = mail_app();
        let remover = engine.clone();
        let poller = poller(engine);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            remover.remove_where(|attrs| attrs.name.as_deref() == Some("Send"));
        });
        let outcome = poller
            .wait_for(
                &WaitRequest::new(WaitCondition::ElementGone)
                    .value("send")
                    .timeout(2.0)
                    .poll_interval(0.02),
            )
            .await;
        assert!(outcome.met, "{outcome:?}");
        assert!(outcome.elapsed_ms < 2000);
    }

    #[tokio::test]
    async fn test_title_changed_against_baseline() {
        let engine = mail_app();
        let renamer = engine.clone();
        let poller = poller(engine);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            renamer.update_where(
                |attrs| attrs.title.as_deref() == Some("Inbox"),
                |attrs| attrs.title = Some("Drafts".into()),
            );
        });
        let outcome = poller
            .wait_for(
                &WaitRequest::new(WaitCondition::TitleChanged)
                    .timeout(2.0)
                    .poll_interval(0.01),
            )
            .await;
        assert!(outcome.met);
    }

    #[test]
    fn test_condition_names() {
        assert_eq!(
            "urlContains".parse::<WaitCondition>().unwrap(),
            WaitCondition::UrlContains
        );
        assert_eq!(
            "element_gone".parse::<WaitCondition>().unwrap(),
            WaitCondition::ElementGone
        );
        assert!("appears".parse::<WaitCondition>().is_err());
    }
}
