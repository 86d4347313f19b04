use super::types::{
    parse_bool, parse_button, parse_combo, parse_condition, parse_count, parse_direction,
    parse_key, parse_modifiers, parse_number, parse_seconds, FailurePolicy, ParamType,
    Preconditions, Recipe, RecipeStep, StepAction, WaitSpec,
};
use crate::actions::{settle, ActionExecutor, ActionMethod, ActionRequest, ActionTarget, FocusGuard};
use crate::config::AutomationConfig;
use crate::context::{self, ContextSnapshot};
use crate::element::{Point, ScrollDirection};
use crate::errors::{AutomationError, ErrorKind};
use crate::locator::Locator;
use crate::platforms::{AccessibilityEngine, MouseButton};
use crate::wait::{ConditionPoller, WaitCondition, WaitRequest};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

/// Outcome of one executed step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub step_id: u32,
    pub action: String,
    pub success: bool,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Path that carried out the action; absent for wait steps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<ActionMethod>,
}

/// Everything a caller learns about one recipe run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub recipe_name: String,
    pub success: bool,
    /// Steps that were attempted, including failed and skipped ones.
    pub steps_completed: usize,
    pub total_steps: usize,
    pub duration_ms: u64,
    pub step_results: Vec<StepResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_context: Option<ContextSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl RunReport {
    fn start(run_id: Uuid, recipe: &Recipe) -> Self {
        Self {
            run_id,
            recipe_name: recipe.name.clone(),
            success: false,
            steps_completed: 0,
            total_steps: recipe.steps.len(),
            duration_ms: 0,
            step_results: Vec::new(),
            error: None,
            error_kind: None,
            failed_step: None,
            failure_context: None,
            suggestion: None,
        }
    }

    fn finish(mut self, started: Instant) -> Self {
        self.steps_completed = self.step_results.len();
        self.duration_ms = elapsed_ms(started);
        self
    }

    /// The first failed step's error, if any step failed.
    pub fn first_step_error(&self) -> Option<&str> {
        self.step_results
            .iter()
            .find(|r| !r.success)
            .and_then(|r| r.error.as_deref())
    }
}

/// What a resolved step turns into.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Dispatch {
    Action(ActionRequest),
    Wait(WaitRequest),
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

fn suggestion_for(kind: ErrorKind) -> Option<&'static str> {
    let text = match kind {
        ErrorKind::ElementNotFound => {
            "Broaden the target: use a shorter name fragment or drop the role filter, and inspect the tree with find_elements."
        }
        ErrorKind::MissingParameter => {
            "Provide all required parameters. Load the recipe to see parameter details."
        }
        ErrorKind::PreconditionFailed => {
            "Bring the application to the required state (running, on the right page) and run again."
        }
        ErrorKind::Timeout => {
            "The action ran but the expected state never appeared. Check failure_context for where the UI ended up."
        }
        ErrorKind::InvalidDefinition => "Fix the recipe definition; the error names the step.",
        ErrorKind::ActionFailed => {
            "The element was found but did not accept the input. Check that it is enabled and visible."
        }
        _ => return None,
    };
    Some(text)
}

/// Turn a substituted step into an action or wait request.
pub(crate) fn plan(
    step: &RecipeStep,
    action: &StepAction,
    recipe_app: Option<&str>,
) -> Result<Dispatch, AutomationError> {
    let id = step.id;
    let target = step.target.clone().filter(|t| !t.is_empty());
    let or_recipe = |app: &Option<String>| app.clone().or_else(|| recipe_app.map(str::to_string));
    let point = |x: &Option<String>, y: &Option<String>| -> Result<Option<Point>, AutomationError> {
        match (x, y) {
            (Some(x), Some(y)) => Ok(Some(Point::new(
                parse_number(id, "x", x)?,
                parse_number(id, "y", y)?,
            ))),
            _ => Ok(None),
        }
    };

    let dispatch = match action {
        StepAction::Click {
            query,
            x,
            y,
            button,
            count,
            app,
        } => {
            let query = query.as_deref().map(str::trim).filter(|q| !q.is_empty());
            let target = match (target, query) {
                (Some(locator), query) => ActionTarget::Element(locator.or_name(query)),
                (None, Some(query)) => ActionTarget::Element(Locator::name_contains(query)),
                (None, None) => match point(x, y)? {
                    Some(point) => ActionTarget::Point(point),
                    None => {
                        return Err(AutomationError::invalid_step(
                            id,
                            "click needs a target, a 'query' param, or both 'x' and 'y'",
                        ))
                    }
                },
            };
            Dispatch::Action(ActionRequest::Click {
                target,
                button: match button {
                    Some(b) => parse_button(id, b)?,
                    None => MouseButton::Left,
                },
                count: match count {
                    Some(c) => parse_count(id, c)?,
                    None => 1,
                },
                app: or_recipe(app),
            })
        }
        StepAction::Type {
            text,
            into,
            clear,
            app,
        } => {
            let into = into.as_deref().map(str::trim).filter(|i| !i.is_empty());
            let target = match (target, into) {
                (Some(locator), into) => Some(ActionTarget::Element(locator.or_name(into))),
                (None, Some(into)) => Some(ActionTarget::Named(into.to_string())),
                (None, None) => None,
            };
            Dispatch::Action(ActionRequest::Type {
                text: text.clone(),
                target,
                clear: match clear {
                    Some(c) => parse_bool(id, "clear", c)?,
                    None => false,
                },
                app: or_recipe(app),
            })
        }
        StepAction::Press {
            key,
            modifiers,
            app,
        } => Dispatch::Action(ActionRequest::Press {
            key: parse_key(id, key)?,
            modifiers: match modifiers {
                Some(m) => parse_modifiers(id, m)?,
                None => Vec::new(),
            },
            app: or_recipe(app),
        }),
        StepAction::Hotkey { keys, app } => Dispatch::Action(ActionRequest::Hotkey {
            combo: parse_combo(id, keys)?,
            app: or_recipe(app),
        }),
        StepAction::Focus { app, window } => {
            let app = or_recipe(app).ok_or_else(|| {
                AutomationError::invalid_step(id, "focus needs an 'app' param or a recipe-level app")
            })?;
            Dispatch::Action(ActionRequest::Focus {
                app,
                window: window.clone(),
            })
        }
        StepAction::Scroll {
            direction,
            amount,
            x,
            y,
            app,
        } => Dispatch::Action(ActionRequest::Scroll {
            direction: match direction {
                Some(d) => parse_direction(id, d)?,
                None => ScrollDirection::Down,
            },
            amount: match amount {
                Some(a) => Some(parse_number(id, "amount", a)?),
                None => None,
            },
            point: point(x, y)?,
            app: or_recipe(app),
        }),
        StepAction::Wait {
            condition,
            value,
            timeout,
            app,
        } => {
            let mut request = WaitRequest::new(parse_condition(id, condition)?);
            request.value = value.clone();
            request.app = or_recipe(app);
            request.timeout_seconds = Some(match timeout {
                Some(t) => parse_seconds(id, "timeout", t)?,
                None => WaitSpec::DEFAULT_TIMEOUT_SECS,
            });
            Dispatch::Wait(request)
        }
    };
    Ok(dispatch)
}

/// Runs recipes step by step against one engine.
#[derive(Clone)]
pub struct RecipeRunner {
    engine: Arc<dyn AccessibilityEngine>,
    executor: ActionExecutor,
    poller: ConditionPoller,
    config: Arc<AutomationConfig>,
}

impl RecipeRunner {
    pub fn new(
        engine: Arc<dyn AccessibilityEngine>,
        executor: ActionExecutor,
        poller: ConditionPoller,
        config: Arc<AutomationConfig>,
    ) -> Self {
        Self {
            engine,
            executor,
            poller,
            config,
        }
    }

    /// Run `recipe` with `values` for its parameters.
    ///
    /// Every failure is reported inside the [`RunReport`]; this never errors.
    pub async fn run(&self, recipe: &Recipe, values: &HashMap<String, String>) -> RunReport {
        let run_id = Uuid::new_v4();
        let span = info_span!("recipe_run", recipe = %recipe.name, run_id = %run_id);
        self.run_inner(recipe, values, run_id).instrument(span).await
    }

    async fn run_inner(
        &self,
        recipe: &Recipe,
        values: &HashMap<String, String>,
        run_id: Uuid,
    ) -> RunReport {
        let started = Instant::now();
        let mut report = RunReport::start(run_id, recipe);
        let app = recipe.app.as_deref();
        info!("running recipe '{}' ({} steps)", recipe.name, recipe.steps.len());

        if let Err(e) = check_params(recipe, values) {
            return self.abort(report, started, e, None, app);
        }
        if let Some(preconditions) = &recipe.preconditions {
            if let Err(e) = self.check_preconditions(preconditions) {
                return self.abort(report, started, e, None, app);
            }
        }

        let _focus = FocusGuard::save(self.engine.as_ref());
        if let Some(name) = app {
            if let Err(e) = self.executor.focus_application(name, None).await {
                let e = AutomationError::PreconditionFailed(format!(
                    "Failed to focus '{name}' for recipe '{}': {e}",
                    recipe.name
                ));
                return self.abort(report, started, e, None, app);
            }
            settle(self.config.timing.recipe_focus_delay_ms).await;
        }

        for step in &recipe.steps {
            let step_started = Instant::now();
            let mut result = StepResult {
                step_id: step.id,
                action: step.action.kind().to_string(),
                success: true,
                duration_ms: 0,
                error: None,
                note: step.note.clone(),
                method: None,
            };

            match self.execute(step, values, app).await {
                Ok(method) => result.method = method,
                Err(e) => {
                    result.success = false;
                    result.error = Some(e.to_string());
                    result.duration_ms = elapsed_ms(step_started);
                    report.step_results.push(result);

                    if step.on_failure.unwrap_or(recipe.on_failure) == FailurePolicy::Skip {
                        warn!("step {} ({}) failed, skipping: {}", step.id, step.label(), e);
                        continue;
                    }
                    let e = step_failure(recipe, step, e);
                    return self.abort(report, started, e, Some(step.id), app);
                }
            }

            if let Some(wait) = &step.wait_after {
                let wait = wait.substituted(values);
                if let Err(e) = self.wait_after(&wait, app).await {
                    let message = format!("Action succeeded but expected state didn't materialize: {e}");
                    result.success = false;
                    result.error = Some(message.clone());
                    result.duration_ms = elapsed_ms(step_started);
                    report.step_results.push(result);
                    let e = AutomationError::Timeout(format!(
                        "Recipe '{}' step {} wait_after failed: {message}",
                        recipe.name, step.id
                    ));
                    return self.abort(report, started, e, Some(step.id), app);
                }
            }

            result.duration_ms = elapsed_ms(step_started);
            info!("step {} OK: {}", step.id, step.label());
            report.step_results.push(result);
        }

        report.success = true;
        let report = report.finish(started);
        info!(
            "recipe '{}' finished: {}/{} steps in {} ms",
            recipe.name, report.steps_completed, report.total_steps, report.duration_ms
        );
        report
    }

    async fn execute(
        &self,
        step: &RecipeStep,
        values: &HashMap<String, String>,
        recipe_app: Option<&str>,
    ) -> Result<Option<ActionMethod>, AutomationError> {
        let action = step.action.substituted(step.id, values)?;
        match plan(step, &action, recipe_app)? {
            Dispatch::Action(request) => {
                let outcome = self.executor.dispatch(&request).await?;
                Ok(Some(outcome.method))
            }
            Dispatch::Wait(request) => {
                self.poller.wait_for(&request).await.into_result()?;
                Ok(None)
            }
        }
    }

    async fn wait_after(&self, wait: &WaitSpec, app: Option<&str>) -> Result<(), AutomationError> {
        if wait.condition == WaitCondition::Delay {
            tokio::time::sleep(Duration::from_secs_f64(wait.timeout_secs().max(0.0))).await;
            return Ok(());
        }
        let mut request = WaitRequest::new(wait.condition).timeout(wait.timeout_secs());
        request.value = wait.probe_value().map(str::to_string);
        request.app = app.map(str::to_string);
        self.poller.wait_for(&request).await.into_result()
    }

    fn check_preconditions(&self, pre: &Preconditions) -> Result<(), AutomationError> {
        if let Some(required) = &pre.app_running {
            let running = self.engine.running_applications()?;
            if !running.iter().any(|a| a.matches(required)) {
                let names: Vec<&str> = running.iter().map(|a| a.name.as_str()).collect();
                return Err(AutomationError::PreconditionFailed(format!(
                    "'{required}' is not running. Running applications: {}",
                    names.join(", ")
                )));
            }
        }
        if let Some(required) = &pre.url_contains {
            let app = pre
                .app_running
                .as_deref()
                .unwrap_or(&self.config.default_browser);
            let current = context::current_url(
                self.engine.as_ref(),
                Some(app),
                self.config.limits.web_area_search_depth,
            )
            .unwrap_or_else(|| "(no URL)".to_string());
            if !current.to_lowercase().contains(&required.to_lowercase()) {
                return Err(AutomationError::PreconditionFailed(format!(
                    "URL should contain '{required}' but current URL is '{current}'"
                )));
            }
        }
        Ok(())
    }

    /// Close out a failed run. The context snapshot is best effort and
    /// never replaces `error`.
    fn abort(
        &self,
        mut report: RunReport,
        started: Instant,
        error: AutomationError,
        failed_step: Option<u32>,
        app: Option<&str>,
    ) -> RunReport {
        warn!("recipe '{}' aborted: {}", report.recipe_name, error);
        let kind = error.kind();
        report.success = false;
        report.error = Some(error.to_string());
        report.error_kind = Some(kind);
        report.failed_step = failed_step;
        report.suggestion = suggestion_for(kind).map(str::to_string);
        let snapshot = context::capture(
            self.engine.as_ref(),
            app,
            self.config.limits.web_area_search_depth,
        );
        report.failure_context = (!snapshot.is_empty()).then_some(snapshot);
        report.finish(started)
    }
}

fn check_params(recipe: &Recipe, values: &HashMap<String, String>) -> Result<(), AutomationError> {
    if let Some((name, def)) = recipe.missing_params(values).next() {
        return Err(AutomationError::MissingParameter {
            name: name.to_string(),
            description: def.description.clone(),
        });
    }
    for (name, value) in values {
        if let Some(def) = recipe.params.get(name) {
            if !def.accepts(value) {
                let expected = match def.kind {
                    ParamType::String => "string",
                    ParamType::Number => "number",
                    ParamType::Boolean => "boolean",
                };
                return Err(AutomationError::InvalidArgument(format!(
                    "Parameter '{name}' must be a {expected}, got '{value}'"
                )));
            }
        }
    }
    Ok(())
}

/// Wrap a step error with the recipe and step, keeping its kind.
fn step_failure(recipe: &Recipe, step: &RecipeStep, error: AutomationError) -> AutomationError {
    let prefix = format!(
        "Recipe '{}' failed at step {} ({})",
        recipe.name,
        step.id,
        step.label()
    );
    match error {
        AutomationError::ElementNotFound(m) => AutomationError::ElementNotFound(format!("{prefix}: {m}")),
        AutomationError::ActionFailed { method, detail } => AutomationError::ActionFailed {
            method,
            detail: format!("{prefix}: {detail}"),
        },
        AutomationError::Timeout(m) => AutomationError::Timeout(format!("{prefix}: {m}")),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(action: StepAction) -> RecipeStep {
        RecipeStep::new(1, action)
    }

    #[test]
    fn test_plan_click_prefers_locator_over_query() {
        let s = step(StepAction::Click {
            query: Some("Send".into()),
            x: None,
            y: None,
            button: None,
            count: None,
            app: None,
        })
        .with_target(Locator::name_contains("Compose"));
        match plan(&s, &s.action, Some("Mail")).unwrap() {
            Dispatch::Action(ActionRequest::Click { target, app, count, .. }) => {
                assert_eq!(target, ActionTarget::Element(Locator::name_contains("Compose")));
                assert_eq!(app.as_deref(), Some("Mail"));
                assert_eq!(count, 1);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_plan_click_query_is_a_name_not_a_selector() {
        let s = step(StepAction::Click {
            query: Some("#general".into()),
            x: None,
            y: None,
            button: None,
            count: None,
            app: None,
        });
        match plan(&s, &s.action, None).unwrap() {
            Dispatch::Action(ActionRequest::Click { target, .. }) => {
                assert_eq!(target, ActionTarget::Element(Locator::name_contains("#general")));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_plan_click_coordinates() {
        let s = step(StepAction::Click {
            query: None,
            x: Some("10".into()),
            y: Some("20.5".into()),
            button: Some("right".into()),
            count: Some("2".into()),
            app: None,
        });
        match plan(&s, &s.action, None).unwrap() {
            Dispatch::Action(ActionRequest::Click {
                target,
                button,
                count,
                ..
            }) => {
                assert_eq!(target, ActionTarget::Point(Point::new(10.0, 20.5)));
                assert_eq!(button, MouseButton::Right);
                assert_eq!(count, 2);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_plan_rejects_bad_substituted_number() {
        let s = step(StepAction::Scroll {
            direction: None,
            amount: Some("lots".into()),
            x: None,
            y: None,
            app: None,
        });
        assert!(matches!(
            plan(&s, &s.action, None),
            Err(AutomationError::InvalidDefinition { step_id: 1, .. })
        ));
    }

    #[test]
    fn test_plan_type_into_named_field() {
        let s = step(StepAction::Type {
            text: "hi".into(),
            into: Some("Subject".into()),
            clear: Some("true".into()),
            app: None,
        });
        match plan(&s, &s.action, None).unwrap() {
            Dispatch::Action(ActionRequest::Type { target, clear, .. }) => {
                assert_eq!(target, Some(ActionTarget::Named("Subject".into())));
                assert!(clear);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
