use axflow::platforms::{AccessibilityEngine, InputEvent, MemoryEngine, UINode};
use axflow::{Automation, AutomationConfig, ErrorKind, Recipe, RunReport};
use std::collections::HashMap;
use std::sync::Arc;

fn mail() -> UINode {
    UINode::new("application").named("Mail").child(
        UINode::new("window").titled("Inbox").with_children([
            UINode::new("button")
                .named("Compose")
                .with_bounds(10.0, 10.0, 80.0, 30.0),
            UINode::new("text-field")
                .named("Message")
                .with_bounds(10.0, 60.0, 400.0, 200.0)
                .editable(),
        ]),
    )
}

fn browser(url: &str) -> UINode {
    UINode::new("application").named("Google Chrome").child(
        UINode::new("window")
            .titled("Inbox - Mail")
            .child(UINode::new("AXWebArea").with_url(url)),
    )
}

fn automation(engine: &MemoryEngine) -> Automation {
    Automation::with_config(Arc::new(engine.clone()), AutomationConfig::immediate()).unwrap()
}

fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

async fn run(engine: &MemoryEngine, json: &str, values: &[(&str, &str)]) -> RunReport {
    let recipe = Recipe::from_json(json).unwrap();
    automation(engine).run(&recipe, &params(values)).await
}

fn value_of(engine: &MemoryEngine, name: &str) -> Option<String> {
    engine
        .find_attributes(|a| a.name.as_deref() == Some(name))
        .into_iter()
        .next()
        .and_then(|a| a.value)
}

const COMPOSE: &str = r#"{
    "name": "compose",
    "app": "Mail",
    "params": {"name": {"type": "string", "description": "Who to greet", "required": true}},
    "steps": [
        {"id": 1, "action": "click", "target": {"nameContains": "Compose"},
         "waitAfter": {"condition": "delay", "timeout": 0.1}},
        {"id": 2, "action": "type", "params": {"text": "Hello {{name}}", "into": "Message"}}
    ]
}"#;

#[tokio::test]
async fn test_compose_and_greet() {
    let engine = MemoryEngine::new(vec![mail()]);
    let report = run(&engine, COMPOSE, &[("name", "Ann")]).await;

    assert!(report.success, "{:?}", report.error);
    assert_eq!(report.steps_completed, 2);
    assert_eq!(report.total_steps, 2);
    assert!(report.step_results.iter().all(|r| r.success));
    assert!(report.step_results[0].duration_ms >= 100);
    assert_eq!(value_of(&engine, "Message").as_deref(), Some("Hello Ann"));
    assert!(report.error.is_none() && report.failure_context.is_none());
}

#[tokio::test]
async fn test_missing_parameter_stops_before_any_step() {
    let engine = MemoryEngine::new(vec![mail()]);
    let report = run(&engine, COMPOSE, &[]).await;

    assert!(!report.success);
    assert_eq!(report.error_kind, Some(ErrorKind::MissingParameter));
    assert_eq!(report.steps_completed, 0);
    assert!(report.error.as_deref().unwrap().contains("name"));
    assert!(report.suggestion.is_some());
    assert!(engine.events().is_empty());
}

#[tokio::test]
async fn test_parameter_type_checked() {
    let json = r#"{
        "name": "repeat",
        "params": {"times": {"type": "number", "required": true}},
        "steps": [{"id": 1, "action": "press", "params": {"key": "tab"}}]
    }"#;
    let engine = MemoryEngine::new(vec![mail()]);
    let report = run(&engine, json, &[("times", "many")]).await;
    assert_eq!(report.error_kind, Some(ErrorKind::InvalidArgument));
    assert!(report.error.as_deref().unwrap().contains("number"));
}

fn three_steps(policy: &str) -> String {
    format!(
        r#"{{
        "name": "tabs",
        "steps": [
            {{"id": 1, "action": "press", "params": {{"key": "tab"}}}},
            {{"id": 2, "action": "click", "params": {{"query": "Nonexistent"}}, "onFailure": "{policy}"}},
            {{"id": 3, "action": "press", "params": {{"key": "tab"}}}}
        ]
    }}"#
    )
}

#[tokio::test]
async fn test_skip_continues_past_failed_step() {
    let engine = MemoryEngine::new(vec![mail()]);
    let report = run(&engine, &three_steps("skip"), &[]).await;

    assert!(report.success);
    assert_eq!(report.steps_completed, 3);
    assert!(!report.step_results[1].success);
    assert!(report.step_results[2].success);
    assert!(report.first_step_error().is_some());
    assert!(report.error.is_none());
}

#[tokio::test]
async fn test_stop_aborts_at_failed_step() {
    let engine = MemoryEngine::new(vec![mail()]);
    let report = run(&engine, &three_steps("stop"), &[]).await;

    assert!(!report.success);
    assert_eq!(report.steps_completed, 2);
    assert_eq!(report.failed_step, Some(2));
    assert_eq!(report.error_kind, Some(ErrorKind::ElementNotFound));
    let error = report.error.as_deref().unwrap();
    assert!(error.contains("Recipe 'tabs' failed at step 2"), "{error}");
    assert!(report.failure_context.is_some());
}

#[tokio::test]
async fn test_wait_after_timeout_fails_the_step() {
    let json = r#"{
        "name": "compose-draft",
        "steps": [
            {"id": 1, "action": "click", "target": {"nameContains": "Compose"},
             "wait_after": {"condition": "elementExists", "value": "Draft", "timeout": 0.2}}
        ]
    }"#;
    let engine = MemoryEngine::new(vec![mail()]);
    let report = run(&engine, json, &[]).await;

    assert!(!report.success);
    assert_eq!(report.error_kind, Some(ErrorKind::Timeout));
    assert_eq!(report.failed_step, Some(1));
    let step = &report.step_results[0];
    assert!(!step.success);
    assert!(step
        .error
        .as_deref()
        .unwrap()
        .starts_with("Action succeeded but expected state didn't materialize"));
    assert!(step.duration_ms >= 200);
}

#[tokio::test]
async fn test_app_precondition_lists_running_apps() {
    let json = r#"{
        "name": "needs-safari",
        "preconditions": {"appRunning": "Safari"},
        "steps": [{"id": 1, "action": "press", "params": {"key": "tab"}}]
    }"#;
    let engine = MemoryEngine::new(vec![mail()]);
    let report = run(&engine, json, &[]).await;

    assert_eq!(report.error_kind, Some(ErrorKind::PreconditionFailed));
    assert!(report
        .error
        .as_deref()
        .unwrap()
        .contains("'Safari' is not running. Running applications: Mail"));
    assert!(report.step_results.is_empty());
}

#[tokio::test]
async fn test_url_precondition() {
    let json = r#"{
        "name": "gmail",
        "preconditions": {"url_contains": "mail.google.com"},
        "steps": [{"id": 1, "action": "press", "params": {"key": "tab"}}]
    }"#;

    let elsewhere = MemoryEngine::new(vec![browser("https://example.com/")]);
    let report = run(&elsewhere, json, &[]).await;
    assert_eq!(report.error_kind, Some(ErrorKind::PreconditionFailed));
    assert!(report.error.as_deref().unwrap().contains(
        "URL should contain 'mail.google.com' but current URL is 'https://example.com/'"
    ));

    let on_gmail = MemoryEngine::new(vec![browser("https://mail.google.com/mail/u/0/#inbox")]);
    let report = run(&on_gmail, json, &[]).await;
    assert!(report.success, "{:?}", report.error);
}

#[tokio::test]
async fn test_run_restores_previous_frontmost_app() {
    let engine = MemoryEngine::new(vec![browser("https://example.com/"), mail()]);
    let report = run(&engine, COMPOSE, &[("name", "Bo")]).await;
    assert!(report.success, "{:?}", report.error);

    assert_eq!(
        engine.frontmost_application().map(|a| a.name).as_deref(),
        Some("Google Chrome")
    );
}

#[tokio::test]
async fn test_type_at_current_focus_with_delay_after() {
    let json = r#"{
        "name": "greet",
        "steps": [
            {"id": 1, "action": "click", "target": {"nameContains": "Compose"}},
            {"id": 2, "action": "type", "params": {"text": "Hello {{name}}"},
             "waitAfter": {"condition": "delay", "timeoutSeconds": 0.1}}
        ]
    }"#;
    let engine = MemoryEngine::new(vec![mail()]);
    let report = run(&engine, json, &[("name", "Ann")]).await;

    assert!(report.success, "{:?}", report.error);
    assert_eq!(report.steps_completed, 2);
    assert!(report.step_results[1].duration_ms >= 100);
    assert!(engine.events().contains(&InputEvent::Type {
        text: "Hello Ann".into()
    }));
}

#[tokio::test]
async fn test_click_query_is_matched_as_plain_text() {
    let engine = MemoryEngine::new(vec![UINode::new("application").named("Slack").child(
        UINode::new("window").titled("Workspace").with_children([
            UINode::new("button")
                .named("#random")
                .with_bounds(10.0, 10.0, 120.0, 24.0),
            UINode::new("button")
                .named("#general")
                .with_bounds(10.0, 40.0, 120.0, 24.0),
        ]),
    )]);
    let report = run(
        &engine,
        r##"{
            "name": "chan",
            "steps": [{"id": 1, "action": "click", "params": {"query": "#general"}}]
        }"##,
        &[],
    )
    .await;

    assert!(report.success, "{:?}", report.error);
    assert!(engine.events().contains(&InputEvent::NativePress {
        target: "#general".into()
    }));
}
