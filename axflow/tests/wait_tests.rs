use axflow::platforms::{MemoryEngine, UINode};
use axflow::{Automation, AutomationConfig, WaitCondition, WaitRequest};
use std::sync::Arc;
use std::time::Duration;

fn checkout() -> UINode {
    UINode::new("application").named("Shop").child(
        UINode::new("window").titled("Checkout").with_children([
            UINode::new("statictext").with_value("Press Submit when you are done"),
            UINode::new("group").named("Payment"),
        ]),
    )
}

fn automation(engine: &MemoryEngine) -> Automation {
    Automation::with_config(Arc::new(engine.clone()), AutomationConfig::immediate()).unwrap()
}

#[tokio::test]
async fn test_element_exists_times_out_after_full_timeout() {
    let engine = MemoryEngine::new(vec![checkout()]);
    let request = WaitRequest::new(WaitCondition::ElementExists)
        .value("Submit")
        .timeout(0.2)
        .poll_interval(0.05);
    let outcome = automation(&engine).wait_for(&request).await;

    assert!(!outcome.met);
    assert!(outcome.elapsed_ms >= 200, "{}", outcome.elapsed_ms);
    assert!(outcome.error.as_deref().unwrap().starts_with("Timed out after"));
}

#[tokio::test]
async fn test_element_exists_once_it_appears() {
    let engine = MemoryEngine::new(vec![checkout()]);
    let writer = engine.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        writer.append_child_where(
            |a| a.name.as_deref() == Some("Payment"),
            UINode::new("button").named("Submit order"),
        );
    });

    let request = WaitRequest::new(WaitCondition::ElementExists)
        .value("submit")
        .timeout(2.0)
        .poll_interval(0.05);
    let outcome = automation(&engine).wait_for(&request).await;
    assert!(outcome.met, "{:?}", outcome.error);
    assert!(outcome.elapsed_ms < 2000);
}

#[tokio::test]
async fn test_url_changed_sees_navigation() {
    let app = UINode::new("application").named("Google Chrome").child(
        UINode::new("window")
            .titled("Inbox")
            .child(UINode::new("AXWebArea").with_url("https://mail.google.com/#inbox")),
    );
    let engine = MemoryEngine::new(vec![app]);
    let writer = engine.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        writer.update_where(
            |a| a.url.is_some(),
            |a| a.url = Some("https://mail.google.com/#sent".into()),
        );
    });

    let request = WaitRequest::new(WaitCondition::UrlChanged)
        .timeout(2.0)
        .poll_interval(0.05);
    let outcome = automation(&engine).wait_for(&request).await;
    assert!(outcome.met, "{:?}", outcome.error);
}

#[tokio::test]
async fn test_delay_sleeps_and_succeeds() {
    let engine = MemoryEngine::new(vec![checkout()]);
    let request = WaitRequest::new(WaitCondition::Delay).timeout(0.1);
    let outcome = automation(&engine).wait_for(&request).await;
    assert!(outcome.met);
    assert!(outcome.elapsed_ms >= 100);
}
