use super::init_tracing;
use crate::cache::ResolutionCache;
use crate::locator::Locator;
use crate::platforms::{AccessibilityEngine, MemoryEngine, UINode};
use crate::search::{ElementSearcher, SearchBudget};
use crate::UIElement;
use std::sync::Arc;

fn searcher(semantic_depth: usize) -> ElementSearcher {
    ElementSearcher::new(
        SearchBudget::default().with_semantic_depth(semantic_depth),
        Arc::new(ResolutionCache::default()),
    )
}

/// `wrappers` empty layout groups around `node`.
fn tunnelled(node: UINode, wrappers: usize) -> UINode {
    (0..wrappers).fold(node, |inner, _| UINode::new("AXGroup").child(inner))
}

/// `levels` labelled regions around `node`; each one costs a level.
fn labelled(node: UINode, levels: usize) -> UINode {
    (0..levels).fold(node, |inner, i| {
        UINode::new("AXGroup")
            .with_description(format!("Region {i}"))
            .child(inner)
    })
}

/// Application (depth 0) and window (depth 1); content starts at depth 2.
fn browser(content: UINode) -> UIElement {
    let app = UINode::new("application")
        .named("Browser")
        .child(UINode::new("window").titled("Inbox").child(content));
    MemoryEngine::new(vec![app]).application_root(None).unwrap()
}

fn send_button() -> UINode {
    UINode::new("button").named("Send")
}

#[test]
fn test_empty_wrappers_are_free() {
    init_tracing();
    let send = Locator::name_contains("Send");
    for wrappers in [0, 40] {
        let root = browser(tunnelled(send_button(), wrappers));
        let found = searcher(2).resolve(&send, &root);
        assert_eq!(found.len(), 1, "{wrappers} wrappers within budget 2");

        let root = browser(tunnelled(send_button(), wrappers));
        assert!(
            searcher(1).resolve(&send, &root).is_empty(),
            "{wrappers} wrappers with budget 1"
        );
    }
}

#[test]
fn test_labelled_containers_cost_a_level_each() {
    let send = Locator::name_contains("Send");
    let root = browser(labelled(send_button(), 3));
    assert!(searcher(4).resolve(&send, &root).is_empty());

    let root = browser(labelled(send_button(), 3));
    assert_eq!(searcher(5).resolve(&send, &root).len(), 1);
}

#[test]
fn test_dom_id_shadows_other_criteria() {
    let root = browser(UINode::new("group").with_children([
        send_button(),
        UINode::new("button")
            .named("Archive")
            .with_dom_id("send-btn"),
    ]));
    let combined = Locator {
        dom_id: Some("send-btn".into()),
        name_contains: Some("Send".into()),
        ..Default::default()
    };
    let alone = Locator::dom_id("send-btn");

    let s = searcher(25);
    let via_combined = s.resolve(&combined, &root);
    let via_alone = s.resolve(&alone, &root);
    assert_eq!(via_combined.len(), 1);
    assert_eq!(via_combined[0].attributes().name.as_deref(), Some("Archive"));
    assert_eq!(via_combined[0], via_alone[0]);
    assert_eq!(combined.cache_key(), alone.cache_key());
}

#[test]
fn test_dom_id_ignores_semantic_depth_within_structural_ceiling() {
    let target = UINode::new("textfield").with_dom_id("to");
    let root = browser(labelled(target.clone(), 30));
    assert!(searcher(2).find_by_dom_id("to", &root).is_some());

    let root = browser(labelled(target, 60));
    assert!(searcher(2).find_by_dom_id("to", &root).is_none());
}

#[test]
fn test_results_capped_and_deduplicated() {
    let buttons = (0..80).map(|i| UINode::new("button").named(format!("Row {i}")));
    let root = browser(UINode::new("list").with_children(buttons));
    let budget = SearchBudget::new(25, 10, 100).unwrap();
    let s = ElementSearcher::new(budget, Arc::new(ResolutionCache::default()));
    let found = s.resolve(&Locator::name_contains("Row"), &root);
    assert_eq!(found.len(), 10);
    let mut ids: Vec<usize> = found.iter().map(UIElement::object_id).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 10);
}

#[test]
fn test_stale_path_hint_falls_back_to_full_search() {
    init_tracing();
    let app = UINode::new("application").named("Mail").child(
        UINode::new("window")
            .titled("Inbox")
            .with_children([send_button(), UINode::new("button").named("Archive")]),
    );
    let engine = MemoryEngine::new(vec![app]);
    let root = engine.application_root(None).unwrap();
    let cache = Arc::new(ResolutionCache::default());
    let s = ElementSearcher::new(SearchBudget::default(), cache.clone());
    let send = Locator::name_contains("Send");

    let first = s.resolve_first(&send, &root).unwrap();
    assert_eq!(first.attributes().name.as_deref(), Some("Send"));
    assert_eq!(cache.nodes.len(), 1);
    assert_eq!(cache.path_hints.len(), 1);

    // The recorded path now leads to "Archive".
    engine.remove_where(|a| a.name.as_deref() == Some("Send"));
    assert!(engine.append_child_where(
        |a| a.title.as_deref() == Some("Inbox"),
        UINode::new("button").named("Send later"),
    ));
    cache.nodes.invalidate_all();

    let second = s.resolve_first(&send, &root).unwrap();
    assert_eq!(second.attributes().name.as_deref(), Some("Send later"));
}

#[test]
fn test_cache_entries_scoped_to_root() {
    let mail = UINode::new("application")
        .named("Mail")
        .child(UINode::new("window").titled("Inbox").child(send_button()));
    let notes = UINode::new("application")
        .named("Notes")
        .child(UINode::new("window").titled("All").child(send_button()));
    let engine = MemoryEngine::new(vec![mail, notes]);
    let s = searcher(25);
    let send = Locator::name_contains("Send");

    let in_mail = s
        .resolve_first(&send, &engine.application_root(Some("Mail")).unwrap())
        .unwrap();
    let in_notes = s
        .resolve_first(&send, &engine.application_root(Some("Notes")).unwrap())
        .unwrap();
    assert_ne!(in_mail.object_id(), in_notes.object_id());
}

fn rows_then_send(rows: usize) -> UIElement {
    let mut list = UINode::new("list")
        .with_children((0..rows).map(|i| UINode::new("button").named(format!("Row {i}"))));
    list = list.child(send_button());
    browser(list)
}

#[test]
fn test_scan_cap_stops_before_late_match() {
    let send = Locator::name_contains("Send");
    let root = rows_then_send(120);
    let capped = ElementSearcher::new(SearchBudget::default(), Arc::new(ResolutionCache::default()));
    assert_eq!(capped.budget().max_candidates_scanned, 100);
    assert!(capped.resolve(&send, &root).is_empty());

    let root = rows_then_send(120);
    let wider = ElementSearcher::new(
        SearchBudget::new(25, 50, 200).unwrap(),
        Arc::new(ResolutionCache::default()),
    );
    let found = wider.resolve(&send, &root);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].attributes().name.as_deref(), Some("Send"));
}

#[test]
fn test_field_lookup_is_not_scan_capped() {
    let list = UINode::new("list")
        .with_children((0..150).map(|i| UINode::new("button").named(format!("Row {i}"))))
        .child(UINode::new("text-field").named("Subject").editable());
    let root = browser(list);
    let field = searcher(25)
        .find_editable_field("Subject", &root, &[])
        .expect("field past the scan cap");
    assert_eq!(field.attributes().name.as_deref(), Some("Subject"));
}

#[test]
fn test_field_lookup_tunnels_through_valued_groups() {
    let subject = UINode::new("text-field").named("Subject").editable();
    let content = UINode::new("AXGroup")
        .with_value("draft")
        .child(UINode::new("AXGroup").with_value("draft").child(subject));

    let root = browser(content.clone());
    assert!(searcher(3)
        .resolve(&Locator::name_contains("Subject"), &root)
        .is_empty());

    let root = browser(content);
    let field = searcher(3).find_editable_field("Subject", &root, &[]);
    assert_eq!(
        field.map(|f| f.attributes().name),
        Some(Some("Subject".to_string()))
    );
}
