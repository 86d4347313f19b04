//! Semantic-depth element search.
//!
//! Structural nesting is not the cost metric here. Layout-only containers
//! with no content of their own ("tunnel" nodes) are traversed for free, every
//! other node costs one level. Deep web content buried under dozens of empty
//! wrapper groups stays reachable within a small budget.

use crate::cache::{PathHint, ResolutionCache};
use crate::element::{Rect, UIElement, UIElementAttributes};
use crate::errors::AutomationError;
use crate::locator::Locator;
use crate::roles;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Limits for one semantic search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchBudget {
    pub semantic_depth: usize,
    pub max_results: usize,
    pub max_candidates_scanned: usize,
    /// Structural ceiling for dom-id lookups, which ignore semantic depth.
    pub dom_id_depth: usize,
}

impl SearchBudget {
    pub fn new(
        semantic_depth: usize,
        max_results: usize,
        max_candidates_scanned: usize,
    ) -> Result<Self, AutomationError> {
        if max_results > max_candidates_scanned {
            return Err(AutomationError::InvalidArgument(format!(
                "max_results ({max_results}) cannot exceed max_candidates_scanned ({max_candidates_scanned})"
            )));
        }
        Ok(Self {
            semantic_depth,
            max_results,
            max_candidates_scanned,
            dom_id_depth: 50,
        })
    }

    pub fn with_dom_id_depth(mut self, depth: usize) -> Self {
        self.dom_id_depth = depth;
        self
    }

    pub fn with_semantic_depth(mut self, depth: usize) -> Self {
        self.semantic_depth = depth;
        self
    }
}

impl Default for SearchBudget {
    fn default() -> Self {
        Self {
            semantic_depth: 25,
            max_results: 50,
            max_candidates_scanned: 100,
            dom_id_depth: 50,
        }
    }
}

/// A layout-only node with nothing of its own to show costs no depth.
pub fn is_tunnel(attrs: &UIElementAttributes) -> bool {
    roles::is_layout(&attrs.role) && !attrs.has_semantic_content()
}

/// Tunnel rule for field lookup: only a label (name, title or description)
/// makes a layout node cost a level. Editors often park their draft text in
/// the value of a wrapping group.
fn is_label_tunnel(attrs: &UIElementAttributes) -> bool {
    let labelled = [&attrs.name, &attrs.title, &attrs.description]
        .into_iter()
        .any(|v| v.as_deref().is_some_and(|v| !v.is_empty()));
    roles::is_layout(&attrs.role) && !labelled
}

const FIELD_EXACT: u32 = 100;
const FIELD_PREFIX: u32 = 80;
const FIELD_CONTAINS: u32 = 60;
const FIELD_EDITABLE_BONUS: u32 = 50;
const FIELD_VISIBLE_BONUS: u32 = 20;
const FIELD_MIN_SCORE: u32 = 50;

/// Score a node as the target of a text-entry action named `query_lower`.
///
/// Returns 0 for nodes whose name, title and description don't mention the
/// query at all.
pub fn score_field(attrs: &UIElementAttributes, query_lower: &str, displays: &[Rect]) -> u32 {
    let labels: Vec<String> = [&attrs.name, &attrs.title, &attrs.description]
        .into_iter()
        .filter_map(|v| v.as_deref())
        .filter(|v| !v.is_empty())
        .map(str::to_lowercase)
        .collect();

    let mut score = if labels.iter().any(|l| l == query_lower) {
        FIELD_EXACT
    } else if labels.iter().any(|l| l.starts_with(query_lower)) {
        FIELD_PREFIX
    } else if labels.iter().any(|l| l.contains(query_lower)) {
        FIELD_CONTAINS
    } else {
        return 0;
    };

    if roles::is_editable(&attrs.role) {
        score += FIELD_EDITABLE_BONUS;
    }
    if let Some(bounds) = attrs.bounds {
        if !bounds.is_degenerate() && displays.iter().any(|d| d.intersects(&bounds)) {
            score += FIELD_VISIBLE_BONUS;
        }
    }
    score
}

/// Depth-first walker shared by every semantic search.
struct SemanticWalk<'a, P> {
    budget: &'a SearchBudget,
    predicate: P,
    tunnel: fn(&UIElementAttributes) -> bool,
    /// Stop once this many matches are collected.
    result_cap: usize,
    /// Stop once this many nodes are visited; `None` scans the whole budget.
    scan_cap: Option<usize>,
    results: Vec<(UIElement, PathHint)>,
    seen: HashSet<usize>,
    scanned: usize,
    path: PathHint,
}

impl<'a, P> SemanticWalk<'a, P>
where
    P: FnMut(&UIElementAttributes) -> bool,
{
    fn new(budget: &'a SearchBudget, predicate: P) -> Self {
        Self {
            budget,
            predicate,
            tunnel: is_tunnel,
            result_cap: budget.max_results,
            scan_cap: Some(budget.max_candidates_scanned),
            results: Vec::new(),
            seen: HashSet::new(),
            scanned: 0,
            path: Vec::new(),
        }
    }

    fn exhausted(&self) -> bool {
        self.results.len() >= self.result_cap
            || self.scan_cap.is_some_and(|cap| self.scanned >= cap)
    }

    fn visit(&mut self, element: &UIElement, semantic_depth: usize) {
        if semantic_depth > self.budget.semantic_depth || self.exhausted() {
            return;
        }
        self.scanned += 1;

        let attrs = element.attributes();
        let child_depth = if (self.tunnel)(&attrs) {
            semantic_depth
        } else {
            semantic_depth + 1
        };

        if (self.predicate)(&attrs) && self.seen.insert(element.object_id()) {
            self.results.push((element.clone(), self.path.clone()));
        }

        let children = match element.children() {
            Ok(children) => children,
            Err(e) => {
                debug!("skipping children of {:?}: {}", attrs.role, e);
                return;
            }
        };
        for (index, child) in children.iter().enumerate() {
            if self.exhausted() {
                break;
            }
            self.path.push(index);
            self.visit(child, child_depth);
            self.path.pop();
        }
    }

    fn run(mut self, root: &UIElement) -> Vec<(UIElement, PathHint)> {
        self.visit(root, 0);
        debug!(
            "semantic walk scanned {} nodes, {} matches",
            self.scanned,
            self.results.len()
        );
        self.results
    }
}

fn find_dom_id_walk(
    element: &UIElement,
    dom_id: &str,
    depth: usize,
    max_depth: usize,
    path: &mut PathHint,
) -> Option<UIElement> {
    if depth >= max_depth {
        return None;
    }
    if element.attributes().dom_id.as_deref() == Some(dom_id) {
        return Some(element.clone());
    }
    let children = element.children().ok()?;
    for (index, child) in children.iter().enumerate() {
        path.push(index);
        if let Some(found) = find_dom_id_walk(child, dom_id, depth + 1, max_depth, path) {
            return Some(found);
        }
        path.pop();
    }
    None
}

/// Follow child indices from `root`; `None` when the tree no longer has that shape.
pub fn follow_path(root: &UIElement, path: &[usize]) -> Option<UIElement> {
    let mut current = root.clone();
    for index in path {
        let mut children = current.children().ok()?;
        if *index >= children.len() {
            return None;
        }
        current = children.swap_remove(*index);
    }
    Some(current)
}

/// Depth-limited structural search, used for shallow lookups
/// (web areas, scroll areas, wait predicates).
pub fn find_structural<P>(root: &UIElement, max_depth: usize, predicate: P) -> Option<UIElement>
where
    P: Fn(&UIElementAttributes) -> bool,
{
    fn walk<P: Fn(&UIElementAttributes) -> bool>(
        element: &UIElement,
        depth: usize,
        max_depth: usize,
        predicate: &P,
    ) -> Option<UIElement> {
        if depth >= max_depth {
            return None;
        }
        if predicate(&element.attributes()) {
            return Some(element.clone());
        }
        for child in element.children().ok()? {
            if let Some(found) = walk(&child, depth + 1, max_depth, predicate) {
                return Some(found);
            }
        }
        None
    }
    walk(root, 0, max_depth, &predicate)
}

/// Resolves locators and free-text queries against a live tree.
#[derive(Debug, Clone)]
pub struct ElementSearcher {
    budget: SearchBudget,
    cache: Arc<ResolutionCache>,
}

impl ElementSearcher {
    pub fn new(budget: SearchBudget, cache: Arc<ResolutionCache>) -> Self {
        Self { budget, cache }
    }

    pub fn budget(&self) -> &SearchBudget {
        &self.budget
    }

    pub fn cache(&self) -> &Arc<ResolutionCache> {
        &self.cache
    }

    /// Key for both caches: the locator plus the identity of the search root.
    fn scoped_key(locator: &Locator, root: &UIElement) -> u64 {
        locator.cache_key() ^ (root.object_id() as u64).rotate_left(32)
    }

    /// All nodes matching `locator`, in traversal order, deduplicated and
    /// capped at `max_results`. Never fails; an empty result is a miss.
    #[instrument(level = "debug", skip(self, root), fields(locator = %locator))]
    pub fn resolve(&self, locator: &Locator, root: &UIElement) -> Vec<UIElement> {
        if locator.is_empty() {
            return Vec::new();
        }
        let effective = locator.effective();
        let found = match &effective.dom_id {
            Some(dom_id) => {
                let mut path = Vec::new();
                find_dom_id_walk(root, dom_id, 0, self.budget.dom_id_depth, &mut path)
                    .map(|element| vec![(element, path)])
                    .unwrap_or_default()
            }
            None => SemanticWalk::new(&self.budget, |attrs: &UIElementAttributes| {
                effective.matches(attrs)
            })
            .run(root),
        };

        if let Some((_, path)) = found.first() {
            self.cache
                .path_hints
                .put(Self::scoped_key(&effective, root), path.clone());
        }
        found.into_iter().map(|(element, _)| element).collect()
    }

    /// Free-text search: a node matches when its name, title, value,
    /// description or identifier contains `query` (case-insensitive), or
    /// equals it when `exact` is set. `role` filters what is reported but
    /// never stops descent into non-matching subtrees.
    #[instrument(level = "debug", skip(self, root))]
    pub fn search_text(
        &self,
        query: &str,
        role: Option<&str>,
        exact: bool,
        root: &UIElement,
    ) -> Vec<UIElement> {
        let query_lower = query.to_lowercase();
        let predicate = |attrs: &UIElementAttributes| {
            if let Some(role) = role {
                if !roles::same_role(&attrs.role, role) {
                    return false;
                }
            }
            if exact {
                attrs
                    .label_fields()
                    .any(|field| field.to_lowercase() == query_lower)
            } else {
                attrs.label_contains(&query_lower)
            }
        };
        SemanticWalk::new(&self.budget, predicate)
            .run(root)
            .into_iter()
            .map(|(element, _)| element)
            .collect()
    }

    /// Single-target resolution: node cache, then a validated path hint,
    /// then a full search.
    #[instrument(level = "debug", skip(self, root), fields(locator = %locator))]
    pub fn resolve_first(&self, locator: &Locator, root: &UIElement) -> Option<UIElement> {
        if locator.is_empty() {
            return None;
        }
        let effective = locator.effective();
        let key = Self::scoped_key(&effective, root);

        if let Some(element) = self.cache.nodes.get(key) {
            debug!("node cache hit for {}", effective);
            return Some(element);
        }

        if let Some(path) = self.cache.path_hints.get(key) {
            match follow_path(root, &path) {
                Some(element) if effective.matches(&element.attributes()) => {
                    debug!("path hint {:?} still valid for {}", path, effective);
                    self.cache.nodes.put(key, element.clone());
                    return Some(element);
                }
                _ => {
                    debug!("stale path hint for {}, falling back to search", effective);
                    self.cache.path_hints.remove(key);
                }
            }
        }

        let element = self.resolve(&effective, root).into_iter().next()?;
        self.cache.nodes.put(key, element.clone());
        Some(element)
    }

    /// Locate an element by dom id, ignoring semantic depth.
    pub fn find_by_dom_id(&self, dom_id: &str, root: &UIElement) -> Option<UIElement> {
        let mut path = Vec::new();
        find_dom_id_walk(root, dom_id, 0, self.budget.dom_id_depth, &mut path)
    }

    /// Best text-entry target for a human-readable field name.
    ///
    /// Every node mentioning the name is scored; the highest score wins and
    /// ties go to the node found first. The walk is bounded by the semantic
    /// depth and by collecting at most `max_candidates_scanned` candidates,
    /// not by the number of nodes visited: compose forms put their fields
    /// after long runs of unlabelled chrome that a scan cap would cut off.
    #[instrument(level = "debug", skip(self, root, displays))]
    pub fn find_editable_field(
        &self,
        name: &str,
        root: &UIElement,
        displays: &[Rect],
    ) -> Option<UIElement> {
        let query_lower = name.to_lowercase();
        let mut walk = SemanticWalk::new(&self.budget, |attrs: &UIElementAttributes| {
            score_field(attrs, &query_lower, displays) >= FIELD_MIN_SCORE
        });
        walk.tunnel = is_label_tunnel;
        walk.result_cap = self.budget.max_candidates_scanned;
        walk.scan_cap = None;
        let candidates = walk.run(root);

        let mut best: Option<(UIElement, u32)> = None;
        for (element, _) in candidates {
            let score = score_field(&element.attributes(), &query_lower, displays);
            let better = match &best {
                Some((_, top)) => score > *top,
                None => true,
            };
            if better {
                best = Some((element, score));
            }
        }
        let (element, score) = best?;
        debug!(
            "field '{}' resolved to {:?} with score {}",
            name,
            element.attributes().display_name(),
            score
        );
        Some(element)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platforms::{AccessibilityEngine, MemoryEngine, UINode};

    fn searcher(semantic_depth: usize) -> ElementSearcher {
        ElementSearcher::new(
            SearchBudget::default().with_semantic_depth(semantic_depth),
            Arc::new(ResolutionCache::default()),
        )
    }

    fn root_of(app: UINode) -> UIElement {
        MemoryEngine::new(vec![app]).application_root(None).unwrap()
    }

    #[test]
    fn test_tunnel_classification() {
        let empty_group = UIElementAttributes {
            role: "AXGroup".into(),
            ..Default::default()
        };
        let labelled_group = UIElementAttributes {
            role: "AXGroup".into(),
            description: Some("Toolbar".into()),
            ..Default::default()
        };
        let button = UIElementAttributes {
            role: "button".into(),
            ..Default::default()
        };
        assert!(is_tunnel(&empty_group));
        assert!(!is_tunnel(&labelled_group));
        assert!(!is_tunnel(&button));
    }

    #[test]
    fn test_role_filter_does_not_stop_descent() {
        let root = root_of(UINode::new("application").named("App").child(
            UINode::new("toolbar").named("Send tools").child(UINode::new("button").named("Send")),
        ));
        let found = searcher(25).search_text("send", Some("button"), false, &root);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].attributes().name.as_deref(), Some("Send"));

        let exact = searcher(25).search_text("send", None, true, &root);
        assert_eq!(exact.len(), 1);
    }

    #[test]
    fn test_score_prefers_editable_visible_field() {
        let displays = [Rect::new(0.0, 0.0, 1920.0, 1080.0)];
        let field = UIElementAttributes {
            role: "text-field".into(),
            name: Some("To".into()),
            bounds: Some(Rect::new(10.0, 10.0, 200.0, 20.0)),
            ..Default::default()
        };
        let container = UIElementAttributes {
            role: "group".into(),
            name: Some("To recipients".into()),
            ..Default::default()
        };
        assert_eq!(score_field(&field, "to", &displays), 170);
        assert_eq!(score_field(&container, "to", &displays), 80);
        assert_eq!(score_field(&container, "cc", &displays), 0);
    }
}
