//! Role classification shared by search, actions and the poller.
//!
//! Roles are compared in a normalized form so that platform spellings
//! (`AXTextField`, `text-field`, `text_field`) land in the same bucket.

/// Lowercase, strip an `AX` prefix and drop separators.
pub fn normalize(role: &str) -> String {
    let trimmed = role.trim();
    let stripped = trimmed.strip_prefix("AX").unwrap_or(trimmed);
    stripped
        .chars()
        .filter(|c| !matches!(c, '-' | '_' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Role equality after normalization.
pub fn same_role(a: &str, b: &str) -> bool {
    normalize(a) == normalize(b)
}

const LAYOUT_ROLES: &[&str] = &[
    "group",
    "generic",
    "genericelement",
    "section",
    "div",
    "list",
    "landmarkmain",
    "landmarknavigation",
    "landmarkbanner",
    "landmarkcontentinfo",
    "landmarkregion",
    "landmarkcomplementary",
];

const EDITABLE_ROLES: &[&str] = &[
    "textfield",
    "textarea",
    "combobox",
    "searchfield",
    "securetextfield",
];

const WEB_AREA_ROLES: &[&str] = &["webarea", "document"];

const SCROLLABLE_ROLES: &[&str] = &["scrollarea", "webarea"];

const TEXT_CONTENT_ROLES: &[&str] = &["statictext", "text", "textarea", "paragraph"];

fn in_set(set: &[&str], role: &str) -> bool {
    let role = normalize(role);
    set.contains(&role.as_str())
}

/// Layout-only container roles; candidates for zero-cost tunneling.
pub fn is_layout(role: &str) -> bool {
    in_set(LAYOUT_ROLES, role)
}

pub fn is_editable(role: &str) -> bool {
    in_set(EDITABLE_ROLES, role)
}

pub fn is_web_area(role: &str) -> bool {
    in_set(WEB_AREA_ROLES, role)
}

pub fn is_scrollable(role: &str) -> bool {
    in_set(SCROLLABLE_ROLES, role)
}

/// Roles whose value is body text rather than a control state.
pub fn is_text_content(role: &str) -> bool {
    in_set(TEXT_CONTENT_ROLES, role)
}

pub fn is_window(role: &str) -> bool {
    normalize(role) == "window"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_platform_spellings() {
        assert_eq!(normalize("AXTextField"), "textfield");
        assert_eq!(normalize("text-field"), "textfield");
        assert_eq!(normalize("landmark_main"), "landmarkmain");
        assert!(same_role("AXButton", "button"));
    }

    #[test]
    fn test_classification() {
        assert!(is_layout("AXGroup"));
        assert!(is_layout("landmark-navigation"));
        assert!(!is_layout("button"));
        assert!(is_editable("AXComboBox"));
        assert!(is_editable("secure-text-field"));
        assert!(is_web_area("AXWebArea"));
        assert!(is_scrollable("scroll-area"));
        assert!(is_window("AXWindow"));
    }
}
