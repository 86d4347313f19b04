use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashMap;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{([^{}]+)\}\}").expect("placeholder pattern is valid"));

/// Replace `{{name}}` with `values[name]` in a single pass.
///
/// Names match exactly (no trimming, case-sensitive). Placeholders without a
/// value stay verbatim so recipes can be templated in stages.
pub fn substitute(input: &str, values: &HashMap<String, String>) -> String {
    if !input.contains("{{") {
        return input.to_string();
    }
    PLACEHOLDER
        .replace_all(input, |caps: &Captures| match values.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Whether `input` still carries a placeholder, i.e. is not a literal.
pub fn is_template(input: &str) -> bool {
    PLACEHOLDER.is_match(input)
}

/// Placeholder names in order of appearance.
pub fn placeholders(input: &str) -> Vec<&str> {
    PLACEHOLDER
        .captures_iter(input)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect()
}
