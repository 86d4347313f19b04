use crate::element::UIElementAttributes;
use crate::roles;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A serializable query for one target node.
///
/// Criteria in order of specificity: `dom_id` (used alone when present),
/// `identifier`, `role`, `dom_class`, `name_contains`.
///
/// Shorthand strings parse into locators:
/// - `#compose-button` dom id
/// - `id:send-btn` identifier
/// - `role:button|name:Send` role plus name
/// - `class:T-I-KE` dom class
/// - `name:Send` or a bare `Send` name-contains
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "LocatorRepr")]
pub struct Locator {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dom_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dom_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_contains: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
enum MatchType {
    #[default]
    Exact,
    Contains,
}

#[derive(Debug, Deserialize)]
struct Criterion {
    attribute: String,
    value: String,
    #[serde(default, alias = "matchType")]
    #[allow(dead_code)]
    match_type: MatchType,
}

/// Accepts both the flat form and the attribute/value criteria list.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LocatorRepr {
    #[serde(alias = "domId")]
    dom_id: Option<String>,
    identifier: Option<String>,
    role: Option<String>,
    #[serde(alias = "domClass")]
    dom_class: Option<String>,
    #[serde(
        alias = "nameContains",
        alias = "computed_name_contains",
        alias = "computedNameContains"
    )]
    name_contains: Option<String>,
    criteria: Vec<Criterion>,
}

impl From<LocatorRepr> for Locator {
    fn from(repr: LocatorRepr) -> Self {
        let mut builder = LocatorBuilder::default();
        for c in repr.criteria {
            builder = match roles::normalize(&c.attribute).as_str() {
                "domidentifier" | "domid" => builder.dom_id(c.value),
                "identifier" | "id" => builder.identifier(c.value),
                "role" => builder.role(c.value),
                "domclasslist" | "domclass" | "class" => builder.dom_class(c.value),
                _ => builder.name_contains(c.value),
            };
        }
        // Flat fields win over the criteria list.
        let flat = [
            (repr.dom_id, LocatorField::DomId),
            (repr.identifier, LocatorField::Identifier),
            (repr.role, LocatorField::Role),
            (repr.dom_class, LocatorField::DomClass),
            (repr.name_contains, LocatorField::NameContains),
        ];
        for (value, field) in flat {
            if let Some(v) = value {
                builder = builder.set(field, v);
            }
        }
        builder.into_locator()
    }
}

#[derive(Debug, Clone, Copy)]
enum LocatorField {
    DomId,
    Identifier,
    Role,
    DomClass,
    NameContains,
}

impl Locator {
    pub fn builder() -> LocatorBuilder {
        LocatorBuilder::default()
    }

    pub fn dom_id(dom_id: impl Into<String>) -> Self {
        Self::builder().dom_id(dom_id).build()
    }

    pub fn name_contains(name: impl Into<String>) -> Self {
        Self::builder().name_contains(name).build()
    }

    pub fn is_empty(&self) -> bool {
        self.dom_id.is_none()
            && self.identifier.is_none()
            && self.role.is_none()
            && self.dom_class.is_none()
            && self.name_contains.is_none()
    }

    /// The criteria that actually take part in a search: a `dom_id` shadows
    /// everything else.
    pub fn effective(&self) -> Locator {
        match &self.dom_id {
            Some(dom_id) => Locator {
                dom_id: Some(dom_id.clone()),
                ..Default::default()
            },
            None => self.clone(),
        }
    }

    /// Stable key over the effective criteria, used by the resolution caches.
    pub fn cache_key(&self) -> u64 {
        let effective = self.effective();
        let mut hasher = blake3::Hasher::new();
        for (tag, value) in [
            ("dom_id", &effective.dom_id),
            ("identifier", &effective.identifier),
            ("role", &effective.role),
            ("dom_class", &effective.dom_class),
            ("name_contains", &effective.name_contains),
        ] {
            if let Some(v) = value {
                hasher.update(tag.as_bytes());
                hasher.update(&[0]);
                hasher.update(v.as_bytes());
                hasher.update(&[0]);
            }
        }
        let digest = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest.as_bytes()[..8]);
        u64::from_le_bytes(bytes)
    }

    /// Check the effective criteria against one node's attributes.
    pub fn matches(&self, attrs: &UIElementAttributes) -> bool {
        if let Some(dom_id) = &self.dom_id {
            return attrs.dom_id.as_deref() == Some(dom_id.as_str());
        }
        if let Some(identifier) = &self.identifier {
            if attrs.identifier.as_deref() != Some(identifier.as_str()) {
                return false;
            }
        }
        if let Some(role) = &self.role {
            if !roles::same_role(&attrs.role, role) {
                return false;
            }
        }
        if let Some(class) = &self.dom_class {
            match &attrs.dom_class {
                Some(classes) if classes.contains(class.as_str()) => {}
                _ => return false,
            }
        }
        if let Some(name) = &self.name_contains {
            if !attrs.label_contains(&name.to_lowercase()) {
                return false;
            }
        }
        true
    }

    /// Fill `name_contains` from a free-form query when the locator has none.
    pub fn or_name(mut self, query: Option<&str>) -> Self {
        if self.name_contains.is_none() && self.dom_id.is_none() {
            self.name_contains = query.filter(|q| !q.is_empty()).map(str::to_string);
        }
        self
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(dom_id) = &self.dom_id {
            return write!(f, "#{dom_id}");
        }
        let mut parts = Vec::new();
        if let Some(v) = &self.identifier {
            parts.push(format!("id:{v}"));
        }
        if let Some(v) = &self.role {
            parts.push(format!("role:{v}"));
        }
        if let Some(v) = &self.dom_class {
            parts.push(format!("class:{v}"));
        }
        if let Some(v) = &self.name_contains {
            parts.push(format!("name:{v}"));
        }
        if parts.is_empty() {
            f.write_str("<empty locator>")
        } else {
            f.write_str(&parts.join("|"))
        }
    }
}

impl From<&str> for Locator {
    fn from(s: &str) -> Self {
        let s = s.trim();
        if let Some(dom_id) = s.strip_prefix('#') {
            return Locator::dom_id(dom_id.trim());
        }
        let mut builder = LocatorBuilder::default();
        for part in s.split('|').map(str::trim).filter(|p| !p.is_empty()) {
            let (prefix, rest) = match part.split_once(':') {
                Some((p, r)) => (p.trim().to_lowercase(), r.trim()),
                None => (String::new(), part),
            };
            builder = match prefix.as_str() {
                "id" | "identifier" => builder.identifier(rest),
                "role" => builder.role(rest),
                "class" | "classname" => builder.dom_class(rest),
                "dom" | "domid" => builder.dom_id(rest),
                "name" | "text" => builder.name_contains(rest),
                // Unknown prefixes are part of the name (e.g. "Re: hello").
                _ => builder.name_contains(part),
            };
        }
        builder.build()
    }
}

/// Builds a [`Locator`] in specificity order.
#[derive(Debug, Clone, Default)]
pub struct LocatorBuilder {
    locator: Locator,
}

impl LocatorBuilder {
    fn set(self, field: LocatorField, value: String) -> Self {
        match field {
            LocatorField::DomId => self.dom_id(value),
            LocatorField::Identifier => self.identifier(value),
            LocatorField::Role => self.role(value),
            LocatorField::DomClass => self.dom_class(value),
            LocatorField::NameContains => self.name_contains(value),
        }
    }

    pub fn dom_id(mut self, dom_id: impl Into<String>) -> Self {
        self.locator.dom_id = Some(dom_id.into()).filter(|v: &String| !v.is_empty());
        self
    }

    pub fn identifier(mut self, identifier: impl Into<String>) -> Self {
        self.locator.identifier = Some(identifier.into()).filter(|v: &String| !v.is_empty());
        self
    }

    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.locator.role = Some(role.into()).filter(|v: &String| !v.is_empty());
        self
    }

    pub fn dom_class(mut self, class: impl Into<String>) -> Self {
        self.locator.dom_class = Some(class.into()).filter(|v: &String| !v.is_empty());
        self
    }

    pub fn name_contains(mut self, name: impl Into<String>) -> Self {
        self.locator.name_contains = Some(name.into()).filter(|v: &String| !v.is_empty());
        self
    }

    /// Keeps every criterion as given (serialization preserves them).
    fn into_locator(self) -> Locator {
        self.locator
    }

    /// Short-circuits to the dom id when one is set.
    pub fn build(self) -> Locator {
        self.locator.effective()
    }
}
