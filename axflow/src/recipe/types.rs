use super::substitute::{is_template, substitute};
use crate::element::ScrollDirection;
use crate::errors::AutomationError;
use crate::keys::{Key, KeyCombo, Modifier};
use crate::locator::Locator;
use crate::platforms::MouseButton;
use crate::wait::WaitCondition;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

pub const SCHEMA_VERSION: u32 = 2;

const ACTION_NAMES: &str = "click, type, press, hotkey, focus, scroll, wait";

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// What to do when a step fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    #[default]
    Stop,
    Skip,
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "stop" => Ok(FailurePolicy::Stop),
            "skip" => Ok(FailurePolicy::Skip),
            other => Err(format!("unknown failure policy '{other}' (expected stop or skip)")),
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FailurePolicy::Stop => "stop",
            FailurePolicy::Skip => "skip",
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    #[default]
    String,
    Number,
    Boolean,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamDef {
    #[serde(rename = "type", default)]
    pub kind: ParamType,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required: bool,
}

impl ParamDef {
    /// Check a supplied value against the declared type.
    pub fn accepts(&self, value: &str) -> bool {
        match self.kind {
            ParamType::String => true,
            ParamType::Number => value.trim().parse::<f64>().is_ok(),
            ParamType::Boolean => parse_flag(value).is_some(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Preconditions {
    #[serde(default, alias = "appRunning", skip_serializing_if = "Option::is_none")]
    pub app_running: Option<String>,
    #[serde(default, alias = "urlContains", skip_serializing_if = "Option::is_none")]
    pub url_contains: Option<String>,
}

/// Post-condition polled after a step's action succeeds.
#[derive(Debug, Clone, PartialEq)]
pub struct WaitSpec {
    pub condition: WaitCondition,
    pub target: Option<Locator>,
    pub value: Option<String>,
    /// Seconds. Defaults to 10 for polled conditions and 0.5 for `delay`.
    pub timeout: Option<f64>,
}

impl WaitSpec {
    pub const DEFAULT_TIMEOUT_SECS: f64 = 10.0;
    pub const DEFAULT_DELAY_SECS: f64 = 0.5;

    pub fn new(condition: WaitCondition) -> Self {
        Self {
            condition,
            target: None,
            value: None,
            timeout: None,
        }
    }

    pub fn timeout_secs(&self) -> f64 {
        match (self.timeout, self.condition) {
            (Some(t), _) => t,
            (None, WaitCondition::Delay) => Self::DEFAULT_DELAY_SECS,
            (None, _) => Self::DEFAULT_TIMEOUT_SECS,
        }
    }

    /// The value to poll for: the explicit value, else the target's name.
    pub fn probe_value(&self) -> Option<&str> {
        self.value
            .as_deref()
            .or_else(|| self.target.as_ref().and_then(|t| t.name_contains.as_deref()))
    }

    pub fn substituted(&self, values: &HashMap<String, String>) -> WaitSpec {
        WaitSpec {
            value: self.value.as_deref().map(|v| substitute(v, values)),
            ..self.clone()
        }
    }

    fn validate(&self, step_id: u32) -> Result<(), AutomationError> {
        if self.condition.needs_value() && self.probe_value().is_none() {
            return Err(AutomationError::invalid_step(
                step_id,
                format!(
                    "wait_after condition {} needs a 'value' or a target with a name",
                    self.condition
                ),
            ));
        }
        match self.timeout {
            Some(t) if !t.is_finite() || t < 0.0 => Err(AutomationError::invalid_step(
                step_id,
                format!("wait_after timeout must be a non-negative number of seconds, got {t}"),
            )),
            _ => Ok(()),
        }
    }
}

/// The action of one step, with every parameter still a template string.
///
/// Fields hold the raw `params` values so that `{{placeholders}}` survive
/// until a run substitutes them; literal values are checked at load time.
#[derive(Debug, Clone, PartialEq)]
pub enum StepAction {
    Click {
        query: Option<String>,
        x: Option<String>,
        y: Option<String>,
        button: Option<String>,
        count: Option<String>,
        app: Option<String>,
    },
    Type {
        text: String,
        into: Option<String>,
        clear: Option<String>,
        app: Option<String>,
    },
    Press {
        key: String,
        modifiers: Option<String>,
        app: Option<String>,
    },
    Hotkey {
        keys: String,
        app: Option<String>,
    },
    Focus {
        app: Option<String>,
        window: Option<String>,
    },
    Scroll {
        direction: Option<String>,
        amount: Option<String>,
        x: Option<String>,
        y: Option<String>,
        app: Option<String>,
    },
    Wait {
        condition: String,
        value: Option<String>,
        timeout: Option<String>,
        app: Option<String>,
    },
}

impl StepAction {
    /// Build the typed action from the `action` name and its string params.
    pub fn from_params(
        step_id: u32,
        action: &str,
        params: &BTreeMap<String, String>,
    ) -> Result<StepAction, AutomationError> {
        let get = |key: &str| params.get(key).cloned();
        let action = action.trim().to_lowercase();
        let require = |key: &str| {
            get(key).ok_or_else(|| {
                AutomationError::invalid_step(step_id, format!("'{action}' requires a '{key}' param"))
            })
        };
        let step = match action.as_str() {
            "click" => StepAction::Click {
                query: get("query").or_else(|| get("target")),
                x: get("x"),
                y: get("y"),
                button: get("button"),
                count: get("count"),
                app: get("app"),
            },
            "type" => StepAction::Type {
                text: require("text")?,
                into: get("into").or_else(|| get("target")),
                clear: get("clear"),
                app: get("app"),
            },
            "press" => StepAction::Press {
                key: require("key")?,
                modifiers: get("modifiers"),
                app: get("app"),
            },
            "hotkey" => StepAction::Hotkey {
                keys: require("keys")?,
                app: get("app"),
            },
            "focus" => StepAction::Focus {
                app: get("app"),
                window: get("window"),
            },
            "scroll" => StepAction::Scroll {
                direction: get("direction"),
                amount: get("amount"),
                x: get("x"),
                y: get("y"),
                app: get("app"),
            },
            "wait" => StepAction::Wait {
                condition: require("condition")?,
                value: get("value"),
                timeout: get("timeout"),
                app: get("app"),
            },
            other => {
                return Err(AutomationError::invalid_step(
                    step_id,
                    format!("unknown action '{other}'. Valid actions: {ACTION_NAMES}"),
                ))
            }
        };
        Ok(step)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            StepAction::Click { .. } => "click",
            StepAction::Type { .. } => "type",
            StepAction::Press { .. } => "press",
            StepAction::Hotkey { .. } => "hotkey",
            StepAction::Focus { .. } => "focus",
            StepAction::Scroll { .. } => "scroll",
            StepAction::Wait { .. } => "wait",
        }
    }

    /// Back to the string-map form used on disk.
    pub fn params(&self) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        let mut put = |key: &str, value: Option<&String>| {
            if let Some(v) = value {
                map.insert(key.to_string(), v.clone());
            }
        };
        match self {
            StepAction::Click {
                query,
                x,
                y,
                button,
                count,
                app,
            } => {
                put("query", query.as_ref());
                put("x", x.as_ref());
                put("y", y.as_ref());
                put("button", button.as_ref());
                put("count", count.as_ref());
                put("app", app.as_ref());
            }
            StepAction::Type {
                text,
                into,
                clear,
                app,
            } => {
                put("text", Some(text));
                put("into", into.as_ref());
                put("clear", clear.as_ref());
                put("app", app.as_ref());
            }
            StepAction::Press {
                key,
                modifiers,
                app,
            } => {
                put("key", Some(key));
                put("modifiers", modifiers.as_ref());
                put("app", app.as_ref());
            }
            StepAction::Hotkey { keys, app } => {
                put("keys", Some(keys));
                put("app", app.as_ref());
            }
            StepAction::Focus { app, window } => {
                put("app", app.as_ref());
                put("window", window.as_ref());
            }
            StepAction::Scroll {
                direction,
                amount,
                x,
                y,
                app,
            } => {
                put("direction", direction.as_ref());
                put("amount", amount.as_ref());
                put("x", x.as_ref());
                put("y", y.as_ref());
                put("app", app.as_ref());
            }
            StepAction::Wait {
                condition,
                value,
                timeout,
                app,
            } => {
                put("condition", Some(condition));
                put("value", value.as_ref());
                put("timeout", timeout.as_ref());
                put("app", app.as_ref());
            }
        }
        map
    }

    /// A copy with `{{placeholders}}` replaced in every parameter.
    pub fn substituted(
        &self,
        step_id: u32,
        values: &HashMap<String, String>,
    ) -> Result<StepAction, AutomationError> {
        let resolved: BTreeMap<String, String> = self
            .params()
            .into_iter()
            .map(|(key, value)| (key, substitute(&value, values)))
            .collect();
        StepAction::from_params(step_id, self.kind(), &resolved)
    }
}

/// One step of a recipe.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeStep {
    pub id: u32,
    pub action: StepAction,
    pub target: Option<Locator>,
    pub wait_after: Option<WaitSpec>,
    pub on_failure: Option<FailurePolicy>,
    pub note: Option<String>,
}

impl RecipeStep {
    pub fn new(id: u32, action: StepAction) -> Self {
        Self {
            id,
            action,
            target: None,
            wait_after: None,
            on_failure: None,
            note: None,
        }
    }

    pub fn with_target(mut self, target: Locator) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_wait_after(mut self, wait: WaitSpec) -> Self {
        self.wait_after = Some(wait);
        self
    }

    pub fn with_on_failure(mut self, policy: FailurePolicy) -> Self {
        self.on_failure = Some(policy);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Label used in logs and run reports: the note, else the action kind.
    pub fn label(&self) -> &str {
        self.note.as_deref().unwrap_or(self.action.kind())
    }

    fn target_locator(&self) -> Option<&Locator> {
        self.target.as_ref().filter(|t| !t.is_empty())
    }

    /// Check everything that can be checked before any value is substituted.
    pub fn validate(&self, recipe_app: Option<&str>) -> Result<(), AutomationError> {
        let id = self.id;
        match &self.action {
            StepAction::Click {
                query,
                x,
                y,
                button,
                count,
                ..
            } => {
                let has_query = query.as_deref().is_some_and(|q| !q.trim().is_empty());
                if self.target_locator().is_none() && !has_query && (x.is_none() || y.is_none()) {
                    return Err(AutomationError::invalid_step(
                        id,
                        "click needs a target, a 'query' param, or both 'x' and 'y'",
                    ));
                }
                literal(x, |v| parse_number::<f64>(id, "x", v))?;
                literal(y, |v| parse_number::<f64>(id, "y", v))?;
                literal(count, |v| parse_count(id, v))?;
                literal(button, |v| parse_button(id, v))?;
            }
            StepAction::Type { clear, .. } => {
                literal(clear, |v| parse_bool(id, "clear", v))?;
            }
            StepAction::Press { key, modifiers, .. } => {
                literal(&Some(key.clone()), |v| parse_key(id, v))?;
                literal(modifiers, |v| parse_modifiers(id, v))?;
            }
            StepAction::Hotkey { keys, .. } => {
                literal(&Some(keys.clone()), |v| parse_combo(id, v))?;
            }
            StepAction::Focus { app, .. } => {
                if app.is_none() && recipe_app.is_none() {
                    return Err(AutomationError::invalid_step(
                        id,
                        "focus needs an 'app' param or a recipe-level app",
                    ));
                }
            }
            StepAction::Scroll {
                direction,
                amount,
                x,
                y,
                ..
            } => {
                literal(direction, |v| parse_direction(id, v))?;
                literal(amount, |v| parse_number::<u32>(id, "amount", v))?;
                literal(x, |v| parse_number::<f64>(id, "x", v))?;
                literal(y, |v| parse_number::<f64>(id, "y", v))?;
            }
            StepAction::Wait {
                condition,
                value,
                timeout,
                ..
            } => {
                if let Some(condition) =
                    literal(&Some(condition.clone()), |v| parse_condition(id, v))?
                {
                    if condition.needs_value() && value.is_none() {
                        return Err(AutomationError::invalid_step(
                            id,
                            format!("wait condition {condition} needs a 'value' param"),
                        ));
                    }
                }
                literal(timeout, |v| parse_seconds(id, "timeout", v))?;
            }
        }
        if let Some(wait) = &self.wait_after {
            wait.validate(id)?;
        }
        Ok(())
    }
}

/// A named, parameterized workflow. Immutable once loaded; runs work on
/// substituted copies of each step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RecipeDocument", into = "RecipeDocument")]
pub struct Recipe {
    pub schema_version: u32,
    pub name: String,
    pub description: String,
    pub app: Option<String>,
    pub params: BTreeMap<String, ParamDef>,
    pub preconditions: Option<Preconditions>,
    pub steps: Vec<RecipeStep>,
    pub on_failure: FailurePolicy,
}

impl Recipe {
    pub fn new(name: impl Into<String>, steps: Vec<RecipeStep>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            name: name.into(),
            description: String::new(),
            app: None,
            params: BTreeMap::new(),
            preconditions: None,
            steps,
            on_failure: FailurePolicy::Stop,
        }
    }

    /// Decode and validate a recipe. Decode errors carry serde's line and
    /// column; validation errors name the offending step.
    pub fn from_json(json: &str) -> Result<Recipe, AutomationError> {
        let document: RecipeDocument = serde_json::from_str(json)
            .map_err(|e| AutomationError::InvalidRecipe(format!("Recipe JSON decode error: {e}")))?;
        Recipe::try_from(document)
    }

    pub fn to_json_pretty(&self) -> Result<String, AutomationError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| AutomationError::Internal(format!("Failed to encode recipe: {e}")))
    }

    pub fn validate(&self) -> Result<(), AutomationError> {
        if self.name.trim().is_empty() {
            return Err(AutomationError::InvalidRecipe(
                "recipe name must not be empty".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for step in &self.steps {
            if !seen.insert(step.id) {
                return Err(AutomationError::invalid_step(step.id, "duplicate step id"));
            }
            step.validate(self.app.as_deref())?;
        }
        Ok(())
    }

    /// Required parameters without a value, in name order.
    pub fn missing_params<'a>(
        &'a self,
        values: &HashMap<String, String>,
    ) -> impl Iterator<Item = (&'a str, &'a ParamDef)> + 'a {
        let present: HashSet<String> = values.keys().cloned().collect();
        self.params
            .iter()
            .filter(move |(name, def)| def.required && !present.contains(name.as_str()))
            .map(|(name, def)| (name.as_str(), def))
    }
}

// ---------------------------------------------------------------------------
// On-disk form
// ---------------------------------------------------------------------------

/// Step params as strings; numbers and booleans written as JSON scalars are
/// accepted and stringified.
fn string_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    let raw: BTreeMap<String, serde_json::Value> = BTreeMap::deserialize(deserializer)?;
    let mut map = BTreeMap::new();
    for (key, value) in raw {
        let text = match value {
            serde_json::Value::Null => continue,
            serde_json::Value::String(s) => s,
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::Bool(b) => b.to_string(),
            other => {
                return Err(D::Error::custom(format!(
                    "param '{key}' must be a string, number or boolean, got {other}"
                )))
            }
        };
        map.insert(key, text);
    }
    Ok(map)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawWaitSpec {
    condition: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    target: Option<Locator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<String>,
    #[serde(
        default,
        alias = "timeoutSeconds",
        alias = "timeout_seconds",
        skip_serializing_if = "Option::is_none"
    )]
    timeout: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawStep {
    id: u32,
    action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    target: Option<Locator>,
    #[serde(
        default,
        deserialize_with = "string_map",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    params: BTreeMap<String, String>,
    #[serde(default, alias = "waitAfter", skip_serializing_if = "Option::is_none")]
    wait_after: Option<RawWaitSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    note: Option<String>,
    #[serde(default, alias = "onFailure", skip_serializing_if = "Option::is_none")]
    on_failure: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RecipeDocument {
    #[serde(default = "default_schema_version", alias = "schemaVersion")]
    schema_version: u32,
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    app: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    params: BTreeMap<String, ParamDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    preconditions: Option<Preconditions>,
    #[serde(default)]
    steps: Vec<RawStep>,
    #[serde(default, alias = "onFailure", skip_serializing_if = "Option::is_none")]
    on_failure: Option<String>,
}

impl TryFrom<RawStep> for RecipeStep {
    type Error = AutomationError;

    fn try_from(raw: RawStep) -> Result<Self, Self::Error> {
        let id = raw.id;
        let action = StepAction::from_params(id, &raw.action, &raw.params)?;
        let wait_after = match raw.wait_after {
            Some(w) => Some(WaitSpec {
                condition: parse_condition(id, &w.condition)?,
                target: w.target,
                value: w.value,
                timeout: w.timeout,
            }),
            None => None,
        };
        let on_failure = match raw.on_failure {
            Some(p) => Some(
                p.parse::<FailurePolicy>()
                    .map_err(|e| AutomationError::invalid_step(id, e))?,
            ),
            None => None,
        };
        Ok(RecipeStep {
            id,
            action,
            target: raw.target,
            wait_after,
            on_failure,
            note: raw.note,
        })
    }
}

impl From<RecipeStep> for RawStep {
    fn from(step: RecipeStep) -> Self {
        RawStep {
            id: step.id,
            action: step.action.kind().to_string(),
            params: step.action.params(),
            target: step.target,
            wait_after: step.wait_after.map(|w| RawWaitSpec {
                condition: w.condition.to_string(),
                target: w.target,
                value: w.value,
                timeout: w.timeout,
            }),
            note: step.note,
            on_failure: step.on_failure.map(|p| p.to_string()),
        }
    }
}

impl TryFrom<RecipeDocument> for Recipe {
    type Error = AutomationError;

    fn try_from(doc: RecipeDocument) -> Result<Self, Self::Error> {
        let on_failure = match doc.on_failure {
            Some(p) => p
                .parse::<FailurePolicy>()
                .map_err(AutomationError::InvalidRecipe)?,
            None => FailurePolicy::Stop,
        };
        let steps = doc
            .steps
            .into_iter()
            .map(RecipeStep::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        let recipe = Recipe {
            schema_version: doc.schema_version,
            name: doc.name,
            description: doc.description,
            app: doc.app,
            params: doc.params,
            preconditions: doc.preconditions,
            steps,
            on_failure,
        };
        recipe.validate()?;
        Ok(recipe)
    }
}

impl From<Recipe> for RecipeDocument {
    fn from(recipe: Recipe) -> Self {
        RecipeDocument {
            schema_version: recipe.schema_version,
            name: recipe.name,
            description: recipe.description,
            app: recipe.app,
            params: recipe.params,
            preconditions: recipe.preconditions,
            steps: recipe.steps.into_iter().map(RawStep::from).collect(),
            on_failure: Some(recipe.on_failure.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Param parsing, shared by load-time validation and dispatch
// ---------------------------------------------------------------------------

/// Run `check` only when the value is present and free of placeholders.
fn literal<T>(
    value: &Option<String>,
    check: impl FnOnce(&str) -> Result<T, AutomationError>,
) -> Result<Option<T>, AutomationError> {
    match value.as_deref() {
        Some(v) if !is_template(v) => check(v).map(Some),
        _ => Ok(None),
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" | "" => Some(false),
        _ => None,
    }
}

pub(crate) fn parse_number<T: FromStr>(
    step_id: u32,
    field: &str,
    value: &str,
) -> Result<T, AutomationError> {
    value.trim().parse::<T>().map_err(|_| {
        AutomationError::invalid_step(step_id, format!("'{field}' must be a number, got '{value}'"))
    })
}

pub(crate) fn parse_count(step_id: u32, value: &str) -> Result<u32, AutomationError> {
    match parse_number::<u32>(step_id, "count", value)? {
        0 => Err(AutomationError::invalid_step(step_id, "'count' must be at least 1")),
        n => Ok(n),
    }
}

pub(crate) fn parse_seconds(step_id: u32, field: &str, value: &str) -> Result<f64, AutomationError> {
    let seconds = parse_number::<f64>(step_id, field, value)?;
    if seconds.is_finite() && seconds >= 0.0 {
        Ok(seconds)
    } else {
        Err(AutomationError::invalid_step(
            step_id,
            format!("'{field}' must be a non-negative number of seconds, got '{value}'"),
        ))
    }
}

pub(crate) fn parse_bool(step_id: u32, field: &str, value: &str) -> Result<bool, AutomationError> {
    parse_flag(value).ok_or_else(|| {
        AutomationError::invalid_step(step_id, format!("'{field}' must be true or false, got '{value}'"))
    })
}

pub(crate) fn parse_button(step_id: u32, value: &str) -> Result<MouseButton, AutomationError> {
    value
        .parse::<MouseButton>()
        .map_err(|e| AutomationError::invalid_step(step_id, e.to_string()))
}

pub(crate) fn parse_direction(step_id: u32, value: &str) -> Result<ScrollDirection, AutomationError> {
    value
        .parse::<ScrollDirection>()
        .map_err(|e| AutomationError::invalid_step(step_id, e.to_string()))
}

pub(crate) fn parse_key(step_id: u32, value: &str) -> Result<Key, AutomationError> {
    Key::parse(value).map_err(|e| AutomationError::invalid_step(step_id, e.to_string()))
}

pub(crate) fn parse_modifiers(step_id: u32, value: &str) -> Result<Vec<Modifier>, AutomationError> {
    value
        .split([',', '+'])
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(|m| {
            Modifier::parse(m).ok_or_else(|| {
                AutomationError::invalid_step(step_id, format!("unknown modifier '{m}'"))
            })
        })
        .collect()
}

pub(crate) fn parse_combo(step_id: u32, value: &str) -> Result<KeyCombo, AutomationError> {
    KeyCombo::parse_str(value).map_err(|e| AutomationError::invalid_step(step_id, e.to_string()))
}

pub(crate) fn parse_condition(step_id: u32, value: &str) -> Result<WaitCondition, AutomationError> {
    value
        .trim()
        .parse::<WaitCondition>()
        .map_err(|e| AutomationError::invalid_step(step_id, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMPOSE: &str = r#"{
        "schema_version": 2,
        "name": "gmail-send",
        "description": "Send an email from Gmail",
        "app": "Google Chrome",
        "params": {
            "to": {"type": "string", "description": "Recipient address", "required": true},
            "subject": {"type": "string", "description": "Subject line"}
        },
        "preconditions": {"app_running": "Google Chrome", "url_contains": "mail.google.com"},
        "steps": [
            {"id": 1, "action": "click", "target": {"criteria": [{"attribute": "AXTitle", "value": "Compose"}], "computedNameContains": "Compose"}, "wait_after": {"condition": "elementExists", "value": "To", "timeout": 5}},
            {"id": 2, "action": "type", "params": {"text": "{{to}}", "into": "To"}, "note": "recipient"},
            {"id": 5, "action": "hotkey", "params": {"keys": "cmd,return"}, "on_failure": "skip"},
            {"id": 6, "action": "scroll", "params": {"direction": "down", "amount": 2}}
        ]
    }"#;

    #[test]
    fn test_decode_full_recipe() {
        let recipe = Recipe::from_json(COMPOSE).unwrap();
        assert_eq!(recipe.name, "gmail-send");
        assert_eq!(recipe.steps.len(), 4);
        assert_eq!(recipe.on_failure, FailurePolicy::Stop);
        assert!(recipe.params["to"].required);
        assert!(!recipe.params["subject"].required);

        let click = &recipe.steps[0];
        assert_eq!(click.action.kind(), "click");
        assert_eq!(
            click.target.as_ref().and_then(|t| t.name_contains.as_deref()),
            Some("Compose")
        );
        let wait = click.wait_after.as_ref().unwrap();
        assert_eq!(wait.condition, WaitCondition::ElementExists);
        assert_eq!(wait.timeout_secs(), 5.0);

        assert_eq!(recipe.steps[2].on_failure, Some(FailurePolicy::Skip));
        assert_eq!(recipe.steps[3].action.params()["amount"], "2");
    }

    #[test]
    fn test_round_trip_through_json() {
        let recipe = Recipe::from_json(COMPOSE).unwrap();
        let encoded = recipe.to_json_pretty().unwrap();
        let decoded = Recipe::from_json(&encoded).unwrap();
        assert_eq!(recipe, decoded);
    }

    #[test]
    fn test_unknown_action_names_step() {
        let json = r#"{"name": "x", "steps": [{"id": 7, "action": "drag"}]}"#;
        match Recipe::from_json(json) {
            Err(AutomationError::InvalidDefinition { step_id, reason }) => {
                assert_eq!(step_id, 7);
                assert!(reason.contains("drag"));
            }
            other => panic!("expected InvalidDefinition, got {other:?}"),
        }
    }

    #[test]
    fn test_load_time_checks() {
        let cases = [
            (r#"{"id": 1, "action": "type", "params": {}}"#, "text"),
            (r#"{"id": 1, "action": "click"}"#, "click needs"),
            (r#"{"id": 1, "action": "click", "params": {"x": "ten", "y": "4"}}"#, "'x'"),
            (r#"{"id": 1, "action": "press", "params": {"key": "hyper"}}"#, "hyper"),
            (r#"{"id": 1, "action": "wait", "params": {"condition": "urlContains"}}"#, "value"),
            (r#"{"id": 1, "action": "focus"}"#, "focus needs"),
            (
                r#"{"id": 1, "action": "press", "params": {"key": "a"}, "wait_after": {"condition": "elementGone"}}"#,
                "wait_after",
            ),
        ];
        for (step, needle) in cases {
            let json = format!(r#"{{"name": "t", "steps": [{step}]}}"#);
            let err = Recipe::from_json(&json).unwrap_err();
            assert!(
                err.to_string().contains(needle),
                "{step}: {err} does not mention {needle}"
            );
        }
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let json = r#"{"name": "t", "steps": [
            {"id": 3, "action": "press", "params": {"key": "tab"}},
            {"id": 3, "action": "press", "params": {"key": "tab"}}
        ]}"#;
        assert!(matches!(
            Recipe::from_json(json),
            Err(AutomationError::InvalidDefinition { step_id: 3, .. })
        ));
    }

    #[test]
    fn test_templated_values_skip_literal_checks() {
        let json = r#"{"name": "t", "steps": [
            {"id": 1, "action": "click", "params": {"x": "{{x}}", "y": "{{y}}"}}
        ]}"#;
        assert!(Recipe::from_json(json).is_ok());
    }

    #[test]
    fn test_substituted_copy_leaves_original() {
        let recipe = Recipe::from_json(COMPOSE).unwrap();
        let values: HashMap<String, String> =
            [("to".to_string(), "ann@example.com".to_string())].into();
        let step = &recipe.steps[1];
        let resolved = step.action.substituted(step.id, &values).unwrap();
        assert_eq!(resolved.params()["text"], "ann@example.com");
        assert_eq!(step.action.params()["text"], "{{to}}");
    }

    #[test]
    fn test_missing_params() {
        let recipe = Recipe::from_json(COMPOSE).unwrap();
        let missing: Vec<_> = recipe.missing_params(&HashMap::new()).map(|(n, _)| n).collect();
        assert_eq!(missing, vec!["to"]);
    }
}
