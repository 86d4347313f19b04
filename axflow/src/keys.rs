//! Key and modifier vocabulary for `press` and `hotkey` actions.

use crate::errors::AutomationError;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modifier {
    Command,
    Control,
    Alt,
    Shift,
    Function,
}

impl Modifier {
    pub fn parse(name: &str) -> Option<Modifier> {
        match name.trim().to_lowercase().as_str() {
            "cmd" | "command" | "meta" | "super" => Some(Modifier::Command),
            "ctrl" | "control" => Some(Modifier::Control),
            "alt" | "option" | "opt" => Some(Modifier::Alt),
            "shift" => Some(Modifier::Shift),
            "fn" | "function" => Some(Modifier::Function),
            _ => None,
        }
    }

    /// Modifier used for "select all"-style shortcuts on the current platform.
    pub fn primary() -> Modifier {
        if cfg!(target_os = "macos") {
            Modifier::Command
        } else {
            Modifier::Control
        }
    }
}

impl fmt::Display for Modifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Modifier::Command => "cmd",
            Modifier::Control => "ctrl",
            Modifier::Alt => "alt",
            Modifier::Shift => "shift",
            Modifier::Function => "fn",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Key {
    Return,
    Tab,
    Escape,
    Space,
    Delete,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    F(u8),
    Char(char),
}

impl Key {
    pub fn parse(name: &str) -> Result<Key, AutomationError> {
        let lower = name.trim().to_lowercase();
        let key = match lower.as_str() {
            "return" | "enter" => Key::Return,
            "tab" => Key::Tab,
            "escape" | "esc" => Key::Escape,
            "space" => Key::Space,
            "delete" | "backspace" => Key::Delete,
            "up" | "arrowup" => Key::Up,
            "down" | "arrowdown" => Key::Down,
            "left" | "arrowleft" => Key::Left,
            "right" | "arrowright" => Key::Right,
            "home" => Key::Home,
            "end" => Key::End,
            "pageup" => Key::PageUp,
            "pagedown" => Key::PageDown,
            _ => {
                if let Some(n) = lower
                    .strip_prefix('f')
                    .and_then(|n| n.parse::<u8>().ok())
                    .filter(|n| (1..=12).contains(n))
                {
                    Key::F(n)
                } else {
                    let mut chars = lower.chars();
                    match (chars.next(), chars.next()) {
                        (Some(c), None) => Key::Char(c),
                        _ => {
                            return Err(AutomationError::InvalidArgument(format!(
                                "Unknown key '{name}'. Use a single character or one of: return, tab, escape, space, delete, up, down, left, right, home, end, pageup, pagedown, f1-f12."
                            )))
                        }
                    }
                }
            }
        };
        Ok(key)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::F(n) => write!(f, "f{n}"),
            Key::Char(c) => write!(f, "{c}"),
            other => write!(f, "{}", format!("{other:?}").to_lowercase()),
        }
    }
}

impl TryFrom<String> for Key {
    type Error = AutomationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Key::parse(&value)
    }
}

impl From<Key> for String {
    fn from(key: Key) -> Self {
        key.to_string()
    }
}

/// A key plus the modifiers held while it is pressed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyCombo {
    pub key: Key,
    pub modifiers: Vec<Modifier>,
}

impl KeyCombo {
    /// Parse a hotkey list such as `["cmd", "shift", "t"]`; the single
    /// non-modifier entry is the key.
    pub fn parse(parts: &[&str]) -> Result<KeyCombo, AutomationError> {
        let mut modifiers = Vec::new();
        let mut key = None;
        for part in parts.iter().map(|p| p.trim()).filter(|p| !p.is_empty()) {
            if let Some(m) = Modifier::parse(part) {
                if !modifiers.contains(&m) {
                    modifiers.push(m);
                }
                continue;
            }
            if key.is_some() {
                return Err(AutomationError::InvalidArgument(format!(
                    "Hotkey '{}' names more than one non-modifier key",
                    parts.join("+")
                )));
            }
            key = Some(Key::parse(part)?);
        }
        let key = key.ok_or_else(|| {
            AutomationError::InvalidArgument(format!(
                "Hotkey '{}' has no key besides modifiers",
                parts.join("+")
            ))
        })?;
        Ok(KeyCombo { key, modifiers })
    }

    /// Split a `cmd+shift+t` or `cmd,shift,t` string.
    pub fn parse_str(spec: &str) -> Result<KeyCombo, AutomationError> {
        let parts: Vec<&str> = spec.split(['+', ',']).collect();
        Self::parse(&parts)
    }
}

impl fmt::Display for KeyCombo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for m in &self.modifiers {
            write!(f, "{m}+")?;
        }
        write!(f, "{}", self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_special_keys() {
        assert_eq!(Key::parse("Enter").unwrap(), Key::Return);
        assert_eq!(Key::parse("esc").unwrap(), Key::Escape);
        assert_eq!(Key::parse("backspace").unwrap(), Key::Delete);
        assert_eq!(Key::parse("F12").unwrap(), Key::F(12));
        assert_eq!(Key::parse("a").unwrap(), Key::Char('a'));
        assert!(Key::parse("f13").is_err());
        assert!(Key::parse("hyper").is_err());
    }

    #[test]
    fn test_hotkey_combo() {
        let combo = KeyCombo::parse_str("cmd+shift+t").unwrap();
        assert_eq!(combo.key, Key::Char('t'));
        assert_eq!(combo.modifiers, vec![Modifier::Command, Modifier::Shift]);
        assert_eq!(combo.to_string(), "cmd+shift+t");

        assert!(KeyCombo::parse_str("cmd+shift").is_err());
        assert!(KeyCombo::parse_str("a+b").is_err());
    }
}
