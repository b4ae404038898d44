//! Core data types for page interactions

use serde::{Deserialize, Serialize};
use std::fmt;

/// Element state to wait for before acting
///
/// Most steps wait for `Visible`. `Attached` is used for elements that exist
/// in the DOM but are still being populated asynchronously.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WaitState {
    /// Present in the DOM
    Attached,

    /// Present and rendered
    #[default]
    Visible,

    /// Absent or not rendered
    Hidden,

    /// Absent from the DOM
    Detached,
}

impl fmt::Display for WaitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            WaitState::Attached => "attached",
            WaitState::Visible => "visible",
            WaitState::Hidden => "hidden",
            WaitState::Detached => "detached",
        };
        f.write_str(label)
    }
}

/// Navigation completion tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WaitUntil {
    /// `load` event fired
    #[default]
    Load,

    /// `DOMContentLoaded` fired
    DomContentLoaded,

    /// Load plus a quiet network window
    NetworkIdle,
}

/// How to pick an option from a `<select>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectBy {
    Index(usize),
    Value(String),
    Label(String),
}

impl fmt::Display for SelectBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectBy::Index(index) => write!(f, "index {}", index),
            SelectBy::Value(value) => write!(f, "value {:?}", value),
            SelectBy::Label(label) => write!(f, "label {:?}", label),
        }
    }
}

/// Read-only snapshot of an element, taken without mutating the page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ElementProbe {
    /// Element matched the selector
    pub exists: bool,

    /// Element has no `disabled` attribute
    pub enabled: bool,

    /// Element has non-zero render dimensions
    pub rendered: bool,
}

impl ElementProbe {
    pub fn absent() -> Self {
        Self::default()
    }

    pub fn actionable() -> Self {
        Self {
            exists: true,
            enabled: true,
            rendered: true,
        }
    }

    pub fn disabled() -> Self {
        Self {
            exists: true,
            enabled: false,
            rendered: true,
        }
    }

    pub fn hidden() -> Self {
        Self {
            exists: true,
            enabled: true,
            rendered: false,
        }
    }

    pub fn is_actionable(&self) -> bool {
        self.exists && self.enabled && self.rendered
    }
}

/// One `<option>` of a select element
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectOptionInfo {
    pub value: String,
    pub text: String,
}

impl SelectOptionInfo {
    pub fn new(value: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            text: text.into(),
        }
    }
}

/// Page-level condition polled until it holds or the timeout elapses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageCondition {
    /// Current URL contains the fragment
    UrlContains(String),

    /// Current URL equals the given URL exactly
    UrlIs(String),

    /// Select/input carries a non-empty value
    HasValue { selector: String },

    /// Select is enabled and lists more than `min_options` entries
    OptionsLoaded { selector: String, min_options: usize },
}

impl fmt::Display for PageCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageCondition::UrlContains(fragment) => write!(f, "url contains {:?}", fragment),
            PageCondition::UrlIs(url) => write!(f, "url is {:?}", url),
            PageCondition::HasValue { selector } => write!(f, "{} has a value", selector),
            PageCondition::OptionsLoaded {
                selector,
                min_options,
            } => write!(f, "{} lists more than {} options", selector, min_options),
        }
    }
}

/// Browser viewport size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_state_default_is_visible() {
        assert_eq!(WaitState::default(), WaitState::Visible);
    }

    #[test]
    fn probe_actionable_requires_all_flags() {
        assert!(ElementProbe::actionable().is_actionable());
        assert!(!ElementProbe::disabled().is_actionable());
        assert!(!ElementProbe::hidden().is_actionable());
        assert!(!ElementProbe::absent().is_actionable());
    }

    #[test]
    fn condition_serializes_snake_case() {
        let cond = PageCondition::UrlContains("/products/".into());
        let json = serde_json::to_value(&cond).unwrap();
        assert_eq!(json, serde_json::json!({ "url_contains": "/products/" }));
    }
}
