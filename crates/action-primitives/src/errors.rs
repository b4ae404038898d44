//! Error types for page interactions

use thiserror::Error;

/// Failures reported by a page collaborator
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ActionError {
    /// Navigation did not reach the requested load state in time
    #[error("Navigation timeout: {0}")]
    NavTimeout(String),

    /// Waiting for an element state or page condition timed out
    #[error("Wait timeout: {0}")]
    WaitTimeout(String),

    /// Element could not be located
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// Element is not clickable (hidden, obscured, or not interactable)
    #[error("Element not clickable: {0}")]
    NotClickable(String),

    /// Element is disabled
    #[error("Element not enabled: {0}")]
    NotEnabled(String),

    /// Dropdown option was not found
    #[error("Option not found in dropdown: {0}")]
    OptionNotFound(String),

    /// The page was closed before the operation ran
    #[error("Page closed: {0}")]
    PageClosed(String),

    /// Browser or protocol error
    #[error("Browser error: {0}")]
    Browser(String),

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ActionError {
    /// Check if this error came from an elapsed timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, ActionError::NavTimeout(_) | ActionError::WaitTimeout(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_classification() {
        assert!(ActionError::NavTimeout("x".into()).is_timeout());
        assert!(ActionError::WaitTimeout("x".into()).is_timeout());
        assert!(!ActionError::NotEnabled("x".into()).is_timeout());
    }

    #[test]
    fn display_names_the_failure() {
        let err = ActionError::Browser("target crashed".into());
        assert_eq!(err.to_string(), "Browser error: target crashed");
    }
}
