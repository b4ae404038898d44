//! Page collaborator traits
//!
//! `PagePort` mirrors the operations a checkout step needs from a browser
//! page. Implementations own their timeouts: every call that waits takes an
//! explicit bound and reports `ActionError::WaitTimeout` / `NavTimeout` when
//! it elapses.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::{
    errors::ActionError,
    types::{ElementProbe, PageCondition, SelectBy, SelectOptionInfo, WaitState, WaitUntil},
};

#[async_trait]
pub trait PagePort: Send + Sync {
    /// Navigate to a URL and wait for the requested tier
    async fn goto(&self, url: &str, wait_until: WaitUntil, timeout: Duration)
        -> Result<(), ActionError>;

    /// URL of the current document
    async fn current_url(&self) -> Result<String, ActionError>;

    /// Wait for the element to reach `state`
    async fn wait_for(
        &self,
        selector: &str,
        state: WaitState,
        timeout: Duration,
    ) -> Result<(), ActionError>;

    /// Click the element
    async fn click(&self, selector: &str, timeout: Duration) -> Result<(), ActionError>;

    /// Replace the element's value with `text`
    async fn fill(&self, selector: &str, text: &str) -> Result<(), ActionError>;

    /// Select an option of a `<select>`
    async fn select_option(&self, selector: &str, by: &SelectBy) -> Result<(), ActionError>;

    async fn is_visible(&self, selector: &str) -> Result<bool, ActionError>;

    async fn is_enabled(&self, selector: &str) -> Result<bool, ActionError>;

    /// Read-only existence/enabled/rendered inspection
    async fn probe(&self, selector: &str) -> Result<ElementProbe, ActionError>;

    /// Options currently listed by a `<select>`
    async fn options(&self, selector: &str) -> Result<Vec<SelectOptionInfo>, ActionError>;

    /// Probe every `target` match inside `container`, in document order
    async fn candidates(
        &self,
        container: &str,
        target: &str,
    ) -> Result<Vec<ElementProbe>, ActionError>;

    /// Click the `index`-th `target` inside `container`; false if it vanished
    async fn click_nth(
        &self,
        container: &str,
        target: &str,
        index: usize,
    ) -> Result<bool, ActionError>;

    /// Poll a page condition
    async fn wait_until(
        &self,
        condition: &PageCondition,
        timeout: Duration,
    ) -> Result<(), ActionError>;

    async fn set_viewport(&self, width: u32, height: u32) -> Result<(), ActionError>;

    /// Largest Contentful Paint of the current document in milliseconds
    ///
    /// `None` when the browser has not reported a paint entry.
    async fn largest_contentful_paint(&self) -> Result<Option<u64>, ActionError> {
        Ok(None)
    }

    /// Release the page/session
    async fn close(&self) -> Result<(), ActionError>;
}

#[async_trait]
pub trait BrowserPort: Send + Sync {
    /// Open a fresh page owned by the caller
    async fn new_page(&self) -> Result<Arc<dyn PagePort>, ActionError>;
}
