//! In-memory storefront model
//!
//! `ScriptedPage` answers every `PagePort` call from a table of elements
//! instead of a real browser. Waits resolve against the current table: a
//! wait whose state is not met fails immediately as a timeout, so rehearsals
//! and tests never sleep for the configured bound.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use storeprobe_core_types::PageId;
use tracing::debug;

use crate::{
    errors::ActionError,
    primitives::{BrowserPort, PagePort},
    types::{ElementProbe, PageCondition, SelectBy, SelectOptionInfo, WaitState, WaitUntil},
};

/// State of one element in the model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptedElement {
    pub visible: bool,
    pub enabled: bool,
    pub value: String,
    pub options: Vec<SelectOptionInfo>,
}

impl ScriptedElement {
    pub fn visible() -> Self {
        Self {
            visible: true,
            enabled: true,
            value: String::new(),
            options: Vec::new(),
        }
    }

    /// Present in the DOM with no render box
    pub fn hidden() -> Self {
        Self {
            visible: false,
            ..Self::visible()
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::visible()
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }

    pub fn with_options(mut self, options: Vec<SelectOptionInfo>) -> Self {
        self.options = options;
        self
    }

    fn probe(&self) -> ElementProbe {
        ElementProbe {
            exists: true,
            enabled: self.enabled,
            rendered: self.visible,
        }
    }
}

/// Page mutation triggered by interacting with an element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Navigate(String),
    Show(String),
    Hide(String),
    Insert(String, ScriptedElement),
    Remove(String),
}

/// One recorded page call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCall {
    pub op: &'static str,
    pub target: String,
}

#[derive(Default)]
struct PageState {
    url: String,
    elements: HashMap<String, ScriptedElement>,
    candidates: HashMap<(String, String), Vec<ElementProbe>>,
    viewport: Option<(u32, u32)>,
    lcp_ms: Option<u64>,
    calls: Vec<PageCall>,
}

/// Scripted page implementing `PagePort`
pub struct ScriptedPage {
    id: PageId,
    state: Mutex<PageState>,
    effects: HashMap<String, Vec<Effect>>,
    redirects: HashMap<String, String>,
    failing: HashSet<String>,
    panicking: HashSet<String>,
    fail_viewport: bool,
    fail_close: bool,
    hang_close: bool,
    closes: AtomicUsize,
}

const MUTATING_OPS: [&str; 4] = ["click", "fill", "select_option", "click_nth"];

impl ScriptedPage {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            id: PageId::new(),
            state: Mutex::new(PageState {
                url: url.into(),
                ..PageState::default()
            }),
            effects: HashMap::new(),
            redirects: HashMap::new(),
            failing: HashSet::new(),
            panicking: HashSet::new(),
            fail_viewport: false,
            fail_close: false,
            hang_close: false,
            closes: AtomicUsize::new(0),
        }
    }

    pub fn id(&self) -> &PageId {
        &self.id
    }

    pub fn with_element(self, selector: impl Into<String>, element: ScriptedElement) -> Self {
        self.state.lock().elements.insert(selector.into(), element);
        self
    }

    /// Candidate probes returned for `target` inside `container`
    pub fn with_candidates(
        self,
        container: impl Into<String>,
        target: impl Into<String>,
        probes: Vec<ElementProbe>,
    ) -> Self {
        self.state
            .lock()
            .candidates
            .insert((container.into(), target.into()), probes);
        self
    }

    /// Effects applied after a successful click/select on `selector`
    pub fn on_interact(mut self, selector: impl Into<String>, effect: Effect) -> Self {
        self.effects.entry(selector.into()).or_default().push(effect);
        self
    }

    /// Navigating to `from` lands on `to`
    pub fn redirect(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.redirects.insert(from.into(), to.into());
        self
    }

    /// Largest Contentful Paint reported for the page
    pub fn with_lcp(self, lcp_ms: u64) -> Self {
        self.state.lock().lcp_ms = Some(lcp_ms);
        self
    }

    /// Every call touching `selector` fails with a browser error
    pub fn failing(mut self, selector: impl Into<String>) -> Self {
        self.failing.insert(selector.into());
        self
    }

    /// Every call touching `selector` panics
    pub fn panicking(mut self, selector: impl Into<String>) -> Self {
        self.panicking.insert(selector.into());
        self
    }

    pub fn failing_viewport(mut self) -> Self {
        self.fail_viewport = true;
        self
    }

    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    /// `close` never resolves
    pub fn hanging_close(mut self) -> Self {
        self.hang_close = true;
        self
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn url(&self) -> String {
        self.state.lock().url.clone()
    }

    pub fn value_of(&self, selector: &str) -> Option<String> {
        self.state
            .lock()
            .elements
            .get(selector)
            .map(|el| el.value.clone())
    }

    pub fn viewport(&self) -> Option<(u32, u32)> {
        self.state.lock().viewport
    }

    pub fn calls(&self) -> Vec<PageCall> {
        self.state.lock().calls.clone()
    }

    /// Number of mutating calls (click, fill, select) that targeted `selector`
    pub fn actions_on(&self, selector: &str) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| MUTATING_OPS.contains(&call.op) && call.target == selector)
            .count()
    }

    fn enter(&self, op: &'static str, target: &str) -> Result<(), ActionError> {
        if self.panicking.contains(target) {
            panic!("scripted panic on {} {}", op, target);
        }
        if self.close_count() > 0 {
            return Err(ActionError::PageClosed(self.id.to_string()));
        }
        self.state.lock().calls.push(PageCall {
            op,
            target: target.to_string(),
        });
        if self.failing.contains(target) {
            return Err(ActionError::Browser(format!(
                "scripted failure on {} {}",
                op, target
            )));
        }
        Ok(())
    }

    fn apply_effects(&self, selector: &str) {
        let Some(effects) = self.effects.get(selector) else {
            return;
        };
        let mut state = self.state.lock();
        for effect in effects {
            debug!(selector, ?effect, "applying scripted effect");
            match effect {
                Effect::Navigate(url) => state.url = url.clone(),
                Effect::Show(target) => {
                    if let Some(el) = state.elements.get_mut(target) {
                        el.visible = true;
                    }
                }
                Effect::Hide(target) => {
                    if let Some(el) = state.elements.get_mut(target) {
                        el.visible = false;
                    }
                }
                Effect::Insert(target, element) => {
                    state.elements.insert(target.clone(), element.clone());
                }
                Effect::Remove(target) => {
                    state.elements.remove(target);
                }
            }
        }
    }

    fn element(&self, selector: &str) -> Result<ScriptedElement, ActionError> {
        self.state
            .lock()
            .elements
            .get(selector)
            .cloned()
            .ok_or_else(|| ActionError::ElementNotFound(selector.to_string()))
    }

    fn interactable(&self, selector: &str) -> Result<(), ActionError> {
        let el = self.element(selector)?;
        if !el.visible {
            return Err(ActionError::NotClickable(selector.to_string()));
        }
        if !el.enabled {
            return Err(ActionError::NotEnabled(selector.to_string()));
        }
        Ok(())
    }

    fn condition_holds(&self, condition: &PageCondition) -> bool {
        let state = self.state.lock();
        match condition {
            PageCondition::UrlContains(fragment) => state.url.contains(fragment.as_str()),
            PageCondition::UrlIs(url) => state.url == *url,
            PageCondition::HasValue { selector } => state
                .elements
                .get(selector)
                .map(|el| !el.value.is_empty())
                .unwrap_or(false),
            PageCondition::OptionsLoaded {
                selector,
                min_options,
            } => state
                .elements
                .get(selector)
                .map(|el| el.enabled && el.options.len() > *min_options)
                .unwrap_or(false),
        }
    }
}

#[async_trait]
impl PagePort for ScriptedPage {
    async fn goto(
        &self,
        url: &str,
        _wait_until: WaitUntil,
        _timeout: Duration,
    ) -> Result<(), ActionError> {
        self.enter("goto", url)?;
        let landed = self.redirects.get(url).map_or(url, String::as_str);
        self.state.lock().url = landed.to_string();
        Ok(())
    }

    async fn current_url(&self) -> Result<String, ActionError> {
        Ok(self.url())
    }

    async fn wait_for(
        &self,
        selector: &str,
        state: WaitState,
        timeout: Duration,
    ) -> Result<(), ActionError> {
        self.enter("wait_for", selector)?;
        let probe = self.probe_now(selector);
        let met = match state {
            WaitState::Attached => probe.exists,
            WaitState::Visible => probe.exists && probe.rendered,
            WaitState::Hidden => !probe.exists || !probe.rendered,
            WaitState::Detached => !probe.exists,
        };
        if met {
            Ok(())
        } else {
            Err(ActionError::WaitTimeout(format!(
                "{} not {} within {}ms",
                selector,
                state,
                timeout.as_millis()
            )))
        }
    }

    async fn click(&self, selector: &str, _timeout: Duration) -> Result<(), ActionError> {
        self.enter("click", selector)?;
        self.interactable(selector)?;
        self.apply_effects(selector);
        Ok(())
    }

    async fn fill(&self, selector: &str, text: &str) -> Result<(), ActionError> {
        self.enter("fill", selector)?;
        self.interactable(selector)?;
        if let Some(el) = self.state.lock().elements.get_mut(selector) {
            el.value = text.to_string();
        }
        Ok(())
    }

    async fn select_option(&self, selector: &str, by: &SelectBy) -> Result<(), ActionError> {
        self.enter("select_option", selector)?;
        let el = self.element(selector)?;
        if !el.enabled {
            return Err(ActionError::NotEnabled(selector.to_string()));
        }
        let chosen = match by {
            SelectBy::Index(index) => el.options.get(*index),
            SelectBy::Value(value) => el.options.iter().find(|opt| &opt.value == value),
            SelectBy::Label(label) => el.options.iter().find(|opt| &opt.text == label),
        }
        .cloned()
        .ok_or_else(|| ActionError::OptionNotFound(format!("{} in {}", by, selector)))?;
        if let Some(el) = self.state.lock().elements.get_mut(selector) {
            el.value = chosen.value;
        }
        self.apply_effects(selector);
        Ok(())
    }

    async fn is_visible(&self, selector: &str) -> Result<bool, ActionError> {
        self.enter("is_visible", selector)?;
        let probe = self.probe_now(selector);
        Ok(probe.exists && probe.rendered)
    }

    async fn is_enabled(&self, selector: &str) -> Result<bool, ActionError> {
        self.enter("is_enabled", selector)?;
        Ok(self.element(selector)?.enabled)
    }

    async fn probe(&self, selector: &str) -> Result<ElementProbe, ActionError> {
        self.enter("probe", selector)?;
        Ok(self.probe_now(selector))
    }

    async fn options(&self, selector: &str) -> Result<Vec<SelectOptionInfo>, ActionError> {
        self.enter("options", selector)?;
        Ok(self.element(selector)?.options)
    }

    async fn candidates(
        &self,
        container: &str,
        target: &str,
    ) -> Result<Vec<ElementProbe>, ActionError> {
        self.enter("candidates", target)?;
        let state = self.state.lock();
        if !state.elements.contains_key(container) {
            return Ok(Vec::new());
        }
        Ok(state
            .candidates
            .get(&(container.to_string(), target.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn click_nth(
        &self,
        container: &str,
        target: &str,
        index: usize,
    ) -> Result<bool, ActionError> {
        self.enter("click_nth", target)?;
        let present = self
            .state
            .lock()
            .candidates
            .get(&(container.to_string(), target.to_string()))
            .map(|probes| index < probes.len())
            .unwrap_or(false);
        if present {
            self.apply_effects(target);
        }
        Ok(present)
    }

    async fn wait_until(
        &self,
        condition: &PageCondition,
        timeout: Duration,
    ) -> Result<(), ActionError> {
        self.enter("wait_until", &condition.to_string())?;
        if self.condition_holds(condition) {
            Ok(())
        } else {
            Err(ActionError::WaitTimeout(format!(
                "{} not met within {}ms",
                condition,
                timeout.as_millis()
            )))
        }
    }

    async fn set_viewport(&self, width: u32, height: u32) -> Result<(), ActionError> {
        self.enter("set_viewport", "page")?;
        if self.fail_viewport {
            return Err(ActionError::Browser("viewport emulation rejected".into()));
        }
        self.state.lock().viewport = Some((width, height));
        Ok(())
    }

    async fn largest_contentful_paint(&self) -> Result<Option<u64>, ActionError> {
        if self.close_count() > 0 {
            return Err(ActionError::PageClosed(self.id.to_string()));
        }
        Ok(self.state.lock().lcp_ms)
    }

    async fn close(&self) -> Result<(), ActionError> {
        self.state.lock().calls.push(PageCall {
            op: "close",
            target: "page".to_string(),
        });
        let previous = self.closes.fetch_add(1, Ordering::SeqCst);
        if previous > 0 {
            return Err(ActionError::PageClosed(self.id.to_string()));
        }
        if self.fail_close {
            return Err(ActionError::Browser("target already detached".into()));
        }
        if self.hang_close {
            std::future::pending::<()>().await;
        }
        Ok(())
    }
}

impl ScriptedPage {
    fn probe_now(&self, selector: &str) -> ElementProbe {
        self.state
            .lock()
            .elements
            .get(selector)
            .map(ScriptedElement::probe)
            .unwrap_or_else(ElementProbe::absent)
    }
}

/// Browser handing out one shared scripted page
pub struct ScriptedBrowser {
    page: Option<Arc<ScriptedPage>>,
    opened: AtomicUsize,
}

impl ScriptedBrowser {
    pub fn new(page: Arc<ScriptedPage>) -> Self {
        Self {
            page: Some(page),
            opened: AtomicUsize::new(0),
        }
    }

    /// Browser whose page acquisition always fails
    pub fn unavailable() -> Self {
        Self {
            page: None,
            opened: AtomicUsize::new(0),
        }
    }

    pub fn pages_opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserPort for ScriptedBrowser {
    async fn new_page(&self) -> Result<Arc<dyn PagePort>, ActionError> {
        let page = self
            .page
            .clone()
            .ok_or_else(|| ActionError::Browser("browser process is not running".into()))?;
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn select_options() -> Vec<SelectOptionInfo> {
        vec![
            SelectOptionInfo::new("", "Choose"),
            SelectOptionInfo::new("7", "Santiago"),
        ]
    }

    #[tokio::test]
    async fn click_applies_navigation_effect() {
        let page = ScriptedPage::new("https://shop.test/")
            .with_element("#product", ScriptedElement::visible())
            .on_interact("#product", Effect::Navigate("https://shop.test/products/1".into()));

        page.click("#product", Duration::from_millis(10)).await.unwrap();

        assert_eq!(page.url(), "https://shop.test/products/1");
        assert_eq!(page.actions_on("#product"), 1);
    }

    #[tokio::test]
    async fn wait_for_unmet_state_times_out() {
        let page = ScriptedPage::new("about:blank")
            .with_element("#modal", ScriptedElement::hidden());

        let attached = page
            .wait_for("#modal", WaitState::Attached, Duration::from_millis(5))
            .await;
        let visible = page
            .wait_for("#modal", WaitState::Visible, Duration::from_millis(5))
            .await;

        assert!(attached.is_ok());
        assert!(matches!(visible, Err(ActionError::WaitTimeout(_))));
    }

    #[tokio::test]
    async fn select_by_value_and_index() {
        let page = ScriptedPage::new("about:blank").with_element(
            "#county",
            ScriptedElement::visible().with_options(select_options()),
        );

        page.select_option("#county", &SelectBy::Index(1)).await.unwrap();
        assert_eq!(page.value_of("#county").as_deref(), Some("7"));

        let missing = page
            .select_option("#county", &SelectBy::Value("99".into()))
            .await;
        assert!(matches!(missing, Err(ActionError::OptionNotFound(_))));
    }

    #[tokio::test]
    async fn conditions_follow_state() {
        let page = ScriptedPage::new("https://shop.test/").with_element(
            "#county",
            ScriptedElement::visible().with_options(select_options()),
        );

        let loaded = PageCondition::OptionsLoaded {
            selector: "#county".into(),
            min_options: 1,
        };
        assert!(page.wait_until(&loaded, Duration::ZERO).await.is_ok());

        let valued = PageCondition::HasValue {
            selector: "#county".into(),
        };
        assert!(page.wait_until(&valued, Duration::ZERO).await.is_err());
    }

    #[tokio::test]
    async fn calls_after_close_are_rejected() {
        let page = ScriptedPage::new("about:blank")
            .with_element("#a", ScriptedElement::visible());

        page.close().await.unwrap();

        assert!(matches!(
            page.click("#a", Duration::ZERO).await,
            Err(ActionError::PageClosed(_))
        ));
        assert!(page.close().await.is_err());
        assert_eq!(page.close_count(), 2);
    }

    #[tokio::test]
    async fn close_is_logged_after_page_calls() {
        let page = ScriptedPage::new("about:blank")
            .with_element("#a", ScriptedElement::visible());

        page.click("#a", Duration::ZERO).await.unwrap();
        page.close().await.unwrap();

        let ops: Vec<_> = page.calls().into_iter().map(|c| c.op).collect();
        assert_eq!(ops, vec!["click", "close"]);
        assert_eq!(page.actions_on("page"), 0);
    }

    #[tokio::test]
    async fn redirected_goto_lands_elsewhere() {
        let page = ScriptedPage::new("about:blank")
            .redirect("https://shop.test/", "https://shop.test/maintenance");

        page.goto("https://shop.test/", WaitUntil::Load, Duration::ZERO)
            .await
            .unwrap();

        assert_eq!(page.url(), "https://shop.test/maintenance");
        let exact = PageCondition::UrlIs("https://shop.test/".into());
        assert!(page.wait_until(&exact, Duration::ZERO).await.is_err());
        let partial = PageCondition::UrlContains("https://shop.test/".into());
        assert!(page.wait_until(&partial, Duration::ZERO).await.is_ok());
    }

    #[tokio::test]
    async fn lcp_is_reported_until_close() {
        let silent = ScriptedPage::new("about:blank");
        assert_eq!(silent.largest_contentful_paint().await.unwrap(), None);

        let page = ScriptedPage::new("about:blank").with_lcp(1_850);
        assert_eq!(page.largest_contentful_paint().await.unwrap(), Some(1_850));

        page.close().await.unwrap();
        assert!(page.largest_contentful_paint().await.is_err());
    }

    #[tokio::test]
    async fn unavailable_browser_fails_new_page() {
        let browser = ScriptedBrowser::unavailable();
        assert!(browser.new_page().await.is_err());
        assert_eq!(browser.pages_opened(), 0);
    }

    #[tokio::test]
    async fn candidates_empty_without_container() {
        let page = ScriptedPage::new("about:blank").with_candidates(
            "#modal",
            "button#add",
            vec![ElementProbe::actionable()],
        );
        assert!(page.candidates("#modal", "button#add").await.unwrap().is_empty());
    }
}
