//! `PagePort` over a chromiumoxide page
//!
//! DOM inspection and mutation go through `Runtime.evaluate`; waits poll the
//! DOM at `poll_interval` until their bound elapses.

use action_primitives::{
    ActionError, ElementProbe, PageCondition, PagePort, SelectBy, SelectOptionInfo, WaitState,
    WaitUntil,
};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::error::CdpError;
use chromiumoxide::Page;
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use storeprobe_core_types::PageId;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, instrument};

use crate::scripts;

/// Quiet window approximating `networkidle`
const NETWORK_IDLE_MS: u64 = 500;

pub struct ChromiumPage {
    id: PageId,
    page: Page,
    poll_interval: Duration,
    closed: AtomicBool,
}

impl ChromiumPage {
    pub fn new(page: Page, poll_interval: Duration) -> Self {
        Self {
            id: PageId::new(),
            page,
            poll_interval,
            closed: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &PageId {
        &self.id
    }

    fn ensure_open(&self) -> Result<(), ActionError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ActionError::PageClosed(self.id.to_string()));
        }
        Ok(())
    }

    async fn eval<T: DeserializeOwned>(&self, script: &str) -> Result<T, ActionError> {
        self.ensure_open()?;
        self.page
            .evaluate(script)
            .await
            .map_err(map_cdp_error)?
            .into_value::<T>()
            .map_err(|err| ActionError::Browser(format!("unexpected script result: {}", err)))
    }

    async fn probe_now(&self, selector: &str) -> Result<ElementProbe, ActionError> {
        self.eval(&scripts::probe(selector)).await
    }

    /// Poll `check` until it returns true or `bound` elapses
    async fn poll<F, Fut>(&self, bound: Duration, mut check: F) -> Result<bool, ActionError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<bool, ActionError>>,
    {
        let deadline = Instant::now() + bound;
        loop {
            if check().await? {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            sleep(self.poll_interval).await;
        }
    }

    async fn wait_ready(&self, wait_until: WaitUntil, bound: Duration) -> Result<(), ActionError> {
        let wanted: &[&str] = match wait_until {
            WaitUntil::DomContentLoaded => &["interactive", "complete"],
            WaitUntil::Load | WaitUntil::NetworkIdle => &["complete"],
        };
        let ready = self
            .poll(bound, move || async move {
                let state: String = self.eval(scripts::ready_state()).await?;
                Ok::<_, ActionError>(wanted.contains(&state.as_str()))
            })
            .await?;
        if !ready {
            return Err(ActionError::NavTimeout(format!(
                "document not {:?} within {}ms",
                wait_until,
                bound.as_millis()
            )));
        }
        if wait_until == WaitUntil::NetworkIdle {
            sleep(Duration::from_millis(NETWORK_IDLE_MS)).await;
        }
        Ok(())
    }
}

#[async_trait]
impl PagePort for ChromiumPage {
    #[instrument(skip_all, fields(page = %self.id, url = %url))]
    async fn goto(
        &self,
        url: &str,
        wait_until: WaitUntil,
        bound: Duration,
    ) -> Result<(), ActionError> {
        self.ensure_open()?;
        let started = Instant::now();
        match timeout(bound, self.page.goto(url)).await {
            Ok(result) => {
                result.map_err(map_cdp_error)?;
            }
            Err(_) => {
                return Err(ActionError::NavTimeout(format!(
                    "{} did not load within {}ms",
                    url,
                    bound.as_millis()
                )))
            }
        }
        let remaining = bound.saturating_sub(started.elapsed());
        self.wait_ready(wait_until, remaining).await?;
        debug!(elapsed_ms = started.elapsed().as_millis() as u64, "navigation settled");
        Ok(())
    }

    async fn current_url(&self) -> Result<String, ActionError> {
        self.ensure_open()?;
        Ok(self
            .page
            .url()
            .await
            .map_err(map_cdp_error)?
            .unwrap_or_default())
    }

    async fn wait_for(
        &self,
        selector: &str,
        state: WaitState,
        bound: Duration,
    ) -> Result<(), ActionError> {
        let met = self
            .poll(bound, move || async move {
                let probe = self.probe_now(selector).await?;
                Ok::<_, ActionError>(match state {
                    WaitState::Attached => probe.exists,
                    WaitState::Visible => probe.exists && probe.rendered,
                    WaitState::Hidden => !probe.exists || !probe.rendered,
                    WaitState::Detached => !probe.exists,
                })
            })
            .await?;
        if met {
            Ok(())
        } else {
            Err(ActionError::WaitTimeout(format!(
                "{} not {} within {}ms",
                selector,
                state,
                bound.as_millis()
            )))
        }
    }

    async fn click(&self, selector: &str, bound: Duration) -> Result<(), ActionError> {
        let actionable = self
            .poll(bound, move || async move {
                Ok::<_, ActionError>(self.probe_now(selector).await?.is_actionable())
            })
            .await?;
        if !actionable {
            let probe = self.probe_now(selector).await?;
            return Err(if !probe.exists {
                ActionError::ElementNotFound(selector.to_string())
            } else if !probe.enabled {
                ActionError::NotEnabled(selector.to_string())
            } else {
                ActionError::NotClickable(selector.to_string())
            });
        }
        self.ensure_open()?;
        let element = self.page.find_element(selector).await.map_err(map_cdp_error)?;
        element.click().await.map_err(map_cdp_error)?;
        Ok(())
    }

    async fn fill(&self, selector: &str, text: &str) -> Result<(), ActionError> {
        let filled: bool = self.eval(&scripts::fill(selector, text)).await?;
        if filled {
            Ok(())
        } else {
            Err(ActionError::ElementNotFound(selector.to_string()))
        }
    }

    async fn select_option(&self, selector: &str, by: &SelectBy) -> Result<(), ActionError> {
        let result: String = self.eval(&scripts::select_option(selector, by)).await?;
        match result.as_str() {
            "ok" => Ok(()),
            "missing" => Err(ActionError::ElementNotFound(selector.to_string())),
            _ => Err(ActionError::OptionNotFound(format!("{} in {}", by, selector))),
        }
    }

    async fn is_visible(&self, selector: &str) -> Result<bool, ActionError> {
        let probe = self.probe_now(selector).await?;
        Ok(probe.exists && probe.rendered)
    }

    async fn is_enabled(&self, selector: &str) -> Result<bool, ActionError> {
        let probe = self.probe_now(selector).await?;
        if !probe.exists {
            return Err(ActionError::ElementNotFound(selector.to_string()));
        }
        Ok(probe.enabled)
    }

    async fn probe(&self, selector: &str) -> Result<ElementProbe, ActionError> {
        self.probe_now(selector).await
    }

    async fn options(&self, selector: &str) -> Result<Vec<SelectOptionInfo>, ActionError> {
        let options: Option<Vec<SelectOptionInfo>> =
            self.eval(&scripts::options(selector)).await?;
        options.ok_or_else(|| ActionError::ElementNotFound(selector.to_string()))
    }

    async fn candidates(
        &self,
        container: &str,
        target: &str,
    ) -> Result<Vec<ElementProbe>, ActionError> {
        self.eval(&scripts::candidates(container, target)).await
    }

    async fn click_nth(
        &self,
        container: &str,
        target: &str,
        index: usize,
    ) -> Result<bool, ActionError> {
        self.eval(&scripts::click_nth(container, target, index))
            .await
    }

    async fn wait_until(
        &self,
        condition: &PageCondition,
        bound: Duration,
    ) -> Result<(), ActionError> {
        let script = scripts::condition(condition);
        let script = script.as_deref();
        let met = self
            .poll(bound, move || async move {
                match (script, condition) {
                    (Some(script), _) => self.eval::<bool>(script).await,
                    (None, PageCondition::UrlContains(fragment)) => {
                        Ok(self.current_url().await?.contains(fragment.as_str()))
                    }
                    (None, PageCondition::UrlIs(url)) => Ok(self.current_url().await? == *url),
                    (None, _) => Ok(false),
                }
            })
            .await?;
        if met {
            Ok(())
        } else {
            Err(ActionError::WaitTimeout(format!(
                "{} not met within {}ms",
                condition,
                bound.as_millis()
            )))
        }
    }

    async fn set_viewport(&self, width: u32, height: u32) -> Result<(), ActionError> {
        self.ensure_open()?;
        let params = SetDeviceMetricsOverrideParams::builder()
            .width(i64::from(width))
            .height(i64::from(height))
            .device_scale_factor(1.0)
            .mobile(false)
            .build()
            .map_err(ActionError::Browser)?;
        self.page.execute(params).await.map_err(map_cdp_error)?;
        Ok(())
    }

    async fn largest_contentful_paint(&self) -> Result<Option<u64>, ActionError> {
        self.eval(&scripts::lcp()).await
    }

    async fn close(&self) -> Result<(), ActionError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(ActionError::PageClosed(self.id.to_string()));
        }
        self.page.clone().close().await.map_err(map_cdp_error)?;
        debug!(page = %self.id, "page closed");
        Ok(())
    }
}

pub(crate) fn map_cdp_error(err: CdpError) -> ActionError {
    let hint = err.to_string();
    match err {
        CdpError::Timeout => ActionError::WaitTimeout(hint),
        CdpError::NotFound => ActionError::ElementNotFound(hint),
        CdpError::JavascriptException(_) | CdpError::Serde(_) => ActionError::Internal(hint),
        _ => ActionError::Browser(hint),
    }
}
