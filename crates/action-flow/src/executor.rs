//! Step executor
//!
//! Runs one step against the page: applicability first, then each
//! interaction under its own bound. Errors never leave `execute`; they become
//! a failed `StepOutcome`.

use action_primitives::{ActionError, PagePort, SelectBy};
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, info, instrument, warn};

use crate::resolver::{ApplicabilityResolver, ProbeResolver};
use crate::types::{Interaction, Step, StepOutcome};

/// Slack added on top of a port-level timeout before the executor gives up
const TIMEOUT_GRACE_MS: u64 = 1_000;

pub struct StepExecutor {
    resolver: Arc<dyn ApplicabilityResolver>,
}

impl StepExecutor {
    pub fn new(resolver: Arc<dyn ApplicabilityResolver>) -> Self {
        Self { resolver }
    }

    /// Execute one step; the outcome is created once and never re-thrown
    #[instrument(skip_all, fields(step = %step.name, critical = step.critical))]
    pub async fn execute(&self, step: &Step, page: &dyn PagePort) -> StepOutcome {
        let started_at = Utc::now();
        let clock = Instant::now();

        if let Some(applicability) = &step.applicability {
            match self.resolver.is_applicable(applicability, page).await {
                Ok(true) => {}
                Ok(false) => {
                    let outcome =
                        StepOutcome::not_applicable(step, started_at, elapsed_ms(clock));
                    info!(
                        selector = applicability.selector(),
                        "step not applicable, counted as satisfied"
                    );
                    return outcome;
                }
                Err(err) => {
                    let message = format!("applicability check failed: {}", err);
                    warn!(error = %message, "step failed");
                    return StepOutcome::failed_step(step, message, started_at, elapsed_ms(clock));
                }
            }
        }

        match self.perform(step, page).await {
            Ok(()) => {
                if step.settle_ms > 0 {
                    sleep(Duration::from_millis(step.settle_ms)).await;
                }
                let outcome = StepOutcome::succeeded_step(step, started_at, elapsed_ms(clock));
                info!(latency_ms = outcome.latency_ms, "step succeeded");
                outcome
            }
            Err(err) => {
                let outcome =
                    StepOutcome::failed_step(step, err.to_string(), started_at, elapsed_ms(clock));
                warn!(
                    latency_ms = outcome.latency_ms,
                    timeout = err.is_timeout(),
                    error = %err,
                    "step failed"
                );
                outcome
            }
        }
    }

    async fn perform(&self, step: &Step, page: &dyn PagePort) -> Result<(), ActionError> {
        for interaction in &step.interactions {
            debug!(interaction = %interaction.describe(), "performing interaction");
            self.interact(step, interaction, page).await?;
        }
        Ok(())
    }

    async fn interact(
        &self,
        step: &Step,
        interaction: &Interaction,
        page: &dyn PagePort,
    ) -> Result<(), ActionError> {
        let wait_bound = |override_ms: &Option<u64>| {
            Duration::from_millis(override_ms.unwrap_or(step.timeout_ms))
        };
        let step_bound = Duration::from_millis(step.timeout_ms);
        let action_bound = Duration::from_millis(step.action_timeout_ms);

        match interaction {
            Interaction::Goto {
                url,
                wait_until,
                timeout_ms,
            } => {
                let bound = wait_bound(timeout_ms);
                bounded(interaction, bound, page.goto(url, *wait_until, bound)).await
            }
            Interaction::WaitFor {
                selector,
                state,
                timeout_ms,
            } => {
                let bound = wait_bound(timeout_ms);
                bounded(interaction, bound, page.wait_for(selector, *state, bound)).await
            }
            Interaction::Click { selector } => {
                bounded(interaction, action_bound, page.click(selector, action_bound)).await
            }
            Interaction::Fill { selector, text } => {
                bounded(interaction, step_bound, page.fill(selector, text)).await
            }
            Interaction::SelectOption { selector, by } => {
                bounded(interaction, step_bound, page.select_option(selector, by)).await
            }
            Interaction::SelectFirstValued { selector } => {
                bounded(interaction, step_bound, select_first_valued(page, selector)).await
            }
            Interaction::EnsureEnabled { selector } => {
                let enabled = bounded(interaction, step_bound, page.is_enabled(selector)).await?;
                if enabled {
                    Ok(())
                } else {
                    Err(ActionError::NotEnabled(selector.clone()))
                }
            }
            Interaction::WaitUntil {
                condition,
                timeout_ms,
            } => {
                let bound = wait_bound(timeout_ms);
                bounded(interaction, bound, page.wait_until(condition, bound)).await
            }
            Interaction::ClickFirstActionable { container, target } => {
                bounded(
                    interaction,
                    action_bound + step_bound,
                    click_first_actionable(page, container, target),
                )
                .await
            }
        }
    }
}

impl Default for StepExecutor {
    fn default() -> Self {
        Self::new(Arc::new(ProbeResolver))
    }
}

/// Backstop around a port call that should already honour `bound`
async fn bounded<T, F>(interaction: &Interaction, bound: Duration, call: F) -> Result<T, ActionError>
where
    F: Future<Output = Result<T, ActionError>>,
{
    match timeout(bound + Duration::from_millis(TIMEOUT_GRACE_MS), call).await {
        Ok(result) => result,
        Err(_) => Err(ActionError::WaitTimeout(format!(
            "{} exceeded {}ms",
            interaction.describe(),
            bound.as_millis()
        ))),
    }
}

async fn select_first_valued(page: &dyn PagePort, selector: &str) -> Result<(), ActionError> {
    let options = page.options(selector).await?;
    debug!(selector, count = options.len(), "listing select options");
    let first = options
        .into_iter()
        .find(|opt| !opt.value.is_empty())
        .ok_or_else(|| ActionError::OptionNotFound(format!("no valued option in {}", selector)))?;
    page.select_option(selector, &SelectBy::Value(first.value))
        .await
}

/// Click the first visible and enabled match, skipping the rest
async fn click_first_actionable(
    page: &dyn PagePort,
    container: &str,
    target: &str,
) -> Result<(), ActionError> {
    let candidates = page.candidates(container, target).await?;
    for (index, probe) in candidates.iter().enumerate() {
        if !probe.is_actionable() {
            warn!(index, target, "candidate is not visible or not enabled");
            continue;
        }
        if page.click_nth(container, target, index).await? {
            debug!(index, target, "clicked actionable candidate");
            return Ok(());
        }
        warn!(index, target, "candidate vanished before click");
    }
    Err(ActionError::NotClickable(format!(
        "no visible and enabled {} inside {} ({} candidates)",
        target,
        container,
        candidates.len()
    )))
}

fn elapsed_ms(clock: Instant) -> u64 {
    clock.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Applicability, OutcomeKind};
    use action_primitives::{
        ElementProbe, PageCondition, ScriptedElement, ScriptedPage, SelectOptionInfo,
    };

    #[tokio::test]
    async fn inapplicable_step_never_touches_target() {
        let page = ScriptedPage::new("about:blank");
        let step = Step::optional("region", "Region", Applicability::Enabled("#region".into()))
            .then(Interaction::click("#region"));

        let outcome = StepExecutor::default().execute(&step, &page).await;

        assert_eq!(outcome.kind, OutcomeKind::NotApplicable);
        assert!(outcome.succeeded());
        assert_eq!(page.actions_on("#region"), 0);
    }

    #[tokio::test]
    async fn interactions_run_in_order() {
        let page = ScriptedPage::new("about:blank")
            .with_element("#email", ScriptedElement::visible())
            .with_element("#email_confirm", ScriptedElement::visible());
        let step = Step::best_effort("email", "Email")
            .then(Interaction::wait_visible("#email"))
            .then(Interaction::fill("#email", "test@gmail.com"))
            .then(Interaction::fill("#email_confirm", "test@gmail.com"));

        let outcome = StepExecutor::default().execute(&step, &page).await;

        assert_eq!(outcome.kind, OutcomeKind::Succeeded);
        assert_eq!(page.value_of("#email_confirm").as_deref(), Some("test@gmail.com"));
        let ops: Vec<_> = page.calls().into_iter().map(|c| c.op).collect();
        assert_eq!(ops, vec!["wait_for", "fill", "fill"]);
    }

    #[tokio::test]
    async fn failure_stops_remaining_interactions() {
        let page = ScriptedPage::new("about:blank")
            .with_element("#confirm", ScriptedElement::visible());
        let step = Step::best_effort("email", "Email")
            .then(Interaction::wait_visible("#email"))
            .then(Interaction::fill("#confirm", "x"));

        let outcome = StepExecutor::default().execute(&step, &page).await;

        assert_eq!(outcome.kind, OutcomeKind::Failed);
        assert!(outcome
            .error_message
            .as_deref()
            .unwrap_or_default()
            .contains("Wait timeout"));
        assert_eq!(page.actions_on("#confirm"), 0);
    }

    #[tokio::test]
    async fn disabled_button_fails_ensure_enabled() {
        let page = ScriptedPage::new("about:blank")
            .with_element("#delivery", ScriptedElement::disabled());
        let step = Step::best_effort("shipping", "Shipping")
            .then(Interaction::ensure_enabled("#delivery"))
            .then(Interaction::click("#delivery"));

        let outcome = StepExecutor::default().execute(&step, &page).await;

        assert_eq!(outcome.kind, OutcomeKind::Failed);
        assert_eq!(page.actions_on("#delivery"), 0);
    }

    #[tokio::test]
    async fn first_actionable_candidate_is_clicked() {
        let page = ScriptedPage::new("about:blank")
            .with_element("#modal", ScriptedElement::visible())
            .with_candidates(
                "#modal",
                "button#add",
                vec![
                    ElementProbe::hidden(),
                    ElementProbe::disabled(),
                    ElementProbe::actionable(),
                ],
            );
        let step = Step::critical("add", "Add")
            .then(Interaction::click_first_actionable("#modal", "button#add"));

        let outcome = StepExecutor::default().execute(&step, &page).await;

        assert_eq!(outcome.kind, OutcomeKind::Succeeded);
        assert_eq!(page.actions_on("button#add"), 1);
    }

    #[tokio::test]
    async fn no_actionable_candidate_fails() {
        let page = ScriptedPage::new("about:blank")
            .with_element("#modal", ScriptedElement::visible())
            .with_candidates("#modal", "button#add", vec![ElementProbe::disabled()]);
        let step = Step::critical("add", "Add")
            .then(Interaction::click_first_actionable("#modal", "button#add"));

        let outcome = StepExecutor::default().execute(&step, &page).await;

        assert_eq!(outcome.kind, OutcomeKind::Failed);
    }

    #[tokio::test]
    async fn select_first_valued_skips_placeholder() {
        let page = ScriptedPage::new("about:blank").with_element(
            "#county",
            ScriptedElement::visible().with_options(vec![
                SelectOptionInfo::new("", "Choose"),
                SelectOptionInfo::new("13101", "Santiago"),
                SelectOptionInfo::new("13102", "Cerrillos"),
            ]),
        );
        let step = Step::optional("county", "County", Applicability::Enabled("#county".into()))
            .then(Interaction::wait_until(PageCondition::OptionsLoaded {
                selector: "#county".into(),
                min_options: 1,
            }))
            .then(Interaction::select_first_valued("#county"));

        let outcome = StepExecutor::default().execute(&step, &page).await;

        assert_eq!(outcome.kind, OutcomeKind::Succeeded);
        assert_eq!(page.value_of("#county").as_deref(), Some("13101"));
    }

    #[tokio::test]
    async fn applicability_error_is_a_failure() {
        let page = ScriptedPage::new("about:blank").failing("#region");
        let step = Step::optional("region", "Region", Applicability::Enabled("#region".into()));

        let outcome = StepExecutor::default().execute(&step, &page).await;

        assert_eq!(outcome.kind, OutcomeKind::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_port_call_is_bounded() {
        struct SlowPage(ScriptedPage);

        #[async_trait::async_trait]
        impl PagePort for SlowPage {
            async fn goto(
                &self,
                url: &str,
                wait_until: action_primitives::WaitUntil,
                timeout: Duration,
            ) -> Result<(), ActionError> {
                self.0.goto(url, wait_until, timeout).await
            }
            async fn current_url(&self) -> Result<String, ActionError> {
                self.0.current_url().await
            }
            async fn wait_for(
                &self,
                _selector: &str,
                _state: action_primitives::WaitState,
                _timeout: Duration,
            ) -> Result<(), ActionError> {
                sleep(Duration::from_secs(3600)).await;
                Ok(())
            }
            async fn click(&self, selector: &str, timeout: Duration) -> Result<(), ActionError> {
                self.0.click(selector, timeout).await
            }
            async fn fill(&self, selector: &str, text: &str) -> Result<(), ActionError> {
                self.0.fill(selector, text).await
            }
            async fn select_option(
                &self,
                selector: &str,
                by: &SelectBy,
            ) -> Result<(), ActionError> {
                self.0.select_option(selector, by).await
            }
            async fn is_visible(&self, selector: &str) -> Result<bool, ActionError> {
                self.0.is_visible(selector).await
            }
            async fn is_enabled(&self, selector: &str) -> Result<bool, ActionError> {
                self.0.is_enabled(selector).await
            }
            async fn probe(&self, selector: &str) -> Result<ElementProbe, ActionError> {
                self.0.probe(selector).await
            }
            async fn options(&self, selector: &str) -> Result<Vec<SelectOptionInfo>, ActionError> {
                self.0.options(selector).await
            }
            async fn candidates(
                &self,
                container: &str,
                target: &str,
            ) -> Result<Vec<ElementProbe>, ActionError> {
                self.0.candidates(container, target).await
            }
            async fn click_nth(
                &self,
                container: &str,
                target: &str,
                index: usize,
            ) -> Result<bool, ActionError> {
                self.0.click_nth(container, target, index).await
            }
            async fn wait_until(
                &self,
                condition: &PageCondition,
                timeout: Duration,
            ) -> Result<(), ActionError> {
                self.0.wait_until(condition, timeout).await
            }
            async fn set_viewport(&self, width: u32, height: u32) -> Result<(), ActionError> {
                self.0.set_viewport(width, height).await
            }
            async fn close(&self) -> Result<(), ActionError> {
                self.0.close().await
            }
        }

        let page = SlowPage(ScriptedPage::new("about:blank"));
        let step = Step::critical("modal", "Modal")
            .with_timeout(50)
            .then(Interaction::wait_visible("#modal"));

        let outcome = StepExecutor::default().execute(&step, &page).await;

        assert_eq!(outcome.kind, OutcomeKind::Failed);
        assert!(outcome
            .error_message
            .as_deref()
            .unwrap_or_default()
            .contains("exceeded 50ms"));
    }
}
