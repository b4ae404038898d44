//! Flow sequencer
//!
//! Drives one run of a flow definition: acquire a page, apply the viewport,
//! execute steps in order, stop on a critical failure, release the page and
//! record the terminal verdict.

use action_primitives::{BrowserPort, PagePort};
use chrono::Utc;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use storeprobe_core_types::RunId;
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};

use crate::errors::FlowError;
use crate::executor::StepExecutor;
use crate::recorder::{record_outcome, record_verdict, OutcomeRecorder};
use crate::strategies::{DefaultFailureHandler, FailureHandler, FailureHandlerResult};
use crate::types::{FlowDefinition, FlowReport, FlowState};

/// Bound on releasing the page
const CLOSE_TIMEOUT_MS: u64 = 5_000;

/// Bound on reading the paint metric before release
const LCP_TIMEOUT_MS: u64 = 2_000;

pub struct FlowSequencer {
    flow: FlowDefinition,
    executor: StepExecutor,
    recorder: Arc<dyn OutcomeRecorder>,
    failure_handler: Arc<dyn FailureHandler>,
}

impl FlowSequencer {
    /// Validate `flow` and build a sequencer reporting to `recorder`
    pub fn new(
        flow: FlowDefinition,
        recorder: Arc<dyn OutcomeRecorder>,
    ) -> Result<Self, FlowError> {
        flow.validate()?;
        Ok(Self {
            flow,
            executor: StepExecutor::default(),
            recorder,
            failure_handler: Arc::new(DefaultFailureHandler::new()),
        })
    }

    pub fn with_executor(mut self, executor: StepExecutor) -> Self {
        self.executor = executor;
        self
    }

    pub fn with_failure_handler(mut self, handler: Arc<dyn FailureHandler>) -> Self {
        self.failure_handler = handler;
        self
    }

    pub fn flow(&self) -> &FlowDefinition {
        &self.flow
    }

    /// Execute one complete run; never returns early without cleanup
    #[instrument(skip_all, fields(flow = %self.flow.id))]
    pub async fn run(&self, browser: &dyn BrowserPort) -> FlowReport {
        let run_id = RunId::new();
        let started_at = Utc::now();
        let clock = Instant::now();
        let mut state = FlowState::new();
        let mut fatal: Option<FlowError> = None;
        let mut cleanup_ok = false;
        let mut lcp_ms = None;

        info!(%run_id, steps = self.flow.steps.len(), "flow run starting");

        match browser.new_page().await {
            Err(err) => {
                fatal = Some(FlowError::Setup(format!("page acquisition failed: {}", err)));
            }
            Ok(page) => {
                state.start();
                let driven = AssertUnwindSafe(self.drive(page.as_ref(), &mut state))
                    .catch_unwind()
                    .await;
                match driven {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => fatal = Some(err),
                    Err(payload) => {
                        fatal = Some(FlowError::Panicked(panic_message(payload.as_ref())))
                    }
                }
                lcp_ms = read_lcp(page.as_ref()).await;
                cleanup_ok = release(page.as_ref()).await;
            }
        }

        if let Some(err) = &fatal {
            error!(%run_id, error = %err, outcomes = state.outcomes.len(), "flow run hit a fatal error");
        }

        let verdict = state.finish(&self.flow.steps, fatal.is_some());
        // a panicking recorder must not lose the report
        let recorded = std::panic::catch_unwind(AssertUnwindSafe(|| {
            record_verdict(self.recorder.as_ref(), &self.flow, verdict)
        }));
        if let Err(payload) = recorded {
            warn!(%run_id, panic = %panic_message(payload.as_ref()), "verdict recording panicked");
        }

        let report = FlowReport {
            run_id,
            flow_id: self.flow.id.clone(),
            outcomes: state.outcomes,
            aborted: state.aborted,
            aborted_at: state.aborted_at,
            fatal_error: fatal.map(|err| err.to_string()),
            final_verdict: verdict,
            cleanup_ok,
            lcp_ms,
            started_at,
            finished_at: Utc::now(),
            latency_ms: clock.elapsed().as_millis() as u64,
        };

        info!(
            run_id = %report.run_id,
            verdict,
            aborted = report.aborted,
            cleanup_ok,
            latency_ms = report.latency_ms,
            "flow run finished"
        );
        report
    }

    async fn drive(&self, page: &dyn PagePort, state: &mut FlowState) -> Result<(), FlowError> {
        let viewport = &self.flow.viewport;
        page.set_viewport(viewport.width, viewport.height)
            .await
            .map_err(|err| FlowError::Setup(format!("viewport setup failed: {}", err)))?;

        for step in &self.flow.steps {
            let outcome = self.executor.execute(step, page).await;
            let outcome = state.push(outcome)?;
            record_outcome(self.recorder.as_ref(), &self.flow.id, step, outcome);

            let decision = self.failure_handler.handle_outcome(step, outcome);
            if decision == FailureHandlerResult::Abort {
                state.abort(&step.name);
                break;
            }
        }
        Ok(())
    }
}

/// Best-effort paint metric; errors and stalls leave it unset
async fn read_lcp(page: &dyn PagePort) -> Option<u64> {
    let bound = Duration::from_millis(LCP_TIMEOUT_MS);
    match timeout(bound, AssertUnwindSafe(page.largest_contentful_paint()).catch_unwind()).await {
        Ok(Ok(Ok(lcp_ms))) => lcp_ms,
        Ok(Ok(Err(err))) => {
            debug!(error = %err, "largest contentful paint unavailable");
            None
        }
        Ok(Err(payload)) => {
            warn!(panic = %panic_message(payload.as_ref()), "paint metric read panicked");
            None
        }
        Err(_) => {
            debug!(bound_ms = LCP_TIMEOUT_MS, "paint metric read timed out");
            None
        }
    }
}

/// Close the page once; failures are logged, never propagated
async fn release(page: &dyn PagePort) -> bool {
    let bound = Duration::from_millis(CLOSE_TIMEOUT_MS);
    match timeout(bound, AssertUnwindSafe(page.close()).catch_unwind()).await {
        Ok(Ok(Ok(()))) => {
            debug!("page released");
            true
        }
        Ok(Ok(Err(err))) => {
            warn!(error = %err, "page release failed");
            false
        }
        Ok(Err(payload)) => {
            warn!(panic = %panic_message(payload.as_ref()), "page release panicked");
            false
        }
        Err(_) => {
            warn!(bound_ms = CLOSE_TIMEOUT_MS, "page release timed out");
            false
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::InMemoryRecorder;
    use crate::types::{Applicability, Interaction, OutcomeKind, Step};
    use action_primitives::{ScriptedBrowser, ScriptedElement, ScriptedPage};

    fn flow() -> FlowDefinition {
        FlowDefinition::new(
            "mini",
            "Mini flow",
            vec![
                Step::critical("open", "Open").then(Interaction::click("#open")),
                Step::best_effort("note", "Note").then(Interaction::fill("#note", "hi")),
                Step::optional("extra", "Extra", Applicability::Enabled("#extra".into()))
                    .then(Interaction::click("#extra")),
            ],
        )
    }

    fn sequencer(recorder: Arc<InMemoryRecorder>) -> FlowSequencer {
        FlowSequencer::new(flow(), recorder).unwrap()
    }

    #[tokio::test]
    async fn happy_run_completes_and_releases_once() {
        let page = Arc::new(
            ScriptedPage::new("about:blank")
                .with_element("#open", ScriptedElement::visible())
                .with_element("#note", ScriptedElement::visible()),
        );
        let browser = ScriptedBrowser::new(page.clone());
        let recorder = Arc::new(InMemoryRecorder::new());

        let report = sequencer(recorder.clone()).run(&browser).await;

        assert!(report.final_verdict);
        assert!(!report.aborted);
        assert!(report.cleanup_ok);
        assert_eq!(page.close_count(), 1);
        assert_eq!(page.viewport(), Some((1280, 720)));
        assert_eq!(report.outcome("extra").unwrap().kind, OutcomeKind::NotApplicable);
        assert_eq!(recorder.checks().len(), 4);
        assert_eq!(recorder.verdicts().len(), 1);
    }

    #[tokio::test]
    async fn critical_failure_aborts_before_later_steps() {
        let page = Arc::new(
            ScriptedPage::new("about:blank").with_element("#note", ScriptedElement::visible()),
        );
        let browser = ScriptedBrowser::new(page.clone());
        let recorder = Arc::new(InMemoryRecorder::new());

        let report = sequencer(recorder.clone()).run(&browser).await;

        assert!(report.aborted);
        assert_eq!(report.aborted_at.as_deref(), Some("open"));
        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(page.actions_on("#note"), 0);
        assert!(!report.final_verdict);
        assert_eq!(page.close_count(), 1);
        assert!(recorder.for_step("note").is_empty());
    }

    #[tokio::test]
    async fn unavailable_browser_is_fatal_without_cleanup() {
        let browser = ScriptedBrowser::unavailable();
        let recorder = Arc::new(InMemoryRecorder::new());

        let report = sequencer(recorder.clone()).run(&browser).await;

        assert!(report.fatal_error.is_some());
        assert!(!report.final_verdict);
        assert!(!report.cleanup_ok);
        assert_eq!(recorder.verdicts().len(), 1);
    }

    #[tokio::test]
    async fn viewport_failure_is_fatal_and_still_releases() {
        let page = Arc::new(ScriptedPage::new("about:blank").failing_viewport());
        let browser = ScriptedBrowser::new(page.clone());

        let report = sequencer(Arc::new(InMemoryRecorder::new()))
            .run(&browser)
            .await;

        assert!(report
            .fatal_error
            .as_deref()
            .unwrap_or_default()
            .contains("viewport"));
        assert!(report.outcomes.is_empty());
        assert_eq!(page.close_count(), 1);
    }

    #[tokio::test]
    async fn panic_inside_step_is_fatal_and_still_releases() {
        let page = Arc::new(ScriptedPage::new("about:blank").panicking("#open"));
        let browser = ScriptedBrowser::new(page.clone());
        let recorder = Arc::new(InMemoryRecorder::new());

        let report = sequencer(recorder.clone()).run(&browser).await;

        assert!(report
            .fatal_error
            .as_deref()
            .unwrap_or_default()
            .contains("panicked"));
        assert!(!report.final_verdict);
        assert_eq!(page.close_count(), 1);
        assert_eq!(recorder.verdicts().len(), 1);
    }

    #[tokio::test]
    async fn close_error_does_not_change_verdict() {
        let page = Arc::new(
            ScriptedPage::new("about:blank")
                .with_element("#open", ScriptedElement::visible())
                .with_element("#note", ScriptedElement::visible())
                .failing_close(),
        );
        let browser = ScriptedBrowser::new(page.clone());

        let report = sequencer(Arc::new(InMemoryRecorder::new()))
            .run(&browser)
            .await;

        assert!(report.final_verdict);
        assert!(!report.cleanup_ok);
        assert_eq!(page.close_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_close_is_bounded() {
        let page = Arc::new(
            ScriptedPage::new("about:blank")
                .with_element("#open", ScriptedElement::visible())
                .with_element("#note", ScriptedElement::visible())
                .hanging_close(),
        );
        let browser = ScriptedBrowser::new(page.clone());

        let report = sequencer(Arc::new(InMemoryRecorder::new()))
            .run(&browser)
            .await;

        assert!(report.final_verdict);
        assert!(!report.cleanup_ok);
        assert_eq!(page.close_count(), 1);
    }

    #[tokio::test]
    async fn panicking_recorder_still_yields_a_report() {
        struct Exploding;

        impl OutcomeRecorder for Exploding {
            fn record(&self, check: crate::recorder::Check) {
                if check.is_verdict() {
                    panic!("sink unavailable");
                }
            }
        }

        let page = Arc::new(
            ScriptedPage::new("about:blank")
                .with_element("#open", ScriptedElement::visible())
                .with_element("#note", ScriptedElement::visible()),
        );
        let browser = ScriptedBrowser::new(page.clone());

        let report = FlowSequencer::new(flow(), Arc::new(Exploding))
            .unwrap()
            .run(&browser)
            .await;

        assert!(report.final_verdict);
        assert!(report.cleanup_ok);
        assert_eq!(page.close_count(), 1);
    }

    #[tokio::test]
    async fn lcp_is_read_before_release() {
        let page = Arc::new(
            ScriptedPage::new("about:blank")
                .with_element("#open", ScriptedElement::visible())
                .with_lcp(2_400),
        );
        let browser = ScriptedBrowser::new(page.clone());

        let report = sequencer(Arc::new(InMemoryRecorder::new()))
            .run(&browser)
            .await;

        assert_eq!(report.lcp_ms, Some(2_400));
        assert!(report.cleanup_ok);
    }

    #[tokio::test]
    async fn missing_lcp_leaves_report_unset() {
        let browser = ScriptedBrowser::new(Arc::new(
            ScriptedPage::new("about:blank").with_element("#open", ScriptedElement::visible()),
        ));

        let report = sequencer(Arc::new(InMemoryRecorder::new()))
            .run(&browser)
            .await;

        assert_eq!(report.lcp_ms, None);
    }

    #[test]
    fn invalid_flow_is_rejected() {
        let flow = FlowDefinition::new("mini", "Mini", vec![]);
        assert!(FlowSequencer::new(flow, Arc::new(InMemoryRecorder::new())).is_err());
    }
}
