//! Outcome recording
//!
//! Every step outcome becomes exactly one named pass/fail check tagged with
//! `{flow, step}`; the run ends with one terminal verdict check tagged
//! `{flow, final_step: final_state}`.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::types::{FlowDefinition, Step, StepOutcome};

pub const TAG_FLOW: &str = "flow";
pub const TAG_STEP: &str = "step";
pub const TAG_FINAL_STEP: &str = "final_step";
pub const FINAL_STEP_VALUE: &str = "final_state";

/// Named pass/fail assertion with tags
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Check {
    pub name: String,
    pub passed: bool,
    pub tags: BTreeMap<String, String>,
    pub latency_ms: Option<u64>,
}

impl Check {
    pub fn new(name: impl Into<String>, passed: bool) -> Self {
        Self {
            name: name.into(),
            passed,
            tags: BTreeMap::new(),
            latency_ms: None,
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = Some(latency_ms);
        self
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    pub fn is_verdict(&self) -> bool {
        self.tag(TAG_FINAL_STEP) == Some(FINAL_STEP_VALUE)
    }
}

/// Sink for checks
pub trait OutcomeRecorder: Send + Sync {
    fn record(&self, check: Check);
}

impl<T: OutcomeRecorder + ?Sized> OutcomeRecorder for Arc<T> {
    fn record(&self, check: Check) {
        (**self).record(check)
    }
}

/// Emit the check for one step outcome
pub fn record_outcome(
    recorder: &dyn OutcomeRecorder,
    flow_id: &str,
    step: &Step,
    outcome: &StepOutcome,
) {
    let check = Check::new(step.check.clone(), outcome.succeeded())
        .with_tag(TAG_FLOW, flow_id)
        .with_tag(TAG_STEP, step.name.clone())
        .with_latency(outcome.latency_ms);
    recorder.record(check);
}

/// Emit the terminal verdict check
pub fn record_verdict(recorder: &dyn OutcomeRecorder, flow: &FlowDefinition, verdict: bool) {
    let check = Check::new(flow.final_check.clone(), verdict)
        .with_tag(TAG_FLOW, flow.id.clone())
        .with_tag(TAG_FINAL_STEP, FINAL_STEP_VALUE);
    recorder.record(check);
}

/// Keeps every check in memory
#[derive(Debug, Default)]
pub struct InMemoryRecorder {
    checks: Mutex<Vec<Check>>,
}

impl InMemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn checks(&self) -> Vec<Check> {
        self.checks.lock().clone()
    }

    pub fn passed(&self) -> usize {
        self.checks.lock().iter().filter(|c| c.passed).count()
    }

    pub fn failed(&self) -> usize {
        self.checks.lock().iter().filter(|c| !c.passed).count()
    }

    /// Checks carrying `step = step_name`
    pub fn for_step(&self, step_name: &str) -> Vec<Check> {
        self.checks
            .lock()
            .iter()
            .filter(|c| c.tag(TAG_STEP) == Some(step_name))
            .cloned()
            .collect()
    }

    pub fn verdicts(&self) -> Vec<Check> {
        self.checks
            .lock()
            .iter()
            .filter(|c| c.is_verdict())
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.checks.lock().clear();
    }
}

impl OutcomeRecorder for InMemoryRecorder {
    fn record(&self, check: Check) {
        self.checks.lock().push(check);
    }
}

/// Writes each check as a structured log event
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingRecorder;

impl OutcomeRecorder for TracingRecorder {
    fn record(&self, check: Check) {
        let flow = check.tag(TAG_FLOW).unwrap_or_default();
        let step = check
            .tag(TAG_STEP)
            .or_else(|| check.tag(TAG_FINAL_STEP))
            .unwrap_or_default();
        if check.passed {
            info!(check = %check.name, flow, step, latency_ms = check.latency_ms, "check passed");
        } else {
            warn!(check = %check.name, flow, step, latency_ms = check.latency_ms, "check failed");
        }
    }
}

/// Forwards each check to every inner recorder
#[derive(Default)]
pub struct FanoutRecorder {
    sinks: Vec<Arc<dyn OutcomeRecorder>>,
}

impl FanoutRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn OutcomeRecorder>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl OutcomeRecorder for FanoutRecorder {
    fn record(&self, check: Check) {
        for sink in &self.sinks {
            sink.record(check.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Applicability;
    use chrono::Utc;

    #[test]
    fn outcome_check_carries_flow_and_step_tags() {
        let recorder = InMemoryRecorder::new();
        let step = Step::critical("home", "Home loads");
        let outcome = StepOutcome::succeeded_step(&step, Utc::now(), 42);

        record_outcome(&recorder, "guest", &step, &outcome);

        let checks = recorder.for_step("home");
        assert_eq!(checks.len(), 1);
        assert_eq!(checks[0].name, "Home loads");
        assert!(checks[0].passed);
        assert_eq!(checks[0].tag(TAG_FLOW), Some("guest"));
        assert_eq!(checks[0].latency_ms, Some(42));
    }

    #[test]
    fn not_applicable_is_recorded_as_passed() {
        let recorder = InMemoryRecorder::new();
        let step = Step::optional("region", "Region", Applicability::Enabled("#r".into()));
        let outcome = StepOutcome::not_applicable(&step, Utc::now(), 0);

        record_outcome(&recorder, "guest", &step, &outcome);

        assert_eq!(recorder.passed(), 1);
        assert_eq!(recorder.failed(), 0);
    }

    #[test]
    fn verdict_check_uses_final_state_tag() {
        let recorder = InMemoryRecorder::new();
        let flow = FlowDefinition::new("guest", "Guest checkout", vec![Step::critical("a", "A")]);

        record_verdict(&recorder, &flow, false);

        let verdicts = recorder.verdicts();
        assert_eq!(verdicts.len(), 1);
        assert_eq!(verdicts[0].name, "Guest checkout completed");
        assert!(!verdicts[0].passed);
        assert_eq!(verdicts[0].tag(TAG_STEP), None);
    }

    #[test]
    fn fanout_reaches_every_sink() {
        let first = Arc::new(InMemoryRecorder::new());
        let second = Arc::new(InMemoryRecorder::new());
        let fanout = FanoutRecorder::new()
            .with(first.clone())
            .with(second.clone())
            .with(Arc::new(TracingRecorder));

        fanout.record(Check::new("x", true));

        assert_eq!(first.checks().len(), 1);
        assert_eq!(second.checks().len(), 1);
    }
}
