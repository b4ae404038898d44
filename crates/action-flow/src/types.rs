//! Core types for flow orchestration

use action_primitives::{PageCondition, SelectBy, Viewport, WaitState, WaitUntil};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use storeprobe_core_types::RunId;

use crate::errors::FlowError;

/// Default bound for element waits
pub const DEFAULT_STEP_TIMEOUT_MS: u64 = 20_000;

/// Default bound for clicks
pub const DEFAULT_ACTION_TIMEOUT_MS: u64 = 5_000;

/// Flow definition - the fixed ordered list of steps for one business flow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowDefinition {
    /// Flow identifier, used as the `flow` tag on every check
    pub id: String,

    /// Flow name
    pub name: String,

    /// Flow description
    pub description: String,

    /// Steps in execution order
    pub steps: Vec<Step>,

    /// Viewport applied before the first step
    pub viewport: Viewport,

    /// Name of the terminal verdict check
    pub final_check: String,
}

impl FlowDefinition {
    /// Create a new flow
    pub fn new(id: impl Into<String>, name: impl Into<String>, steps: Vec<Step>) -> Self {
        let name = name.into();
        Self {
            id: id.into(),
            final_check: format!("{} completed", name),
            name,
            description: String::new(),
            steps,
            viewport: Viewport::default(),
        }
    }

    /// Set description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set viewport
    pub fn with_viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = viewport;
        self
    }

    /// Set the terminal check name
    pub fn with_final_check(mut self, name: impl Into<String>) -> Self {
        self.final_check = name.into();
        self
    }

    pub fn step(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|step| step.name == name)
    }

    /// Validate flow structure
    pub fn validate(&self) -> Result<(), FlowError> {
        if self.id.is_empty() {
            return Err(FlowError::ValidationFailed(
                "Flow ID cannot be empty".to_string(),
            ));
        }
        if self.steps.is_empty() {
            return Err(FlowError::InvalidStructure(
                "Flow must define at least one step".to_string(),
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for step in &self.steps {
            if step.name.is_empty() {
                return Err(FlowError::InvalidStructure(
                    "Step name cannot be empty".to_string(),
                ));
            }
            if !seen.insert(step.name.as_str()) {
                return Err(FlowError::InvalidStructure(format!(
                    "Step name {} is defined twice",
                    step.name
                )));
            }
            if step.timeout_ms == 0 || step.action_timeout_ms == 0 {
                return Err(FlowError::ValidationFailed(format!(
                    "Step {} timeouts must be greater than 0",
                    step.name
                )));
            }
            if step.critical && step.applicability.is_some() {
                return Err(FlowError::InvalidStructure(format!(
                    "Critical step {} cannot be skipped by an applicability check",
                    step.name
                )));
            }
        }
        Ok(())
    }
}

/// One discrete UI interaction unit with its criticality and timeouts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    /// Step identifier, used as the `step` tag
    pub name: String,

    /// Human readable check name
    pub check: String,

    /// Failure aborts the remaining flow
    pub critical: bool,

    /// Read-only predicate deciding whether the step applies
    pub applicability: Option<Applicability>,

    /// Interactions performed in order
    pub interactions: Vec<Interaction>,

    /// Bound for element waits and page conditions
    pub timeout_ms: u64,

    /// Bound for clicks
    pub action_timeout_ms: u64,

    /// Pause after a successful step
    pub settle_ms: u64,
}

impl Step {
    fn new(name: impl Into<String>, check: impl Into<String>, critical: bool) -> Self {
        Self {
            name: name.into(),
            check: check.into(),
            critical,
            applicability: None,
            interactions: Vec::new(),
            timeout_ms: DEFAULT_STEP_TIMEOUT_MS,
            action_timeout_ms: DEFAULT_ACTION_TIMEOUT_MS,
            settle_ms: 0,
        }
    }

    /// Step whose failure aborts the flow
    pub fn critical(name: impl Into<String>, check: impl Into<String>) -> Self {
        Self::new(name, check, true)
    }

    /// Step whose failure is reported but does not stop the flow
    pub fn best_effort(name: impl Into<String>, check: impl Into<String>) -> Self {
        Self::new(name, check, false)
    }

    /// Non-critical step that only runs when `applicability` holds
    pub fn optional(
        name: impl Into<String>,
        check: impl Into<String>,
        applicability: Applicability,
    ) -> Self {
        let mut step = Self::new(name, check, false);
        step.applicability = Some(applicability);
        step
    }

    pub fn then(mut self, interaction: Interaction) -> Self {
        self.interactions.push(interaction);
        self
    }

    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_action_timeout(mut self, timeout_ms: u64) -> Self {
        self.action_timeout_ms = timeout_ms;
        self
    }

    pub fn with_settle(mut self, settle_ms: u64) -> Self {
        self.settle_ms = settle_ms;
        self
    }
}

/// Predicate evaluated against current page state before an optional step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Applicability {
    /// Element exists and is not disabled
    Enabled(String),

    /// Element exists and has render dimensions
    Rendered(String),

    /// Element exists, is enabled and rendered
    Actionable(String),
}

impl Applicability {
    pub fn selector(&self) -> &str {
        match self {
            Applicability::Enabled(selector)
            | Applicability::Rendered(selector)
            | Applicability::Actionable(selector) => selector,
        }
    }
}

/// Interaction performed by a step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interaction {
    /// Navigate to URL
    Goto {
        url: String,
        wait_until: WaitUntil,
        timeout_ms: Option<u64>,
    },

    /// Wait for element state
    WaitFor {
        selector: String,
        state: WaitState,
        timeout_ms: Option<u64>,
    },

    /// Click element
    Click { selector: String },

    /// Fill input
    Fill { selector: String, text: String },

    /// Select option
    SelectOption { selector: String, by: SelectBy },

    /// Select the first option carrying a non-empty value
    SelectFirstValued { selector: String },

    /// Fail unless the element is enabled
    EnsureEnabled { selector: String },

    /// Poll a page condition
    WaitUntil {
        condition: PageCondition,
        timeout_ms: Option<u64>,
    },

    /// Click the first visible and enabled `target` inside `container`
    ClickFirstActionable { container: String, target: String },
}

impl Interaction {
    pub fn goto(url: impl Into<String>, wait_until: WaitUntil, timeout_ms: u64) -> Self {
        Interaction::Goto {
            url: url.into(),
            wait_until,
            timeout_ms: Some(timeout_ms),
        }
    }

    pub fn wait_visible(selector: impl Into<String>) -> Self {
        Interaction::WaitFor {
            selector: selector.into(),
            state: WaitState::Visible,
            timeout_ms: None,
        }
    }

    pub fn wait_attached(selector: impl Into<String>) -> Self {
        Interaction::WaitFor {
            selector: selector.into(),
            state: WaitState::Attached,
            timeout_ms: None,
        }
    }

    pub fn wait_visible_within(selector: impl Into<String>, timeout_ms: u64) -> Self {
        Interaction::WaitFor {
            selector: selector.into(),
            state: WaitState::Visible,
            timeout_ms: Some(timeout_ms),
        }
    }

    pub fn click(selector: impl Into<String>) -> Self {
        Interaction::Click {
            selector: selector.into(),
        }
    }

    pub fn fill(selector: impl Into<String>, text: impl Into<String>) -> Self {
        Interaction::Fill {
            selector: selector.into(),
            text: text.into(),
        }
    }

    pub fn select(selector: impl Into<String>, by: SelectBy) -> Self {
        Interaction::SelectOption {
            selector: selector.into(),
            by,
        }
    }

    pub fn select_first_valued(selector: impl Into<String>) -> Self {
        Interaction::SelectFirstValued {
            selector: selector.into(),
        }
    }

    pub fn ensure_enabled(selector: impl Into<String>) -> Self {
        Interaction::EnsureEnabled {
            selector: selector.into(),
        }
    }

    pub fn wait_until(condition: PageCondition) -> Self {
        Interaction::WaitUntil {
            condition,
            timeout_ms: None,
        }
    }

    pub fn wait_until_within(condition: PageCondition, timeout_ms: u64) -> Self {
        Interaction::WaitUntil {
            condition,
            timeout_ms: Some(timeout_ms),
        }
    }

    pub fn click_first_actionable(container: impl Into<String>, target: impl Into<String>) -> Self {
        Interaction::ClickFirstActionable {
            container: container.into(),
            target: target.into(),
        }
    }

    /// Element (or URL, for `Goto`) the interaction acts on
    pub fn selector(&self) -> Option<&str> {
        match self {
            Interaction::Goto { url, .. } => Some(url),
            Interaction::WaitFor { selector, .. }
            | Interaction::Click { selector }
            | Interaction::Fill { selector, .. }
            | Interaction::SelectOption { selector, .. }
            | Interaction::SelectFirstValued { selector }
            | Interaction::EnsureEnabled { selector } => Some(selector),
            Interaction::WaitUntil { condition, .. } => match condition {
                PageCondition::UrlContains(_) | PageCondition::UrlIs(_) => None,
                PageCondition::HasValue { selector }
                | PageCondition::OptionsLoaded { selector, .. } => Some(selector),
            },
            Interaction::ClickFirstActionable { target, .. } => Some(target),
        }
    }

    /// Short label used in logs and error messages
    pub fn describe(&self) -> String {
        match self {
            Interaction::Goto { url, .. } => format!("goto {}", url),
            Interaction::WaitFor {
                selector, state, ..
            } => format!("wait for {} {}", selector, state),
            Interaction::Click { selector } => format!("click {}", selector),
            Interaction::Fill { selector, .. } => format!("fill {}", selector),
            Interaction::SelectOption { selector, by } => format!("select {} in {}", by, selector),
            Interaction::SelectFirstValued { selector } => {
                format!("select first valued option in {}", selector)
            }
            Interaction::EnsureEnabled { selector } => format!("ensure {} enabled", selector),
            Interaction::WaitUntil { condition, .. } => format!("wait until {}", condition),
            Interaction::ClickFirstActionable { container, target } => {
                format!("click first actionable {} in {}", target, container)
            }
        }
    }
}

/// Three-way step outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Succeeded,
    Failed,
    NotApplicable,
}

/// Recorded result of attempting (or skipping) a step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub step_name: String,
    pub critical: bool,
    pub kind: OutcomeKind,
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub latency_ms: u64,
}

impl StepOutcome {
    pub fn succeeded_step(step: &Step, started_at: DateTime<Utc>, latency_ms: u64) -> Self {
        Self::build(step, OutcomeKind::Succeeded, None, started_at, latency_ms)
    }

    pub fn failed_step(
        step: &Step,
        error: impl Into<String>,
        started_at: DateTime<Utc>,
        latency_ms: u64,
    ) -> Self {
        Self::build(
            step,
            OutcomeKind::Failed,
            Some(error.into()),
            started_at,
            latency_ms,
        )
    }

    pub fn not_applicable(step: &Step, started_at: DateTime<Utc>, latency_ms: u64) -> Self {
        Self::build(step, OutcomeKind::NotApplicable, None, started_at, latency_ms)
    }

    fn build(
        step: &Step,
        kind: OutcomeKind,
        error_message: Option<String>,
        started_at: DateTime<Utc>,
        latency_ms: u64,
    ) -> Self {
        Self {
            step_name: step.name.clone(),
            critical: step.critical,
            kind,
            error_message,
            started_at,
            latency_ms,
        }
    }

    /// True for executed-and-passed and for skipped-as-not-applicable
    pub fn succeeded(&self) -> bool {
        matches!(self.kind, OutcomeKind::Succeeded | OutcomeKind::NotApplicable)
    }

    pub fn skipped_as_not_applicable(&self) -> bool {
        self.kind == OutcomeKind::NotApplicable
    }
}

/// Sequencer state machine phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowPhase {
    NotStarted,
    Running,
    Aborted,
    Completed,
}

/// Mutable run state owned by the sequencer for one run
#[derive(Debug, Clone)]
pub struct FlowState {
    pub phase: FlowPhase,
    pub outcomes: Vec<StepOutcome>,
    pub aborted: bool,
    pub aborted_at: Option<String>,
    pub final_verdict: bool,
}

impl FlowState {
    pub fn new() -> Self {
        Self {
            phase: FlowPhase::NotStarted,
            outcomes: Vec::new(),
            aborted: false,
            aborted_at: None,
            final_verdict: false,
        }
    }

    pub fn start(&mut self) {
        self.phase = FlowPhase::Running;
    }

    /// Append an outcome; each step may be recorded once
    pub fn push(&mut self, outcome: StepOutcome) -> Result<&StepOutcome, FlowError> {
        if self.outcome(&outcome.step_name).is_some() {
            return Err(FlowError::DuplicateOutcome(outcome.step_name));
        }
        self.outcomes.push(outcome);
        self.outcomes
            .last()
            .ok_or_else(|| FlowError::Internal("outcome vanished after push".to_string()))
    }

    pub fn outcome(&self, step_name: &str) -> Option<&StepOutcome> {
        self.outcomes.iter().find(|o| o.step_name == step_name)
    }

    pub fn abort(&mut self, step_name: &str) {
        self.phase = FlowPhase::Aborted;
        self.aborted = true;
        self.aborted_at = Some(step_name.to_string());
    }

    /// Move to `Completed` and compute the verdict
    pub fn finish(&mut self, steps: &[Step], fatal: bool) -> bool {
        self.phase = FlowPhase::Completed;
        self.final_verdict = !fatal && final_verdict(steps, &self.outcomes);
        self.final_verdict
    }
}

impl Default for FlowState {
    fn default() -> Self {
        Self::new()
    }
}

/// Aggregate verdict as a pure function of the recorded outcomes
///
/// Critical steps need a succeeded outcome; optional steps need a succeeded
/// or not-applicable one. A step without an outcome fails the verdict.
pub fn final_verdict(steps: &[Step], outcomes: &[StepOutcome]) -> bool {
    steps.iter().all(|step| {
        let Some(outcome) = outcomes.iter().find(|o| o.step_name == step.name) else {
            return false;
        };
        if step.critical {
            outcome.kind == OutcomeKind::Succeeded
        } else {
            outcome.succeeded()
        }
    })
}

/// Snapshot of a finished run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowReport {
    pub run_id: RunId,
    pub flow_id: String,
    pub outcomes: Vec<StepOutcome>,
    pub aborted: bool,
    pub aborted_at: Option<String>,
    pub fatal_error: Option<String>,
    pub final_verdict: bool,
    pub cleanup_ok: bool,
    /// Largest Contentful Paint read before release, when the page reported one
    #[serde(default)]
    pub lcp_ms: Option<u64>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub latency_ms: u64,
}

impl FlowReport {
    pub fn outcome(&self, step_name: &str) -> Option<&StepOutcome> {
        self.outcomes.iter().find(|o| o.step_name == step_name)
    }

    pub fn failed_steps(&self) -> impl Iterator<Item = &StepOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.kind == OutcomeKind::Failed)
    }

    pub fn skipped_steps(&self) -> impl Iterator<Item = &StepOutcome> {
        self.outcomes.iter().filter(|o| o.skipped_as_not_applicable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flow(steps: Vec<Step>) -> FlowDefinition {
        FlowDefinition::new("guest", "Guest", steps)
    }

    #[test]
    fn test_flow_validation_empty_id() {
        let flow = FlowDefinition::new("", "test", vec![Step::critical("a", "A")]);
        assert!(flow.validate().is_err());
    }

    #[test]
    fn test_flow_validation_empty_steps() {
        assert!(matches!(
            flow(vec![]).validate(),
            Err(FlowError::InvalidStructure(_))
        ));
    }

    #[test]
    fn test_flow_validation_duplicate_step() {
        let result = flow(vec![Step::critical("a", "A"), Step::best_effort("a", "A again")])
            .validate();
        assert!(matches!(result, Err(FlowError::InvalidStructure(_))));
    }

    #[test]
    fn test_flow_validation_zero_timeout() {
        let result = flow(vec![Step::critical("a", "A").with_timeout(0)]).validate();
        assert!(matches!(result, Err(FlowError::ValidationFailed(_))));
    }

    #[test]
    fn test_flow_validation_critical_with_applicability() {
        let mut step = Step::critical("a", "A");
        step.applicability = Some(Applicability::Enabled("#a".into()));
        assert!(flow(vec![step]).validate().is_err());
    }

    #[test]
    fn test_state_rejects_duplicate_outcome() {
        let step = Step::critical("a", "A");
        let mut state = FlowState::new();
        state
            .push(StepOutcome::succeeded_step(&step, Utc::now(), 1))
            .unwrap();
        let second = state.push(StepOutcome::failed_step(&step, "again", Utc::now(), 1));
        assert_eq!(second, Err(FlowError::DuplicateOutcome("a".into())));
        assert_eq!(state.outcomes.len(), 1);
    }

    #[test]
    fn test_missing_outcome_fails_verdict() {
        let steps = vec![Step::critical("a", "A"), Step::best_effort("b", "B")];
        let outcomes = vec![StepOutcome::succeeded_step(&steps[0], Utc::now(), 1)];
        assert!(!final_verdict(&steps, &outcomes));
    }

    #[test]
    fn test_fatal_overrides_verdict() {
        let steps = vec![Step::critical("a", "A")];
        let mut state = FlowState::new();
        state
            .push(StepOutcome::succeeded_step(&steps[0], Utc::now(), 1))
            .unwrap();
        assert!(!state.finish(&steps, true));
        assert_eq!(state.phase, FlowPhase::Completed);
    }

    #[test]
    fn test_outcome_flags() {
        let step = Step::optional("region", "Region", Applicability::Enabled("#r".into()));
        let skipped = StepOutcome::not_applicable(&step, Utc::now(), 0);
        assert!(skipped.succeeded());
        assert!(skipped.skipped_as_not_applicable());

        let failed = StepOutcome::failed_step(&step, "boom", Utc::now(), 0);
        assert!(!failed.succeeded());
        assert_eq!(failed.error_message.as_deref(), Some("boom"));
    }
}
