//! Failure handling strategies

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::types::{OutcomeKind, Step, StepOutcome};

/// How a failed step affects the rest of the flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureStrategy {
    /// Abort entire flow on failure
    Abort,

    /// Continue with next step
    Continue,
}

impl FailureStrategy {
    pub fn for_step(step: &Step) -> Self {
        if step.critical {
            FailureStrategy::Abort
        } else {
            FailureStrategy::Continue
        }
    }
}

/// Decision taken after a step outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureHandlerResult {
    /// Run the next step
    Proceed,

    /// Stop the flow; no later step executes
    Abort,
}

/// Failure handler trait
pub trait FailureHandler: Send + Sync {
    /// Decide whether the flow continues after `outcome`
    fn handle_outcome(&self, step: &Step, outcome: &StepOutcome) -> FailureHandlerResult;
}

/// Aborts on critical failures, continues past everything else
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultFailureHandler;

impl DefaultFailureHandler {
    pub fn new() -> Self {
        Self
    }
}

impl FailureHandler for DefaultFailureHandler {
    fn handle_outcome(&self, step: &Step, outcome: &StepOutcome) -> FailureHandlerResult {
        if outcome.kind != OutcomeKind::Failed {
            return FailureHandlerResult::Proceed;
        }
        let reason = outcome.error_message.as_deref().unwrap_or("unknown error");
        match FailureStrategy::for_step(step) {
            FailureStrategy::Abort => {
                warn!(step = %step.name, %reason, "critical step failed, aborting flow");
                FailureHandlerResult::Abort
            }
            FailureStrategy::Continue => {
                info!(step = %step.name, %reason, "step failed, continuing to next step");
                FailureHandlerResult::Proceed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Applicability;
    use chrono::Utc;

    #[test]
    fn test_strategy_follows_criticality() {
        assert_eq!(
            FailureStrategy::for_step(&Step::critical("a", "A")),
            FailureStrategy::Abort
        );
        assert_eq!(
            FailureStrategy::for_step(&Step::best_effort("b", "B")),
            FailureStrategy::Continue
        );
    }

    #[test]
    fn test_handle_failure_abort() {
        let step = Step::critical("add_to_cart", "Add to cart");
        let outcome = StepOutcome::failed_step(&step, "timeout", Utc::now(), 5);
        assert_eq!(
            DefaultFailureHandler::new().handle_outcome(&step, &outcome),
            FailureHandlerResult::Abort
        );
    }

    #[test]
    fn test_handle_failure_continue() {
        let step = Step::best_effort("go_to_cart", "Go to cart");
        let outcome = StepOutcome::failed_step(&step, "not found", Utc::now(), 5);
        assert_eq!(
            DefaultFailureHandler::new().handle_outcome(&step, &outcome),
            FailureHandlerResult::Proceed
        );
    }

    #[test]
    fn test_success_and_skip_proceed() {
        let critical = Step::critical("home", "Home");
        let optional = Step::optional("region", "Region", Applicability::Enabled("#r".into()));
        let handler = DefaultFailureHandler::new();
        assert_eq!(
            handler.handle_outcome(
                &critical,
                &StepOutcome::succeeded_step(&critical, Utc::now(), 1)
            ),
            FailureHandlerResult::Proceed
        );
        assert_eq!(
            handler.handle_outcome(
                &optional,
                &StepOutcome::not_applicable(&optional, Utc::now(), 0)
            ),
            FailureHandlerResult::Proceed
        );
    }
}
