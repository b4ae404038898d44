//! Flow Orchestration Layer
//!
//! Runs a fixed, ordered list of UI steps against a page collaborator:
//! applicability checks for optional steps, per-step timeouts, abort on
//! critical failures, one recorded check per outcome and a guaranteed
//! page release at the end of every run.

pub mod errors;
pub mod executor;
pub mod recorder;
pub mod resolver;
pub mod sequencer;
pub mod strategies;
pub mod types;

pub use errors::FlowError;
pub use executor::StepExecutor;
pub use recorder::{
    record_outcome, record_verdict, Check, FanoutRecorder, InMemoryRecorder, OutcomeRecorder,
    TracingRecorder,
};
pub use resolver::{ApplicabilityResolver, ProbeResolver};
pub use sequencer::FlowSequencer;
pub use strategies::{DefaultFailureHandler, FailureHandler, FailureHandlerResult, FailureStrategy};
pub use types::{
    final_verdict, Applicability, FlowDefinition, FlowPhase, FlowReport, FlowState, Interaction,
    OutcomeKind, Step, StepOutcome,
};
