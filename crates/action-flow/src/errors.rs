//! Flow error types

use thiserror::Error;

/// Errors raised outside any single step's local handling
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FlowError {
    /// Flow validation failed
    #[error("Flow validation failed: {0}")]
    ValidationFailed(String),

    /// Invalid flow structure
    #[error("Invalid flow structure: {0}")]
    InvalidStructure(String),

    /// An outcome for this step was already recorded
    #[error("Duplicate outcome for step {0}")]
    DuplicateOutcome(String),

    /// Page preparation before the first step failed
    #[error("Page setup failed: {0}")]
    Setup(String),

    /// The run panicked
    #[error("Run panicked: {0}")]
    Panicked(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
