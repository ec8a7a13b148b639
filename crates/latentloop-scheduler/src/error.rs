//! Error types for schedulers

use latentloop_core::TensorError;
use thiserror::Error;

/// Scheduler errors
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Operation called before `init`, after `uninit`, or before `mask`
    #[error("Scheduler not ready for {op}")]
    NotInitialized { op: &'static str },

    /// `init` called on a scheduler that is already running
    #[error("Scheduler already initialized")]
    AlreadyInitialized,

    #[error("Step {step} out of range for {steps} steps")]
    StepOutOfRange { step: usize, steps: usize },

    /// `step` called with an index other than the next one
    #[error("Step {actual} called out of order, expected {expected}")]
    OutOfOrder { expected: usize, actual: usize },

    #[error("Invalid scheduler config: {0}")]
    InvalidConfig(String),

    #[error("Tensor error: {0}")]
    Tensor(#[from] TensorError),
}

/// Result type for scheduler operations
pub type Result<T> = std::result::Result<T, SchedulerError>;
