//! Error types for the sampling loop

use crate::engine::EngineError;
use latentloop_core::TensorError;
use latentloop_scheduler::SchedulerError;
use thiserror::Error;

/// UNet errors
#[derive(Debug, Error)]
pub enum UNetError {
    #[error("Invalid config: {0}")]
    Config(String),

    /// Engine output does not fit the latent
    #[error("Engine output has {actual} elements, latent needs {expected}")]
    OutputShape { expected: usize, actual: usize },

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Scheduler error: {0}")]
    Scheduler(#[from] SchedulerError),

    #[error("Tensor error: {0}")]
    Tensor(#[from] TensorError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Result type for UNet operations
pub type Result<T> = std::result::Result<T, UNetError>;
