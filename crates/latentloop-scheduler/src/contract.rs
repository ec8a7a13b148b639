//! The scheduler contract
//!
//! The sampling loop drives a scheduler in a fixed order: `init`, one `mask`,
//! then for each step `scale`, `time` and `step`, and finally `uninit`.
//! [`Progress`] tracks that order for implementations so every scheduler
//! rejects out-of-order calls the same way.

use crate::error::{Result, SchedulerError};
use latentloop_core::Tensor;
use std::borrow::Cow;

/// Where a scheduler is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulerState {
    /// Freshly constructed
    #[default]
    Unconfigured,
    /// Curves built, no mask yet
    Initialized,
    /// Mask produced; the value is the next step index expected
    Stepping(usize),
    /// Curves released
    Uninitialized,
}

/// A diffusion scheduler
///
/// Implementations own their curves and the mask they produced. All indices
/// are inference step indices in `[0, steps)`; `scale` also accepts `steps`,
/// where the noise contribution is zero.
pub trait Scheduler: Send + std::fmt::Debug {
    /// Algorithm name
    fn name(&self) -> &'static str;

    /// Current lifecycle state
    fn state(&self) -> SchedulerState;

    /// Build timestep and noise curves for `steps` inference steps
    fn init(&mut self, steps: usize) -> Result<()>;

    /// Produce the initial noise tensor of `shape`
    fn mask(&mut self, shape: &[usize]) -> Result<Tensor>;

    /// Noise contribution of `mask` at step `index`
    fn scale(&self, mask: &Tensor, index: usize) -> Result<Tensor>;

    /// Timestep fed to the engine at step `index`, as an int64 tensor of shape `[1]`
    fn time(&self, index: usize) -> Result<Tensor>;

    /// Advance from step `index` given the engine input and guided prediction
    fn step(&mut self, model_latent: &Tensor, guided: &Tensor, index: usize) -> Result<Tensor>;

    /// Release curves and return to [`SchedulerState::Uninitialized`]
    fn uninit(&mut self);
}

/// Lifecycle bookkeeping shared by scheduler implementations
#[derive(Debug, Clone, Default)]
pub struct Progress {
    state: SchedulerState,
    steps: usize,
}

impl Progress {
    /// Start unconfigured
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state
    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Configured step count
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Unconfigured or Uninitialized -> Initialized
    pub fn init(&mut self, steps: usize) -> Result<()> {
        match self.state {
            SchedulerState::Unconfigured | SchedulerState::Uninitialized => {
                self.state = SchedulerState::Initialized;
                self.steps = steps;
                Ok(())
            }
            _ => Err(SchedulerError::AlreadyInitialized),
        }
    }

    /// Initialized or Stepping -> Stepping(0)
    pub fn begin(&mut self) -> Result<()> {
        self.ready("mask")?;
        self.state = SchedulerState::Stepping(0);
        Ok(())
    }

    /// Fail unless curves exist
    pub fn ready(&self, op: &'static str) -> Result<()> {
        match self.state {
            SchedulerState::Initialized | SchedulerState::Stepping(_) => Ok(()),
            _ => Err(SchedulerError::NotInitialized { op }),
        }
    }

    /// Check an index for `scale`, which accepts `0..=steps`
    pub fn check_scale(&self, index: usize) -> Result<()> {
        self.ready("scale")?;
        if index > self.steps {
            return Err(self.out_of_range(index));
        }
        Ok(())
    }

    /// Check an index for `time`, which accepts `0..steps`
    pub fn check_time(&self, index: usize) -> Result<()> {
        self.ready("time")?;
        if index >= self.steps {
            return Err(self.out_of_range(index));
        }
        Ok(())
    }

    /// Check that `index` is the next step to take
    pub fn check_step(&self, index: usize) -> Result<()> {
        let SchedulerState::Stepping(expected) = self.state else {
            return Err(SchedulerError::NotInitialized { op: "step" });
        };
        if index >= self.steps {
            return Err(self.out_of_range(index));
        }
        if index != expected {
            return Err(SchedulerError::OutOfOrder {
                expected,
                actual: index,
            });
        }
        Ok(())
    }

    /// Stepping(k) -> Stepping(k + 1)
    pub fn advance(&mut self) {
        if let SchedulerState::Stepping(k) = self.state {
            self.state = SchedulerState::Stepping(k + 1);
        }
    }

    /// Any state -> Uninitialized
    pub fn reset(&mut self) {
        self.state = SchedulerState::Uninitialized;
        self.steps = 0;
    }

    fn out_of_range(&self, step: usize) -> SchedulerError {
        SchedulerError::StepOutOfRange {
            step,
            steps: self.steps,
        }
    }
}

/// The guided prediction, or zeros shaped like `sample` when it is empty
pub(crate) fn noise_prediction<'a>(guided: &'a Tensor, sample: &Tensor) -> Cow<'a, Tensor> {
    if guided.is_empty() {
        Cow::Owned(Tensor::zeros(sample.shape().to_vec()))
    } else {
        Cow::Borrowed(guided)
    }
}
