//! Execution engine interface
//!
//! The loop hands an engine three inputs (latent, timestep, conditioning)
//! and one zero-filled output placeholder shaped like the latent. Model
//! sessions, weight loading and the forward pass live behind this trait.

use latentloop_core::{Tensor, kernel};
use thiserror::Error;

/// Engine errors
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Model not found: {0}")]
    ModelNotFound(String),

    /// Wrong number of inputs or outputs
    #[error("Expected {expected_inputs} inputs and {expected_outputs} outputs, got {inputs} and {outputs}")]
    Arity {
        expected_inputs: usize,
        expected_outputs: usize,
        inputs: usize,
        outputs: usize,
    },

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
}

/// Something that can run the noise-prediction network
pub trait ExecutionEngine {
    /// Run once, filling `outputs` in place
    fn execute(&mut self, inputs: &[Tensor], outputs: &mut [Tensor]) -> Result<(), EngineError>;
}

impl<E: ExecutionEngine + ?Sized> ExecutionEngine for Box<E> {
    fn execute(&mut self, inputs: &[Tensor], outputs: &mut [Tensor]) -> Result<(), EngineError> {
        (**self).execute(inputs, outputs)
    }
}

/// Fail unless the loop's 3-in, 1-out convention holds
pub fn check_arity(inputs: &[Tensor], outputs: &[Tensor]) -> Result<(), EngineError> {
    if inputs.len() != 3 || outputs.len() != 1 {
        return Err(EngineError::Arity {
            expected_inputs: 3,
            expected_outputs: 1,
            inputs: inputs.len(),
            outputs: outputs.len(),
        });
    }
    Ok(())
}

/// Dry-run engine that predicts the latent it was given
#[derive(Debug, Clone, Default)]
pub struct EchoEngine {
    calls: usize,
}

impl EchoEngine {
    /// Create an echo engine
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `execute` calls so far
    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl ExecutionEngine for EchoEngine {
    fn execute(&mut self, inputs: &[Tensor], outputs: &mut [Tensor]) -> Result<(), EngineError> {
        check_arity(inputs, outputs)?;
        self.calls += 1;

        let shape = outputs[0].shape().to_vec();
        outputs[0] = kernel::duplicate_into::<f32>(&inputs[0], &shape)
            .map_err(|e| EngineError::ExecutionFailed(e.to_string()))?;
        Ok(())
    }
}

/// Dry-run engine that always predicts zero noise
#[derive(Debug, Clone, Default)]
pub struct ZeroEngine {
    calls: usize,
}

impl ZeroEngine {
    /// Create a zero engine
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `execute` calls so far
    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl ExecutionEngine for ZeroEngine {
    fn execute(&mut self, inputs: &[Tensor], outputs: &mut [Tensor]) -> Result<(), EngineError> {
        check_arity(inputs, outputs)?;
        self.calls += 1;

        outputs[0] = Tensor::zeros(outputs[0].shape().to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(latent: Tensor) -> Vec<Tensor> {
        vec![
            latent,
            kernel::create(&[1], vec![999i64]),
            Tensor::zeros(vec![1, 77, 8]),
        ]
    }

    #[test]
    fn test_echo_returns_latent() {
        let latent = kernel::create(&[1, 1, 1, 2], vec![0.5f32, -0.5]);
        let mut outputs = vec![Tensor::zeros(vec![1, 1, 1, 2])];

        let mut engine = EchoEngine::new();
        engine.execute(&inputs(latent.clone()), &mut outputs).unwrap();

        assert_eq!(outputs[0], latent);
        assert_eq!(engine.calls(), 1);
    }

    #[test]
    fn test_zero_engine() {
        let latent = kernel::create(&[1, 1, 1, 2], vec![3.0f32, 4.0]);
        let mut outputs = vec![Tensor::zeros(vec![1, 1, 1, 2])];

        let mut engine = ZeroEngine::new();
        engine.execute(&inputs(latent), &mut outputs).unwrap();
        assert!(outputs[0].as_f32().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_arity() {
        let mut engine = EchoEngine::new();
        let mut outputs = vec![Tensor::zeros(vec![1])];
        let result = engine.execute(&[Tensor::zeros(vec![1])], &mut outputs);

        assert!(matches!(result, Err(EngineError::Arity { inputs: 1, .. })));
        assert_eq!(engine.calls(), 0);
    }

    #[test]
    fn test_boxed_engine() {
        let mut engine: Box<dyn ExecutionEngine> = Box::new(ZeroEngine::new());
        let mut outputs = vec![Tensor::zeros(vec![1, 1, 1, 1])];
        engine
            .execute(&inputs(Tensor::zeros(vec![1, 1, 1, 1])), &mut outputs)
            .unwrap();
    }
}
