//! latentloop core - tensors and tensor kernels
//!
//! Shaped, contiguous value buffers and the small set of kernels a diffusion
//! sampling loop needs around its noise-prediction engine.
//!
//! # Layout
//!
//! ```text
//! dtype   - element type table (names, codes, storage support)
//! tensor  - Tensor value type: dtype + shape + buffer + device
//! kernel  - pure, allocating operations over tensors
//! random  - seedable Box-Muller normal generator
//! codec   - binary tensor files
//! ```
//!
//! Kernels never mutate their inputs. Every result owns a freshly allocated
//! buffer and inherits the device of its (first) input.

pub mod codec;
pub mod dtype;
pub mod error;
pub mod kernel;
pub mod random;
pub mod tensor;

pub use dtype::{DType, Element};
pub use error::{Result, TensorError};
pub use random::RandomGenerator;
pub use tensor::{Device, Tensor, TensorData, TensorSummary};
