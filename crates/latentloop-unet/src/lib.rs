//! latentloop UNet - the denoising loop
//!
//! [`UNet`] drives an [`ExecutionEngine`] through the steps of a scheduler
//! borrowed from a [`SchedulerRegistry`](latentloop_scheduler::SchedulerRegistry):
//! each step runs the engine once per non-empty conditioning branch, blends
//! the predictions with classifier-free guidance and lets the scheduler
//! produce the next latent.

pub mod config;
pub mod engine;
pub mod error;
pub mod unet;

pub use config::UNetConfig;
pub use engine::{EchoEngine, EngineError, ExecutionEngine, ZeroEngine};
pub use error::{Result, UNetError};
pub use unet::UNet;
