//! latentloop scheduler - the step-wise noise schedule behind a sampling loop
//!
//! A [`Scheduler`] owns the timestep and noise curves for one sampling run and
//! turns a guided noise prediction into the next latent. Schedulers are
//! handed out and taken back by a [`SchedulerRegistry`], which pools
//! uninitialized instances per configuration.
//!
//! # Lifecycle
//!
//! ```text
//! Unconfigured --init--> Initialized --mask--> Stepping(0) --step--> Stepping(k)
//!       any state --uninit--> Uninitialized --init--> Initialized
//! ```
//!
//! Calls made out of this order fail with a [`SchedulerError`].

pub mod config;
pub mod contract;
pub mod ddim;
pub mod error;
pub mod euler;
pub mod registry;
pub mod schedule;

pub use config::{BetaSchedule, SchedulerConfig, SchedulerKind};
pub use contract::{Progress, Scheduler, SchedulerState};
pub use ddim::DdimScheduler;
pub use error::{Result, SchedulerError};
pub use euler::EulerScheduler;
pub use registry::{RegistryConfig, RegistryStats, SchedulerEntity, SchedulerRegistry};
pub use schedule::NoiseSchedule;
