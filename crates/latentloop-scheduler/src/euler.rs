//! Euler discrete scheduler
//!
//! Integrates the probability-flow ODE in sigma space, `x = x0 + σ ε`. The
//! engine sees the sample at unit variance, `x / sqrt(σ² + 1)`, so the loop's
//! latent and scale terms are kept in that normalized space.

use crate::config::SchedulerConfig;
use crate::contract::{Progress, Scheduler, SchedulerState, noise_prediction};
use crate::error::{Result, SchedulerError};
use crate::schedule::{KARRAS_RHO, NoiseSchedule, inference_timesteps, karras_sigmas};
use latentloop_core::{RandomGenerator, Tensor, kernel};
use tracing::debug;

#[derive(Debug)]
struct Curves {
    timesteps: Vec<usize>,
    /// σ per step, with a trailing 0.0
    sigmas: Vec<f32>,
}

impl Curves {
    fn input_scale(&self, index: usize) -> f32 {
        1.0 / (self.sigmas[index].powi(2) + 1.0).sqrt()
    }
}

/// Euler discrete scheduler
#[derive(Debug)]
pub struct EulerScheduler {
    config: SchedulerConfig,
    progress: Progress,
    curves: Option<Curves>,
    mask: Option<Tensor>,
}

impl EulerScheduler {
    /// Create an unconfigured scheduler
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            progress: Progress::new(),
            curves: None,
            mask: None,
        }
    }

    /// Configuration
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Sigmas in sampling order including the final zero, empty before `init`
    pub fn sigmas(&self) -> &[f32] {
        self.curves
            .as_ref()
            .map(|c| c.sigmas.as_slice())
            .unwrap_or(&[])
    }

    fn curves(&self, op: &'static str) -> Result<&Curves> {
        self.curves
            .as_ref()
            .ok_or(SchedulerError::NotInitialized { op })
    }
}

impl Scheduler for EulerScheduler {
    fn name(&self) -> &'static str {
        "euler"
    }

    fn state(&self) -> SchedulerState {
        self.progress.state()
    }

    fn init(&mut self, steps: usize) -> Result<()> {
        self.config.validate()?;
        self.progress.init(steps)?;

        let schedule = NoiseSchedule::from_config(&self.config);
        let mut timesteps = inference_timesteps(steps, schedule.num_train_steps());
        let mut sigmas: Vec<f32> = timesteps.iter().map(|&t| schedule.sigma_at(t)).collect();

        if self.config.karras {
            sigmas = karras_sigmas(&sigmas, KARRAS_RHO);
            timesteps = sigmas
                .iter()
                .map(|&sigma| schedule.timestep_for_sigma(sigma))
                .collect();
        }
        sigmas.push(0.0);

        debug!(
            steps,
            karras = self.config.karras,
            sigma_max = ?sigmas.first(),
            "euler curves built"
        );
        self.curves = Some(Curves { timesteps, sigmas });
        Ok(())
    }

    fn mask(&mut self, shape: &[usize]) -> Result<Tensor> {
        self.progress.begin()?;
        let mut generator = RandomGenerator::seeded(self.config.seed);
        let mask = kernel::random(shape, &mut generator, 1.0);
        self.mask = Some(mask.clone());
        Ok(mask)
    }

    fn scale(&self, mask: &Tensor, index: usize) -> Result<Tensor> {
        self.progress.check_scale(index)?;
        let curves = self.curves("scale")?;
        let weight = curves.sigmas[index] * curves.input_scale(index);
        Ok(kernel::multiple(mask, weight, 0.0))
    }

    fn time(&self, index: usize) -> Result<Tensor> {
        self.progress.check_time(index)?;
        let t = self.curves("time")?.timesteps[index];
        Ok(kernel::create(&[1], vec![t as i64]))
    }

    fn step(&mut self, model_latent: &Tensor, guided: &Tensor, index: usize) -> Result<Tensor> {
        self.progress.check_step(index)?;
        let curves = self.curves("step")?;
        let mask = self
            .mask
            .as_ref()
            .ok_or(SchedulerError::NotInitialized { op: "step" })?;

        let shape = model_latent.shape();
        let eps = noise_prediction(guided, model_latent);
        let sigma = curves.sigmas[index];
        let sigma_next = curves.sigmas[index + 1];

        // Back to sigma space, one Euler step, then renormalize for the next input
        let sample = kernel::divide(model_latent, curves.input_scale(index), 0.0);
        let delta = kernel::multiple(&eps, sigma_next - sigma, 0.0);
        let next = kernel::add(&sample, &delta, shape)?;
        let next = kernel::multiple(&next, curves.input_scale(index + 1), 0.0);

        let next_noise = kernel::multiple(
            mask,
            sigma_next * curves.input_scale(index + 1),
            0.0,
        );
        let latent = kernel::sub(&next, &next_noise, shape)?;

        self.progress.advance();
        Ok(latent)
    }

    fn uninit(&mut self) {
        self.progress.reset();
        self.curves = None;
        self.mask = None;
    }
}
