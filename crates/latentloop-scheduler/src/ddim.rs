//! DDIM scheduler
//!
//! Deterministic DDIM (eta = 0). The rolling latent the loop carries is the
//! sample with its mask noise taken out; `scale` puts that noise back at
//! `sqrt(1 - ᾱ)` for the current step.

use crate::config::SchedulerConfig;
use crate::contract::{Progress, Scheduler, SchedulerState, noise_prediction};
use crate::error::{Result, SchedulerError};
use crate::schedule::{NoiseSchedule, inference_timesteps};
use latentloop_core::{RandomGenerator, Tensor, kernel};
use tracing::debug;

#[derive(Debug)]
struct Curves {
    timesteps: Vec<usize>,
    /// ᾱ per step, with a trailing 1.0 for the fully denoised end
    alphas: Vec<f32>,
}

impl Curves {
    fn noise_weight(&self, index: usize) -> f32 {
        (1.0 - self.alphas[index]).sqrt()
    }
}

/// DDIM scheduler
#[derive(Debug)]
pub struct DdimScheduler {
    config: SchedulerConfig,
    progress: Progress,
    curves: Option<Curves>,
    mask: Option<Tensor>,
}

impl DdimScheduler {
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

    /// Training timesteps in sampling order, empty before `init`
    pub fn timesteps(&self) -> &[usize] {
        self.curves
            .as_ref()
            .map(|c| c.timesteps.as_slice())
            .unwrap_or(&[])
    }

    fn curves(&self, op: &'static str) -> Result<&Curves> {
        self.curves
            .as_ref()
            .ok_or(SchedulerError::NotInitialized { op })
    }
}

impl Scheduler for DdimScheduler {
    fn name(&self) -> &'static str {
        "ddim"
    }

    fn state(&self) -> SchedulerState {
        self.progress.state()
    }

    fn init(&mut self, steps: usize) -> Result<()> {
        self.config.validate()?;
        self.progress.init(steps)?;

        let schedule = NoiseSchedule::from_config(&self.config);
        let timesteps = inference_timesteps(steps, schedule.num_train_steps());
        let mut alphas: Vec<f32> = timesteps
            .iter()
            .map(|&t| schedule.alpha_cumprod_at(t))
            .collect();
        alphas.push(1.0);

        debug!(steps, first = ?timesteps.first(), "ddim curves built");
        self.curves = Some(Curves { timesteps, alphas });
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
        let weight = self.curves("scale")?.noise_weight(index);
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
        let alpha = curves.alphas[index];
        let alpha_prev = curves.alphas[index + 1];

        // x0 = (x - sqrt(1 - ᾱ) ε) / sqrt(ᾱ)
        let noise = kernel::multiple(&eps, (1.0 - alpha).sqrt(), 0.0);
        let pred_x0 = kernel::divide(&kernel::sub(model_latent, &noise, shape)?, alpha.sqrt(), 0.0);

        // x_prev = sqrt(ᾱ_prev) x0 + sqrt(1 - ᾱ_prev) ε
        let direction = kernel::multiple(&eps, (1.0 - alpha_prev).sqrt(), 0.0);
        let prev = kernel::add(
            &kernel::multiple(&pred_x0, alpha_prev.sqrt(), 0.0),
            &direction,
            shape,
        )?;

        let next_noise = kernel::multiple(mask, curves.noise_weight(index + 1), 0.0);
        let latent = kernel::sub(&prev, &next_noise, shape)?;

        self.progress.advance();
        Ok(latent)
    }

    fn uninit(&mut self) {
        self.progress.reset();
        self.curves = None;
        self.mask = None;
    }
}
