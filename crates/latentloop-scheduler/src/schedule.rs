//! Noise schedules
//!
//! Training-time beta curves, their cumulative alpha products and the sigma
//! values derived from them.

use crate::config::{BetaSchedule, SchedulerConfig};

/// Rho used for Karras sigma spacing
pub const KARRAS_RHO: f32 = 7.0;

/// Precomputed cumulative alpha curve
#[derive(Debug, Clone)]
pub struct NoiseSchedule {
    /// Cumulative product of alphas: ᾱₜ
    alphas_cumprod: Vec<f32>,
}

impl NoiseSchedule {
    /// Betas evenly spaced between `beta_start` and `beta_end`
    pub fn linear(num_steps: usize, beta_start: f32, beta_end: f32) -> Self {
        let betas = (0..num_steps).map(|i| {
            let t = fraction(i, num_steps);
            beta_start + t * (beta_end - beta_start)
        });
        Self::from_betas(betas)
    }

    /// Square roots of the betas evenly spaced
    pub fn scaled_linear(num_steps: usize, beta_start: f32, beta_end: f32) -> Self {
        let (start, end) = (beta_start.sqrt(), beta_end.sqrt());
        let betas = (0..num_steps).map(|i| {
            let t = fraction(i, num_steps);
            (start + t * (end - start)).powi(2)
        });
        Self::from_betas(betas)
    }

    /// Training curve described by `config`
    pub fn from_config(config: &SchedulerConfig) -> Self {
        match config.beta_schedule {
            BetaSchedule::Linear => {
                Self::linear(config.num_train_steps, config.beta_start, config.beta_end)
            }
            BetaSchedule::ScaledLinear => {
                Self::scaled_linear(config.num_train_steps, config.beta_start, config.beta_end)
            }
        }
    }

    fn from_betas(betas: impl Iterator<Item = f32>) -> Self {
        let mut cumprod = 1.0f32;
        let alphas_cumprod = betas
            .map(|beta| {
                cumprod *= 1.0 - beta;
                cumprod
            })
            .collect();
        Self { alphas_cumprod }
    }

    /// Number of training timesteps
    pub fn num_train_steps(&self) -> usize {
        self.alphas_cumprod.len()
    }

    /// ᾱ at training timestep `t`
    pub fn alpha_cumprod_at(&self, t: usize) -> f32 {
        self.alphas_cumprod[t]
    }

    /// σ = sqrt((1 - ᾱ) / ᾱ) at training timestep `t`
    pub fn sigma_at(&self, t: usize) -> f32 {
        let alpha = self.alpha_cumprod_at(t);
        ((1.0 - alpha) / alpha).sqrt()
    }

    /// Training timestep whose sigma is closest to `sigma` in log space
    pub fn timestep_for_sigma(&self, sigma: f32) -> usize {
        let target = sigma.max(f32::MIN_POSITIVE).ln();
        (0..self.num_train_steps())
            .min_by(|&a, &b| {
                let da = (self.sigma_at(a).ln() - target).abs();
                let db = (self.sigma_at(b).ln() - target).abs();
                da.total_cmp(&db)
            })
            .unwrap_or(0)
    }
}

fn fraction(i: usize, n: usize) -> f32 {
    if n <= 1 {
        0.0
    } else {
        i as f32 / (n - 1) as f32
    }
}

/// Evenly spaced training timesteps for inference, highest noise first
pub fn inference_timesteps(num_inference_steps: usize, num_train_steps: usize) -> Vec<usize> {
    if num_inference_steps == 0 || num_train_steps == 0 {
        return Vec::new();
    }
    let step_ratio = (num_train_steps / num_inference_steps).max(1);
    (0..num_inference_steps)
        .rev()
        .map(|i| (i * step_ratio).min(num_train_steps - 1))
        .collect()
}

/// Respace sigmas following Karras et al. between the same endpoints
pub fn karras_sigmas(sigmas: &[f32], rho: f32) -> Vec<f32> {
    let (Some(&sigma_max), Some(&sigma_min)) = (sigmas.first(), sigmas.last()) else {
        return Vec::new();
    };
    let n = sigmas.len();
    let min_inv_rho = sigma_min.powf(1.0 / rho);
    let max_inv_rho = sigma_max.powf(1.0 / rho);

    (0..n)
        .map(|i| {
            let t = fraction(i, n);
            (max_inv_rho + t * (min_inv_rho - max_inv_rho)).powf(rho)
        })
        .collect()
}
