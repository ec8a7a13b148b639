//! Scheduler configuration
//!
//! A [`SchedulerConfig`] is both the recipe for building a scheduler and the
//! key the registry pools instances under.

use crate::error::{Result, SchedulerError};
use serde::{Deserialize, Serialize};

/// Scheduler algorithm selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerKind {
    /// Deterministic DDIM
    #[default]
    Ddim,
    /// Euler discrete in sigma space
    Euler,
}

impl SchedulerKind {
    /// All algorithms the registry can build
    pub const ALL: [SchedulerKind; 2] = [SchedulerKind::Ddim, SchedulerKind::Euler];

    /// Short name
    pub fn name(self) -> &'static str {
        match self {
            Self::Ddim => "ddim",
            Self::Euler => "euler",
        }
    }

    /// One-line description
    pub fn description(self) -> &'static str {
        match self {
            Self::Ddim => "deterministic DDIM over the cumulative alpha curve",
            Self::Euler => "Euler discrete steps in sigma space, optional Karras spacing",
        }
    }
}

impl std::fmt::Display for SchedulerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Beta curve used during training
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BetaSchedule {
    /// Betas evenly spaced between start and end
    Linear,
    /// Square roots of the betas evenly spaced (SD 1.x)
    #[default]
    ScaledLinear,
}

/// Scheduler configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Algorithm
    pub kind: SchedulerKind,
    /// Number of training timesteps
    pub num_train_steps: usize,
    /// First beta of the training curve
    pub beta_start: f32,
    /// Last beta of the training curve
    pub beta_end: f32,
    /// Shape of the beta curve
    pub beta_schedule: BetaSchedule,
    /// Seed for the initial noise mask (0 keeps the default stream)
    pub seed: u64,
    /// Use Karras sigma spacing (Euler only)
    pub karras: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            kind: SchedulerKind::Ddim,
            num_train_steps: 1000,
            beta_start: 0.00085,
            beta_end: 0.012,
            beta_schedule: BetaSchedule::ScaledLinear,
            seed: 0,
            karras: false,
        }
    }
}

impl SchedulerConfig {
    /// DDIM with SD 1.x training betas
    pub fn ddim() -> Self {
        Self::default()
    }

    /// Euler with SD 1.x training betas
    pub fn euler() -> Self {
        Self {
            kind: SchedulerKind::Euler,
            ..Self::default()
        }
    }

    /// Set the noise seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Enable Karras sigma spacing
    pub fn with_karras(mut self, karras: bool) -> Self {
        self.karras = karras;
        self
    }

    /// Check the training curve parameters
    pub fn validate(&self) -> Result<()> {
        if self.num_train_steps == 0 {
            return Err(SchedulerError::InvalidConfig(
                "num_train_steps must be positive".to_string(),
            ));
        }
        if !(self.beta_start > 0.0 && self.beta_end >= self.beta_start && self.beta_end < 1.0) {
            return Err(SchedulerError::InvalidConfig(format!(
                "betas must satisfy 0 < start <= end < 1, got {}..{}",
                self.beta_start, self.beta_end
            )));
        }
        Ok(())
    }

    /// Pool key: blake3 hash of the JSON form
    pub fn content_key(&self) -> [u8; 32] {
        let data = serde_json::to_vec(self).unwrap_or_default();
        *blake3::hash(&data).as_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SchedulerConfig::default();
        assert_eq!(config.kind, SchedulerKind::Ddim);
        assert_eq!(config.num_train_steps, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json() {
        let config: SchedulerConfig =
            serde_json::from_str(r#"{ "kind": "euler", "karras": true }"#).unwrap();
        assert_eq!(config.kind, SchedulerKind::Euler);
        assert!(config.karras);
        assert_eq!(config.beta_schedule, BetaSchedule::ScaledLinear);
    }

    #[test]
    fn test_invalid_betas() {
        let config = SchedulerConfig {
            beta_start: 0.5,
            beta_end: 0.1,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(SchedulerError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_content_key() {
        let a = SchedulerConfig::ddim().with_seed(1);
        let b = SchedulerConfig::ddim().with_seed(1);
        let c = SchedulerConfig::ddim().with_seed(2);

        assert_eq!(a.content_key(), b.content_key());
        assert_ne!(a.content_key(), c.content_key());
        assert_ne!(a.content_key(), SchedulerConfig::euler().with_seed(1).content_key());
    }
}
