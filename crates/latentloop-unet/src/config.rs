//! UNet run configuration

use crate::error::{Result, UNetError};
use latentloop_scheduler::SchedulerConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Sampling loop configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UNetConfig {
    /// Scheduler requested from the registry
    pub scheduler: SchedulerConfig,
    /// Inference steps (0 returns the initial latent)
    pub steps: usize,
    /// Latent width
    pub width: usize,
    /// Latent height
    pub height: usize,
    /// Latent channels
    pub channels: usize,
    /// Classifier-free guidance scale
    pub guidance_scale: f32,
}

impl Default for UNetConfig {
    fn default() -> Self {
        Self {
            scheduler: SchedulerConfig::default(),
            steps: 3,
            width: 512,
            height: 512,
            channels: 4,
            guidance_scale: 7.5,
        }
    }
}

impl UNetConfig {
    /// Small latent for quick dry runs
    pub fn preview() -> Self {
        Self {
            width: 64,
            height: 64,
            ..Self::default()
        }
    }

    /// Parse and validate a JSON config
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Check dimensions and scheduler parameters
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("width", self.width),
            ("height", self.height),
            ("channels", self.channels),
        ] {
            if value == 0 {
                return Err(UNetError::Config(format!("{name} must be positive")));
            }
        }
        if !self.guidance_scale.is_finite() {
            return Err(UNetError::Config("guidance_scale must be finite".to_string()));
        }
        self.scheduler.validate()?;
        Ok(())
    }

    /// Latent shape `[1, C, H, W]`
    pub fn latent_shape(&self) -> [usize; 4] {
        [1, self.channels, self.height, self.width]
    }

    /// Elements in one latent
    pub fn latent_size(&self) -> usize {
        self.channels * self.height * self.width
    }
}
