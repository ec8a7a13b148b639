//! Sampling loop orchestrator

use crate::config::UNetConfig;
use crate::engine::ExecutionEngine;
use crate::error::{Result, UNetError};
use latentloop_core::{Tensor, kernel};
use latentloop_scheduler::{Scheduler, SchedulerEntity, SchedulerError, SchedulerRegistry};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{Level, debug, info, span};

/// Denoising loop bound to one engine and one pooled scheduler
///
/// The scheduler is requested from the registry on construction and returned
/// to it, uninitialized, when the UNet is dropped.
pub struct UNet<E> {
    model_path: PathBuf,
    config: UNetConfig,
    engine: E,
    registry: Arc<SchedulerRegistry>,
    scheduler: Option<SchedulerEntity>,
}

impl<E: ExecutionEngine> UNet<E> {
    /// Validate `config`, take a scheduler from `registry` and initialize it
    pub fn new(
        model_path: impl Into<PathBuf>,
        config: UNetConfig,
        engine: E,
        registry: Arc<SchedulerRegistry>,
    ) -> Result<Self> {
        config.validate()?;

        let mut entity = registry.request_scheduler(&config.scheduler);
        if let Err(e) = entity.scheduler_mut().init(config.steps) {
            registry.recycle_scheduler(entity);
            return Err(e.into());
        }

        let model_path = model_path.into();
        info!(
            model = %model_path.display(),
            scheduler = entity.scheduler().name(),
            steps = config.steps,
            shape = ?config.latent_shape(),
            "UNet ready"
        );

        Ok(Self {
            model_path,
            config,
            engine,
            registry,
            scheduler: Some(entity),
        })
    }

    /// Zero-filled output placeholder handed to the engine
    pub fn generate_output(&self) -> Tensor {
        output_placeholder(&self.config)
    }

    /// Denoise from `encoded_img` (or zeros when empty) under the given conditionings
    ///
    /// Either conditioning may be empty to skip its engine call. A negative
    /// prediction without a positive one fails the guidance blend.
    pub fn inference(
        &mut self,
        embs_positive: &Tensor,
        embs_negative: &Tensor,
        encoded_img: &Tensor,
    ) -> Result<Tensor> {
        let span = span!(Level::DEBUG, "unet_inference", steps = self.config.steps);
        let _enter = span.enter();

        let Self {
            config,
            engine,
            scheduler,
            ..
        } = self;
        let scheduler = scheduler
            .as_mut()
            .ok_or(SchedulerError::NotInitialized { op: "inference" })?
            .scheduler_mut();

        let shape = config.latent_shape();
        let mut latent = if encoded_img.is_empty() {
            Tensor::zeros(shape.to_vec())
        } else {
            kernel::duplicate_into::<f32>(encoded_img, &shape)?
        };
        let mask = scheduler.mask(&shape)?;

        info!(
            scheduler = scheduler.name(),
            positive = !embs_positive.is_empty(),
            negative = !embs_negative.is_empty(),
            image = !encoded_img.is_empty(),
            "Inference started"
        );

        for i in 0..config.steps {
            let noise = scheduler.scale(&mask, i)?;
            let model_latent = if latent.is_empty() {
                noise
            } else {
                kernel::add(&latent, &noise, &shape)?
            };
            let timestep = scheduler.time(i)?;

            let pred_positive = predict(engine, config, &model_latent, &timestep, embs_positive)?;
            let pred_negative = predict(engine, config, &model_latent, &timestep, embs_negative)?;

            let guided = match (pred_negative, pred_positive) {
                (Some(negative), positive) => kernel::guidance(
                    &negative,
                    &positive.unwrap_or_else(Tensor::empty),
                    config.guidance_scale,
                )?,
                (None, Some(positive)) => kernel::duplicate_into::<f32>(&positive, &shape)?,
                (None, None) => Tensor::empty(),
            };

            debug!(
                step = i,
                timestep = ?timestep.data::<i64>().and_then(|t| t.first().copied()),
                guided = %guided.summary(),
                "Step"
            );

            latent = scheduler.step(&model_latent, &guided, i)?;
        }

        info!(latent = %latent.summary(), "Inference finished");
        Ok(latent)
    }

    /// Configuration
    pub fn config(&self) -> &UNetConfig {
        &self.config
    }

    /// Model path this UNet was created for
    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    /// Engine
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Engine, mutably
    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    /// The scheduler currently held
    pub fn scheduler(&self) -> Option<&dyn Scheduler> {
        self.scheduler.as_ref().map(SchedulerEntity::scheduler)
    }

    /// Registry the scheduler returns to
    pub fn registry(&self) -> &Arc<SchedulerRegistry> {
        &self.registry
    }
}

impl<E> Drop for UNet<E> {
    fn drop(&mut self) {
        if let Some(mut entity) = self.scheduler.take() {
            entity.scheduler_mut().uninit();
            self.scheduler = self.registry.recycle_scheduler(entity);
            debug!("Scheduler recycled");
        }
    }
}

fn output_placeholder(config: &UNetConfig) -> Tensor {
    Tensor::zeros(config.latent_shape().to_vec())
}

/// One engine call for a conditioning branch, `None` when it is empty
fn predict<E: ExecutionEngine>(
    engine: &mut E,
    config: &UNetConfig,
    model_latent: &Tensor,
    timestep: &Tensor,
    conditioning: &Tensor,
) -> Result<Option<Tensor>> {
    if conditioning.is_empty() {
        return Ok(None);
    }

    let inputs = [
        kernel::duplicate::<f32>(model_latent),
        kernel::duplicate::<i64>(timestep),
        kernel::duplicate::<f32>(conditioning),
    ];
    let mut outputs = [output_placeholder(config)];
    engine.execute(&inputs, &mut outputs)?;

    let [output] = outputs;
    let expected = config.latent_size();
    if output.element_count() != expected {
        return Err(UNetError::OutputShape {
            expected,
            actual: output.element_count(),
        });
    }
    Ok(Some(output))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EchoEngine, ZeroEngine};
    use latentloop_scheduler::{RegistryConfig, SchedulerConfig, SchedulerState};

    fn tiny_config(steps: usize) -> UNetConfig {
        UNetConfig {
            scheduler: SchedulerConfig::ddim().with_seed(1),
            steps,
            width: 2,
            height: 2,
            channels: 1,
            guidance_scale: 7.5,
        }
    }

    #[test]
    fn test_construction_initializes_scheduler() {
        let registry = SchedulerRegistry::shared(RegistryConfig::default());
        let unet = UNet::new("unet.onnx", tiny_config(2), ZeroEngine::new(), registry).unwrap();

        assert_eq!(unet.model_path(), Path::new("unet.onnx"));
        assert_eq!(
            unet.scheduler().map(|s| s.state()),
            Some(SchedulerState::Initialized)
        );
    }

    #[test]
    fn test_invalid_config_takes_nothing() {
        let registry = SchedulerRegistry::shared(RegistryConfig::default());
        let config = UNetConfig {
            width: 0,
            ..tiny_config(1)
        };

        let result = UNet::new("unet.onnx", config, ZeroEngine::new(), Arc::clone(&registry));
        assert!(matches!(result, Err(UNetError::Config(_))));
        assert_eq!(registry.stats().requests, 0);
    }

    #[test]
    fn test_drop_recycles() {
        let registry = SchedulerRegistry::shared(RegistryConfig::default());
        {
            let _unet =
                UNet::new("unet.onnx", tiny_config(1), EchoEngine::new(), Arc::clone(&registry))
                    .unwrap();
            assert_eq!(registry.idle_count(), 0);
        }
        assert_eq!(registry.idle_count(), 1);
        assert_eq!(registry.stats().recycles, 1);
    }

    #[test]
    fn test_generate_output() {
        let registry = SchedulerRegistry::shared(RegistryConfig::default());
        let unet = UNet::new("unet.onnx", tiny_config(1), ZeroEngine::new(), registry).unwrap();

        let output = unet.generate_output();
        assert_eq!(output.shape(), &[1, 1, 2, 2]);
        assert!(output.as_f32().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_two_branches_call_engine_twice_per_step() {
        let registry = SchedulerRegistry::shared(RegistryConfig::default());
        let mut unet =
            UNet::new("unet.onnx", tiny_config(3), EchoEngine::new(), registry).unwrap();

        let embs = Tensor::zeros(vec![1, 4, 8]);
        let latent = unet.inference(&embs, &embs, &Tensor::empty()).unwrap();

        assert_eq!(unet.engine().calls(), 6);
        assert_eq!(latent.shape(), &[1, 1, 2, 2]);
    }

    #[test]
    fn test_inference_can_repeat() {
        let registry = SchedulerRegistry::shared(RegistryConfig::default());
        let mut unet =
            UNet::new("unet.onnx", tiny_config(2), ZeroEngine::new(), registry).unwrap();

        let embs = Tensor::zeros(vec![1, 4, 8]);
        let first = unet.inference(&embs, &Tensor::empty(), &Tensor::empty()).unwrap();
        let second = unet.inference(&embs, &Tensor::empty(), &Tensor::empty()).unwrap();
        assert_eq!(first, second);
    }
}
