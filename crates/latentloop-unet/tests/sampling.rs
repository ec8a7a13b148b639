//! End-to-end sampling loop scenarios with stub engines and schedulers

use latentloop_core::{DType, Tensor, kernel};
use latentloop_scheduler::{
    DdimScheduler, NoiseSchedule, Progress, RegistryConfig, Scheduler, SchedulerConfig,
    SchedulerRegistry, SchedulerState,
};
use latentloop_unet::{EchoEngine, EngineError, ExecutionEngine, UNet, UNetConfig, UNetError};
use std::sync::Arc;

/// Records every call and answers with the latent it was given
#[derive(Debug, Default)]
struct RecordingEngine {
    dtypes: Vec<[DType; 3]>,
    conditionings: Vec<Vec<f32>>,
}

impl ExecutionEngine for RecordingEngine {
    fn execute(&mut self, inputs: &[Tensor], outputs: &mut [Tensor]) -> Result<(), EngineError> {
        self.dtypes
            .push([inputs[0].dtype(), inputs[1].dtype(), inputs[2].dtype()]);
        self.conditionings.push(inputs[2].as_f32().to_vec());
        let shape = outputs[0].shape().to_vec();
        outputs[0] = kernel::duplicate_into::<f32>(&inputs[0], &shape)
            .map_err(|e| EngineError::ExecutionFailed(e.to_string()))?;
        Ok(())
    }
}

/// Returns an output that does not fit the latent
struct WrongShapeEngine;

impl ExecutionEngine for WrongShapeEngine {
    fn execute(&mut self, _inputs: &[Tensor], outputs: &mut [Tensor]) -> Result<(), EngineError> {
        outputs[0] = Tensor::zeros(vec![1, 1, 1, 3]);
        Ok(())
    }
}

struct FailingEngine;

impl ExecutionEngine for FailingEngine {
    fn execute(&mut self, _inputs: &[Tensor], _outputs: &mut [Tensor]) -> Result<(), EngineError> {
        Err(EngineError::ExecutionFailed("device lost".to_string()))
    }
}

/// Constant mask, identity scale, and a step that passes the model latent through
#[derive(Debug)]
struct PassThroughScheduler {
    progress: Progress,
    mask_value: f32,
}

impl PassThroughScheduler {
    fn new(mask_value: f32) -> Self {
        Self {
            progress: Progress::new(),
            mask_value,
        }
    }
}

impl Scheduler for PassThroughScheduler {
    fn name(&self) -> &'static str {
        "pass-through"
    }

    fn state(&self) -> SchedulerState {
        self.progress.state()
    }

    fn init(&mut self, steps: usize) -> latentloop_scheduler::Result<()> {
        self.progress.init(steps)
    }

    fn mask(&mut self, shape: &[usize]) -> latentloop_scheduler::Result<Tensor> {
        self.progress.begin()?;
        let size: usize = shape.iter().product();
        Ok(kernel::create(shape, vec![self.mask_value; size]))
    }

    fn scale(&self, mask: &Tensor, index: usize) -> latentloop_scheduler::Result<Tensor> {
        self.progress.check_scale(index)?;
        Ok(kernel::duplicate::<f32>(mask))
    }

    fn time(&self, index: usize) -> latentloop_scheduler::Result<Tensor> {
        self.progress.check_time(index)?;
        Ok(kernel::create(&[1], vec![index as i64]))
    }

    fn step(
        &mut self,
        model_latent: &Tensor,
        _guided: &Tensor,
        index: usize,
    ) -> latentloop_scheduler::Result<Tensor> {
        self.progress.check_step(index)?;
        self.progress.advance();
        Ok(kernel::duplicate::<f32>(model_latent))
    }

    fn uninit(&mut self) {
        self.progress.reset();
    }
}

fn config(steps: usize, width: usize, height: usize, channels: usize) -> UNetConfig {
    UNetConfig {
        scheduler: SchedulerConfig::ddim().with_seed(21),
        steps,
        width,
        height,
        channels,
        guidance_scale: 7.5,
    }
}

fn registry() -> Arc<SchedulerRegistry> {
    SchedulerRegistry::shared(RegistryConfig::default())
}

#[test]
fn test_zero_steps_returns_zero_latent() {
    let mut unet =
        UNet::new("unet.onnx", config(0, 2, 2, 1), EchoEngine::new(), registry()).unwrap();

    let embs = Tensor::zeros(vec![1, 2, 3]);
    let latent = unet.inference(&embs, &embs, &Tensor::empty()).unwrap();

    assert_eq!(latent, Tensor::zeros(vec![1, 1, 2, 2]));
    assert_eq!(unet.engine().calls(), 0);
}

#[test]
fn test_zero_steps_returns_encoded_image() {
    let mut unet =
        UNet::new("unet.onnx", config(0, 2, 1, 2), EchoEngine::new(), registry()).unwrap();

    let image = kernel::create(&[4], vec![1.0f64, 2.0, 3.0, 4.0]);
    let latent = unet
        .inference(&Tensor::zeros(vec![1]), &Tensor::empty(), &image)
        .unwrap();

    assert_eq!(latent.shape(), &[1, 2, 1, 2]);
    assert_eq!(latent.dtype(), DType::Float32);
    assert_eq!(latent.as_f32().as_ref(), &[1.0, 2.0, 3.0, 4.0]);
    assert_eq!(unet.engine().calls(), 0);
}

#[test]
fn test_encoded_image_must_fit_latent() {
    let mut unet =
        UNet::new("unet.onnx", config(1, 2, 2, 1), EchoEngine::new(), registry()).unwrap();

    let image = Tensor::zeros(vec![3]);
    let result = unet.inference(&Tensor::empty(), &Tensor::empty(), &image);
    assert!(matches!(result, Err(UNetError::Tensor(_))));
}

#[test]
fn test_empty_conditionings_skip_engine() {
    let unet_config = config(1, 2, 2, 1);
    let mut unet =
        UNet::new("unet.onnx", unet_config.clone(), EchoEngine::new(), registry()).unwrap();

    let latent = unet
        .inference(&Tensor::empty(), &Tensor::empty(), &Tensor::empty())
        .unwrap();

    assert_eq!(unet.engine().calls(), 0);
    assert_eq!(latent.shape(), &[1, 1, 2, 2]);

    // Zero noise leaves x0 = mask * sqrt(1 - ᾱ) / sqrt(ᾱ) after one DDIM step
    let mut reference = DdimScheduler::new(unet_config.scheduler.clone());
    reference.init(1).unwrap();
    let mask = reference.mask(&[1, 1, 2, 2]).unwrap();
    let alpha = NoiseSchedule::from_config(&unet_config.scheduler)
        .alpha_cumprod_at(reference.timesteps()[0]);
    let factor = (1.0 - alpha).sqrt() / alpha.sqrt();

    for (actual, m) in latent.as_f32().iter().zip(mask.as_f32().iter()) {
        let expected = m * factor;
        assert!(
            (actual - expected).abs() <= 1e-5 * expected.abs().max(1.0),
            "{actual} != {expected}"
        );
    }
    assert!(latent.as_f32().iter().any(|v| *v != 0.0));
}

#[test]
fn test_single_pixel_pass_through() {
    let registry = registry();
    let unet_config = config(1, 1, 1, 1);
    assert!(registry.preload(
        &unet_config.scheduler,
        Box::new(PassThroughScheduler::new(0.25))
    ));

    let mut unet =
        UNet::new("unet.onnx", unet_config, EchoEngine::new(), Arc::clone(&registry)).unwrap();
    assert_eq!(unet.scheduler().map(|s| s.name()), Some("pass-through"));

    let positive = kernel::create(&[1], vec![1.0f32]);
    let latent = unet
        .inference(&positive, &Tensor::empty(), &Tensor::empty())
        .unwrap();

    // zero latent plus the identity scale of the mask
    assert_eq!(latent.shape(), &[1, 1, 1, 1]);
    assert_eq!(latent.as_f32().as_ref(), &[0.25]);
    assert_eq!(unet.engine().calls(), 1);
}

#[test]
fn test_engine_inputs_are_typed() {
    let mut unet = UNet::new(
        "unet.onnx",
        config(2, 2, 2, 1),
        RecordingEngine::default(),
        registry(),
    )
    .unwrap();

    let positive = kernel::create(&[1, 1, 2], vec![1.0f32, 1.0]);
    let negative = kernel::create(&[1, 1, 2], vec![-1i32, -1]);
    unet.inference(&positive, &negative, &Tensor::empty()).unwrap();

    let engine = unet.engine();
    assert_eq!(engine.dtypes.len(), 4);
    assert!(
        engine
            .dtypes
            .iter()
            .all(|d| *d == [DType::Float32, DType::Int64, DType::Float32])
    );
    // positive branch runs before negative within a step
    assert_eq!(engine.conditionings[0], vec![1.0, 1.0]);
    assert_eq!(engine.conditionings[1], vec![-1.0, -1.0]);
}

#[test]
fn test_negative_without_positive_fails_guidance() {
    let mut unet =
        UNet::new("unet.onnx", config(1, 2, 2, 1), EchoEngine::new(), registry()).unwrap();

    let negative = Tensor::zeros(vec![1, 2]);
    let result = unet.inference(&Tensor::empty(), &negative, &Tensor::empty());
    assert!(matches!(result, Err(UNetError::Tensor(_))));
}

#[test]
fn test_output_shape_checked() {
    let mut unet =
        UNet::new("unet.onnx", config(1, 2, 2, 1), WrongShapeEngine, registry()).unwrap();

    let result = unet.inference(&Tensor::zeros(vec![1]), &Tensor::empty(), &Tensor::empty());
    assert!(matches!(
        result,
        Err(UNetError::OutputShape {
            expected: 4,
            actual: 3
        })
    ));
}

#[test]
fn test_failure_still_recycles_scheduler() {
    let registry = registry();
    {
        let mut unet = UNet::new(
            "unet.onnx",
            config(3, 2, 2, 1),
            FailingEngine,
            Arc::clone(&registry),
        )
        .unwrap();
        let result = unet.inference(&Tensor::zeros(vec![1]), &Tensor::empty(), &Tensor::empty());
        assert!(matches!(result, Err(UNetError::Engine(_))));
    }

    assert_eq!(registry.idle_count(), 1);
    let entity = registry.request_scheduler(&config(3, 2, 2, 1).scheduler);
    assert_eq!(entity.scheduler().state(), SchedulerState::Uninitialized);
}

#[test]
fn test_pipelines_share_one_registry() {
    let registry = registry();
    let first =
        UNet::new("a.onnx", config(1, 2, 2, 1), EchoEngine::new(), Arc::clone(&registry)).unwrap();
    drop(first);
    let _second =
        UNet::new("b.onnx", config(1, 2, 2, 1), EchoEngine::new(), Arc::clone(&registry)).unwrap();

    let stats = registry.stats();
    assert_eq!(stats.constructions, 1);
    assert_eq!(stats.reuses, 1);
}
