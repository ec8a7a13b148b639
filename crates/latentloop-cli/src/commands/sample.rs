//! Dry-run sampling command

use crate::{EngineKind, SampleArgs};
use latentloop_core::{Tensor, codec};
use latentloop_scheduler::{RegistryConfig, SchedulerRegistry};
use latentloop_unet::{EchoEngine, ExecutionEngine, UNet, UNetConfig, ZeroEngine};
use std::error::Error;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Resolve the run configuration from file, preset and flag overrides
pub fn build_config(args: &SampleArgs) -> Result<UNetConfig, Box<dyn Error>> {
    let mut config = match &args.config {
        Some(path) => UNetConfig::from_json_file(path)?,
        None if args.preview => UNetConfig::preview(),
        None => UNetConfig::default(),
    };

    if let Some(kind) = args.scheduler {
        config.scheduler.kind = kind.into();
    }
    if let Some(steps) = args.steps {
        config.steps = steps;
    }
    if let Some(width) = args.width {
        config.width = width;
    }
    if let Some(height) = args.height {
        config.height = height;
    }
    if let Some(channels) = args.channels {
        config.channels = channels;
    }
    if let Some(scale) = args.scale {
        config.guidance_scale = scale;
    }
    if let Some(seed) = args.seed {
        config.scheduler.seed = seed;
    }
    if args.karras {
        config.scheduler.karras = true;
    }

    config.validate()?;
    Ok(config)
}

fn load(path: Option<&Path>) -> Result<Tensor, Box<dyn Error>> {
    match path {
        Some(path) => Ok(codec::read_tensor(path)?),
        None => Ok(Tensor::empty()),
    }
}

pub fn run(args: &SampleArgs) -> Result<(), Box<dyn Error>> {
    let config = build_config(args)?;
    info!(
        scheduler = %config.scheduler.kind,
        steps = config.steps,
        engine = ?args.engine,
        "Sampling"
    );

    let positive = load(args.positive.as_deref())?;
    let negative = load(args.negative.as_deref())?;
    let image = load(args.image.as_deref())?;

    let engine: Box<dyn ExecutionEngine> = match args.engine {
        EngineKind::Echo => Box::new(EchoEngine::new()),
        EngineKind::Zero => Box::new(ZeroEngine::new()),
    };

    let registry = SchedulerRegistry::shared(RegistryConfig::default());
    let latent = {
        let mut unet = UNet::new(args.model.clone(), config, engine, Arc::clone(&registry))?;
        unet.inference(&positive, &negative, &image)?
    };
    debug!(stats = ?registry.stats(), "Registry");

    codec::write_tensor(&args.output, &latent)?;
    println!("Wrote {} to {}", latent.summary(), args.output.display());

    Ok(())
}
