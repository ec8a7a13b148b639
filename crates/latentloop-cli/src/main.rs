//! latentloop CLI - dry-run sampling and tensor file tools
//!
//! Runs the denoising loop against built-in stand-in engines, and reads and
//! writes the binary tensor files the loop consumes.

use clap::{Parser, Subcommand};
use latentloop_scheduler::SchedulerKind;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

mod commands;

/// latentloop - diffusion sampling loop
#[derive(Parser)]
#[command(name = "latentloop")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the sampling loop with a dry-run engine
    Sample(SampleArgs),

    /// Write a tensor of normal noise
    Noise {
        /// Shape, comma separated
        #[arg(short, long, value_delimiter = ',', default_value = "1,4,64,64")]
        shape: Vec<usize>,

        /// Seed (0 keeps the default stream)
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Multiplier applied to every sample
        #[arg(short, long, default_value = "1.0")]
        factor: f32,

        /// Output tensor file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Describe a tensor file
    Inspect {
        /// Tensor file
        input: PathBuf,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// List available schedulers
    Schedulers,
}

/// Options for `sample`
#[derive(clap::Args)]
pub struct SampleArgs {
    /// UNet config file (JSON)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Start from the small preview config instead of the defaults
    #[arg(long)]
    pub preview: bool,

    /// Model path recorded with the run
    #[arg(long, default_value = "unet.onnx")]
    pub model: PathBuf,

    /// Stand-in engine
    #[arg(short, long, value_enum, default_value = "zero")]
    pub engine: EngineKind,

    /// Override the scheduler algorithm
    #[arg(long, value_enum)]
    pub scheduler: Option<SchedulerArg>,

    /// Override the step count
    #[arg(long)]
    pub steps: Option<usize>,

    /// Override the latent width
    #[arg(long)]
    pub width: Option<usize>,

    /// Override the latent height
    #[arg(long)]
    pub height: Option<usize>,

    /// Override the latent channels
    #[arg(long)]
    pub channels: Option<usize>,

    /// Override the guidance scale
    #[arg(long)]
    pub scale: Option<f32>,

    /// Override the noise seed
    #[arg(long)]
    pub seed: Option<u64>,

    /// Use Karras sigma spacing
    #[arg(long)]
    pub karras: bool,

    /// Positive conditioning tensor file
    #[arg(long)]
    pub positive: Option<PathBuf>,

    /// Negative conditioning tensor file
    #[arg(long)]
    pub negative: Option<PathBuf>,

    /// Encoded image tensor file
    #[arg(long)]
    pub image: Option<PathBuf>,

    /// Output latent tensor file
    #[arg(short, long)]
    pub output: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum EngineKind {
    /// Predict the latent it was given
    Echo,
    /// Predict zero noise
    Zero,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SchedulerArg {
    /// Deterministic DDIM
    Ddim,
    /// Euler discrete
    Euler,
}

impl From<SchedulerArg> for SchedulerKind {
    fn from(arg: SchedulerArg) -> Self {
        match arg {
            SchedulerArg::Ddim => SchedulerKind::Ddim,
            SchedulerArg::Euler => SchedulerKind::Euler,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_ansi(!cli.no_color)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Sample(args) => commands::sample::run(&args)?,

        Commands::Noise {
            shape,
            seed,
            factor,
            output,
        } => commands::noise::run(&shape, seed, factor, &output)?,

        Commands::Inspect { input, json } => commands::inspect::run(&input, json)?,

        Commands::Schedulers => commands::schedulers::run(),
    }

    Ok(())
}
