//! Noise generation command

use latentloop_core::{RandomGenerator, codec, kernel};
use std::path::Path;
use tracing::info;

pub fn run(
    shape: &[usize],
    seed: u64,
    factor: f32,
    output: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut generator = RandomGenerator::seeded(seed);
    let tensor = kernel::random(shape, &mut generator, factor);

    codec::write_tensor(output, &tensor)?;
    info!(path = %output.display(), ?shape, seed, "noise written");
    println!("Wrote {} to {}", tensor.summary(), output.display());

    Ok(())
}
