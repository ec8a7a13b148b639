//! Tensor inspection command

use latentloop_core::codec;
use std::path::Path;

pub fn run(input: &Path, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    let tensor = codec::read_tensor(input)?;
    let summary = tensor.summary();

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("Tensor: {}", input.display());
    println!("==============================");
    println!("Type:       {} (code {})", summary.dtype, summary.dtype.code());
    println!("Shape:      {:?}", summary.shape);
    println!("Elements:   {}", summary.count);
    println!("Device:     {:?}", tensor.device());
    println!();
    println!("Min:        {:.6}", summary.min);
    println!("Max:        {:.6}", summary.max);
    println!("Mean:       {:.6}", summary.mean);
    if summary.non_finite > 0 {
        println!("Non-finite: {}", summary.non_finite);
    }

    Ok(())
}
