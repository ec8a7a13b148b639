//! Tensor kernels
//!
//! Pure functions over [`Tensor`] values. Each call reads its inputs through
//! the f32 view and allocates a new buffer for the result; float results keep
//! the device of their first input.

use crate::dtype::Element;
use crate::error::{Result, TensorError};
use crate::random::RandomGenerator;
use crate::tensor::Tensor;

fn float_like(source: &Tensor, shape: Vec<usize>, values: Vec<f32>) -> Tensor {
    Tensor::new(shape, values).with_device(source.device())
}

fn check_counts(op: &'static str, left: usize, right: usize) -> Result<()> {
    if left != right {
        return Err(TensorError::ShapeMismatch { op, left, right });
    }
    Ok(())
}

/// Wrap an explicit buffer as a tensor of `shape`
pub fn create<T: Element>(shape: &[usize], values: Vec<T>) -> Tensor {
    Tensor::new(shape.to_vec(), values)
}

/// Tensor of normal samples, each multiplied by `factor`
///
/// Draws continue the generator's stream, so two calls with the same generator
/// produce different noise.
pub fn random(shape: &[usize], generator: &mut RandomGenerator, factor: f32) -> Tensor {
    let size: usize = shape.iter().product();
    let values: Vec<f32> = (0..size).map(|_| generator.next() * factor).collect();
    Tensor::new(shape.to_vec(), values)
}

/// `x / denominator + offset`, elementwise
pub fn divide(input: &Tensor, denominator: f32, offset: f32) -> Tensor {
    let values = input.as_f32().iter().map(|x| x / denominator + offset).collect();
    float_like(input, input.shape().to_vec(), values)
}

/// `x * multiplier + offset`, elementwise
pub fn multiple(input: &Tensor, multiplier: f32, offset: f32) -> Tensor {
    let values = input.as_f32().iter().map(|x| x * multiplier + offset).collect();
    float_like(input, input.shape().to_vec(), values)
}

/// Copy `input` as element type `T`, keeping its shape
pub fn duplicate<T: Element>(input: &Tensor) -> Tensor {
    let values: Vec<T> = match input.data::<T>() {
        Some(values) => values.to_vec(),
        None => input.as_f32().iter().map(|&x| T::from_f32(x)).collect(),
    };
    Tensor::new(input.shape().to_vec(), values).with_device(input.device())
}

/// Copy `input` as element type `T` under a new shape
///
/// This reinterprets the buffer; the element count of `shape` must match.
pub fn duplicate_into<T: Element>(input: &Tensor, shape: &[usize]) -> Result<Tensor> {
    check_counts(
        "duplicate",
        input.element_count(),
        shape.iter().product::<usize>(),
    )?;
    let (_, data) = duplicate::<T>(input).into_parts();
    Ok(Tensor::from_data(shape.to_vec(), data)?.with_device(input.device()))
}

/// Split a `[N, C, H, W]` tensor along the batch dimension
///
/// The left half holds batches `[0, N/2)` and the right half `[N/2, N)`, each
/// with its `(C, H, W)` layout intact.
pub fn split(input: &Tensor) -> Result<(Tensor, Tensor)> {
    let shape = input.shape();
    if shape.len() != 4 {
        return Err(TensorError::InvalidShape(format!(
            "split expects [N, C, H, W], got {shape:?}"
        )));
    }

    let batches = shape[0];
    if batches < 2 {
        return Err(TensorError::InvalidShape(format!(
            "split needs at least two batches, got {batches}"
        )));
    }

    let split_at = batches / 2;
    let stride = shape[1] * shape[2] * shape[3];
    let values = input.as_f32();
    let (left, right) = values.split_at(split_at * stride);

    let mut left_shape = shape.to_vec();
    left_shape[0] = split_at;
    let mut right_shape = shape.to_vec();
    right_shape[0] = batches - split_at;

    Ok((
        float_like(input, left_shape, left.to_vec()),
        float_like(input, right_shape, right.to_vec()),
    ))
}

/// Concatenate equally shaped tensors, growing dimension `offset`
///
/// Output element `i * size + k` is element `k` of input `i`.
pub fn merge(inputs: &[Tensor], offset: usize) -> Result<Tensor> {
    let first = inputs
        .first()
        .ok_or_else(|| TensorError::InvalidShape("merge of an empty list".to_string()))?;

    if offset >= first.rank() {
        return Err(TensorError::InvalidShape(format!(
            "merge offset {offset} out of range for rank {}",
            first.rank()
        )));
    }

    let mut values = Vec::with_capacity(first.element_count() * inputs.len());
    for input in inputs {
        if input.shape() != first.shape() {
            return Err(TensorError::InvalidShape(format!(
                "merge of {:?} with {:?}",
                first.shape(),
                input.shape()
            )));
        }
        values.extend_from_slice(&input.as_f32());
    }

    let mut shape = first.shape().to_vec();
    shape[offset] *= inputs.len();
    Ok(float_like(first, shape, values))
}

/// Classifier-free guidance: `left + scale * (right - left)`
///
/// `left` is the unconditioned (or negative) prediction, `right` the
/// conditioned one. The result takes the shape of `left`.
pub fn guidance(left: &Tensor, right: &Tensor, scale: f32) -> Result<Tensor> {
    check_counts("guidance", left.element_count(), right.element_count())?;

    // Evaluated as `left * (1 - scale) + right * scale`. Equal to the form
    // above, but rounds differently at scales like 7.5; scale 0 and 1
    // reproduce the operands exactly.
    let keep = 1.0 - scale;
    let values = left
        .as_f32()
        .iter()
        .zip(right.as_f32().iter())
        .map(|(l, r)| l * keep + r * scale)
        .collect();
    Ok(float_like(left, left.shape().to_vec(), values))
}

/// Scale slices of `left` by per-slice weights taken from `right`
///
/// `left` is cut into groups over its leading `rank - offset` dimensions and
/// group `g` is multiplied by `right[g]`. With `renormalize`, the result is
/// rescaled so that its mean matches the mean of `left`.
pub fn weight(left: &Tensor, right: &Tensor, offset: usize, renormalize: bool) -> Result<Tensor> {
    let rank = left.rank();
    if offset > rank {
        return Err(TensorError::InvalidShape(format!(
            "weight offset {offset} exceeds rank {rank}"
        )));
    }

    let groups: usize = left.shape()[..rank - offset].iter().product();
    let input = left.as_f32();
    if groups == 0 || input.is_empty() {
        return Ok(float_like(left, left.shape().to_vec(), input.to_vec()));
    }

    let weights = right.as_f32();
    if weights.len() < groups {
        return Err(TensorError::ShapeMismatch {
            op: "weight",
            left: groups,
            right: weights.len(),
        });
    }

    let single = input.len() / groups;
    let mut values = Vec::with_capacity(input.len());
    let mut original_mean = 0.0f32;
    let mut weighted_mean = 0.0f32;

    for (group, chunk) in input.chunks(single).enumerate() {
        let w = weights[group];
        for &x in chunk {
            let weighted = x * w;
            values.push(weighted);
            original_mean += x / single as f32;
            weighted_mean += weighted / single as f32;
        }
    }

    let result = float_like(left, left.shape().to_vec(), values);
    if renormalize && weighted_mean != 0.0 {
        return Ok(multiple(&result, original_mean / weighted_mean, 0.0));
    }
    Ok(result)
}

/// Elementwise `left + right`, shaped as `shape`
pub fn add(left: &Tensor, right: &Tensor, shape: &[usize]) -> Result<Tensor> {
    binary("add", left, right, shape, |l, r| l + r)
}

/// Elementwise `left - right`, shaped as `shape`
pub fn sub(left: &Tensor, right: &Tensor, shape: &[usize]) -> Result<Tensor> {
    binary("sub", left, right, shape, |l, r| l - r)
}

fn binary(
    op: &'static str,
    left: &Tensor,
    right: &Tensor,
    shape: &[usize],
    f: impl Fn(f32, f32) -> f32,
) -> Result<Tensor> {
    check_counts(op, left.element_count(), right.element_count())?;
    check_counts(op, left.element_count(), shape.iter().product::<usize>())?;

    let values = left
        .as_f32()
        .iter()
        .zip(right.as_f32().iter())
        .map(|(&l, &r)| f(l, r))
        .collect();
    Ok(float_like(left, shape.to_vec(), values))
}

/// Sum of all `inputs`, shaped as `shape`
pub fn sum(inputs: &[Tensor], shape: &[usize]) -> Result<Tensor> {
    let (first, rest) = inputs
        .split_first()
        .ok_or_else(|| TensorError::InvalidShape("sum of an empty list".to_string()))?;

    let mut result = duplicate_into::<f32>(first, shape)?;
    for input in rest {
        result = add(&result, input, shape)?;
    }
    Ok(result)
}
