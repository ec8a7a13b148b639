//! Binary tensor files
//!
//! Layout (header little-endian, payload in native byte order):
//!
//! ```text
//! [4 bytes magic "LLTN"] [u32 version] [i32 dtype code] [u32 rank]
//! [rank x u64 dims] [element bytes]
//! ```
//!
//! This is the boundary where element type codes enter the process, so
//! unknown codes and dtypes without storage are rejected here.

use crate::dtype::DType;
use crate::error::{Result, TensorError};
use crate::tensor::{Tensor, TensorData};
use std::path::Path;

/// File magic
pub const MAGIC: [u8; 4] = *b"LLTN";

/// Current format version
pub const FORMAT_VERSION: u32 = 1;

const HEADER_LEN: usize = 16;

/// Encode a tensor into a byte buffer
pub fn encode(tensor: &Tensor) -> Vec<u8> {
    let payload = tensor.buffer().as_bytes();
    let mut out = Vec::with_capacity(HEADER_LEN + tensor.rank() * 8 + payload.len());

    out.extend_from_slice(&MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    out.extend_from_slice(&tensor.dtype().code().to_le_bytes());
    out.extend_from_slice(&(tensor.rank() as u32).to_le_bytes());
    for &dim in tensor.shape() {
        out.extend_from_slice(&(dim as u64).to_le_bytes());
    }
    out.extend_from_slice(payload);

    out
}

/// Decode a tensor from a byte buffer
pub fn decode(bytes: &[u8]) -> Result<Tensor> {
    if bytes.len() < HEADER_LEN {
        return Err(TensorError::Codec(format!(
            "header truncated: {} bytes",
            bytes.len()
        )));
    }
    if bytes[0..4] != MAGIC {
        return Err(TensorError::Codec("bad magic".to_string()));
    }

    let version = read_u32(bytes, 4);
    if version != FORMAT_VERSION {
        return Err(TensorError::Codec(format!(
            "unsupported format version {version}"
        )));
    }

    let dtype = DType::from_code(read_u32(bytes, 8) as i32)?;
    let rank = read_u32(bytes, 12) as usize;

    let dims_end = HEADER_LEN + rank * 8;
    if bytes.len() < dims_end {
        return Err(TensorError::Codec(format!(
            "shape truncated: rank {rank} needs {dims_end} bytes"
        )));
    }
    let shape = (0..rank)
        .map(|i| usize::try_from(read_u64(bytes, HEADER_LEN + i * 8)))
        .collect::<std::result::Result<Vec<usize>, _>>()
        .map_err(|_| TensorError::Codec("dimension exceeds address space".to_string()))?;

    let width = dtype
        .storage_width()
        .ok_or(TensorError::UnsupportedStorage(dtype))?;
    let expected = shape
        .iter()
        .try_fold(width, |acc, &d| acc.checked_mul(d))
        .ok_or_else(|| TensorError::Codec(format!("shape {shape:?} overflows")))?;
    let payload = &bytes[dims_end..];
    if payload.len() != expected {
        return Err(TensorError::Codec(format!(
            "payload is {} bytes, shape {shape:?} of {dtype} needs {expected}",
            payload.len()
        )));
    }

    let data = TensorData::from_bytes(dtype, payload)?;
    Tensor::from_data(shape, data)
}

/// Write a tensor file
pub fn write_tensor(path: impl AsRef<Path>, tensor: &Tensor) -> Result<()> {
    std::fs::write(path, encode(tensor))?;
    Ok(())
}

/// Read a tensor file
pub fn read_tensor(path: impl AsRef<Path>) -> Result<Tensor> {
    let bytes = std::fs::read(path)?;
    decode(&bytes)
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn read_u64(bytes: &[u8], at: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[at..at + 8]);
    u64::from_le_bytes(buf)
}
