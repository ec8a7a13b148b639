//! Tensor value type

use crate::dtype::{DType, Element};
use crate::error::{Result, TensorError};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Where a tensor's buffer lives
///
/// Kernels allocate results on the device of their first input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Device {
    #[default]
    Cpu,
    Cuda(u32),
}

/// Typed, contiguous element buffer
#[derive(Debug, Clone, PartialEq)]
pub enum TensorData {
    F32(Vec<f32>),
    F64(Vec<f64>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    U8(Vec<u8>),
}

impl TensorData {
    /// Element type of the buffer
    pub fn dtype(&self) -> DType {
        match self {
            Self::F32(_) => DType::Float32,
            Self::F64(_) => DType::Float64,
            Self::I32(_) => DType::Int32,
            Self::I64(_) => DType::Int64,
            Self::U8(_) => DType::Uint8,
        }
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        match self {
            Self::F32(v) => v.len(),
            Self::F64(v) => v.len(),
            Self::I32(v) => v.len(),
            Self::I64(v) => v.len(),
            Self::U8(v) => v.len(),
        }
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Raw element bytes in native byte order
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::F32(v) => bytemuck::cast_slice(v),
            Self::F64(v) => bytemuck::cast_slice(v),
            Self::I32(v) => bytemuck::cast_slice(v),
            Self::I64(v) => bytemuck::cast_slice(v),
            Self::U8(v) => v,
        }
    }

    /// Rebuild a buffer of `dtype` from raw native-order bytes
    pub fn from_bytes(dtype: DType, bytes: &[u8]) -> Result<Self> {
        let width = dtype
            .storage_width()
            .ok_or(TensorError::UnsupportedStorage(dtype))?;
        if bytes.len() % width != 0 {
            return Err(TensorError::Codec(format!(
                "{} bytes is not a whole number of {} elements",
                bytes.len(),
                dtype
            )));
        }

        let data = match dtype {
            DType::Float32 => Self::F32(bytemuck::pod_collect_to_vec(bytes)),
            DType::Float64 => Self::F64(bytemuck::pod_collect_to_vec(bytes)),
            DType::Int32 => Self::I32(bytemuck::pod_collect_to_vec(bytes)),
            DType::Int64 => Self::I64(bytemuck::pod_collect_to_vec(bytes)),
            DType::Uint8 => Self::U8(bytes.to_vec()),
            other => return Err(TensorError::UnsupportedStorage(other)),
        };
        Ok(data)
    }

    fn to_f32_vec(&self) -> Vec<f32> {
        match self {
            Self::F32(v) => v.clone(),
            Self::F64(v) => v.iter().map(|&x| x.to_f32()).collect(),
            Self::I32(v) => v.iter().map(|&x| x.to_f32()).collect(),
            Self::I64(v) => v.iter().map(|&x| x.to_f32()).collect(),
            Self::U8(v) => v.iter().map(|&x| x.to_f32()).collect(),
        }
    }
}

/// Shaped tensor value
///
/// Immutable once created: kernels read a tensor and allocate a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: Vec<usize>,
    data: TensorData,
    device: Device,
}

impl Tensor {
    /// Wrap a typed buffer as a tensor of `shape`
    ///
    /// The buffer length must equal the product of `shape`.
    pub fn new<T: Element>(shape: Vec<usize>, values: Vec<T>) -> Self {
        debug_assert_eq!(
            values.len(),
            shape.iter().product::<usize>(),
            "buffer length does not match shape {shape:?}"
        );
        Self {
            shape,
            data: T::wrap(values),
            device: Device::Cpu,
        }
    }

    /// Wrap an already tagged buffer
    pub fn from_data(shape: Vec<usize>, data: TensorData) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(TensorError::ShapeMismatch {
                op: "from_data",
                left: expected,
                right: data.len(),
            });
        }
        Ok(Self {
            shape,
            data,
            device: Device::Cpu,
        })
    }

    /// The empty tensor: shape `[0]`, no elements
    pub fn empty() -> Self {
        Self::new::<f32>(vec![0], Vec::new())
    }

    /// A zero-filled float tensor
    pub fn zeros(shape: Vec<usize>) -> Self {
        let size: usize = shape.iter().product();
        Self::new(shape, vec![0.0f32; size])
    }

    /// Move this tensor to another device descriptor
    pub fn with_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    /// Shape
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of dimensions
    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Element type
    pub fn dtype(&self) -> DType {
        self.data.dtype()
    }

    /// Device descriptor
    pub fn device(&self) -> Device {
        self.device
    }

    /// Total elements
    pub fn element_count(&self) -> usize {
        self.data.len()
    }

    /// Check if the tensor holds no elements
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Tagged buffer
    pub fn buffer(&self) -> &TensorData {
        &self.data
    }

    /// Typed buffer, if the tensor holds `T`
    pub fn data<T: Element>(&self) -> Option<&[T]> {
        T::slice(&self.data)
    }

    /// Float view of the buffer, converting when the tensor is not f32
    pub fn as_f32(&self) -> Cow<'_, [f32]> {
        match &self.data {
            TensorData::F32(values) => Cow::Borrowed(values),
            other => Cow::Owned(other.to_f32_vec()),
        }
    }

    /// Consume into shape and buffer
    pub fn into_parts(self) -> (Vec<usize>, TensorData) {
        (self.shape, self.data)
    }

    /// Min, max and mean of the float view
    pub fn summary(&self) -> TensorSummary {
        let values = self.as_f32();
        let (min, max, sum) = values.iter().fold(
            (f32::INFINITY, f32::NEG_INFINITY, 0.0f64),
            |(min, max, sum), &v| (min.min(v), max.max(v), sum + v as f64),
        );
        let count = values.len();

        TensorSummary {
            dtype: self.dtype(),
            shape: self.shape.clone(),
            count,
            min: if count == 0 { 0.0 } else { min },
            max: if count == 0 { 0.0 } else { max },
            mean: if count == 0 { 0.0 } else { (sum / count as f64) as f32 },
            non_finite: values.iter().filter(|v| !v.is_finite()).count(),
        }
    }
}

/// Value summary used in logs and by `inspect`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TensorSummary {
    pub dtype: DType,
    pub shape: Vec<usize>,
    pub count: usize,
    pub min: f32,
    pub max: f32,
    pub mean: f32,
    /// NaN or infinite elements
    pub non_finite: usize,
}

impl std::fmt::Display for TensorSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {:?} min={:.4} max={:.4} mean={:.4}",
            self.dtype, self.shape, self.min, self.max, self.mean
        )?;
        if self.non_finite > 0 {
            write!(f, " non_finite={}", self.non_finite)?;
        }
        Ok(())
    }
}
