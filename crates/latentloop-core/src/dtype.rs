//! Element type table
//!
//! [`DType`] is the closed set of element types an execution engine may hand
//! back. Only a subset has storage in [`TensorData`]; the rest exist so that
//! diagnostics can name what they saw and so that the codec can reject them by
//! name instead of by number.

use crate::error::{Result, TensorError};
use crate::tensor::TensorData;
use serde::{Deserialize, Serialize};

/// Tensor element type
///
/// Discriminants follow the ONNX `TensorProto.DataType` numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum DType {
    Undefined = 0,
    Float32 = 1,
    Uint8 = 2,
    Int8 = 3,
    Uint16 = 4,
    Int16 = 5,
    Int32 = 6,
    Int64 = 7,
    String = 8,
    Bool = 9,
    Float16 = 10,
    Float64 = 11,
    Uint32 = 12,
    Uint64 = 13,
    Complex64 = 14,
    Complex128 = 15,
    BFloat16 = 16,
}

impl DType {
    /// Every known element type, in code order
    pub const ALL: [DType; 17] = [
        DType::Undefined,
        DType::Float32,
        DType::Uint8,
        DType::Int8,
        DType::Uint16,
        DType::Int16,
        DType::Int32,
        DType::Int64,
        DType::String,
        DType::Bool,
        DType::Float16,
        DType::Float64,
        DType::Uint32,
        DType::Uint64,
        DType::Complex64,
        DType::Complex128,
        DType::BFloat16,
    ];

    /// Look up a dtype by its wire code
    pub fn from_code(code: i32) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|dtype| dtype.code() == code)
            .ok_or(TensorError::UnsupportedType(code))
    }

    /// Wire code
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Human-readable name
    pub fn name(self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Float32 => "float32",
            Self::Uint8 => "uint8",
            Self::Int8 => "int8",
            Self::Uint16 => "uint16",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::String => "string",
            Self::Bool => "bool",
            Self::Float16 => "float16",
            Self::Float64 => "float64",
            Self::Uint32 => "uint32",
            Self::Uint64 => "uint64",
            Self::Complex64 => "complex64",
            Self::Complex128 => "complex128",
            Self::BFloat16 => "bfloat16",
        }
    }

    /// Width of one element in bytes, if this dtype has storage
    pub fn storage_width(self) -> Option<usize> {
        match self {
            Self::Float32 | Self::Int32 => Some(4),
            Self::Float64 | Self::Int64 => Some(8),
            Self::Uint8 => Some(1),
            _ => None,
        }
    }
}

impl std::fmt::Display for DType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A scalar type that can back a tensor buffer
pub trait Element: bytemuck::Pod + PartialEq + std::fmt::Debug + Send + Sync + 'static {
    /// Tag stored alongside buffers of this type
    const DTYPE: DType;

    /// Convert from the kernel's working precision
    fn from_f32(value: f32) -> Self;

    /// Convert to the kernel's working precision
    fn to_f32(self) -> f32;

    /// Move a typed buffer into a tagged buffer
    fn wrap(values: Vec<Self>) -> TensorData;

    /// Borrow the typed buffer, if `data` holds this type
    fn slice(data: &TensorData) -> Option<&[Self]>;
}

macro_rules! impl_element {
    ($ty:ty, $dtype:ident, $variant:ident) => {
        impl Element for $ty {
            const DTYPE: DType = DType::$dtype;

            fn from_f32(value: f32) -> Self {
                value as $ty
            }

            fn to_f32(self) -> f32 {
                self as f32
            }

            fn wrap(values: Vec<Self>) -> TensorData {
                TensorData::$variant(values)
            }

            fn slice(data: &TensorData) -> Option<&[Self]> {
                match data {
                    TensorData::$variant(values) => Some(values),
                    _ => None,
                }
            }
        }
    };
}

impl_element!(f32, Float32, F32);
impl_element!(f64, Float64, F64);
impl_element!(i32, Int32, I32);
impl_element!(i64, Int64, I64);
impl_element!(u8, Uint8, U8);
