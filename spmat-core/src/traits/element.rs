//! Scalar type constraints for sparse matrix values
//!
//! This module defines the trait that constrains what types can be
//! stored as values of a sparse matrix and combined by the kernels.

use core::fmt::Debug;
use core::ops::{Add, Mul, Sub};

/// Storage type of a scalar value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DataType {
    F32 = 0,
    F64 = 1,
}

impl DataType {
    /// Get the size in bytes for this data type
    pub const fn size_bytes(&self) -> usize {
        match self {
            DataType::F32 => 4,
            DataType::F64 => 8,
        }
    }
}

impl core::fmt::Display for DataType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DataType::F32 => write!(f, "f32"),
            DataType::F64 => write!(f, "f64"),
        }
    }
}

/// Trait for types that can be stored as sparse matrix values
///
/// All scalar types must be:
/// - `Pod`: plain bytes, so buffers can be zero-initialised and viewed as bytes
/// - `Send + Sync`: shared across the worker pool
/// - closed under `+`, `-` and `*` for the arithmetic kernels
pub trait Scalar:
    bytemuck::Pod
    + PartialEq
    + Debug
    + Send
    + Sync
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
{
    /// The additive identity; also the value of an absent entry
    const ZERO: Self;

    /// The multiplicative identity
    const ONE: Self;

    /// Get the DataType representation for this scalar type
    fn data_type() -> DataType;

    /// Convert from f64 for generic construction
    fn from_f64(value: f64) -> Self;

    /// Convert to f64 for generic comparisons
    fn to_f64(self) -> f64;
}

impl Scalar for f32 {
    const ZERO: Self = 0.0;
    const ONE: Self = 1.0;

    fn data_type() -> DataType {
        DataType::F32
    }

    fn from_f64(value: f64) -> Self {
        value as f32
    }

    fn to_f64(self) -> f64 {
        self as f64
    }
}

impl Scalar for f64 {
    const ZERO: Self = 0.0;
    const ONE: Self = 1.0;

    fn data_type() -> DataType {
        DataType::F64
    }

    fn from_f64(value: f64) -> Self {
        value
    }

    fn to_f64(self) -> f64 {
        self
    }
}
