//! Owned fixed-size element storage
//!
//! [`Buffer`] is the backing store for every index and value array of the
//! sparse layouts. It never grows implicitly and cannot be copied by
//! accident: it is moved between owners and released exactly once when the
//! last owner drops it.

use alloc::vec::Vec;
use core::ops::{Deref, DerefMut};

use crate::error::{Result, SpmatError};

/// Owned, fixed-size, contiguous storage of `T`
#[derive(Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Buffer<T> {
    data: Vec<T>,
}

impl<T> Buffer<T> {
    /// Create an empty buffer without allocating
    pub const fn new() -> Self {
        Self { data: Vec::new() }
    }

    /// Take ownership of an existing vector
    pub fn from_vec(data: Vec<T>) -> Self {
        Self { data }
    }

    /// Number of elements in the buffer
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the buffer holds no elements
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Release the backing store, leaving an empty buffer
    pub fn clear(&mut self) {
        self.data = Vec::new();
    }

    /// Give up ownership of the storage
    pub fn into_vec(self) -> Vec<T> {
        self.data
    }
}

impl<T: Copy> Buffer<T> {
    /// Allocate `len` elements, all set to `value`
    pub fn filled(len: usize, value: T) -> Result<Self> {
        let mut data = Vec::new();
        data.try_reserve_exact(len)
            .map_err(|_| SpmatError::AllocationFailed { elements: len })?;
        data.resize(len, value);
        Ok(Self { data })
    }

    /// Allocate a buffer holding a copy of `values`
    pub fn from_slice(values: &[T]) -> Result<Self> {
        let mut data = Vec::new();
        data.try_reserve_exact(values.len())
            .map_err(|_| SpmatError::AllocationFailed {
                elements: values.len(),
            })?;
        data.extend_from_slice(values);
        Ok(Self { data })
    }
}

impl<T: bytemuck::Zeroable + Copy> Buffer<T> {
    /// Allocate `len` zero-initialised elements
    pub fn allocate(len: usize) -> Result<Self> {
        Self::filled(len, T::zeroed())
    }

    /// Change the number of elements
    ///
    /// Prior contents are discarded and the new storage is zeroed, unless
    /// `len` equals the current length, in which case nothing happens.
    pub fn resize(&mut self, len: usize) -> Result<()> {
        if len == self.len() {
            return Ok(());
        }
        self.clear();
        *self = Self::allocate(len)?;
        Ok(())
    }
}

impl<T: bytemuck::Pod> Buffer<T> {
    /// View the elements as raw bytes without copying
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }
}

impl<T> Default for Buffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Deref for Buffer<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.data
    }
}

impl<T> DerefMut for Buffer<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        &mut self.data
    }
}

impl<T> From<Vec<T>> for Buffer<T> {
    fn from(data: Vec<T>) -> Self {
        Self::from_vec(data)
    }
}
