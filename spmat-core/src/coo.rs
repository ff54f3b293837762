//! Coordinate-list sparse matrices
//!
//! A [`Coo`] is typically built once from external input and consumed
//! exactly once by conversion into a CSR matrix. Coordinates are neither
//! ordered nor deduplicated by the type.

use alloc::vec::Vec;

use crate::buffer::Buffer;
use crate::traits::{Scalar, SparseMatrix};
use crate::validation::{validate_column_bounds, validate_row_bounds, validate_shape};
use crate::{Index, Result, SpmatError};

/// Sparse matrix stored as parallel row, column and value buffers
#[derive(Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Coo<T> {
    rows: usize,
    cols: usize,
    row_index: Buffer<Index>,
    col_index: Buffer<Index>,
    values: Buffer<T>,
}

impl<T> Coo<T> {
    /// Build a coordinate matrix, taking ownership of the buffers
    ///
    /// The three buffers must have the same length. Coordinate bounds are
    /// checked in debug builds only.
    pub fn new(
        rows: usize,
        cols: usize,
        row_index: Buffer<Index>,
        col_index: Buffer<Index>,
        values: Buffer<T>,
    ) -> Result<Self> {
        validate_shape(rows, cols)?;
        if col_index.len() != row_index.len() {
            return Err(SpmatError::LengthMismatch {
                expected: row_index.len(),
                found: col_index.len(),
            });
        }
        if values.len() != row_index.len() {
            return Err(SpmatError::LengthMismatch {
                expected: row_index.len(),
                found: values.len(),
            });
        }
        let coo = Self {
            rows,
            cols,
            row_index,
            col_index,
            values,
        };
        if cfg!(debug_assertions) {
            coo.validate()?;
        }
        Ok(coo)
    }

    /// Build a coordinate matrix with no stored entries
    pub fn empty(rows: usize, cols: usize) -> Result<Self> {
        Self::new(rows, cols, Buffer::new(), Buffer::new(), Buffer::new())
    }

    /// Check every coordinate against the matrix shape
    pub fn validate(&self) -> Result<()> {
        validate_row_bounds(&self.row_index, self.rows)?;
        validate_column_bounds(&self.col_index, self.cols)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Number of stored coordinates, duplicates included
    pub fn nnz(&self) -> usize {
        self.row_index.len()
    }

    pub fn row_index(&self) -> &[Index] {
        &self.row_index
    }

    pub fn col_index(&self) -> &[Index] {
        &self.col_index
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    /// Split into `(rows, cols, row_index, col_index, values)`
    pub fn into_parts(self) -> (usize, usize, Buffer<Index>, Buffer<Index>, Buffer<T>) {
        (
            self.rows,
            self.cols,
            self.row_index,
            self.col_index,
            self.values,
        )
    }
}

impl<T: Copy> Coo<T> {
    /// Build a coordinate matrix from `(row, col, value)` triplets
    ///
    /// Unlike [`Coo::new`], bounds are always checked since the indices are
    /// narrowed to [`Index`] here.
    pub fn from_triplets(rows: usize, cols: usize, triplets: &[(usize, usize, T)]) -> Result<Self> {
        validate_shape(rows, cols)?;
        let mut row_index = Vec::with_capacity(triplets.len());
        let mut col_index = Vec::with_capacity(triplets.len());
        let mut values = Vec::with_capacity(triplets.len());
        for &(r, c, v) in triplets {
            if r >= rows {
                return Err(SpmatError::RowOutOfBounds { index: r, rows });
            }
            if c >= cols {
                return Err(SpmatError::ColumnOutOfBounds { index: c, cols });
            }
            row_index.push(r as Index);
            col_index.push(c as Index);
            values.push(v);
        }
        Self::new(
            rows,
            cols,
            Buffer::from_vec(row_index),
            Buffer::from_vec(col_index),
            Buffer::from_vec(values),
        )
    }
}

impl<T: Scalar> SparseMatrix for Coo<T> {
    type Element = T;

    /// Returns the last stored value at `(row, col)`, if any
    fn get_element(&self, row: usize, col: usize) -> Option<T> {
        self.row_index
            .iter()
            .zip(self.col_index.iter())
            .zip(self.values.iter())
            .rev()
            .find(|((&r, &c), _)| r as usize == row && c as usize == col)
            .map(|(_, &v)| v)
    }

    fn dimensions(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    fn nnz(&self) -> usize {
        self.row_index.len()
    }
}
