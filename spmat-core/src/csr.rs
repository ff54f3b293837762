//! Row-compressed sparse matrices
//!
//! Two small types cover the CSR layout:
//!
//! - [`CsrView`] borrows externally owned buffers and cannot outlive them.
//!   It accepts both the 3-array layout (one `rows + 1` pointer array) and
//!   the 4-array layout (independent row start and row end arrays, which
//!   allows rows to live anywhere in the shared storage).
//! - [`Csr`] owns its buffers and always uses the 3-array layout. Every
//!   kernel returns one.

use core::ops::Range;

use crate::traits::{Scalar, SparseMatrix};
use crate::validation::{validate_column_bounds, validate_row_ranges, validate_shape};
use crate::{Index, Result, SpmatError};

#[cfg(feature = "alloc")]
use crate::buffer::Buffer;
#[cfg(feature = "alloc")]
use crate::validation::validate_row_pointers;
#[cfg(feature = "alloc")]
use alloc::vec::Vec;

/// Per-row offsets into the shared column index and value storage
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RowPointers<'a> {
    /// One `rows + 1` array; row `i` spans `ptr[i]..ptr[i + 1]`
    Compressed(&'a [usize]),
    /// Independent arrays; row `i` spans `start[i]..end[i]`
    Split {
        start: &'a [usize],
        end: &'a [usize],
    },
}

impl<'a> RowPointers<'a> {
    #[inline]
    pub fn start(&self, row: usize) -> usize {
        match self {
            RowPointers::Compressed(ptr) => ptr[row],
            RowPointers::Split { start, .. } => start[row],
        }
    }

    #[inline]
    pub fn end(&self, row: usize) -> usize {
        match self {
            RowPointers::Compressed(ptr) => ptr[row + 1],
            RowPointers::Split { end, .. } => end[row],
        }
    }

    #[inline]
    pub fn range(&self, row: usize) -> Range<usize> {
        self.start(row)..self.end(row)
    }

    pub fn is_compressed(&self) -> bool {
        matches!(self, RowPointers::Compressed(_))
    }
}

/// Borrowed CSR matrix
#[derive(Debug, Clone, Copy)]
pub struct CsrView<'a, T> {
    rows: usize,
    cols: usize,
    nnz: usize,
    pointers: RowPointers<'a>,
    col_index: &'a [Index],
    values: &'a [T],
}

impl<'a, T> CsrView<'a, T> {
    /// Borrow a 3-array CSR matrix
    ///
    /// `row_ptr` has `rows + 1` entries. It does not need to start at zero,
    /// but `row_ptr[rows]` must not exceed the storage length.
    pub fn new(
        rows: usize,
        cols: usize,
        row_ptr: &'a [usize],
        col_index: &'a [Index],
        values: &'a [T],
    ) -> Result<Self> {
        validate_shape(rows, cols)?;
        check_storage(col_index.len(), values.len())?;
        if row_ptr.len() != rows + 1 {
            return Err(SpmatError::LengthMismatch {
                expected: rows + 1,
                found: row_ptr.len(),
            });
        }
        if row_ptr[rows] < row_ptr[0] || row_ptr[rows] > col_index.len() {
            return Err(SpmatError::InvalidRowPointers { row: rows });
        }
        let view = Self {
            rows,
            cols,
            nnz: row_ptr[rows] - row_ptr[0],
            pointers: RowPointers::Compressed(row_ptr),
            col_index,
            values,
        };
        if cfg!(debug_assertions) {
            view.validate()?;
        }
        Ok(view)
    }

    /// Borrow a 4-array CSR matrix with independent row start and end arrays
    pub fn from_parts(
        rows: usize,
        cols: usize,
        row_start: &'a [usize],
        row_end: &'a [usize],
        col_index: &'a [Index],
        values: &'a [T],
    ) -> Result<Self> {
        validate_shape(rows, cols)?;
        check_storage(col_index.len(), values.len())?;
        if row_start.len() != rows {
            return Err(SpmatError::LengthMismatch {
                expected: rows,
                found: row_start.len(),
            });
        }
        let nnz = validate_row_ranges(row_start, row_end, col_index.len())?;
        let view = Self {
            rows,
            cols,
            nnz,
            pointers: RowPointers::Split {
                start: row_start,
                end: row_end,
            },
            col_index,
            values,
        };
        if cfg!(debug_assertions) {
            view.validate()?;
        }
        Ok(view)
    }

    /// Run the full structural check: pointer order and column bounds
    pub fn validate(&self) -> Result<()> {
        if let RowPointers::Compressed(ptr) = self.pointers {
            if let Some(row) = ptr.windows(2).position(|w| w[0] > w[1]) {
                return Err(SpmatError::InvalidRowPointers { row });
            }
        }
        (0..self.rows).try_for_each(|i| {
            validate_column_bounds(&self.col_index[self.pointers.range(i)], self.cols)
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Number of stored entries, the sum of all row lengths
    pub fn nnz(&self) -> usize {
        self.nnz
    }

    pub fn pointers(&self) -> RowPointers<'a> {
        self.pointers
    }

    pub fn is_compressed(&self) -> bool {
        self.pointers.is_compressed()
    }

    /// The whole column index storage, including any unused gaps
    pub fn col_index(&self) -> &'a [Index] {
        self.col_index
    }

    /// The whole value storage, including any unused gaps
    pub fn values(&self) -> &'a [T] {
        self.values
    }

    #[inline]
    pub fn row_len(&self, row: usize) -> usize {
        self.pointers.end(row) - self.pointers.start(row)
    }

    /// Column indices and values of one row
    #[inline]
    pub fn row(&self, row: usize) -> (&'a [Index], &'a [T]) {
        let range = self.pointers.range(row);
        (&self.col_index[range.clone()], &self.values[range])
    }

    /// The contiguous storage of a 3-array view
    ///
    /// Returns the row pointer and the storage slices it addresses, or
    /// `None` for a 4-array view.
    pub fn contiguous(&self) -> Option<(&'a [usize], &'a [Index], &'a [T])> {
        match self.pointers {
            RowPointers::Compressed(ptr) => {
                let range = ptr[0]..ptr[self.rows];
                Some((ptr, &self.col_index[range.clone()], &self.values[range]))
            }
            RowPointers::Split { .. } => None,
        }
    }
}

impl<'a, T: Copy> CsrView<'a, T> {
    /// Iterate over all stored `(row, col, value)` entries in row order
    pub fn triplets(&self) -> impl Iterator<Item = (usize, usize, T)> + 'a {
        let view = *self;
        (0..view.rows).flat_map(move |i| {
            let (cols, vals) = view.row(i);
            cols.iter()
                .zip(vals.iter())
                .map(move |(&c, &v)| (i, c as usize, v))
        })
    }
}

#[cfg(feature = "alloc")]
impl<'a, T: Scalar> CsrView<'a, T> {
    /// Copy into an owned 3-array matrix with rows laid out in order
    pub fn to_owned_compact(&self) -> Result<Csr<T>> {
        let mut row_ptr = Buffer::allocate(self.rows + 1)?;
        for i in 0..self.rows {
            row_ptr[i + 1] = row_ptr[i] + self.row_len(i);
        }
        let mut col_index = Vec::new();
        let mut values = Vec::new();
        col_index
            .try_reserve_exact(self.nnz)
            .and_then(|_| values.try_reserve_exact(self.nnz))
            .map_err(|_| SpmatError::AllocationFailed { elements: self.nnz })?;
        for i in 0..self.rows {
            let (cols, vals) = self.row(i);
            col_index.extend_from_slice(cols);
            values.extend_from_slice(vals);
        }
        Csr::from_parts(
            self.rows,
            self.cols,
            row_ptr,
            Buffer::from_vec(col_index),
            Buffer::from_vec(values),
        )
    }
}

impl<'a, T: Scalar> SparseMatrix for CsrView<'a, T> {
    type Element = T;

    fn get_element(&self, row: usize, col: usize) -> Option<T> {
        if row >= self.rows {
            return None;
        }
        let (cols, vals) = self.row(row);
        cols.iter()
            .position(|&c| c as usize == col)
            .map(|pos| vals[pos])
    }

    fn dimensions(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    fn nnz(&self) -> usize {
        self.nnz
    }
}

fn check_storage(col_len: usize, value_len: usize) -> Result<()> {
    if col_len != value_len {
        return Err(SpmatError::LengthMismatch {
            expected: col_len,
            found: value_len,
        });
    }
    Ok(())
}

/// Owned CSR matrix in the 3-array layout
#[cfg(feature = "alloc")]
#[derive(Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Csr<T> {
    rows: usize,
    cols: usize,
    row_ptr: Buffer<usize>,
    col_index: Buffer<Index>,
    values: Buffer<T>,
}

#[cfg(feature = "alloc")]
impl<T: Scalar> Csr<T> {
    /// Create a matrix with no stored entries; every row pointer is zero
    pub fn empty(rows: usize, cols: usize) -> Result<Self> {
        validate_shape(rows, cols)?;
        Ok(Self {
            rows,
            cols,
            row_ptr: Buffer::allocate(rows + 1)?,
            col_index: Buffer::new(),
            values: Buffer::new(),
        })
    }

    /// Create the `n x n` identity matrix
    pub fn identity(n: usize) -> Result<Self> {
        validate_shape(n, n)?;
        Self::from_parts(
            n,
            n,
            Buffer::from_vec((0..=n).collect()),
            Buffer::from_vec((0..n as Index).collect()),
            Buffer::filled(n, T::ONE)?,
        )
    }

    /// Assemble a matrix from owned buffers
    ///
    /// `row_ptr` must have `rows + 1` entries, start at zero and end at the
    /// storage length. Pointer order and column bounds are checked in debug
    /// builds only.
    pub fn from_parts(
        rows: usize,
        cols: usize,
        row_ptr: Buffer<usize>,
        col_index: Buffer<Index>,
        values: Buffer<T>,
    ) -> Result<Self> {
        validate_shape(rows, cols)?;
        check_storage(col_index.len(), values.len())?;
        if row_ptr.len() != rows + 1 {
            return Err(SpmatError::LengthMismatch {
                expected: rows + 1,
                found: row_ptr.len(),
            });
        }
        if row_ptr[0] != 0 {
            return Err(SpmatError::InvalidRowPointers { row: 0 });
        }
        if row_ptr[rows] != col_index.len() {
            return Err(SpmatError::LengthMismatch {
                expected: row_ptr[rows],
                found: col_index.len(),
            });
        }
        let csr = Self {
            rows,
            cols,
            row_ptr,
            col_index,
            values,
        };
        if cfg!(debug_assertions) {
            csr.validate()?;
        }
        Ok(csr)
    }

    /// Run the full structural check: pointer order and column bounds
    pub fn validate(&self) -> Result<()> {
        validate_row_pointers(&self.row_ptr, self.rows, self.col_index.len())?;
        validate_column_bounds(&self.col_index, self.cols)
    }

    /// Borrow this matrix as a view
    pub fn view(&self) -> CsrView<'_, T> {
        CsrView {
            rows: self.rows,
            cols: self.cols,
            nnz: self.col_index.len(),
            pointers: RowPointers::Compressed(&self.row_ptr),
            col_index: &self.col_index,
            values: &self.values,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn nnz(&self) -> usize {
        self.col_index.len()
    }

    pub fn row_ptr(&self) -> &[usize] {
        &self.row_ptr
    }

    pub fn col_index(&self) -> &[Index] {
        &self.col_index
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    /// Column indices and values of one row
    pub fn row(&self, row: usize) -> (&[Index], &[T]) {
        let range = self.row_ptr[row]..self.row_ptr[row + 1];
        (&self.col_index[range.clone()], &self.values[range])
    }

    /// Iterate over all stored `(row, col, value)` entries in row order
    pub fn triplets(&self) -> impl Iterator<Item = (usize, usize, T)> + '_ {
        self.view().triplets()
    }

    /// Expand into a row-major dense array; duplicate entries are summed
    pub fn to_dense(&self) -> Vec<T> {
        let mut dense = alloc::vec![T::ZERO; self.rows * self.cols];
        for (r, c, v) in self.triplets() {
            let slot = &mut dense[r * self.cols + c];
            *slot = *slot + v;
        }
        dense
    }

    /// Split into `(rows, cols, row_ptr, col_index, values)`
    pub fn into_parts(self) -> (usize, usize, Buffer<usize>, Buffer<Index>, Buffer<T>) {
        (
            self.rows,
            self.cols,
            self.row_ptr,
            self.col_index,
            self.values,
        )
    }
}

#[cfg(feature = "alloc")]
impl<T: Scalar> SparseMatrix for Csr<T> {
    type Element = T;

    fn get_element(&self, row: usize, col: usize) -> Option<T> {
        self.view().get_element(row, col)
    }

    fn dimensions(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    fn nnz(&self) -> usize {
        self.col_index.len()
    }
}
