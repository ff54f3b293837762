//! Batched sparse tensors
//!
//! A [`SparseTensor`] stores either a single CSR matrix (rank 2) or a batch
//! of same-shaped CSR matrices (rank 3) as a chain of compressed levels.
//!
//! For rank 2 the only level is the matrix itself: `outer` is the row
//! pointer and `inner` the column indices.
//!
//! For rank 3 the first level lists, per batch element, the ids of its
//! non-empty rows (`outer` has `batch + 1` offsets into `inner`). The second
//! level holds the columns of those rows back to back (`outer` has one
//! offset per non-empty row plus one). Values run parallel to the columns.

use std::borrow::Cow;

use rayon::prelude::*;
use spmat_core::{
    validate_column_bounds, validate_level, Buffer, Coo, Csr, CsrView, Index, Result, Scalar,
    SparseBackend, SpmatError,
};

use crate::kernel::scatter::{allocate_storage, prefix_sum, row_slots};

/// One compressed level of a [`SparseTensor`]
#[derive(Debug, Default, PartialEq)]
pub struct DimLevel {
    inner: Buffer<Index>,
    outer: Buffer<usize>,
}

impl DimLevel {
    pub fn new(inner: Buffer<Index>, outer: Buffer<usize>) -> Self {
        Self { inner, outer }
    }

    /// Indices stored at this level
    pub fn inner(&self) -> &[Index] {
        &self.inner
    }

    /// Offsets into [`inner`](Self::inner), one per parent entry plus one
    pub fn outer(&self) -> &[usize] {
        &self.outer
    }
}

/// Sparse tensor of rank 2 or 3 in compressed level form
#[derive(Debug, PartialEq)]
pub struct SparseTensor<T> {
    shape: Vec<usize>,
    values: Buffer<T>,
    dims: Vec<DimLevel>,
}

impl<T> Default for SparseTensor<T> {
    fn default() -> Self {
        Self {
            shape: Vec::new(),
            values: Buffer::new(),
            dims: Vec::new(),
        }
    }
}

/// One batch element unpacked from a [`SparseTensor`]
///
/// Storage is borrowed from the tensor whenever its layout already matches
/// CSR, and owned otherwise.
#[derive(Debug, Clone)]
pub struct BatchMatrix<'a, T: Clone> {
    rows: usize,
    cols: usize,
    row_ptr: Cow<'a, [usize]>,
    col_index: Cow<'a, [Index]>,
    values: Cow<'a, [T]>,
}

impl<'a, T: Scalar> BatchMatrix<'a, T> {
    pub fn view(&self) -> Result<CsrView<'_, T>> {
        CsrView::new(
            self.rows,
            self.cols,
            &self.row_ptr,
            &self.col_index,
            &self.values,
        )
    }

    /// Whether columns and values point into the tensor's storage
    pub fn is_borrowed(&self) -> bool {
        matches!(self.col_index, Cow::Borrowed(_)) && matches!(self.values, Cow::Borrowed(_))
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
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
}

impl<T: Scalar> SparseTensor<T> {
    /// Assemble a tensor from its parts, checking every level
    ///
    /// Index bounds of the innermost level are only checked in debug builds.
    pub fn new(shape: Vec<usize>, values: Buffer<T>, dims: Vec<DimLevel>) -> Result<Self> {
        let rank = shape.len();
        if rank < 2 || dims.len() + 1 != rank || dims[0].outer.len() != shape[0] + 1 {
            return Err(SpmatError::InvalidTensor);
        }
        for (k, level) in dims.iter().enumerate() {
            validate_level(&level.outer, level.inner.len())?;
            if k > 0 && level.outer.len() != dims[k - 1].inner.len() + 1 {
                return Err(SpmatError::InvalidTensor);
            }
        }
        let last = &dims[rank - 2];
        if values.len() != last.inner.len() {
            return Err(SpmatError::LengthMismatch {
                expected: last.inner.len(),
                found: values.len(),
            });
        }
        if cfg!(debug_assertions) {
            for (k, level) in dims.iter().enumerate() {
                validate_column_bounds(&level.inner, shape[k + 1])?;
            }
        }
        Ok(Self {
            shape,
            values,
            dims,
        })
    }

    /// Pack same-shaped matrices into one tensor
    ///
    /// With `squeeze_batch` a single matrix becomes a rank-2 tensor;
    /// otherwise the result has rank 3 with one batch element per matrix.
    /// An empty list gives an empty tensor of rank 0.
    pub fn from_matrices(matrices: &[CsrView<'_, T>], squeeze_batch: bool) -> Result<Self> {
        let Some(first) = matrices.first() else {
            return if squeeze_batch {
                Err(SpmatError::InvalidTensor)
            } else {
                Ok(Self::default())
            };
        };
        let (rows, cols) = first.shape();
        if let Some(other) = matrices.iter().find(|m| m.shape() != (rows, cols)) {
            return Err(SpmatError::ShapeMismatch {
                op: "stack",
                left: (rows, cols),
                right: other.shape(),
            });
        }

        if squeeze_batch {
            if matrices.len() != 1 {
                return Err(SpmatError::InvalidTensor);
            }
            let (rows, cols, row_ptr, col_index, values) = first.to_owned_compact()?.into_parts();
            return Ok(Self {
                shape: vec![rows, cols],
                values,
                dims: vec![DimLevel::new(col_index, row_ptr)],
            });
        }

        let batch = matrices.len();
        let (row_counts, entry_counts): (Vec<usize>, Vec<usize>) = matrices
            .par_iter()
            .map(|m| {
                let nonempty = (0..m.rows()).filter(|&i| m.row_len(i) > 0).count();
                (nonempty, m.nnz())
            })
            .unzip();
        let batch_ptr = prefix_sum(&row_counts)?;
        let entry_ptr = prefix_sum(&entry_counts)?;

        let mut row_ids = Buffer::<Index>::allocate(batch_ptr[batch])?;
        let mut row_lens = Buffer::<usize>::allocate(batch_ptr[batch])?;
        let (mut col_index, mut values) = allocate_storage::<T>(entry_ptr[batch])?;
        row_slots(&batch_ptr, &mut row_ids, &mut row_lens)
            .into_par_iter()
            .zip(row_slots(&entry_ptr, &mut col_index, &mut values))
            .zip(matrices.par_iter())
            .for_each(|(((ids, lens), (out_cols, out_values)), m)| {
                let mut k = 0;
                let mut n = 0;
                for i in 0..m.rows() {
                    let (row_cols, row_values) = m.row(i);
                    if row_cols.is_empty() {
                        continue;
                    }
                    ids[k] = i as Index;
                    lens[k] = row_cols.len();
                    out_cols[n..n + row_cols.len()].copy_from_slice(row_cols);
                    out_values[n..n + row_cols.len()].copy_from_slice(row_values);
                    k += 1;
                    n += row_cols.len();
                }
            });
        let row_ptr = prefix_sum(&row_lens)?;

        log::trace!(
            "packed {batch} matrices of {rows}x{cols}, {} non-empty rows",
            row_ids.len()
        );
        Ok(Self {
            shape: vec![batch, rows, cols],
            values,
            dims: vec![
                DimLevel::new(row_ids, batch_ptr),
                DimLevel::new(col_index, row_ptr),
            ],
        })
    }

    /// Convert a coordinate list into a rank-2 tensor
    pub fn from_coo(coo: Coo<T>, backend: &dyn SparseBackend<T>) -> Result<Self> {
        let (rows, cols, row_ptr, col_index, values) = backend.coo_to_csr(coo)?.into_parts();
        Ok(Self {
            shape: vec![rows, cols],
            values,
            dims: vec![DimLevel::new(col_index, row_ptr)],
        })
    }

    /// Unpack every batch element as a CSR matrix
    ///
    /// A rank-2 tensor yields one matrix borrowing all of its storage. For
    /// rank 3, elements whose row ids ascend borrow their columns and values;
    /// the others are compacted into owned storage in row order.
    pub fn to_matrices(&self) -> Result<Vec<BatchMatrix<'_, T>>> {
        match self.rank() {
            0 => Ok(Vec::new()),
            2 => Ok(vec![BatchMatrix {
                rows: self.shape[0],
                cols: self.shape[1],
                row_ptr: Cow::Borrowed(&self.dims[0].outer),
                col_index: Cow::Borrowed(&self.dims[0].inner),
                values: Cow::Borrowed(&self.values),
            }]),
            3 => (0..self.shape[0])
                .into_par_iter()
                .map(|b| self.unpack(b))
                .collect(),
            _ => Err(SpmatError::InvalidTensor),
        }
    }

    fn unpack(&self, b: usize) -> Result<BatchMatrix<'_, T>> {
        let (rows, cols) = (self.shape[1], self.shape[2]);
        let (batch_ptr, row_ids) = (&self.dims[0].outer, &self.dims[0].inner);
        let (row_ptr, col_index) = (&self.dims[1].outer, &self.dims[1].inner);

        let (lo, hi) = (batch_ptr[b], batch_ptr[b + 1]);
        let ids = &row_ids[lo..hi];
        let starts = &row_ptr[lo..=hi];
        if ids.iter().any(|&r| r as usize >= rows) {
            return Err(SpmatError::InvalidTensor);
        }

        let mut out_ptr = Buffer::<usize>::allocate(rows + 1)?;
        for (k, &r) in ids.iter().enumerate() {
            out_ptr[r as usize + 1] += starts[k + 1] - starts[k];
        }
        let mut total = 0;
        for p in out_ptr.iter_mut() {
            total += *p;
            *p = total;
        }

        let (base, end) = (starts[0], starts[ids.len()]);
        if ids.windows(2).all(|w| w[0] < w[1]) {
            return Ok(BatchMatrix {
                rows,
                cols,
                row_ptr: Cow::Owned(out_ptr.into_vec()),
                col_index: Cow::Borrowed(&col_index[base..end]),
                values: Cow::Borrowed(&self.values[base..end]),
            });
        }

        let mut order: Vec<usize> = (0..ids.len()).collect();
        order.sort_by_key(|&k| ids[k]);
        let (mut out_cols, mut out_values) = allocate_storage::<T>(end - base)?;
        let mut n = 0;
        for k in order {
            let range = starts[k]..starts[k + 1];
            let len = range.len();
            out_cols[n..n + len].copy_from_slice(&col_index[range.clone()]);
            out_values[n..n + len].copy_from_slice(&self.values[range]);
            n += len;
        }
        Ok(BatchMatrix {
            rows,
            cols,
            row_ptr: Cow::Owned(out_ptr.into_vec()),
            col_index: Cow::Owned(out_cols.into_vec()),
            values: Cow::Owned(out_values.into_vec()),
        })
    }

    /// Apply a per-matrix operation to every batch element
    pub fn apply_unary<F>(&self, op: F) -> Result<Self>
    where
        F: Fn(CsrView<'_, T>) -> Result<Csr<T>>,
    {
        if self.rank() > 3 {
            return Err(SpmatError::InvalidTensor);
        }
        let results = self
            .to_matrices()?
            .iter()
            .map(|m| op(m.view()?))
            .collect::<Result<Vec<_>>>()?;
        self.repack(&results)
    }

    /// Apply a per-matrix operation to matching batch elements of two tensors
    ///
    /// Both tensors must have the same rank, at most 3, and rank-3 tensors
    /// the same batch size. Elements are processed one after the other; the
    /// operation itself is free to run in parallel.
    pub fn apply_binary<F>(&self, other: &Self, op: F) -> Result<Self>
    where
        F: Fn(CsrView<'_, T>, CsrView<'_, T>) -> Result<Csr<T>>,
    {
        if self.rank() != other.rank() || self.rank() > 3 {
            return Err(SpmatError::InvalidTensor);
        }
        if self.rank() == 3 && self.shape[0] != other.shape[0] {
            return Err(SpmatError::BatchMismatch {
                left: self.shape[0],
                right: other.shape[0],
            });
        }
        let left = self.to_matrices()?;
        let right = other.to_matrices()?;
        let results = left
            .iter()
            .zip(&right)
            .map(|(a, b)| op(a.view()?, b.view()?))
            .collect::<Result<Vec<_>>>()?;
        self.repack(&results)
    }

    /// Pack per-element results back into a tensor of this tensor's rank
    ///
    /// An empty rank-3 batch stays rank 3 and keeps its matrix shape.
    fn repack(&self, results: &[Csr<T>]) -> Result<Self> {
        if self.rank() == 3 && results.is_empty() {
            return Ok(Self::empty_batch(self.shape[1], self.shape[2]));
        }
        let views: Vec<CsrView<'_, T>> = results.iter().map(Csr::view).collect();
        Self::from_matrices(&views, self.rank() == 2)
    }

    /// Rank-3 tensor holding no batch elements
    fn empty_batch(rows: usize, cols: usize) -> Self {
        let level = || DimLevel::new(Buffer::new(), Buffer::from(vec![0]));
        Self {
            shape: vec![0, rows, cols],
            values: Buffer::new(),
            dims: vec![level(), level()],
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    pub fn dims(&self) -> &[DimLevel] {
        &self.dims
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    /// Number of matrices held: 1 for rank 2, the leading extent for rank 3
    pub fn batch_size(&self) -> usize {
        match self.rank() {
            0 => 0,
            2 => 1,
            _ => self.shape[0],
        }
    }

    pub fn into_parts(self) -> (Vec<usize>, Buffer<T>, Vec<DimLevel>) {
        (self.shape, self.values, self.dims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::default_backend;

    fn level(inner: &[Index], outer: &[usize]) -> DimLevel {
        DimLevel::new(Buffer::from(inner.to_vec()), Buffer::from(outer.to_vec()))
    }

    fn tensor(shape: &[usize], values: &[f32], dims: Vec<DimLevel>) -> SparseTensor<f32> {
        SparseTensor::new(shape.to_vec(), Buffer::from(values.to_vec()), dims).unwrap()
    }

    fn batch_of_four() -> SparseTensor<f32> {
        tensor(
            &[4, 3, 5],
            &[1.0, 2.0, 3.0, 4.0, 5.0],
            vec![
                level(&[0, 1, 0, 1], &[0, 1, 2, 4, 4]),
                level(&[0, 1, 2, 2, 4], &[0, 1, 3, 4, 5]),
            ],
        )
    }

    fn unordered_batch() -> SparseTensor<f32> {
        tensor(
            &[4, 3, 5],
            &[1.0, 2.0, 3.0, 5.0, 4.0],
            vec![
                level(&[0, 1, 1, 0], &[0, 1, 2, 4, 4]),
                level(&[0, 1, 2, 4, 2], &[0, 1, 3, 4, 5]),
            ],
        )
    }

    const ROW_PTRS: [[usize; 4]; 4] = [[0, 1, 1, 1], [0, 0, 2, 2], [0, 1, 2, 2], [0, 0, 0, 0]];

    fn expected_cols() -> [&'static [Index]; 4] {
        [&[0], &[1, 2], &[2, 4], &[]]
    }

    fn expected_values() -> [&'static [f32]; 4] {
        [&[1.0], &[2.0, 3.0], &[4.0, 5.0], &[]]
    }

    #[test]
    fn test_unpack_batch() {
        let t = batch_of_four();
        let matrices = t.to_matrices().unwrap();
        assert_eq!(matrices.len(), 4);
        for (i, m) in matrices.iter().enumerate() {
            assert_eq!(m.shape(), (3, 5));
            assert_eq!(m.row_ptr(), &ROW_PTRS[i]);
            assert_eq!(m.col_index(), expected_cols()[i]);
            assert_eq!(m.values(), expected_values()[i]);
            assert!(m.is_borrowed());
        }
    }

    #[test]
    fn test_unpack_unordered_row_ids() {
        let t = unordered_batch();
        let matrices = t.to_matrices().unwrap();
        assert_eq!(matrices.len(), 4);
        for (i, m) in matrices.iter().enumerate() {
            assert_eq!(m.row_ptr(), &ROW_PTRS[i]);
            assert_eq!(m.col_index(), expected_cols()[i]);
            assert_eq!(m.values(), expected_values()[i]);
        }
        assert!(matrices[1].is_borrowed());
        assert!(!matrices[2].is_borrowed());
    }

    #[test]
    fn test_unpack_empty_matrices() {
        let t = tensor(&[2, 1, 1], &[], vec![level(&[], &[0, 0, 0]), level(&[], &[0])]);
        let matrices = t.to_matrices().unwrap();
        assert_eq!(matrices.len(), 2);
        for m in &matrices {
            assert_eq!(m.row_ptr(), &[0, 0]);
            assert!(m.col_index().is_empty());
            assert_eq!(m.view().unwrap().nnz(), 0);
        }
    }

    #[test]
    fn test_pack_batch() {
        let cols = expected_cols();
        let values = expected_values();
        let views: Vec<CsrView<'_, f32>> = (0..4)
            .map(|i| CsrView::new(3, 5, &ROW_PTRS[i], cols[i], values[i]).unwrap())
            .collect();
        let t = SparseTensor::from_matrices(&views, false).unwrap();
        assert_eq!(t, batch_of_four());
        assert_eq!(t.batch_size(), 4);
    }

    #[test]
    fn test_pack_empty_matrices() {
        let ptr = [0usize, 0];
        let views = vec![CsrView::<f32>::new(1, 1, &ptr, &[], &[]).unwrap(); 2];
        let t = SparseTensor::from_matrices(&views, false).unwrap();
        assert_eq!(t.shape(), &[2, 1, 1]);
        assert!(t.values().is_empty());
        assert_eq!(t.dims()[0], level(&[], &[0, 0, 0]));
        assert_eq!(t.dims()[1], level(&[], &[0]));
    }

    #[test]
    fn test_pack_empty_list() {
        let t = SparseTensor::<f32>::from_matrices(&[], false).unwrap();
        assert_eq!(t, SparseTensor::default());
        assert!(t.to_matrices().unwrap().is_empty());
        assert_eq!(
            SparseTensor::<f32>::from_matrices(&[], true).unwrap_err(),
            SpmatError::InvalidTensor
        );
    }

    #[test]
    fn test_pack_rejects_mixed_shapes() {
        let a = CsrView::<f32>::new(2, 2, &[0, 0, 0], &[], &[]).unwrap();
        let b = CsrView::<f32>::new(2, 3, &[0, 0, 0], &[], &[]).unwrap();
        assert_eq!(
            SparseTensor::from_matrices(&[a, b], false).unwrap_err(),
            SpmatError::ShapeMismatch {
                op: "stack",
                left: (2, 2),
                right: (2, 3)
            }
        );
    }

    #[test]
    fn test_batched_matmul() {
        let left = unordered_batch();
        let right = tensor(
            &[4, 5, 5],
            &[1.0, 2.0, 3.0, 5.0, 4.0],
            vec![
                level(&[0, 1, 1, 0], &[0, 1, 2, 4, 4]),
                level(&[0, 1, 2, 4, 2], &[0, 1, 3, 4, 5]),
            ],
        );
        let backend = default_backend();
        let product = left
            .apply_binary(&right, |a, b| backend.matmul(a, b))
            .unwrap();

        assert_eq!(product.shape(), &[4, 3, 5]);
        assert_eq!(product.values(), &[1.0, 4.0, 6.0]);
        assert_eq!(product.dims()[0], level(&[0, 1], &[0, 1, 2, 2, 2]));
        assert_eq!(product.dims()[1], level(&[0, 1, 2], &[0, 1, 3]));
    }

    #[test]
    fn test_empty_batch_keeps_rank() {
        let empty = tensor(&[0, 3, 5], &[], vec![level(&[], &[0]), level(&[], &[0])]);
        assert_eq!(empty.batch_size(), 0);
        assert!(empty.to_matrices().unwrap().is_empty());

        let backend = default_backend();
        let doubled = empty.apply_unary(|a| backend.add(a, a)).unwrap();
        assert_eq!(doubled, empty);
        let product = empty
            .apply_binary(&empty, |a, b| backend.times(a, b))
            .unwrap();
        assert_eq!(product.shape(), &[0, 3, 5]);
        assert_eq!(product.rank(), 3);
        assert_eq!(product.dims()[0], level(&[], &[0]));
        assert_eq!(product.dims()[1], level(&[], &[0]));
    }

    #[test]
    fn test_rank_two_round_trip() {
        let coo = Coo::from_triplets(3, 3, &[(0, 0, 1.0f32), (2, 1, 2.0), (0, 2, 3.0)]).unwrap();
        let backend = default_backend();
        let t = SparseTensor::from_coo(coo, backend).unwrap();
        assert_eq!(t.rank(), 2);
        assert_eq!(t.batch_size(), 1);

        let doubled = t.apply_unary(|a| backend.add(a, a)).unwrap();
        assert_eq!(doubled.rank(), 2);
        let matrices = doubled.to_matrices().unwrap();
        assert_eq!(matrices.len(), 1);
        assert!(matrices[0].is_borrowed());
        let m = matrices[0].view().unwrap().to_owned_compact().unwrap();
        assert_eq!(m.to_dense(), vec![2.0, 0.0, 6.0, 0.0, 0.0, 0.0, 0.0, 4.0, 0.0]);
    }

    #[test]
    fn test_binary_rejects_mismatched_operands() {
        let batch = batch_of_four();
        let single = tensor(&[3, 5], &[1.0], vec![level(&[2], &[0, 1, 1, 1])]);
        let backend = default_backend();
        assert_eq!(
            batch
                .apply_binary(&single, |a, b| backend.add(a, b))
                .unwrap_err(),
            SpmatError::InvalidTensor
        );

        let pair = tensor(
            &[2, 3, 5],
            &[],
            vec![level(&[], &[0, 0, 0]), level(&[], &[0])],
        );
        assert_eq!(
            batch.apply_binary(&pair, |a, b| backend.add(a, b)).unwrap_err(),
            SpmatError::BatchMismatch { left: 4, right: 2 }
        );
    }

    #[test]
    fn test_new_rejects_bad_levels() {
        let values = || Buffer::from(vec![1.0f32, 2.0]);
        assert_eq!(
            SparseTensor::new(vec![3], values(), vec![]).unwrap_err(),
            SpmatError::InvalidTensor
        );
        assert_eq!(
            SparseTensor::new(vec![2, 2], values(), vec![level(&[0, 1], &[0, 2, 1])]).unwrap_err(),
            SpmatError::InvalidTensor
        );
        assert_eq!(
            SparseTensor::new(vec![2, 2], values(), vec![level(&[0], &[0, 1, 1])]).unwrap_err(),
            SpmatError::LengthMismatch {
                expected: 1,
                found: 2
            }
        );
    }
}
