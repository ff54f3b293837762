//! CSR transpose
//!
//! Counts entries per column, turns the counts into the output row
//! pointer and scatters every entry into its column's output row. Works on
//! both view layouts since rows are only ever read through the view.

use rayon::prelude::*;
use spmat_core::{Csr, CsrView, Index, Result, Scalar};

use super::scatter::{allocate_storage, even_split, histogram, prefix_sum, sort_rows, Scatter};
use crate::config::KernelConfig;

/// Transposed copy of `matrix`
///
/// Entries of an output row arrive in scheduling order unless
/// [`KernelConfig::sort_scattered_rows`] is set.
pub fn transpose<T: Scalar>(matrix: CsrView<'_, T>, config: &KernelConfig) -> Result<Csr<T>> {
    let (rows, cols) = matrix.shape();
    if matrix.nnz() == 0 {
        return Csr::empty(cols, rows);
    }

    let counts = histogram(rows, cols, |r| matrix.row(r).0);
    let row_ptr = prefix_sum(&counts)?;
    let (mut out_cols, mut out_values) = allocate_storage::<T>(matrix.nnz())?;
    {
        let scatter = Scatter::new(&row_ptr, &mut out_cols, &mut out_values);
        (0..rows)
            .into_par_iter()
            .with_min_len(even_split(rows))
            .for_each(|r| {
                let (row_cols, row_values) = matrix.row(r);
                for (&c, &v) in row_cols.iter().zip(row_values) {
                    scatter.push(c as usize, r as Index, v);
                }
            });
    }
    if config.sort_scattered_rows {
        sort_rows(&row_ptr, &mut out_cols, &mut out_values);
    }
    log::trace!("transpose: {rows}x{cols}, nnz {}", matrix.nnz());
    Csr::from_parts(cols, rows, row_ptr, out_cols, out_values)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sorted() -> KernelConfig {
        KernelConfig::default().with_sorted_scatter(true)
    }

    #[test]
    fn test_does_transpose() {
        let ptr = [0, 2, 3, 3, 3, 3];
        let idx = [0, 1, 1];
        let vals = [1.0f32, 2.0, 3.0];
        let a = CsrView::new(5, 4, &ptr, &idx, &vals).unwrap();
        let t = transpose(a, &sorted()).unwrap();
        assert_eq!(t.shape(), (4, 5));
        assert_eq!(t.row_ptr(), &[0, 1, 3, 3, 3]);
        assert_eq!(t.col_index(), &[0, 0, 1]);
        assert_eq!(t.values(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_empty() {
        let a = CsrView::<f32>::new(5, 4, &[0; 6], &[], &[]).unwrap();
        let t = transpose(a, &KernelConfig::default()).unwrap();
        assert_eq!(t.shape(), (4, 5));
        assert_eq!(t.row_ptr(), &[0; 5]);
    }

    #[test]
    fn test_symmetric() {
        let ptr = [0, 2, 3, 3, 3];
        let idx = [0, 1, 0];
        let vals = [1.0f64, 2.0, 2.0];
        let a = CsrView::new(4, 4, &ptr, &idx, &vals).unwrap();
        let t = transpose(a, &sorted()).unwrap();
        assert_eq!(t.row_ptr(), &ptr);
        assert_eq!(t.col_index(), &idx);
        assert_eq!(t.values(), &vals);
    }

    #[test]
    fn test_split_layout_input() {
        let start = [1usize, 0];
        let end = [3usize, 1];
        let idx = [2, 0, 1];
        let vals = [3.0f64, 1.0, 2.0];
        let a = CsrView::from_parts(2, 3, &start, &end, &idx, &vals).unwrap();
        let t = transpose(a, &sorted()).unwrap();
        assert_eq!(t.shape(), (3, 2));
        assert_eq!(t.to_dense(), vec![1.0, 0.0, 2.0, 0.0, 0.0, 3.0]);
    }

    #[test]
    fn test_double_transpose_round_trips() {
        let ptr = [0, 3, 3, 5];
        let idx = [0, 2, 4, 1, 3];
        let vals = [1.0f32, 2.0, 3.0, 4.0, 5.0];
        let a = CsrView::new(3, 5, &ptr, &idx, &vals).unwrap();
        let t = transpose(a, &sorted()).unwrap();
        let tt = transpose(t.view(), &sorted()).unwrap();
        assert_eq!(tt.row_ptr(), &ptr);
        assert_eq!(tt.col_index(), &idx);
        assert_eq!(tt.values(), &vals);
    }
}
