//! Sparse matrix multiplication
//!
//! Row-by-row Gustavson product in two phases. An analysis pass sizes
//! every output row (smallest reachable column, column span, number of
//! insertions) and picks the strategy:
//!
//! - **Accumulator.** Dense when `max_span * rows * factor` is below the
//!   total number of insertions: a value table indexed by column offset
//!   that is swept once per row, which yields sorted columns and drops
//!   exact zeros. Otherwise general: the same table plus a touched list,
//!   which yields columns in first-touch order and keeps every touched
//!   column.
//! - **Symbolic phase.** When every row of the right operand is sorted and
//!   the bitmap-compressed insertion count is small enough, rows are
//!   counted by OR-ing 32-bit column masks and summing popcounts.
//!
//! Scratch tables are sized to the widest span and created once per rayon
//! job through `map_init`/`for_each_init`, then reused across every row of
//! that job. A worker may run several jobs.

use rayon::prelude::*;
use spmat_core::{Csr, CsrView, Index, Result, Scalar, SpmatError};

use super::compress::{word_table_len, BitmapRows};
use super::scatter::{allocate_storage, prefix_sum, row_slots, RowSlot};
use crate::config::KernelConfig;

/// Sizing information for one output row
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct RowPlan {
    /// Smallest reachable output column
    min: Index,
    /// Reachable column range width; zero when nothing is reachable
    span: usize,
    /// Number of partial products
    insertions: usize,
    /// Number of bitmap words OR-ed in the compressed symbolic phase
    compressed: usize,
}

/// Column bounds of a row; `min > max` for an empty row
#[derive(Debug, Clone, Copy)]
struct ColumnBounds {
    min: Index,
    max: Index,
}

/// Scratch for the general accumulator
struct Accumulator<T> {
    values: Vec<T>,
    seen: Vec<bool>,
    touched: Vec<Index>,
}

impl<T: Scalar> Accumulator<T> {
    fn new(span: usize) -> Self {
        Self {
            values: vec![T::ZERO; span],
            seen: vec![false; span],
            touched: Vec::new(),
        }
    }
}

/// Multiply `left * right`
pub fn matmul<T: Scalar>(
    left: CsrView<'_, T>,
    right: CsrView<'_, T>,
    config: &KernelConfig,
) -> Result<Csr<T>> {
    if left.cols() != right.rows() {
        return Err(SpmatError::ShapeMismatch {
            op: "matmul",
            left: left.shape(),
            right: right.shape(),
        });
    }
    let rows = left.rows();
    let cols = right.cols();
    if left.nnz() == 0 || right.nnz() == 0 {
        log::trace!("matmul: empty operand, {rows}x{cols} empty result");
        return Csr::empty(rows, cols);
    }

    let right_sorted = (0..right.rows())
        .into_par_iter()
        .all(|k| right.row(k).0.windows(2).all(|w| w[0] <= w[1]));
    let bounds: Vec<ColumnBounds> = (0..right.rows())
        .into_par_iter()
        .map(|k| {
            let (row_cols, _) = right.row(k);
            row_cols.iter().fold(
                ColumnBounds {
                    min: Index::MAX,
                    max: 0,
                },
                |b, &c| ColumnBounds {
                    min: b.min.min(c),
                    max: b.max.max(c),
                },
            )
        })
        .collect();
    let bitmaps = if right_sorted {
        Some(BitmapRows::build(right)?)
    } else {
        None
    };

    let chunk = config.chunk_rows(rows, rayon::current_num_threads());
    let plans: Vec<RowPlan> = (0..rows)
        .into_par_iter()
        .with_min_len(chunk)
        .map(|i| plan_row(left.row(i).0, right, &bounds, bitmaps.as_ref()))
        .collect();

    let max_span = plans.iter().map(|p| p.span).max().unwrap_or(0);
    let max_insertions = plans.iter().map(|p| p.insertions).max().unwrap_or(0);
    let total_insertions: usize = plans.iter().map(|p| p.insertions).sum();
    let total_compressed: usize = plans.iter().map(|p| p.compressed).sum();

    if max_span == 0 || max_insertions == 0 || total_insertions == 0 {
        log::trace!("matmul: no aligned products, {rows}x{cols} empty result");
        return Csr::empty(rows, cols);
    }

    let dense = max_span
        .saturating_mul(rows)
        .saturating_mul(config.dense_insertion_factor)
        < total_insertions;
    let bitmaps = bitmaps
        .filter(|_| total_compressed < total_insertions / config.compression_divisor.max(1));
    log::debug!(
        "matmul {rows}x{}x{cols}: {} accumulator, {} symbolic, {total_insertions} insertions, span {max_span}",
        left.cols(),
        if dense { "dense" } else { "general" },
        if bitmaps.is_some() { "bitmap" } else { "marker" },
    );

    let counts = match &bitmaps {
        Some(bits) => symbolic_bitmap(left, bits, &plans, max_span, dense, chunk),
        None => symbolic_marker(left, right, &plans, max_span, dense, chunk),
    };
    drop(bitmaps);

    let row_ptr = prefix_sum(&counts)?;
    let nnz = row_ptr[rows];
    let (mut col_index, mut values) = allocate_storage::<T>(nnz)?;
    let slots = row_slots(&row_ptr, &mut col_index, &mut values);
    let written = if dense {
        numeric_dense(left, right, &plans, max_span, chunk, slots)
    } else {
        numeric_general(left, right, &plans, max_span, chunk, slots)
    };

    let kept: usize = written.iter().sum();
    if kept < nnz {
        log::trace!("matmul: compacting {nnz} -> {kept} entries after pruning zeros");
        return compact(rows, cols, &row_ptr, &col_index, &values, &written);
    }
    Csr::from_parts(rows, cols, row_ptr, col_index, values)
}

fn plan_row<T>(
    left_cols: &[Index],
    right: CsrView<'_, T>,
    bounds: &[ColumnBounds],
    bitmaps: Option<&BitmapRows>,
) -> RowPlan {
    let mut min = Index::MAX;
    let mut max = 0;
    let mut insertions = 0;
    let mut compressed = 0;
    for &k in left_cols {
        let k = k as usize;
        let len = right.row_len(k);
        if len == 0 {
            continue;
        }
        min = min.min(bounds[k].min);
        max = max.max(bounds[k].max);
        insertions += len;
        if let Some(bits) = bitmaps {
            compressed += bits.row_len(k);
        }
    }
    if insertions == 0 {
        return RowPlan::default();
    }
    RowPlan {
        min,
        span: (max - min) as usize + 1,
        insertions,
        compressed,
    }
}

fn symbolic_bitmap<T: Scalar>(
    left: CsrView<'_, T>,
    bits: &BitmapRows,
    plans: &[RowPlan],
    max_span: usize,
    dense: bool,
    chunk: usize,
) -> Vec<usize> {
    let table_len = word_table_len(max_span);
    (0..left.rows())
        .into_par_iter()
        .with_min_len(chunk)
        .map_init(
            || (vec![0u32; table_len], Vec::<usize>::new()),
            |(table, touched), i| {
                let plan = plans[i];
                if plan.insertions == 0 {
                    return 0;
                }
                let base = (plan.min >> 5) as usize;
                for &k in left.row(i).0 {
                    let (words, masks) = bits.row(k as usize);
                    for (&word, &mask) in words.iter().zip(masks) {
                        let slot = word as usize - base;
                        if !dense && table[slot] == 0 {
                            touched.push(slot);
                        }
                        table[slot] |= mask;
                    }
                }
                if dense {
                    let used = &mut table[..word_table_len(plan.span)];
                    let count: usize = used.iter().map(|m| m.count_ones() as usize).sum();
                    used.fill(0);
                    count
                } else {
                    let count: usize = touched.iter().map(|&s| table[s].count_ones() as usize).sum();
                    for s in touched.drain(..) {
                        table[s] = 0;
                    }
                    count
                }
            },
        )
        .collect()
}

fn symbolic_marker<T: Scalar>(
    left: CsrView<'_, T>,
    right: CsrView<'_, T>,
    plans: &[RowPlan],
    max_span: usize,
    dense: bool,
    chunk: usize,
) -> Vec<usize> {
    (0..left.rows())
        .into_par_iter()
        .with_min_len(chunk)
        .map_init(
            || (vec![false; max_span], Vec::<usize>::new()),
            |(seen, touched), i| {
                let plan = plans[i];
                if plan.insertions == 0 {
                    return 0;
                }
                let mut count = 0;
                for &k in left.row(i).0 {
                    for &c in right.row(k as usize).0 {
                        let slot = (c - plan.min) as usize;
                        if !seen[slot] {
                            seen[slot] = true;
                            count += 1;
                            if !dense {
                                touched.push(slot);
                            }
                        }
                    }
                }
                if dense {
                    seen[..plan.span].fill(false);
                } else {
                    for s in touched.drain(..) {
                        seen[s] = false;
                    }
                }
                count
            },
        )
        .collect()
}

/// Accumulate into a span-indexed table and sweep it in column order,
/// dropping exact zeros; returns the entries written per row
fn numeric_dense<T: Scalar>(
    left: CsrView<'_, T>,
    right: CsrView<'_, T>,
    plans: &[RowPlan],
    max_span: usize,
    chunk: usize,
    slots: Vec<RowSlot<'_, T>>,
) -> Vec<usize> {
    slots
        .into_par_iter()
        .enumerate()
        .with_min_len(chunk)
        .map_init(
            || vec![T::ZERO; max_span],
            |table, (i, (out_cols, out_values))| {
                let plan = plans[i];
                if plan.insertions == 0 {
                    return 0;
                }
                let (lc, lv) = left.row(i);
                for (&k, &a) in lc.iter().zip(lv) {
                    let (rc, rv) = right.row(k as usize);
                    for (&c, &b) in rc.iter().zip(rv) {
                        let slot = &mut table[(c - plan.min) as usize];
                        *slot = *slot + a * b;
                    }
                }
                let mut n = 0;
                for (offset, slot) in table[..plan.span].iter_mut().enumerate() {
                    if *slot != T::ZERO {
                        out_cols[n] = plan.min + offset as Index;
                        out_values[n] = *slot;
                        n += 1;
                        *slot = T::ZERO;
                    }
                }
                n
            },
        )
        .collect()
}

/// Accumulate with a touched list; emits every touched column in
/// first-touch order
fn numeric_general<T: Scalar>(
    left: CsrView<'_, T>,
    right: CsrView<'_, T>,
    plans: &[RowPlan],
    max_span: usize,
    chunk: usize,
    slots: Vec<RowSlot<'_, T>>,
) -> Vec<usize> {
    slots
        .into_par_iter()
        .enumerate()
        .with_min_len(chunk)
        .map_init(
            || Accumulator::new(max_span),
            |acc, (i, (out_cols, out_values))| {
                let plan = plans[i];
                if plan.insertions == 0 {
                    return 0;
                }
                let (lc, lv) = left.row(i);
                for (&k, &a) in lc.iter().zip(lv) {
                    let (rc, rv) = right.row(k as usize);
                    for (&c, &b) in rc.iter().zip(rv) {
                        let slot = (c - plan.min) as usize;
                        if acc.seen[slot] {
                            acc.values[slot] = acc.values[slot] + a * b;
                        } else {
                            acc.seen[slot] = true;
                            acc.values[slot] = a * b;
                            acc.touched.push(c);
                        }
                    }
                }
                let n = acc.touched.len();
                for (k, c) in acc.touched.drain(..).enumerate() {
                    let slot = (c - plan.min) as usize;
                    out_cols[k] = c;
                    out_values[k] = acc.values[slot];
                    acc.seen[slot] = false;
                }
                n
            },
        )
        .collect()
}

/// Copy the first `written[i]` entries of every row into exact-size storage
fn compact<T: Scalar>(
    rows: usize,
    cols: usize,
    row_ptr: &[usize],
    col_index: &[Index],
    values: &[T],
    written: &[usize],
) -> Result<Csr<T>> {
    let new_ptr = prefix_sum(written)?;
    let (mut new_cols, mut new_values) = allocate_storage::<T>(new_ptr[rows])?;
    row_slots(&new_ptr, &mut new_cols, &mut new_values)
        .into_par_iter()
        .enumerate()
        .for_each(|(i, (out_cols, out_values))| {
            let start = row_ptr[i];
            let end = start + out_cols.len();
            out_cols.copy_from_slice(&col_index[start..end]);
            out_values.copy_from_slice(&values[start..end]);
        });
    Csr::from_parts(rows, cols, new_ptr, new_cols, new_values)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> KernelConfig {
        KernelConfig::default()
    }

    #[test]
    fn test_does_matmul() {
        let ptr = [0, 1, 2];
        let vals = [1.0f32, 2.0];
        let a = CsrView::new(2, 2, &ptr, &[0, 1], &vals).unwrap();
        let b = CsrView::new(2, 2, &ptr, &[1, 1], &vals).unwrap();
        let c = matmul(a, b, &config()).unwrap();
        assert_eq!(c.row_ptr(), &[0, 1, 2]);
        assert_eq!(c.col_index(), &[1, 1]);
        assert_eq!(c.values(), &[1.0, 4.0]);
    }

    #[test]
    fn test_no_aligned_products() {
        let a = CsrView::new(2, 2, &[0, 1, 2], &[1, 1], &[1.0f32, 2.0]).unwrap();
        let b = CsrView::new(2, 2, &[0, 2, 2], &[0, 1], &[1.0f32, 2.0]).unwrap();
        let c = matmul(a, b, &config()).unwrap();
        assert_eq!(c.shape(), (2, 2));
        assert_eq!(c.row_ptr(), &[0, 0, 0]);
        assert_eq!(c.nnz(), 0);
    }

    #[test]
    fn test_empty_operand() {
        let a = CsrView::new(2, 3, &[0, 1, 2], &[0, 2], &[1.0f64, 2.0]).unwrap();
        let e = CsrView::new(3, 4, &[0, 0, 0, 0], &[], &[]).unwrap();
        let c = matmul(a, e, &config()).unwrap();
        assert_eq!(c.shape(), (2, 4));
        assert_eq!(c.row_ptr(), &[0, 0, 0]);

        let e = CsrView::<f64>::new(4, 2, &[0, 0, 0, 0, 0], &[], &[]).unwrap();
        let c = matmul(e, a, &config()).unwrap();
        assert_eq!(c.shape(), (4, 3));
        assert_eq!(c.nnz(), 0);
    }

    #[test]
    fn test_shape_mismatch() {
        let a = CsrView::new(2, 2, &[0, 1, 2], &[0, 1], &[1.0f32, 2.0]).unwrap();
        let b = CsrView::<f32>::new(3, 3, &[0, 0, 0, 0], &[], &[]).unwrap();
        assert_eq!(
            matmul(a, b, &config()).unwrap_err(),
            SpmatError::ShapeMismatch {
                op: "matmul",
                left: (2, 2),
                right: (3, 3)
            }
        );
    }

    fn dense_product(a: &Csr<f64>, b: &Csr<f64>) -> Vec<f64> {
        let (n, k, m) = (a.rows(), a.cols(), b.cols());
        let (da, db) = (a.to_dense(), b.to_dense());
        let mut out = vec![0.0; n * m];
        for i in 0..n {
            for p in 0..k {
                for j in 0..m {
                    out[i * m + j] += da[i * k + p] * db[p * m + j];
                }
            }
        }
        out
    }

    fn banded(n: usize, width: usize) -> Csr<f64> {
        let mut ptr = vec![0];
        let mut cols = Vec::new();
        let mut vals = Vec::new();
        for i in 0..n {
            for j in i.saturating_sub(width)..(i + width + 1).min(n) {
                cols.push(j as Index);
                vals.push((i * n + j) as f64 * 0.5 + 1.0);
            }
            ptr.push(cols.len());
        }
        Csr::from_parts(n, n, ptr.into(), cols.into(), vals.into()).unwrap()
    }

    #[test]
    fn test_strategies_agree_with_dense_product() {
        let a = banded(40, 3);
        let expected = dense_product(&a, &a);
        let configs = [
            config(),
            config().with_dense_insertion_factor(0),
            config().with_dense_insertion_factor(usize::MAX),
            config().with_compression_divisor(usize::MAX),
            config().with_compression_divisor(1).with_dense_insertion_factor(0),
        ];
        for cfg in &configs {
            let c = matmul(a.view(), a.view(), cfg).unwrap();
            assert_eq!(c.to_dense(), expected, "config {cfg:?}");
            c.validate().unwrap();
        }
    }

    #[test]
    fn test_dense_accumulator_prunes_cancellations() {
        // Row 0 of the product is 1*1 + 1*(-1) = 0 in column 0
        let a = CsrView::new(1, 2, &[0, 2], &[0, 1], &[1.0f64, 1.0]).unwrap();
        let b = CsrView::new(2, 2, &[0, 2, 3], &[0, 1, 0], &[1.0f64, 2.0, -1.0]).unwrap();

        let dense = matmul(a, b, &config().with_dense_insertion_factor(0)).unwrap();
        assert_eq!(dense.row_ptr(), &[0, 1]);
        assert_eq!(dense.col_index(), &[1]);
        assert_eq!(dense.values(), &[2.0]);

        let general = matmul(a, b, &config().with_dense_insertion_factor(usize::MAX)).unwrap();
        assert_eq!(general.row_ptr(), &[0, 2]);
        assert_eq!(general.to_dense(), vec![0.0, 2.0]);
    }

    #[test]
    fn test_unsorted_right_operand() {
        let a = CsrView::new(2, 2, &[0, 2, 3], &[1, 0, 1], &[1.0f64, 2.0, 3.0]).unwrap();
        let b = CsrView::new(2, 3, &[0, 2, 4], &[2, 0, 1, 0], &[1.0f64, 2.0, 3.0, 4.0]).unwrap();
        let c = matmul(a, b, &config()).unwrap();
        // row 0 = 1*[4, 3, 0] + 2*[2, 0, 1]; row 1 = 3*[4, 3, 0]
        assert_eq!(c.to_dense(), vec![8.0, 3.0, 2.0, 12.0, 9.0, 0.0]);
    }

    #[test]
    fn test_identity_product() {
        let a = banded(10, 2);
        let eye = Csr::<f64>::identity(10).unwrap();
        let c = matmul(a.view(), eye.view(), &config()).unwrap();
        assert_eq!(c.to_dense(), a.to_dense());
    }
}
