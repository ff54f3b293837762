//! Element-wise addition, subtraction and multiplication
//!
//! `add` and `sub` combine the union of both sparsity patterns, `times`
//! only their intersection. A missing entry contributes zero to the
//! combinator. Results keep exact zeros (`A - A` has the pattern of `A`).

use hashbrown::HashMap;
use rayon::prelude::*;
use spmat_core::{Csr, CsrView, Index, Result, Scalar, SpmatError};

use super::merge::{is_sorted_row, merge_hashed, merge_sorted, MergeKind};
use super::scatter::{allocate_storage, even_split, prefix_sum, row_slots};

/// Element-wise combinator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementwiseOp {
    Add,
    Sub,
    Times,
}

impl ElementwiseOp {
    /// The merge this operator runs on each pair of rows
    pub const fn kind(self) -> MergeKind {
        match self {
            ElementwiseOp::Add | ElementwiseOp::Sub => MergeKind::Union,
            ElementwiseOp::Times => MergeKind::Intersection,
        }
    }

    #[inline]
    pub fn apply<T: Scalar>(self, left: T, right: T) -> T {
        match self {
            ElementwiseOp::Add => left + right,
            ElementwiseOp::Sub => left - right,
            ElementwiseOp::Times => left * right,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            ElementwiseOp::Add => "add",
            ElementwiseOp::Sub => "sub",
            ElementwiseOp::Times => "times",
        }
    }
}

/// How a row pair was merged in the counting phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RowPath {
    Sorted,
    Hashed,
}

/// Combine two equally shaped matrices entry by entry
pub fn elementwise<T: Scalar>(
    op: ElementwiseOp,
    left: CsrView<'_, T>,
    right: CsrView<'_, T>,
) -> Result<Csr<T>> {
    if left.shape() != right.shape() {
        return Err(SpmatError::ShapeMismatch {
            op: op.name(),
            left: left.shape(),
            right: right.shape(),
        });
    }
    if let Some(result) = trivial(op, left, right)? {
        return Ok(result);
    }
    general(op, left, right)
}

/// Handle an empty operand or two identical patterns in one pass
fn trivial<T: Scalar>(
    op: ElementwiseOp,
    left: CsrView<'_, T>,
    right: CsrView<'_, T>,
) -> Result<Option<Csr<T>>> {
    let (rows, cols) = left.shape();
    if left.nnz() == 0 || right.nnz() == 0 {
        log::trace!("{}: empty operand fast path", op.name());
        let result = match op.kind() {
            MergeKind::Intersection => Csr::empty(rows, cols)?,
            MergeKind::Union if right.nnz() == 0 => map_pattern(left, |i, out| {
                for (o, &v) in out.iter_mut().zip(left.row(i).1) {
                    *o = op.apply(v, T::ZERO);
                }
            })?,
            MergeKind::Union => map_pattern(right, |i, out| {
                for (o, &v) in out.iter_mut().zip(right.row(i).1) {
                    *o = op.apply(T::ZERO, v);
                }
            })?,
        };
        return Ok(Some(result));
    }
    if same_pattern(left, right) {
        log::trace!("{}: identical pattern fast path", op.name());
        let result = map_pattern(left, |i, out| {
            let (_, lv) = left.row(i);
            let (_, rv) = right.row(i);
            for ((o, &l), &r) in out.iter_mut().zip(lv).zip(rv) {
                *o = op.apply(l, r);
            }
        })?;
        return Ok(Some(result));
    }
    Ok(None)
}

/// Same number of entries and, row by row, the same column sequence
fn same_pattern<T: Scalar>(left: CsrView<'_, T>, right: CsrView<'_, T>) -> bool {
    left.nnz() == right.nnz()
        && (0..left.rows())
            .into_par_iter()
            .all(|i| left.row_len(i) == right.row_len(i))
        && (0..left.rows())
            .into_par_iter()
            .all(|i| left.row(i).0 == right.row(i).0)
}

/// Copy the pattern of `pattern` into a compact matrix, letting `fill`
/// write the values of each row
fn map_pattern<T, F>(pattern: CsrView<'_, T>, fill: F) -> Result<Csr<T>>
where
    T: Scalar,
    F: Fn(usize, &mut [T]) + Sync + Send,
{
    let rows = pattern.rows();
    let lens: Vec<usize> = (0..rows).into_par_iter().map(|i| pattern.row_len(i)).collect();
    let row_ptr = prefix_sum(&lens)?;
    let (mut col_index, mut values) = allocate_storage::<T>(pattern.nnz())?;
    row_slots(&row_ptr, &mut col_index, &mut values)
        .into_par_iter()
        .enumerate()
        .with_min_len(even_split(rows))
        .for_each(|(i, (out_cols, out_values))| {
            out_cols.copy_from_slice(pattern.row(i).0);
            fill(i, out_values);
        });
    Csr::from_parts(rows, pattern.cols(), row_ptr, col_index, values)
}

fn general<T: Scalar>(
    op: ElementwiseOp,
    left: CsrView<'_, T>,
    right: CsrView<'_, T>,
) -> Result<Csr<T>> {
    let kind = op.kind();
    let rows = left.rows();
    let min_len = even_split(rows);

    let plan: Vec<(usize, RowPath)> = (0..rows)
        .into_par_iter()
        .with_min_len(min_len)
        .map_init(HashMap::new, |lookup, i| {
            let (lc, _) = left.row(i);
            let (rc, _) = right.row(i);
            let mut len = 0;
            let path = if is_sorted_row(lc) && is_sorted_row(rc) {
                merge_sorted(kind, lc, rc, |_, _, _| len += 1);
                RowPath::Sorted
            } else {
                merge_hashed(kind, lc, rc, lookup, |_, _, _| len += 1);
                RowPath::Hashed
            };
            (len, path)
        })
        .collect();

    let lens: Vec<usize> = plan.iter().map(|&(len, _)| len).collect();
    let row_ptr = prefix_sum(&lens)?;
    let nnz = row_ptr[rows];
    let (mut col_index, mut values) = allocate_storage::<T>(nnz)?;
    log::debug!(
        "{}: general merge over {rows} rows, {} hashed, nnz {nnz}",
        op.name(),
        plan.iter().filter(|&&(_, path)| path == RowPath::Hashed).count()
    );

    row_slots(&row_ptr, &mut col_index, &mut values)
        .into_par_iter()
        .zip(plan.par_iter())
        .enumerate()
        .with_min_len(min_len)
        .for_each_init(
            HashMap::new,
            |lookup: &mut HashMap<Index, usize>, (i, ((out_cols, out_values), &(_, path)))| {
                let (lc, lv) = left.row(i);
                let (rc, rv) = right.row(i);
                let mut k = 0;
                let emit = |col, li: Option<usize>, ri: Option<usize>| {
                    out_cols[k] = col;
                    out_values[k] = op.apply(
                        li.map_or(T::ZERO, |x| lv[x]),
                        ri.map_or(T::ZERO, |x| rv[x]),
                    );
                    k += 1;
                };
                match path {
                    RowPath::Sorted => merge_sorted(kind, lc, rc, emit),
                    RowPath::Hashed => merge_hashed(kind, lc, rc, lookup, emit),
                }
                debug_assert_eq!(k, out_cols.len());
            },
        );

    Csr::from_parts(rows, left.cols(), row_ptr, col_index, values)
}
