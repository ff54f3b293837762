//! Shared building blocks for the two-phase kernels
//!
//! Count, prefix sum, then fill: every kernel sizes its output before
//! writing it. Fills go either through [`row_slots`] (one worker owns a
//! whole output row) or through [`Scatter`] (many workers append to the
//! same row through an atomic cursor).

use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use spmat_core::{Buffer, Index, Result, Scalar};

/// The column and value storage of one output row
pub(crate) type RowSlot<'a, T> = (&'a mut [Index], &'a mut [T]);

/// Minimum work unit for a static split of `len` items over the pool
pub(crate) fn even_split(len: usize) -> usize {
    len.div_ceil(rayon::current_num_threads()).max(1)
}

/// Turn per-row counts into a `rows + 1` row pointer
pub(crate) fn prefix_sum(counts: &[usize]) -> Result<Buffer<usize>> {
    let mut row_ptr = Buffer::allocate(counts.len() + 1)?;
    for (i, &count) in counts.iter().enumerate() {
        row_ptr[i + 1] = row_ptr[i] + count;
    }
    Ok(row_ptr)
}

/// Allocate zeroed column and value storage for `nnz` entries
pub(crate) fn allocate_storage<T: Scalar>(nnz: usize) -> Result<(Buffer<Index>, Buffer<T>)> {
    Ok((Buffer::allocate(nnz)?, Buffer::allocate(nnz)?))
}

/// Split output storage into one disjoint slot per row
///
/// `row_ptr` must start at zero and end at the storage length.
pub(crate) fn row_slots<'a, T>(
    row_ptr: &[usize],
    mut cols: &'a mut [Index],
    mut values: &'a mut [T],
) -> Vec<RowSlot<'a, T>> {
    let mut slots = Vec::with_capacity(row_ptr.len().saturating_sub(1));
    for w in row_ptr.windows(2) {
        let len = w[1] - w[0];
        let (row_cols, rest_cols) = std::mem::take(&mut cols).split_at_mut(len);
        let (row_values, rest_values) = std::mem::take(&mut values).split_at_mut(len);
        slots.push((row_cols, row_values));
        cols = rest_cols;
        values = rest_values;
    }
    slots
}

/// Count keys into `bins` buckets
///
/// `keys_of(u)` yields the keys of work unit `u`. Each worker fills a
/// private counter block; the blocks are summed at the end.
pub(crate) fn histogram<'a, F>(units: usize, bins: usize, keys_of: F) -> Vec<usize>
where
    F: Fn(usize) -> &'a [Index] + Sync + Send,
{
    (0..units)
        .into_par_iter()
        .with_min_len(even_split(units))
        .fold(
            || vec![0usize; bins],
            |mut counts, unit| {
                for &key in keys_of(unit) {
                    counts[key as usize] += 1;
                }
                counts
            },
        )
        .reduce_with(|mut total, block| {
            for (t, b) in total.iter_mut().zip(&block) {
                *t += b;
            }
            total
        })
        .unwrap_or_else(|| vec![0; bins])
}

/// Concurrent appender into row-partitioned storage
///
/// Each row owns the storage range given by its row pointer. Appends claim
/// the next free position of a row with a `fetch_add` on that row's
/// cursor, so placement order within a row depends on scheduling.
pub(crate) struct Scatter<'a, T> {
    row_ptr: &'a [usize],
    cursors: Vec<AtomicUsize>,
    cols: *mut Index,
    values: *mut T,
    _storage: PhantomData<(&'a mut [Index], &'a mut [T])>,
}

// Positions are claimed through atomic cursors and checked against the row
// range before each write, so no two threads ever touch the same element.
unsafe impl<T: Send> Send for Scatter<'_, T> {}
unsafe impl<T: Send> Sync for Scatter<'_, T> {}

impl<'a, T: Copy> Scatter<'a, T> {
    pub(crate) fn new(row_ptr: &'a [usize], cols: &'a mut [Index], values: &'a mut [T]) -> Self {
        let nnz = row_ptr.last().copied().unwrap_or(0);
        assert!(cols.len() == nnz && values.len() == nnz);
        let cursors = row_ptr
            .iter()
            .take(row_ptr.len().saturating_sub(1))
            .map(|&start| AtomicUsize::new(start))
            .collect();
        Self {
            row_ptr,
            cursors,
            cols: cols.as_mut_ptr(),
            values: values.as_mut_ptr(),
            _storage: PhantomData,
        }
    }

    /// Append one entry to `row`
    ///
    /// Panics if the row receives more entries than its range holds.
    #[inline]
    pub(crate) fn push(&self, row: usize, col: Index, value: T) {
        let pos = self.cursors[row].fetch_add(1, Ordering::Relaxed);
        assert!(pos < self.row_ptr[row + 1], "row {row} overflows its range");
        // SAFETY: `pos` lies inside this row's range, which is inside the
        // storage, and the cursor hands it out exactly once.
        unsafe {
            self.cols.add(pos).write(col);
            self.values.add(pos).write(value);
        }
    }
}

/// Sort every row by column, carrying values along
pub(crate) fn sort_rows<T: Scalar>(row_ptr: &[usize], cols: &mut [Index], values: &mut [T]) {
    let rows = row_ptr.len().saturating_sub(1);
    row_slots(row_ptr, cols, values)
        .into_par_iter()
        .with_min_len(even_split(rows))
        .for_each_init(Vec::new, |pairs: &mut Vec<(Index, T)>, (row_cols, row_values)| {
            if row_cols.windows(2).all(|w| w[0] <= w[1]) {
                return;
            }
            pairs.clear();
            pairs.extend(row_cols.iter().copied().zip(row_values.iter().copied()));
            pairs.sort_by_key(|&(col, _)| col);
            for ((c, v), &(col, value)) in row_cols.iter_mut().zip(row_values.iter_mut()).zip(pairs.iter()) {
                *c = col;
                *v = value;
            }
        });
}
