//! Row merges for element-wise operations
//!
//! The merges know nothing about arithmetic. They walk the column indices
//! of two rows and report, for every output entry, its column and the
//! position of the contributing entry on each side. Counting and filling
//! drive the same walk, so both phases always agree on the row length.

use hashbrown::HashMap;
use spmat_core::Index;

/// Which columns of two rows appear in the merged row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeKind {
    /// Every column present on either side
    Union,
    /// Only columns present on both sides
    Intersection,
}

/// Whether the columns of a row are strictly increasing
#[inline]
pub(crate) fn is_sorted_row(cols: &[Index]) -> bool {
    cols.windows(2).all(|w| w[0] < w[1])
}

/// Two-pointer merge of strictly increasing rows
///
/// Output columns come out in increasing order.
pub(crate) fn merge_sorted<F>(kind: MergeKind, left: &[Index], right: &[Index], mut emit: F)
where
    F: FnMut(Index, Option<usize>, Option<usize>),
{
    let (mut i, mut j) = (0, 0);
    while i < left.len() && j < right.len() {
        let (l, r) = (left[i], right[j]);
        if l == r {
            emit(l, Some(i), Some(j));
            i += 1;
            j += 1;
        } else if l < r {
            if kind == MergeKind::Union {
                emit(l, Some(i), None);
            }
            i += 1;
        } else {
            if kind == MergeKind::Union {
                emit(r, None, Some(j));
            }
            j += 1;
        }
    }
    if kind == MergeKind::Union {
        for (k, &l) in left.iter().enumerate().skip(i) {
            emit(l, Some(k), None);
        }
        for (k, &r) in right.iter().enumerate().skip(j) {
            emit(r, None, Some(k));
        }
    }
}

/// Hash merge of rows in arbitrary column order
///
/// Columns are expected to be unique within each row. Left-side columns
/// come out in their stored order, followed (for a union) by the remaining
/// right-side columns in their stored order. `lookup` is caller-owned
/// scratch and is left empty.
pub(crate) fn merge_hashed<F>(
    kind: MergeKind,
    left: &[Index],
    right: &[Index],
    lookup: &mut HashMap<Index, usize>,
    mut emit: F,
) where
    F: FnMut(Index, Option<usize>, Option<usize>),
{
    lookup.clear();
    lookup.extend(right.iter().enumerate().map(|(j, &c)| (c, j)));
    for (i, &c) in left.iter().enumerate() {
        match lookup.remove(&c) {
            Some(j) => emit(c, Some(i), Some(j)),
            None if kind == MergeKind::Union => emit(c, Some(i), None),
            None => {}
        }
    }
    if kind == MergeKind::Union {
        for (j, &c) in right.iter().enumerate() {
            if lookup.get(&c) == Some(&j) {
                emit(c, None, Some(j));
            }
        }
    }
    lookup.clear();
}
