//! 32-bit bitmap compression of row-sorted matrices
//!
//! Each row is stored as a list of `(word, mask)` pairs, where `word` is
//! `col >> 5` and bit `col & 31` of `mask` is set for every stored column.
//! Counting the distinct output columns of a product row then becomes an
//! OR over words plus a popcount, which touches far fewer slots when rows
//! hold runs of nearby columns.

use rayon::prelude::*;
use spmat_core::{Buffer, CsrView, Index, Result};

use super::scatter::{even_split, prefix_sum, row_slots};

/// Number of table words needed for a column span, plus one for a span
/// that does not start on a word boundary
#[inline]
pub(crate) fn word_table_len(span: usize) -> usize {
    ((span + 31) >> 5) + 1
}

/// Bitmap-compressed copy of a matrix pattern
pub(crate) struct BitmapRows {
    row_ptr: Buffer<usize>,
    words: Buffer<Index>,
    masks: Buffer<u32>,
}

impl BitmapRows {
    /// Compress every row of `matrix`
    ///
    /// Columns of each row must be non-decreasing.
    pub(crate) fn build<T: Sync>(matrix: CsrView<'_, T>) -> Result<Self> {
        let rows = matrix.rows();
        let counts: Vec<usize> = (0..rows)
            .into_par_iter()
            .with_min_len(even_split(rows))
            .map(|r| {
                let (cols, _) = matrix.row(r);
                let mut count = 0;
                let mut last = None;
                for &c in cols {
                    if last != Some(c >> 5) {
                        last = Some(c >> 5);
                        count += 1;
                    }
                }
                count
            })
            .collect();

        let row_ptr = prefix_sum(&counts)?;
        let mut words = Buffer::<Index>::allocate(row_ptr[rows])?;
        let mut masks = Buffer::<u32>::allocate(row_ptr[rows])?;
        row_slots(&row_ptr, &mut words, &mut masks)
            .into_par_iter()
            .enumerate()
            .with_min_len(even_split(rows))
            .for_each(|(r, (row_words, row_masks))| {
                let (cols, _) = matrix.row(r);
                let mut slot = None;
                for &c in cols {
                    let word = c >> 5;
                    let s = match slot {
                        Some(s) if row_words[s] == word => s,
                        Some(s) => s + 1,
                        None => 0,
                    };
                    row_words[s] = word;
                    row_masks[s] |= 1 << (c & 31);
                    slot = Some(s);
                }
            });

        Ok(Self {
            row_ptr,
            words,
            masks,
        })
    }

    /// Word indices and masks of one row
    #[inline]
    pub(crate) fn row(&self, row: usize) -> (&[Index], &[u32]) {
        let range = self.row_ptr[row]..self.row_ptr[row + 1];
        (&self.words[range.clone()], &self.masks[range])
    }

    #[inline]
    pub(crate) fn row_len(&self, row: usize) -> usize {
        self.row_ptr[row + 1] - self.row_ptr[row]
    }
}
