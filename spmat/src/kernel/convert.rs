//! Coordinate-list to CSR conversion

use hashbrown::hash_map::Entry;
use hashbrown::{HashMap, HashSet};
use rayon::prelude::*;
use spmat_core::{Buffer, Coo, Csr, CsrView, Index, Result, Scalar, SpmatError};

use super::merge::is_sorted_row;
use super::scatter::{
    allocate_storage, even_split, histogram, prefix_sum, row_slots, sort_rows, Scatter,
};
use crate::config::{DuplicatePolicy, KernelConfig};

/// Convert a coordinate list into CSR, consuming it
///
/// Input sorted by row keeps its column and value buffers as they are and
/// only derives the row pointer. Otherwise entries are counted per row and
/// scattered in parallel, which leaves the order within a row unspecified
/// unless [`KernelConfig::sort_scattered_rows`] is set. Repeated
/// coordinates are then handled according to
/// [`KernelConfig::duplicate_policy`].
pub fn coo_to_csr<T: Scalar>(coo: Coo<T>, config: &KernelConfig) -> Result<Csr<T>> {
    let (rows, cols, row_index, col_index, values) = coo.into_parts();
    let n = row_index.len();
    if n == 0 {
        return Csr::empty(rows, cols);
    }

    let (row_ptr, col_index, values) = if row_index.par_windows(2).all(|w| w[0] <= w[1]) {
        log::debug!("coo_to_csr: {n} entries already grouped by row");
        let mut row_ptr = Buffer::<usize>::allocate(rows + 1)?;
        row_ptr
            .par_iter_mut()
            .enumerate()
            .for_each(|(r, p)| *p = row_index.partition_point(|&x| (x as usize) < r));
        if row_ptr[rows] != n {
            return Err(SpmatError::RowOutOfBounds {
                index: row_index[row_ptr[rows]] as usize,
                rows,
            });
        }
        (row_ptr, col_index, values)
    } else {
        log::debug!("coo_to_csr: scattering {n} unordered entries over {rows} rows");
        if let Some(pos) = row_index.par_iter().position_any(|&r| r as usize >= rows) {
            return Err(SpmatError::RowOutOfBounds {
                index: row_index[pos] as usize,
                rows,
            });
        }
        let chunk = even_split(n);
        let counts = histogram(n.div_ceil(chunk), rows, |u| {
            &row_index[u * chunk..((u + 1) * chunk).min(n)]
        });
        let row_ptr = prefix_sum(&counts)?;
        let (mut out_cols, mut out_values) = allocate_storage::<T>(n)?;
        {
            let scatter = Scatter::new(&row_ptr, &mut out_cols, &mut out_values);
            row_index
                .par_iter()
                .zip(col_index.par_iter())
                .zip(values.par_iter())
                .with_min_len(chunk)
                .for_each(|((&r, &c), &v)| scatter.push(r as usize, c, v));
        }
        if config.sort_scattered_rows {
            sort_rows(&row_ptr, &mut out_cols, &mut out_values);
        }
        (row_ptr, out_cols, out_values)
    };

    resolve_duplicates(rows, cols, row_ptr, col_index, values, config.duplicate_policy)
}

/// Number of distinct columns in a row
fn distinct_columns(cols: &[Index], seen: &mut HashSet<Index>) -> usize {
    if is_sorted_row(cols) {
        return cols.len();
    }
    seen.clear();
    seen.extend(cols.iter().copied());
    seen.len()
}

fn resolve_duplicates<T: Scalar>(
    rows: usize,
    cols: usize,
    row_ptr: Buffer<usize>,
    col_index: Buffer<Index>,
    values: Buffer<T>,
    policy: DuplicatePolicy,
) -> Result<Csr<T>> {
    let distinct: Vec<usize> = {
        let view = CsrView::new(rows, cols, &row_ptr, &col_index, &values)?;
        (0..rows)
            .into_par_iter()
            .with_min_len(even_split(rows))
            .map_init(HashSet::new, |seen, i| distinct_columns(view.row(i).0, seen))
            .collect()
    };
    let unique: usize = distinct.iter().sum();
    if unique == col_index.len() {
        return Csr::from_parts(rows, cols, row_ptr, col_index, values);
    }

    let view = CsrView::new(rows, cols, &row_ptr, &col_index, &values)?;
    match policy {
        DuplicatePolicy::Reject => {
            let (row, col) = (0..rows)
                .find(|&i| distinct[i] < view.row_len(i))
                .and_then(|i| {
                    let mut seen = HashSet::new();
                    view.row(i).0.iter().find(|&&c| !seen.insert(c)).map(|&c| (i, c as usize))
                })
                .unwrap_or((0, 0));
            Err(SpmatError::DuplicateCoordinate { row, col })
        }
        DuplicatePolicy::Sum => {
            log::debug!(
                "coo_to_csr: summing {} duplicate entries",
                col_index.len() - unique
            );
            let merged_ptr = prefix_sum(&distinct)?;
            let (mut merged_cols, mut merged_values) = allocate_storage::<T>(unique)?;
            row_slots(&merged_ptr, &mut merged_cols, &mut merged_values)
                .into_par_iter()
                .enumerate()
                .with_min_len(even_split(rows))
                .for_each_init(
                    HashMap::new,
                    |slot_of: &mut HashMap<Index, usize>, (i, (out_cols, out_values))| {
                        let (row_cols, row_values) = view.row(i);
                        slot_of.clear();
                        let mut n = 0;
                        for (&c, &v) in row_cols.iter().zip(row_values) {
                            match slot_of.entry(c) {
                                Entry::Occupied(slot) => {
                                    let s = *slot.get();
                                    out_values[s] = out_values[s] + v;
                                }
                                Entry::Vacant(slot) => {
                                    slot.insert(n);
                                    out_cols[n] = c;
                                    out_values[n] = v;
                                    n += 1;
                                }
                            }
                        }
                    },
                );
            Csr::from_parts(rows, cols, merged_ptr, merged_cols, merged_values)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn coo(rows: usize, cols: usize, r: &[Index], c: &[Index], v: &[f64]) -> Coo<f64> {
        Coo::new(
            rows,
            cols,
            Buffer::from_slice(r).unwrap(),
            Buffer::from_slice(c).unwrap(),
            Buffer::from_slice(v).unwrap(),
        )
        .unwrap()
    }

    fn entries(csr: &Csr<f64>) -> BTreeSet<(usize, usize, u64)> {
        csr.triplets().map(|(r, c, v)| (r, c, v.to_bits())).collect()
    }

    #[test]
    fn test_diagonal() {
        let csr = coo_to_csr(
            coo(5, 5, &[0, 1, 2, 3, 4], &[0, 1, 2, 3, 4], &[0.0, 1.0, 2.0, 3.0, 4.0]),
            &KernelConfig::default(),
        )
        .unwrap();
        assert_eq!(csr.row_ptr(), &[0, 1, 2, 3, 4, 5]);
        assert_eq!(csr.col_index(), &[0, 1, 2, 3, 4]);
        assert_eq!(csr.values(), &[0.0, 1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_empty() {
        let csr = coo_to_csr(coo(5, 5, &[], &[], &[]), &KernelConfig::default()).unwrap();
        assert_eq!(csr.row_ptr(), &[0; 6]);
        assert_eq!(csr.nnz(), 0);
    }

    #[test]
    fn test_sorted_rows_keep_input_order() {
        let csr = coo_to_csr(
            coo(3, 3, &[0, 0, 1, 1, 2], &[1, 2, 0, 1, 2], &[0.5, 0.25, 0.75, 1.5, 2.5]),
            &KernelConfig::default(),
        )
        .unwrap();
        assert_eq!(csr.row_ptr(), &[0, 2, 4, 5]);
        assert_eq!(csr.col_index(), &[1, 2, 0, 1, 2]);
        assert_eq!(csr.values(), &[0.5, 0.25, 0.75, 1.5, 2.5]);
    }

    #[test]
    fn test_sparse_rows() {
        let csr = coo_to_csr(
            coo(10, 5, &[0, 4, 4, 7], &[2, 0, 2, 4], &[0.6, 0.9, 0.4, 0.7]),
            &KernelConfig::default(),
        )
        .unwrap();
        assert_eq!(csr.row_ptr(), &[0, 1, 1, 1, 1, 3, 3, 3, 4, 4, 4]);
        assert_eq!(csr.col_index(), &[2, 0, 2, 4]);
    }

    #[test]
    fn test_permuted_rows_scatter() {
        let input = coo(10, 5, &[0, 7, 4, 4], &[2, 4, 2, 0], &[0.6, 0.7, 0.4, 0.9]);
        let expected: BTreeSet<_> = [(0, 2, 0.6f64), (4, 0, 0.9), (4, 2, 0.4), (7, 4, 0.7)]
            .iter()
            .map(|&(r, c, v)| (r, c, v.to_bits()))
            .collect();

        let csr = coo_to_csr(input, &KernelConfig::default()).unwrap();
        assert_eq!(csr.row_ptr(), &[0, 1, 1, 1, 1, 3, 3, 3, 4, 4, 4]);
        assert_eq!(entries(&csr), expected);

        let input = coo(10, 5, &[0, 7, 4, 4], &[2, 4, 2, 0], &[0.6, 0.7, 0.4, 0.9]);
        let sorted = coo_to_csr(input, &KernelConfig::default().with_sorted_scatter(true)).unwrap();
        assert_eq!(sorted.col_index(), &[2, 0, 2, 4]);
        assert_eq!(sorted.values(), &[0.6, 0.9, 0.4, 0.7]);
    }

    #[test]
    fn test_duplicates_are_summed_in_first_occurrence_order() {
        let input = coo(2, 4, &[0, 0, 0, 0, 1], &[3, 1, 3, 1, 2], &[1.0, 2.0, 4.0, 16.0, 8.0]);
        let csr = coo_to_csr(input, &KernelConfig::default()).unwrap();
        assert_eq!(csr.row_ptr(), &[0, 2, 3]);
        assert_eq!(csr.row(0), (&[3, 1][..], &[5.0, 18.0][..]));
        assert_eq!(csr.row(1), (&[2][..], &[8.0][..]));
    }

    #[test]
    fn test_duplicates_rejected() {
        let input = coo(3, 3, &[0, 2, 2], &[1, 0, 0], &[1.0, 2.0, 3.0]);
        let config = KernelConfig::default().with_duplicate_policy(DuplicatePolicy::Reject);
        assert_eq!(
            coo_to_csr(input, &config).unwrap_err(),
            SpmatError::DuplicateCoordinate { row: 2, col: 0 }
        );
    }
}
