//! Row pointer and level layout validation

use crate::{Result, SpmatError};

/// Validate a compressed (`rows + 1`) row pointer array
///
/// The pointer must start at zero, never decrease and end at `nnz`.
pub fn validate_row_pointers(row_ptr: &[usize], rows: usize, nnz: usize) -> Result<()> {
    if row_ptr.len() != rows + 1 {
        return Err(SpmatError::LengthMismatch {
            expected: rows + 1,
            found: row_ptr.len(),
        });
    }
    if row_ptr[0] != 0 {
        return Err(SpmatError::InvalidRowPointers { row: 0 });
    }
    if let Some(row) = row_ptr.windows(2).position(|w| w[0] > w[1]) {
        return Err(SpmatError::InvalidRowPointers { row });
    }
    if row_ptr[rows] != nnz {
        return Err(SpmatError::LengthMismatch {
            expected: row_ptr[rows],
            found: nnz,
        });
    }
    Ok(())
}

/// Validate independent row start/end arrays against the storage length
///
/// Returns the number of stored entries, the sum of all row lengths.
pub fn validate_row_ranges(
    row_start: &[usize],
    row_end: &[usize],
    storage_len: usize,
) -> Result<usize> {
    if row_start.len() != row_end.len() {
        return Err(SpmatError::LengthMismatch {
            expected: row_start.len(),
            found: row_end.len(),
        });
    }
    let mut nnz = 0usize;
    for (row, (&start, &end)) in row_start.iter().zip(row_end).enumerate() {
        if end < start || end > storage_len {
            return Err(SpmatError::InvalidRowPointers { row });
        }
        nnz += end - start;
    }
    Ok(nnz)
}

/// Validate one level of a batched tensor
///
/// An empty `outer` describes an empty level; otherwise `outer` starts at
/// zero, never decreases and its last entry equals `inner_len`.
pub fn validate_level(outer: &[usize], inner_len: usize) -> Result<()> {
    let Some(&last) = outer.last() else {
        return if inner_len == 0 {
            Ok(())
        } else {
            Err(SpmatError::InvalidTensor)
        };
    };
    if outer[0] != 0 || last != inner_len || outer.windows(2).any(|w| w[0] > w[1]) {
        return Err(SpmatError::InvalidTensor);
    }
    Ok(())
}
