//! Shape and index bounds validation

use crate::{Index, Result, SpmatError};

/// Largest row or column count; every index below it fits in [`Index`]
pub const MAX_DIMENSION: usize = Index::MAX as usize;

/// Validate that a matrix shape is usable
///
/// Both dimensions must be positive and representable by the index type.
pub const fn validate_shape(rows: usize, cols: usize) -> Result<()> {
    if rows == 0 || cols == 0 || rows > MAX_DIMENSION || cols > MAX_DIMENSION {
        return Err(SpmatError::InvalidShape { rows, cols });
    }
    Ok(())
}

/// Validate that every column index is smaller than `cols`
pub fn validate_column_bounds(col_index: &[Index], cols: usize) -> Result<()> {
    match col_index.iter().find(|&&c| c as usize >= cols) {
        Some(&c) => Err(SpmatError::ColumnOutOfBounds {
            index: c as usize,
            cols,
        }),
        None => Ok(()),
    }
}

/// Validate that every row index is smaller than `rows`
pub fn validate_row_bounds(row_index: &[Index], rows: usize) -> Result<()> {
    match row_index.iter().find(|&&r| r as usize >= rows) {
        Some(&r) => Err(SpmatError::RowOutOfBounds {
            index: r as usize,
            rows,
        }),
        None => Ok(()),
    }
}
