//! Core matrix abstraction trait

use super::element::Scalar;

/// Layout-agnostic read access to a sparse matrix
///
/// Implemented by the coordinate list, the borrowed CSR view and the owned
/// CSR matrix. Element lookup is linear in the row length (or in the total
/// number of entries for a coordinate list) and meant for inspection, not
/// for kernels.
pub trait SparseMatrix {
    /// The element type stored in this matrix
    type Element: Scalar;

    /// Get an element at the specified position
    ///
    /// Returns `None` if nothing is stored there or if the position is out
    /// of bounds.
    fn get_element(&self, row: usize, col: usize) -> Option<Self::Element>;

    /// Get matrix dimensions as (rows, cols)
    fn dimensions(&self) -> (usize, usize);

    /// Get number of stored entries
    fn nnz(&self) -> usize;
}
