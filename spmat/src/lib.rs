//! spmat - Portable parallel sparse matrix arithmetic
//!
//! This library provides element-wise arithmetic, sparse-sparse matrix
//! multiplication, transposition and coordinate-list conversion on CSR
//! matrices, parallelised with rayon.
//!
//! ## Architecture
//!
//! spmat keeps data layouts and kernels apart:
//!
//! - **spmat-core**: Buffers, COO and CSR layouts, validation and the backend trait (`no_std`)
//! - **spmat**: The portable kernels, the backend running them and the batched adapter
//!
//! ## Quick Start
//!
//! ```rust
//! use spmat::{Csr, SpmatError};
//!
//! fn example() -> Result<(), SpmatError> {
//!     let a = spmat::from_triplets(2, 3, &[(0, 0, 1.0f64), (1, 2, 2.0)])?;
//!     let b = Csr::identity(3)?;
//!
//!     let sum = spmat::add(a.view(), a.view())?;
//!     let product = spmat::matmul(sum.view(), b.view())?;
//!     assert_eq!(product.to_dense(), vec![2.0, 0.0, 0.0, 0.0, 0.0, 4.0]);
//!     Ok(())
//! }
//! # example().unwrap();
//! ```
//!
//! ## Features
//!
//! - **Two-phase kernels**: Output sizes are counted before any storage is written
//! - **Adaptive multiply**: Dense or hashed accumulators, bitmap-compressed counting
//! - **Split layouts**: Operands may use separate row start and end arrays
//! - **Batching**: Stacks of same-shaped matrices as one [`SparseTensor`]
//!
//! The free functions run on [`default_backend`], whose worker count can be
//! set with the `SPMAT_NUM_THREADS` environment variable.

// Re-export core abstractions and layouts
pub use spmat_core::{
    // Layouts
    Buffer, Coo, Csr, CsrView, Index, RowPointers,
    // Core traits
    DataType, Scalar, SparseBackend, SparseMatrix,
    // Error handling
    ErrorCategory, Result, SpmatError,
};

// Implementation modules
pub mod backend;
pub mod batched;
pub mod config;
pub mod kernel;

// Public exports
pub use backend::{default_backend, PortableBackend};
pub use batched::{BatchMatrix, DimLevel, SparseTensor};
pub use config::{DuplicatePolicy, KernelConfig};

/// Element-wise sum of two matrices of the same shape
pub fn add<T: Scalar>(a: CsrView<'_, T>, b: CsrView<'_, T>) -> Result<Csr<T>> {
    default_backend().add(a, b)
}

/// Element-wise difference of two matrices of the same shape
pub fn sub<T: Scalar>(a: CsrView<'_, T>, b: CsrView<'_, T>) -> Result<Csr<T>> {
    default_backend().sub(a, b)
}

/// Element-wise (Hadamard) product of two matrices of the same shape
pub fn times<T: Scalar>(a: CsrView<'_, T>, b: CsrView<'_, T>) -> Result<Csr<T>> {
    default_backend().times(a, b)
}

/// Matrix product `a * b`
pub fn matmul<T: Scalar>(a: CsrView<'_, T>, b: CsrView<'_, T>) -> Result<Csr<T>> {
    default_backend().matmul(a, b)
}

/// Transposed copy of a matrix
pub fn transpose<T: Scalar>(a: CsrView<'_, T>) -> Result<Csr<T>> {
    default_backend().transpose(a)
}

/// Convert a coordinate list into CSR
pub fn coo_to_csr<T: Scalar>(coo: Coo<T>) -> Result<Csr<T>> {
    default_backend().coo_to_csr(coo)
}

/// Build a CSR matrix from `(row, col, value)` triplets in any order
///
/// Repeated coordinates are handled by the default backend's
/// [`DuplicatePolicy`].
pub fn from_triplets<T: Scalar>(
    rows: usize,
    cols: usize,
    triplets: &[(usize, usize, T)],
) -> Result<Csr<T>> {
    coo_to_csr(Coo::from_triplets(rows, cols, triplets)?)
}
