//! Abstract interfaces shared by matrix layouts and kernel backends
//!
//! Traits are pure interfaces; the concrete kernels live in the `spmat`
//! crate.

pub mod backend;
pub mod element;
pub mod matrix;

#[cfg(feature = "alloc")]
pub use backend::SparseBackend;
pub use element::{DataType, Scalar};
pub use matrix::SparseMatrix;
