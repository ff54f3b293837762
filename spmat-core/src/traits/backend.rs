//! Kernel backend interface
//!
//! A backend provides every sparse arithmetic operation for one scalar
//! type. Callers that want to swap in an accelerated implementation hold a
//! `&dyn SparseBackend<T>` instead of calling the portable free functions
//! directly.

#![cfg(feature = "alloc")]

use crate::coo::Coo;
use crate::csr::{Csr, CsrView};
use crate::error::Result;

use super::element::Scalar;

/// Trait for implementations of the sparse arithmetic kernels
///
/// All operations leave their inputs untouched, except [`coo_to_csr`],
/// which consumes the coordinate list. Results are always freshly
/// allocated 3-array CSR matrices.
///
/// [`coo_to_csr`]: SparseBackend::coo_to_csr
pub trait SparseBackend<T: Scalar>: Send + Sync {
    /// Short identifier used in log output
    fn name(&self) -> &'static str;

    /// Element-wise sum over the union of both patterns
    fn add(&self, a: CsrView<'_, T>, b: CsrView<'_, T>) -> Result<Csr<T>>;

    /// Element-wise difference over the union of both patterns
    fn sub(&self, a: CsrView<'_, T>, b: CsrView<'_, T>) -> Result<Csr<T>>;

    /// Element-wise product over the intersection of both patterns
    fn times(&self, a: CsrView<'_, T>, b: CsrView<'_, T>) -> Result<Csr<T>>;

    /// Matrix product `a * b`
    fn matmul(&self, a: CsrView<'_, T>, b: CsrView<'_, T>) -> Result<Csr<T>>;

    /// Transposed copy of `a`
    fn transpose(&self, a: CsrView<'_, T>) -> Result<Csr<T>>;

    /// Convert a coordinate list into CSR, consuming it
    fn coo_to_csr(&self, coo: Coo<T>) -> Result<Csr<T>>;
}
