//! Portable parallel kernels
//!
//! Every kernel borrows its operands, runs on the current rayon pool and
//! returns a freshly allocated [`Csr`](spmat_core::Csr). Output rows are
//! written through disjoint `&mut` row slots or, for scatters, through
//! per-row atomic cursors.

mod compress;
pub mod convert;
pub mod elementwise;
pub mod matmul;
pub mod merge;
pub(crate) mod scatter;
pub mod transpose;

pub use convert::coo_to_csr;
pub use elementwise::{elementwise, ElementwiseOp};
pub use matmul::matmul;
pub use merge::MergeKind;
pub use transpose::transpose;
