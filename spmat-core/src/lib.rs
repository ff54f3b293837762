#![no_std]

//! spmat core - sparse matrix layouts and kernel interfaces
//!
//! This crate provides the data model shared by every sparse kernel:
//! owned buffers, the coordinate and row-compressed layouts, the scalar
//! and backend traits, and the validation helpers used by constructors.
//! It does not depend on `std`; the owned layouts need the `alloc` feature.

#[cfg(feature = "alloc")]
extern crate alloc;

#[cfg(feature = "alloc")]
pub mod buffer;
#[cfg(feature = "alloc")]
pub mod coo;
pub mod csr;
pub mod error;
pub mod traits;
pub mod validation;

/// Index type for row and column coordinates
pub type Index = u32;

#[cfg(feature = "alloc")]
pub use buffer::Buffer;
#[cfg(feature = "alloc")]
pub use coo::Coo;
#[cfg(feature = "alloc")]
pub use csr::Csr;
pub use csr::{CsrView, RowPointers};
pub use error::{ErrorCategory, Result, SpmatError};
pub use traits::*;
pub use validation::*;
