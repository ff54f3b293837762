//! Structural validation utilities for sparse layouts
//!
//! This module contains pure validation functions with no allocation.
//! Constructors call the cheap checks unconditionally; the O(nnz) checks
//! on stored indices only run with `debug_assertions`.

pub mod bounds;
pub mod format;

pub use bounds::{validate_column_bounds, validate_row_bounds, validate_shape, MAX_DIMENSION};
pub use format::{validate_level, validate_row_pointers, validate_row_ranges};
