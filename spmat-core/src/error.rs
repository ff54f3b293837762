//! Error types for sparse matrix operations

/// Errors that can occur while building or combining sparse matrices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpmatError {
    /// Row or column count is zero or does not fit the index type
    InvalidShape { rows: usize, cols: usize },
    /// Operand shapes are incompatible for the named operation
    ShapeMismatch {
        op: &'static str,
        left: (usize, usize),
        right: (usize, usize),
    },
    /// A buffer does not have the length its layout requires
    LengthMismatch { expected: usize, found: usize },
    /// Row pointers are malformed at the given row
    InvalidRowPointers { row: usize },
    /// A stored column index is not smaller than the column count
    ColumnOutOfBounds { index: usize, cols: usize },
    /// A stored row index is not smaller than the row count
    RowOutOfBounds { index: usize, rows: usize },
    /// The same coordinate appears more than once in a coordinate list
    DuplicateCoordinate { row: usize, col: usize },
    /// The allocator could not provide the requested number of elements
    AllocationFailed { elements: usize },
    /// Batched operands hold different numbers of matrices
    BatchMismatch { left: usize, right: usize },
    /// Batched tensor shape or level data is inconsistent
    InvalidTensor,
    /// A dedicated worker pool could not be created
    ThreadPool,
}

/// Broad grouping of errors, useful for mapping onto caller exceptions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Operand dimensions are wrong for the request
    Shape,
    /// Buffers do not describe a well-formed matrix or tensor
    Structure,
    /// Memory or threads could not be obtained
    Resource,
}

impl SpmatError {
    /// Get the category of this error
    pub const fn category(&self) -> ErrorCategory {
        match self {
            SpmatError::InvalidShape { .. }
            | SpmatError::ShapeMismatch { .. }
            | SpmatError::BatchMismatch { .. } => ErrorCategory::Shape,
            SpmatError::LengthMismatch { .. }
            | SpmatError::InvalidRowPointers { .. }
            | SpmatError::ColumnOutOfBounds { .. }
            | SpmatError::RowOutOfBounds { .. }
            | SpmatError::DuplicateCoordinate { .. }
            | SpmatError::InvalidTensor => ErrorCategory::Structure,
            SpmatError::AllocationFailed { .. } | SpmatError::ThreadPool => {
                ErrorCategory::Resource
            }
        }
    }
}

impl core::fmt::Display for SpmatError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            SpmatError::InvalidShape { rows, cols } => {
                write!(f, "Invalid matrix shape {rows}x{cols}")
            }
            SpmatError::ShapeMismatch { op, left, right } => write!(
                f,
                "Shape mismatch in {op}: {}x{} vs {}x{}",
                left.0, left.1, right.0, right.1
            ),
            SpmatError::LengthMismatch { expected, found } => {
                write!(f, "Buffer length mismatch: expected {expected}, found {found}")
            }
            SpmatError::InvalidRowPointers { row } => {
                write!(f, "Invalid row pointers at row {row}")
            }
            SpmatError::ColumnOutOfBounds { index, cols } => {
                write!(f, "Column index {index} out of bounds for {cols} columns")
            }
            SpmatError::RowOutOfBounds { index, rows } => {
                write!(f, "Row index {index} out of bounds for {rows} rows")
            }
            SpmatError::DuplicateCoordinate { row, col } => {
                write!(f, "Duplicate coordinate ({row}, {col})")
            }
            SpmatError::AllocationFailed { elements } => {
                write!(f, "Failed to allocate {elements} elements")
            }
            SpmatError::BatchMismatch { left, right } => {
                write!(f, "Batch size mismatch: {left} vs {right}")
            }
            SpmatError::InvalidTensor => write!(f, "Invalid sparse tensor layout"),
            SpmatError::ThreadPool => write!(f, "Failed to build worker pool"),
        }
    }
}

impl core::error::Error for SpmatError {}

/// Result type for sparse matrix operations
pub type Result<T> = core::result::Result<T, SpmatError>;
