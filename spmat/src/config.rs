//! Kernel tuning and policy configuration

use std::env;

/// Environment variable read by [`KernelConfig::from_env`]
pub const NUM_THREADS_ENV: &str = "SPMAT_NUM_THREADS";

/// How coordinate-to-CSR conversion treats repeated `(row, col)` entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// Merge repeated coordinates into one entry carrying their sum
    #[default]
    Sum,
    /// Fail with [`SpmatError::DuplicateCoordinate`](crate::SpmatError)
    Reject,
}

/// Configuration shared by all kernels of a backend
#[derive(Debug, Clone, PartialEq)]
pub struct KernelConfig {
    /// Size of a dedicated worker pool; `None` uses the global rayon pool
    pub num_threads: Option<usize>,
    /// Target number of row chunks per worker in matrix multiplication
    pub tasks_per_thread: usize,
    /// Dense accumulation is chosen when `max_span * rows * factor` is below
    /// the total number of insertions
    pub dense_insertion_factor: usize,
    /// Bitmap compression is used for the symbolic phase when the compressed
    /// insertion count is below `total / divisor`
    pub compression_divisor: usize,
    /// Handling of repeated coordinates in coordinate-to-CSR conversion
    pub duplicate_policy: DuplicatePolicy,
    /// Sort rows produced by an atomic scatter by column
    pub sort_scattered_rows: bool,
}

impl KernelConfig {
    /// Set the size of a dedicated worker pool
    pub fn with_num_threads(mut self, num_threads: usize) -> Self {
        self.num_threads = Some(num_threads.max(1));
        self
    }

    /// Set the number of multiplication chunks per worker
    pub fn with_tasks_per_thread(mut self, tasks_per_thread: usize) -> Self {
        self.tasks_per_thread = tasks_per_thread.max(1);
        self
    }

    /// Set the dense accumulation threshold factor
    pub fn with_dense_insertion_factor(mut self, factor: usize) -> Self {
        self.dense_insertion_factor = factor;
        self
    }

    /// Set the bitmap compression threshold divisor
    pub fn with_compression_divisor(mut self, divisor: usize) -> Self {
        self.compression_divisor = divisor.max(1);
        self
    }

    /// Set the duplicate coordinate policy
    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    /// Sort scattered rows by column
    pub fn with_sorted_scatter(mut self, sort: bool) -> Self {
        self.sort_scattered_rows = sort;
        self
    }

    /// Default configuration, with the pool size taken from
    /// `SPMAT_NUM_THREADS` when it holds a positive integer
    pub fn from_env() -> Self {
        let config = Self::default();
        let Ok(value) = env::var(NUM_THREADS_ENV) else {
            return config;
        };
        match parse_num_threads(&value) {
            Some(n) => config.with_num_threads(n),
            None => {
                log::warn!("ignoring invalid {NUM_THREADS_ENV}={value:?}");
                config
            }
        }
    }

    /// Minimum number of rows handed to a worker at once in multiplication
    pub fn chunk_rows(&self, rows: usize, threads: usize) -> usize {
        (rows / threads.max(1) / self.tasks_per_thread.max(1)).max(1)
    }
}

/// Parse a worker count; only positive integers are accepted
fn parse_num_threads(value: &str) -> Option<usize> {
    value.trim().parse::<usize>().ok().filter(|&n| n > 0)
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            num_threads: None,
            tasks_per_thread: 30,
            dense_insertion_factor: 4,
            compression_divisor: 2,
            duplicate_policy: DuplicatePolicy::Sum,
            sort_scattered_rows: false,
        }
    }
}
