//! Portable backend built on the rayon kernels

use std::sync::OnceLock;

use rayon::{ThreadPool, ThreadPoolBuilder};
use spmat_core::{Coo, Csr, CsrView, Result, Scalar, SparseBackend, SpmatError};

use crate::config::KernelConfig;
use crate::kernel::{self, ElementwiseOp};

/// Backend running the portable kernels
///
/// Kernels run on the global rayon pool, or on a dedicated pool when the
/// configuration sets `num_threads`.
#[derive(Debug)]
pub struct PortableBackend {
    config: KernelConfig,
    pool: Option<ThreadPool>,
}

impl PortableBackend {
    /// Backend with the default configuration on the global pool
    pub fn new() -> Self {
        Self {
            config: KernelConfig::default(),
            pool: None,
        }
    }

    /// Backend with a custom configuration
    ///
    /// Fails with [`SpmatError::ThreadPool`] if a dedicated pool was
    /// requested and could not be started.
    pub fn with_config(config: KernelConfig) -> Result<Self> {
        let pool = match config.num_threads {
            Some(threads) => Some(
                ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .thread_name(|i| format!("spmat-worker-{i}"))
                    .build()
                    .map_err(|e| {
                        log::error!("failed to start {threads} worker threads: {e}");
                        SpmatError::ThreadPool
                    })?,
            ),
            None => None,
        };
        Ok(Self { config, pool })
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// Number of workers the kernels of this backend run on
    pub fn num_threads(&self) -> usize {
        match &self.pool {
            Some(pool) => pool.current_num_threads(),
            None => rayon::current_num_threads(),
        }
    }

    fn run<R, F>(&self, f: F) -> R
    where
        R: Send,
        F: FnOnce() -> R + Send,
    {
        match &self.pool {
            Some(pool) => pool.install(f),
            None => f(),
        }
    }
}

impl Default for PortableBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Scalar> SparseBackend<T> for PortableBackend {
    fn name(&self) -> &'static str {
        "portable"
    }

    fn add(&self, a: CsrView<'_, T>, b: CsrView<'_, T>) -> Result<Csr<T>> {
        self.run(|| kernel::elementwise(ElementwiseOp::Add, a, b))
    }

    fn sub(&self, a: CsrView<'_, T>, b: CsrView<'_, T>) -> Result<Csr<T>> {
        self.run(|| kernel::elementwise(ElementwiseOp::Sub, a, b))
    }

    fn times(&self, a: CsrView<'_, T>, b: CsrView<'_, T>) -> Result<Csr<T>> {
        self.run(|| kernel::elementwise(ElementwiseOp::Times, a, b))
    }

    fn matmul(&self, a: CsrView<'_, T>, b: CsrView<'_, T>) -> Result<Csr<T>> {
        self.run(|| kernel::matmul(a, b, &self.config))
    }

    fn transpose(&self, a: CsrView<'_, T>) -> Result<Csr<T>> {
        self.run(|| kernel::transpose(a, &self.config))
    }

    fn coo_to_csr(&self, coo: Coo<T>) -> Result<Csr<T>> {
        self.run(|| kernel::coo_to_csr(coo, &self.config))
    }
}

static DEFAULT_BACKEND: OnceLock<PortableBackend> = OnceLock::new();

/// The process-wide backend used by the free functions of this crate
///
/// Configured from the environment on first use (see
/// [`KernelConfig::from_env`]). If the requested pool cannot be started
/// the global rayon pool is used instead.
pub fn default_backend() -> &'static PortableBackend {
    DEFAULT_BACKEND.get_or_init(|| backend_or_global(KernelConfig::from_env()))
}

fn backend_or_global(config: KernelConfig) -> PortableBackend {
    PortableBackend::with_config(config.clone()).unwrap_or_else(|_| {
        log::warn!("falling back to the global worker pool");
        global_backend(config)
    })
}

fn global_backend(config: KernelConfig) -> PortableBackend {
    PortableBackend {
        config: KernelConfig {
            num_threads: None,
            ..config
        },
        pool: None,
    }
}
