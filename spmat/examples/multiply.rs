//! Multiply two large random sparse matrices and report timings

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use spmat::{Csr, KernelConfig, PortableBackend, SparseBackend, SparseMatrix};
use std::time::Instant;

fn random_matrix(rng: &mut StdRng, n: usize, per_row: usize) -> spmat::Result<Csr<f64>> {
    let triplets: Vec<_> = (0..n)
        .flat_map(|r| (0..per_row).map(move |_| r))
        .map(|r| (r, rng.gen_range(0..n), rng.gen_range(-1.0..1.0)))
        .collect();
    spmat::from_triplets(n, n, &triplets)
}

fn main() -> spmat::Result<()> {
    let n = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(20_000);
    let per_row = 16;

    let backend = PortableBackend::with_config(KernelConfig::from_env())?;
    println!(
        "Using the {} backend on {} threads",
        SparseBackend::<f64>::name(&backend),
        backend.num_threads()
    );

    println!("Building two {n} x {n} matrices with ~{per_row} entries per row...");
    let start = Instant::now();
    let mut rng = StdRng::seed_from_u64(42);
    let a = random_matrix(&mut rng, n, per_row)?;
    let b = random_matrix(&mut rng, n, per_row)?;
    println!(
        "Built in {:.3}ms (nnz {} and {})",
        start.elapsed().as_secs_f64() * 1000.0,
        a.nnz(),
        b.nnz()
    );

    let start = Instant::now();
    let sum = backend.add(a.view(), b.view())?;
    println!(
        "add:       {:>10.3}ms, nnz {}",
        start.elapsed().as_secs_f64() * 1000.0,
        sum.nnz()
    );

    let start = Instant::now();
    let product = backend.matmul(a.view(), b.view())?;
    println!(
        "matmul:    {:>10.3}ms, nnz {}",
        start.elapsed().as_secs_f64() * 1000.0,
        product.nnz()
    );

    let start = Instant::now();
    let transposed = backend.transpose(product.view())?;
    println!(
        "transpose: {:>10.3}ms, nnz {}",
        start.elapsed().as_secs_f64() * 1000.0,
        transposed.nnz()
    );

    println!("\nResult Information:");
    println!("   Dimensions: {} x {}", product.rows(), product.cols());
    println!(
        "   Density: {:.6}%",
        (product.nnz() as f64 / (n * n) as f64) * 100.0
    );
    if let Some(value) = product.get_element(0, 0) {
        println!("   product[0, 0] = {value}");
    }
    Ok(())
}
