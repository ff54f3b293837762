//! Randomised checks of every kernel against a dense reference

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use spmat::{
    Csr, CsrView, KernelConfig, PortableBackend, SparseBackend, SparseTensor,
};

/// Random matrix with small integer values, so every sum is exact
fn random_triplets(rng: &mut StdRng, rows: usize, cols: usize, density: f64) -> Vec<(usize, usize, f64)> {
    let mut triplets = Vec::new();
    for r in 0..rows {
        for c in 0..cols {
            if rng.gen_bool(density) {
                triplets.push((r, c, rng.gen_range(-9..=9) as f64));
            }
        }
    }
    triplets
}

fn random_matrix(rng: &mut StdRng, rows: usize, cols: usize, density: f64) -> Csr<f64> {
    spmat::from_triplets(rows, cols, &random_triplets(rng, rows, cols, density)).unwrap()
}

fn dense_matmul(a: &[f64], b: &[f64], n: usize, k: usize, m: usize) -> Vec<f64> {
    let mut out = vec![0.0; n * m];
    for i in 0..n {
        for p in 0..k {
            let x = a[i * k + p];
            if x != 0.0 {
                for j in 0..m {
                    out[i * m + j] += x * b[p * m + j];
                }
            }
        }
    }
    out
}

fn dense_transpose(a: &[f64], rows: usize, cols: usize) -> Vec<f64> {
    let mut out = vec![0.0; rows * cols];
    for r in 0..rows {
        for c in 0..cols {
            out[c * rows + r] = a[r * cols + c];
        }
    }
    out
}

const SHAPES: [(usize, usize); 4] = [(1, 1), (7, 3), (33, 65), (120, 90)];
const DENSITIES: [f64; 3] = [0.02, 0.2, 0.7];

#[test]
fn test_elementwise_matches_dense() {
    let mut rng = StdRng::seed_from_u64(42);
    for &(rows, cols) in &SHAPES {
        for &density in &DENSITIES {
            let a = random_matrix(&mut rng, rows, cols, density);
            let b = random_matrix(&mut rng, rows, cols, density);
            let (da, db) = (a.to_dense(), b.to_dense());

            let sum = spmat::add(a.view(), b.view()).unwrap();
            let diff = spmat::sub(a.view(), b.view()).unwrap();
            let prod = spmat::times(a.view(), b.view()).unwrap();
            sum.validate().unwrap();
            diff.validate().unwrap();
            prod.validate().unwrap();

            let expected: Vec<f64> = da.iter().zip(&db).map(|(x, y)| x + y).collect();
            assert_eq!(sum.to_dense(), expected);
            let expected: Vec<f64> = da.iter().zip(&db).map(|(x, y)| x - y).collect();
            assert_eq!(diff.to_dense(), expected);
            let expected: Vec<f64> = da.iter().zip(&db).map(|(x, y)| x * y).collect();
            assert_eq!(prod.to_dense(), expected);

            let swapped = spmat::add(b.view(), a.view()).unwrap();
            assert_eq!(swapped.to_dense(), sum.to_dense());
            assert!(prod.nnz() <= a.nnz().min(b.nnz()));
            assert!(sum.nnz() <= a.nnz() + b.nnz());
        }
    }
}

#[test]
fn test_subtracting_self_leaves_zeros() {
    let mut rng = StdRng::seed_from_u64(3);
    let a = random_matrix(&mut rng, 40, 40, 0.1);
    let zero = spmat::sub(a.view(), a.view()).unwrap();
    assert_eq!(zero.row_ptr(), a.row_ptr());
    assert!(zero.values().iter().all(|&v| v == 0.0));
}

#[test]
fn test_matmul_strategies_match_dense() {
    let mut rng = StdRng::seed_from_u64(7);
    let configs = [
        KernelConfig::default(),
        KernelConfig::default().with_dense_insertion_factor(0),
        KernelConfig::default().with_dense_insertion_factor(usize::MAX),
        KernelConfig::default().with_compression_divisor(1),
        KernelConfig::default().with_compression_divisor(usize::MAX),
        KernelConfig::default().with_num_threads(3).with_tasks_per_thread(1),
    ];
    let backends: Vec<PortableBackend> = configs
        .into_iter()
        .map(|config| PortableBackend::with_config(config).unwrap())
        .collect();

    for &(n, k, m, density) in &[(1, 1, 1, 1.0), (9, 4, 6, 0.4), (50, 70, 40, 0.05), (64, 64, 64, 0.3)] {
        let a = random_matrix(&mut rng, n, k, density);
        let b = random_matrix(&mut rng, k, m, density);
        let expected = dense_matmul(&a.to_dense(), &b.to_dense(), n, k, m);
        for backend in &backends {
            let c = backend.matmul(a.view(), b.view()).unwrap();
            assert_eq!(c.shape(), (n, m));
            c.validate().unwrap();
            assert_eq!(c.to_dense(), expected, "config {:?}", backend.config());
        }
    }
}

#[test]
fn test_matmul_identity() {
    let mut rng = StdRng::seed_from_u64(11);
    let a = random_matrix(&mut rng, 30, 20, 0.15);
    let left = spmat::matmul(Csr::identity(30).unwrap().view(), a.view()).unwrap();
    let right = spmat::matmul(a.view(), Csr::identity(20).unwrap().view()).unwrap();
    assert_eq!(left.to_dense(), a.to_dense());
    assert_eq!(right.to_dense(), a.to_dense());
}

#[test]
fn test_transpose_matches_dense() {
    let mut rng = StdRng::seed_from_u64(5);
    for &(rows, cols) in &SHAPES {
        let a = random_matrix(&mut rng, rows, cols, 0.2);
        let t = spmat::transpose(a.view()).unwrap();
        assert_eq!(t.shape(), (cols, rows));
        assert_eq!(t.to_dense(), dense_transpose(&a.to_dense(), rows, cols));

        let tt = spmat::transpose(t.view()).unwrap();
        assert_eq!(tt.row_ptr(), a.row_ptr());
        assert_eq!(tt.to_dense(), a.to_dense());
    }
}

#[test]
fn test_shuffled_triplets_round_trip() {
    let mut rng = StdRng::seed_from_u64(13);
    let mut triplets = random_triplets(&mut rng, 25, 35, 0.1);
    let sorted = spmat::from_triplets(25, 35, &triplets).unwrap();
    triplets.shuffle(&mut rng);
    let shuffled = spmat::from_triplets(25, 35, &triplets).unwrap();

    assert_eq!(shuffled.row_ptr(), sorted.row_ptr());
    assert_eq!(shuffled.to_dense(), sorted.to_dense());

    let mut recovered: Vec<_> = shuffled.triplets().collect();
    recovered.sort_by_key(|&(r, c, _)| (r, c));
    let mut original = triplets.clone();
    original.sort_by_key(|&(r, c, _)| (r, c));
    assert_eq!(recovered, original);
}

#[test]
fn test_split_layout_operands() {
    let mut rng = StdRng::seed_from_u64(17);
    let a = random_matrix(&mut rng, 12, 10, 0.3);
    let b = random_matrix(&mut rng, 12, 10, 0.3);

    // Same rows stored back to front, addressed through separate start and end arrays
    let rows = a.rows();
    let mut start = vec![0; rows];
    let mut end = vec![0; rows];
    let mut cols = Vec::new();
    let mut values = Vec::new();
    for i in (0..rows).rev() {
        let (c, v) = a.row(i);
        start[i] = cols.len();
        cols.extend_from_slice(c);
        values.extend_from_slice(v);
        end[i] = cols.len();
    }
    let split = CsrView::from_parts(rows, a.cols(), &start, &end, &cols, &values).unwrap();
    assert!(!split.is_compressed());

    let expected = spmat::add(a.view(), b.view()).unwrap();
    assert_eq!(spmat::add(split, b.view()).unwrap().to_dense(), expected.to_dense());
    let bt = spmat::transpose(b.view()).unwrap();
    assert_eq!(
        spmat::matmul(split, bt.view()).unwrap().to_dense(),
        spmat::matmul(a.view(), bt.view()).unwrap().to_dense()
    );
    assert_eq!(split.to_owned_compact().unwrap().to_dense(), a.to_dense());
}

#[test]
fn test_batch_pack_unpack() {
    let mut rng = StdRng::seed_from_u64(19);
    let batch: Vec<Csr<f64>> = (0..5).map(|_| random_matrix(&mut rng, 8, 6, 0.25)).collect();
    let views: Vec<CsrView<'_, f64>> = batch.iter().map(Csr::view).collect();
    let tensor = SparseTensor::from_matrices(&views, false).unwrap();
    assert_eq!(tensor.shape(), &[5, 8, 6]);

    let unpacked = tensor.to_matrices().unwrap();
    assert_eq!(unpacked.len(), batch.len());
    for (m, original) in unpacked.iter().zip(&batch) {
        assert!(m.is_borrowed());
        assert_eq!(m.row_ptr(), original.row_ptr());
        assert_eq!(m.values(), original.values());
    }

    let squared = tensor
        .apply_binary(&tensor, |a, b| spmat::times(a, b))
        .unwrap();
    for (m, original) in squared.to_matrices().unwrap().iter().zip(&batch) {
        let expected: Vec<f64> = original.to_dense().iter().map(|x| x * x).collect();
        let got = m.view().unwrap().to_owned_compact().unwrap();
        assert_eq!(got.to_dense(), expected);
    }
}
