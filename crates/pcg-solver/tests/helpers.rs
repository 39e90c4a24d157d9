//! Shared test helpers for the pcg-solver integration test suite.
//!
//! Provides deterministic random SPD generators, a dense reference solver,
//! and floating-point comparison utilities used across all test modules.

#![allow(dead_code)]

use pcg_solver::operators::{CsrMatrix, DenseMatrix};

// ---------------------------------------------------------------------------
// Random number generator (simple LCG for deterministic reproducibility)
// ---------------------------------------------------------------------------

/// A minimal linear congruential generator for deterministic test data.
pub struct Lcg {
    state: u64,
}

impl Lcg {
    /// Create a new LCG with the given seed.
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Generate the next u64 value.
    pub fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.state
    }

    /// Generate a uniform f64 in [0, 1).
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Generate a uniform f64 in [lo, hi).
    pub fn next_f64_range(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }
}

// ---------------------------------------------------------------------------
// Matrix generators
// ---------------------------------------------------------------------------

/// Random SPD matrix `A = B^T B + I` as rows, `B` with entries in [-1, 1).
pub fn random_spd_rows(n: usize, seed: u64) -> Vec<Vec<f64>> {
    let mut rng = Lcg::new(seed);
    let b: Vec<Vec<f64>> = (0..n)
        .map(|_| (0..n).map(|_| rng.next_f64_range(-1.0, 1.0)).collect())
        .collect();

    let mut a = vec![vec![0.0f64; n]; n];
    for i in 0..n {
        for j in 0..n {
            let mut sum = 0.0;
            for k in 0..n {
                sum += b[k][i] * b[k][j];
            }
            a[i][j] = sum;
        }
        a[i][i] += 1.0;
    }
    a
}

/// [`random_spd_rows`] as a [`DenseMatrix`].
pub fn random_spd_dense(n: usize, seed: u64) -> DenseMatrix {
    DenseMatrix::from_rows(&random_spd_rows(n, seed)).unwrap()
}

/// Random sparse SPD matrix: symmetric pattern with density `density`,
/// diagonal set to `1 + sum |off-diagonal|` so it is strictly dominant.
pub fn random_spd_csr(n: usize, density: f64, seed: u64) -> CsrMatrix {
    let mut rng = Lcg::new(seed);
    let mut entries = Vec::new();
    let mut row_abs = vec![0.0f64; n];

    for i in 0..n {
        for j in (i + 1)..n {
            if rng.next_f64() < density {
                let val = rng.next_f64_range(-1.0, 1.0);
                entries.push((i, j, val));
                entries.push((j, i, val));
                row_abs[i] += val.abs();
                row_abs[j] += val.abs();
            }
        }
    }
    for (i, s) in row_abs.iter().enumerate() {
        entries.push((i, i, s + 1.0 + rng.next_f64()));
    }

    CsrMatrix::from_coo(n, entries).unwrap()
}

/// Symmetric tridiagonal `tridiag(-1, diag, -1)`.
pub fn tridiagonal_csr(n: usize, diag: f64) -> CsrMatrix {
    let mut entries = Vec::with_capacity(3 * n);
    for i in 0..n {
        if i > 0 {
            entries.push((i, i - 1, -1.0));
        }
        entries.push((i, i, diag));
        if i + 1 < n {
            entries.push((i, i + 1, -1.0));
        }
    }
    CsrMatrix::from_coo(n, entries).unwrap()
}

/// `D T D` with `T = tridiag(-1, 4, -1)` and `D` spanning `scale_range`
/// orders of magnitude. SPD with a condition number driven by `D`.
pub fn badly_scaled_csr(n: usize, scale_range: f64) -> CsrMatrix {
    let d: Vec<f64> = (0..n)
        .map(|i| 10f64.powf(scale_range * i as f64 / (n.max(2) - 1) as f64))
        .collect();
    let mut entries = Vec::with_capacity(3 * n);
    for i in 0..n {
        if i > 0 {
            entries.push((i, i - 1, -d[i] * d[i - 1]));
        }
        entries.push((i, i, 4.0 * d[i] * d[i]));
        if i + 1 < n {
            entries.push((i, i + 1, -d[i] * d[i + 1]));
        }
    }
    CsrMatrix::from_coo(n, entries).unwrap()
}

/// Generate a deterministic random vector of length `n`.
pub fn random_vector(n: usize, seed: u64) -> Vec<f64> {
    let mut rng = Lcg::new(seed);
    (0..n).map(|_| rng.next_f64_range(-1.0, 1.0)).collect()
}

// ---------------------------------------------------------------------------
// Dense reference solver
// ---------------------------------------------------------------------------

/// Expand a CSR matrix to rows.
pub fn csr_to_rows(matrix: &CsrMatrix) -> Vec<Vec<f64>> {
    let n = matrix.n;
    let mut rows = vec![vec![0.0f64; n]; n];
    for i in 0..n {
        for idx in matrix.row_ptr[i]..matrix.row_ptr[i + 1] {
            rows[i][matrix.col_indices[idx]] += matrix.values[idx];
        }
    }
    rows
}

/// Solve `Ax = b` using dense Gaussian elimination with partial pivoting.
///
/// # Panics
///
/// Panics if the matrix is singular or dimensions are inconsistent.
pub fn dense_solve(rows: &[Vec<f64>], rhs: &[f64]) -> Vec<f64> {
    let n = rows.len();
    assert_eq!(rhs.len(), n, "rhs length must match matrix dimension");

    let mut aug: Vec<Vec<f64>> = rows
        .iter()
        .zip(rhs)
        .map(|(row, &bi)| {
            assert_eq!(row.len(), n, "dense_solve requires a square matrix");
            let mut r = row.clone();
            r.push(bi);
            r
        })
        .collect();

    for col in 0..n {
        let mut max_row = col;
        let mut max_val = aug[col][col].abs();
        for row in (col + 1)..n {
            if aug[row][col].abs() > max_val {
                max_val = aug[row][col].abs();
                max_row = row;
            }
        }
        assert!(max_val > 1e-15, "matrix is singular or near-singular");
        aug.swap(col, max_row);

        let pivot = aug[col][col];
        for row in (col + 1)..n {
            let factor = aug[row][col] / pivot;
            for j in col..=n {
                aug[row][j] -= factor * aug[col][j];
            }
        }
    }

    let mut x = vec![0.0f64; n];
    for i in (0..n).rev() {
        let mut sum = aug[i][n];
        for j in (i + 1)..n {
            sum -= aug[i][j] * x[j];
        }
        x[i] = sum / aug[i][i];
    }
    x
}

// ---------------------------------------------------------------------------
// Floating-point comparison utilities
// ---------------------------------------------------------------------------

/// Compute the L2 norm of a vector.
pub fn l2_norm(v: &[f64]) -> f64 {
    v.iter().map(|&x| x * x).sum::<f64>().sqrt()
}

/// Compute the L2 distance between two vectors.
pub fn l2_distance(a: &[f64], b: &[f64]) -> f64 {
    assert_eq!(a.len(), b.len(), "vectors must have same length");
    a.iter()
        .zip(b)
        .map(|(&ai, &bi)| (ai - bi) * (ai - bi))
        .sum::<f64>()
        .sqrt()
}

/// Relative error `||approx - exact|| / ||exact||`, or the absolute error if
/// `exact` is zero.
pub fn relative_error(approx: &[f64], exact: &[f64]) -> f64 {
    let exact_norm = l2_norm(exact);
    let error = l2_distance(approx, exact);
    if exact_norm > 1e-15 {
        error / exact_norm
    } else {
        error
    }
}

/// Compute the residual `b - A*x` for a sparse system.
pub fn compute_residual(matrix: &CsrMatrix, x: &[f64], rhs: &[f64]) -> Vec<f64> {
    let mut ax = vec![0.0f64; matrix.n];
    matrix.spmv(x, &mut ax);
    rhs.iter().zip(&ax).map(|(b, a)| b - a).collect()
}

/// `<r, diag_inv .* r>`: the squared `M^{-1}`-norm of `r` for a diagonal
/// preconditioner.
pub fn diag_m_norm_sq(r: &[f64], diag_inv: &[f64]) -> f64 {
    r.iter().zip(diag_inv).map(|(ri, di)| ri * di * ri).sum()
}
