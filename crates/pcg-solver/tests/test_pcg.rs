//! Integration tests for the PCG engine.
//!
//! Tests cover convergence on dense and sparse SPD systems, agreement with a
//! dense reference solve, the meaning of the returned reduction ratio,
//! preconditioning benefits, degenerate inputs, and matrix-free operators.

mod helpers;

use approx::assert_relative_eq;
use pcg_solver::operators::{DiagonalOperator, IdentityOperator, JacobiPreconditioner};
use pcg_solver::{
    dot, pcg, LinearOperator, Parallelism, PcgConfig, PcgSolver, SolverError, StopReason,
};

use helpers::{
    badly_scaled_csr, compute_residual, csr_to_rows, dense_solve, diag_m_norm_sq, l2_norm,
    random_spd_csr, random_spd_dense, random_spd_rows, random_vector, relative_error,
    tridiagonal_csr,
};

// ---------------------------------------------------------------------------
// Reference scenarios
// ---------------------------------------------------------------------------

#[test]
fn test_pcg_identity_one_iteration() {
    let mut a = IdentityOperator::new(4);
    let mut m = IdentityOperator::new(4);
    let b = [1.0, 2.0, 3.0, 4.0];
    let mut x = [0.0; 4];

    let outcome = PcgSolver::new(PcgConfig::new(10, 1e-10))
        .solve(&mut a, &mut m, &mut x, &b)
        .unwrap();

    assert!(outcome.converged);
    assert_eq!(outcome.iterations, 1);
    assert!(outcome.reduction_ratio < 1e-20);
    for i in 0..4 {
        assert_relative_eq!(x[i], b[i], epsilon = 1e-12);
    }
}

#[test]
fn test_pcg_diagonal_within_n() {
    let mut a = DiagonalOperator::new(vec![1.0, 2.0, 3.0, 4.0]);
    let mut m = IdentityOperator::new(4);
    let b = [1.0; 4];
    let mut x = [0.0; 4];

    let outcome = PcgSolver::new(PcgConfig::new(10, 1e-8))
        .solve(&mut a, &mut m, &mut x, &b)
        .unwrap();

    assert!(outcome.converged);
    assert!(outcome.iterations <= 4);
    let expected = [1.0, 0.5, 1.0 / 3.0, 0.25];
    for i in 0..4 {
        assert_relative_eq!(x[i], expected[i], epsilon = 1e-8);
    }
}

#[test]
fn test_pcg_zero_iterations() {
    let mut a = DiagonalOperator::new(vec![1.0, 2.0, 3.0, 4.0]);
    let mut m = IdentityOperator::new(4);
    let b = [1.0; 4];
    let mut x = [0.0; 4];

    let ratio = pcg(&mut a, &mut m, &mut x, &b, 0, 1e-8).unwrap();

    assert_eq!(x, [0.0; 4]);
    assert!(ratio.is_finite());
    assert!(ratio >= 1e-16, "must not report convergence");
}

#[test]
fn test_pcg_zero_iterations_exact_guess() {
    let mut a = DiagonalOperator::new(vec![2.0, 4.0]);
    let mut m = IdentityOperator::new(2);
    let mut x = [1.0, 1.0];

    let ratio = pcg(&mut a, &mut m, &mut x, &[2.0, 4.0], 0, 1e-8).unwrap();

    assert_eq!(ratio, 0.0);
    assert_eq!(x, [1.0, 1.0]);
}

#[test]
fn test_pcg_empty_system() {
    let mut a = IdentityOperator::new(0);
    let mut m = IdentityOperator::new(0);
    let mut x: Vec<f64> = Vec::new();

    let outcome = PcgSolver::default()
        .solve(&mut a, &mut m, &mut x, &[])
        .unwrap();
    assert!(outcome.converged);
    assert_eq!(outcome.iterations, 0);
    assert_eq!(dot(&[], &[]), 0.0);
}

// ---------------------------------------------------------------------------
// Dense SPD system against the dense reference solve
// ---------------------------------------------------------------------------

#[test]
fn test_pcg_dense_spd_matches_dense_solve() {
    let n = 10;
    let mut a = random_spd_dense(n, 42);
    let mut m = IdentityOperator::new(n);
    let b = random_vector(n, 43);
    let mut x = vec![0.0; n];

    let outcome = PcgSolver::new(PcgConfig::new(n, 1e-6))
        .solve(&mut a, &mut m, &mut x, &b)
        .unwrap();
    assert!(outcome.converged, "ratio {:e}", outcome.reduction_ratio);
    assert!(outcome.iterations <= n);

    let exact = dense_solve(&random_spd_rows(n, 42), &b);
    let rel_err = relative_error(&x, &exact);
    assert!(rel_err < 1e-5, "relative error vs dense solve: {rel_err:e}");
}

#[test]
fn test_pcg_dense_with_jacobi() {
    let n = 16;
    let mut a = random_spd_dense(n, 7);
    let mut m = JacobiPreconditioner::from_dense(&a);
    let b = random_vector(n, 8);
    let mut x = vec![0.0; n];

    let outcome = PcgSolver::new(PcgConfig::new(200, 1e-10))
        .solve(&mut a, &mut m, &mut x, &b)
        .unwrap();
    assert!(outcome.converged);

    let mut ax = vec![0.0; n];
    a.matvec(&x, &mut ax);
    let resid: Vec<f64> = b.iter().zip(&ax).map(|(bi, ai)| bi - ai).collect();
    assert!(l2_norm(&resid) < 1e-7 * l2_norm(&b));
}

// ---------------------------------------------------------------------------
// Meaning of the reduction ratio
// ---------------------------------------------------------------------------

#[test]
fn test_pcg_ratio_matches_recomputed_residual() {
    let n = 60;
    let mut a = random_spd_csr(n, 0.1, 11);
    let mut m = JacobiPreconditioner::from_csr(&a);
    let b = random_vector(n, 12);
    let x0 = random_vector(n, 13);
    let mut x = x0.clone();

    let outcome = PcgSolver::new(PcgConfig::new(500, 1e-4))
        .solve(&mut a, &mut m, &mut x, &b)
        .unwrap();
    assert!(outcome.converged);

    let diag_inv = m.inverse_diagonal();
    let rho0 = diag_m_norm_sq(&compute_residual(&a, &x0, &b), diag_inv);
    let rho = diag_m_norm_sq(&compute_residual(&a, &x, &b), diag_inv);

    assert_relative_eq!(outcome.initial_rho, rho0, max_relative = 1e-12);
    assert_relative_eq!(outcome.reduction_ratio, rho / rho0, max_relative = 1e-6);
    assert!(outcome.reduction_ratio < 1e-8);
}

#[test]
fn test_pcg_history_decreases() {
    let n = 100;
    let mut a = tridiagonal_csr(n, 4.0);
    let mut m = IdentityOperator::new(n);
    let b = random_vector(n, 3);
    let mut x = vec![0.0; n];

    let outcome = PcgSolver::new(PcgConfig::new(500, 1e-12).with_history(true))
        .solve(&mut a, &mut m, &mut x, &b)
        .unwrap();
    assert!(outcome.converged);

    let ratios: Vec<f64> = outcome.history.iter().map(|h| h.reduction_ratio).collect();
    assert!(ratios[0] < 1.0);
    for w in ratios.windows(2) {
        assert!(w[1] <= w[0] * 10.0, "ratio jumped from {:e} to {:e}", w[0], w[1]);
    }
    assert!(ratios.last().copied().unwrap_or(1.0) < 1e-24);
}

#[test]
fn test_pcg_tolerance_levels() {
    let n = 200;
    let b = random_vector(n, 5);
    let mut prev_iterations = 0;
    for tol in [1e-2, 1e-5, 1e-8, 1e-11] {
        let mut a = random_spd_csr(n, 0.02, 4);
        let mut m = IdentityOperator::new(n);
        let mut x = vec![0.0; n];
        let outcome = PcgSolver::new(PcgConfig::new(2000, tol))
            .solve(&mut a, &mut m, &mut x, &b)
            .unwrap();
        assert!(outcome.converged, "tol {tol:e}");
        assert!(outcome.reduction_ratio < tol * tol);
        assert!(outcome.iterations >= prev_iterations);
        prev_iterations = outcome.iterations;
    }
}

// ---------------------------------------------------------------------------
// Preconditioning
// ---------------------------------------------------------------------------

#[test]
fn test_pcg_jacobi_reduces_iterations() {
    let n = 200;
    let matrix = badly_scaled_csr(n, 3.0);
    let b = random_vector(n, 21);
    let config = PcgConfig::new(5000, 1e-8);

    let mut plain_x = vec![0.0; n];
    let plain = PcgSolver::new(config.clone())
        .solve(&mut matrix.clone(), &mut IdentityOperator::new(n), &mut plain_x, &b)
        .unwrap();

    let mut jacobi_x = vec![0.0; n];
    let jacobi = PcgSolver::new(config)
        .solve(
            &mut matrix.clone(),
            &mut JacobiPreconditioner::from_csr(&matrix),
            &mut jacobi_x,
            &b,
        )
        .unwrap();

    assert!(jacobi.converged);
    assert!(jacobi.iterations < 60, "jacobi took {}", jacobi.iterations);
    assert!(
        jacobi.iterations < plain.iterations,
        "jacobi {} vs plain {}",
        jacobi.iterations,
        plain.iterations
    );

    let exact = dense_solve(&csr_to_rows(&matrix), &b);
    assert!(relative_error(&jacobi_x, &exact) < 1e-4);
}

// ---------------------------------------------------------------------------
// Matrix-free operators
// ---------------------------------------------------------------------------

/// 1-D Laplacian with Dirichlet boundaries, shifted by `shift * I`, applied
/// without storing a matrix.
struct ShiftedLaplacian {
    n: usize,
    shift: f64,
}

impl LinearOperator for ShiftedLaplacian {
    fn apply(&mut self, x: &[f64], y: &mut [f64]) -> Result<(), pcg_solver::OperatorError> {
        let n = self.n;
        for i in 0..n {
            let left = if i > 0 { x[i - 1] } else { 0.0 };
            let right = if i + 1 < n { x[i + 1] } else { 0.0 };
            y[i] = (2.0 + self.shift) * x[i] - left - right;
        }
        Ok(())
    }

    fn dim(&self) -> Option<usize> {
        Some(self.n)
    }
}

#[test]
fn test_pcg_matrix_free_operator() {
    let n = 128;
    let mut a = ShiftedLaplacian { n, shift: 0.5 };
    let mut m = |r: &[f64], z: &mut [f64]| {
        for (zi, ri) in z.iter_mut().zip(r) {
            *zi = ri / 2.5;
        }
    };
    let b = random_vector(n, 31);
    let mut x = vec![0.0; n];

    let outcome = PcgSolver::new(PcgConfig::new(500, 1e-10))
        .solve(&mut a, &mut m, &mut x, &b)
        .unwrap();
    assert!(outcome.converged);

    let exact = dense_solve(&csr_to_rows(&tridiagonal_csr(n, 2.5)), &b);
    assert!(relative_error(&x, &exact) < 1e-8);
}

#[test]
fn test_pcg_dyn_operators() {
    let n = 32;
    let mut a: Box<dyn LinearOperator> = Box::new(tridiagonal_csr(n, 3.0));
    let mut m: Box<dyn LinearOperator> = Box::new(IdentityOperator::new(n));
    let b = vec![1.0; n];
    let mut x = vec![0.0; n];

    let outcome = PcgSolver::default()
        .solve(a.as_mut(), m.as_mut(), &mut x, &b)
        .unwrap();
    assert!(outcome.converged);
}

#[test]
fn test_pcg_operator_dimension_checked() {
    let mut a = ShiftedLaplacian { n: 8, shift: 1.0 };
    let mut m = IdentityOperator::new(8);
    let b = vec![1.0; 9];
    let mut x = vec![0.0; 9];

    let err = PcgSolver::default()
        .solve(&mut a, &mut m, &mut x, &b)
        .unwrap_err();
    assert!(matches!(err, SolverError::InvalidInput(_)), "{err}");
}

// ---------------------------------------------------------------------------
// Reentrancy, configuration loading and logging
// ---------------------------------------------------------------------------

#[test]
fn test_pcg_concurrent_independent_solves() {
    let solver = PcgSolver::new(PcgConfig::new(500, 1e-10).with_parallelism(Parallelism::Serial));

    let results: Vec<(Vec<f64>, Vec<f64>)> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4u64)
            .map(|seed| {
                let solver = &solver;
                scope.spawn(move || {
                    let n = 40;
                    let mut a = random_spd_csr(n, 0.1, seed);
                    let mut m = JacobiPreconditioner::from_csr(&a);
                    let b = random_vector(n, seed + 100);
                    let mut x = vec![0.0; n];
                    let outcome = solver.solve(&mut a, &mut m, &mut x, &b).unwrap();
                    assert!(outcome.converged);
                    (x, dense_solve(&csr_to_rows(&a), &b))
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for (x, exact) in &results {
        assert!(relative_error(x, exact) < 1e-8);
    }
}

#[test]
fn test_pcg_config_from_json() {
    let config: PcgConfig = serde_json::from_str(
        r#"{ "max_iterations": 50, "relative_tolerance": 1e-9, "parallelism": "serial" }"#,
    )
    .unwrap();
    assert_eq!(config.parallelism, Parallelism::Serial);
    assert!(!config.record_history);

    let n = 20;
    let mut a = tridiagonal_csr(n, 4.0);
    let mut m = IdentityOperator::new(n);
    let mut x = vec![0.0; n];
    let outcome = PcgSolver::new(config)
        .solve(&mut a, &mut m, &mut x, &vec![1.0; n])
        .unwrap();
    assert_eq!(outcome.stop_reason, StopReason::Converged);
}

#[test]
fn test_pcg_with_tracing_subscriber() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("pcg_solver=trace")
        .with_test_writer()
        .try_init();

    let n = 16;
    let mut a = tridiagonal_csr(n, 4.0);
    let mut m = JacobiPreconditioner::from_csr(&a);
    let mut x = vec![0.0; n];
    let outcome = PcgSolver::default()
        .solve(&mut a, &mut m, &mut x, &vec![1.0; n])
        .unwrap();
    assert!(outcome.converged);
}
