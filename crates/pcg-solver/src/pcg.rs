//! Preconditioned Conjugate Gradient engine.
//!
//! Solves `Ax = b` for symmetric positive-definite `A`, with `A` and the
//! preconditioner `M^{-1}` supplied as [`LinearOperator`]s. Exact arithmetic
//! terminates in at most `n` iterations; in practice the count scales with
//! `sqrt(kappa(M^{-1} A))`.
//!
//! # Algorithm
//!
//! ```text
//! r = b - A*x
//! z = M^{-1} * r
//! rho0 = rho = r . z
//! p = z
//!
//! for k in 0..max_iterations:
//!     q = A * p
//!     alpha = rho / (p . q)
//!     x = x + alpha * p
//!     r = r - alpha * q
//!     z = M^{-1} * r
//!     rho_prev = rho
//!     rho = r . z
//!     if rho / rho0 < tol^2:
//!         converged; break
//!     beta = rho / rho_prev
//!     p = z + beta * p
//! ```
//!
//! # Convergence
//!
//! The stopping test is on the norm induced by `M^{-1}`:
//! `||r_k||_{M^{-1}} / ||r_0||_{M^{-1}} < tol` with
//! `||v||^2_{M^{-1}} = v^T M^{-1} v`. Comparing `rho / rho0` against `tol^2`
//! avoids a square root per iteration. This is the norm PCG computes for
//! free; it is not the Euclidean residual.
//!
//! # Degenerate inputs
//!
//! - `n == 0`: converged with zero iterations; operators are never called.
//! - `rho0 == 0` (exact initial guess, or `M^{-1}` annihilates `r_0`):
//!   converged with zero iterations, `x` untouched.
//! - `max_iterations == 0`: only `r_0` and `rho0` are formed; the outcome
//!   reports ratio `1.0` and is not converged unless `rho0 == 0`.
//! - `p . q <= 0`, `rho < 0`, or any non-finite scalar: the solve stops with
//!   [`SolverError::NumericalInstability`] before the bad value reaches `x`.

use tracing::{debug, trace, warn};

use crate::budget::{BudgetEnforcer, CancelToken};
use crate::error::{OperatorRole, SolverError};
use crate::events::SolverEvent;
use crate::instrument::{Instrument, NoopInstrument, Phase};
use crate::traits::LinearOperator;
use crate::types::{ConvergenceInfo, Parallelism, PcgConfig, PcgOutcome, StopReason};
use crate::validation::{validate_config, validate_system};
use crate::vector::{self, Execution};
use crate::workspace::{scratch_bytes, Workspace};

// ═══════════════════════════════════════════════════════════════════════════
// Entry point
// ═══════════════════════════════════════════════════════════════════════════

/// Solve `A x = b` with PCG and return the achieved reduction ratio
/// `rho / rho0`.
///
/// `x` holds the initial guess on entry and the approximate solution on
/// return. Uses the global rayon pool; see [`PcgSolver`] for the other
/// options and the full [`PcgOutcome`].
///
/// # Errors
///
/// See [`PcgSolver::solve`]. Not converging within `max_iterations` is not
/// an error.
///
/// # Example
///
/// ```
/// use pcg_solver::operators::{DiagonalOperator, IdentityOperator};
/// use pcg_solver::pcg::pcg;
///
/// let mut a = DiagonalOperator::new(vec![1.0, 2.0, 3.0, 4.0]);
/// let mut m = IdentityOperator::new(4);
/// let b = [1.0; 4];
/// let mut x = [0.0; 4];
///
/// let ratio = pcg(&mut a, &mut m, &mut x, &b, 10, 1e-8).unwrap();
/// assert!(ratio < 1e-16);
/// assert!((x[1] - 0.5).abs() < 1e-10);
/// ```
pub fn pcg<A, M>(
    a: &mut A,
    m: &mut M,
    x: &mut [f64],
    b: &[f64],
    max_iterations: usize,
    relative_tolerance: f64,
) -> Result<f64, SolverError>
where
    A: LinearOperator + ?Sized,
    M: LinearOperator + ?Sized,
{
    PcgSolver::new(PcgConfig::new(max_iterations, relative_tolerance))
        .solve(a, m, x, b)
        .map(|outcome| outcome.reduction_ratio)
}

// ═══════════════════════════════════════════════════════════════════════════
// PcgSolver
// ═══════════════════════════════════════════════════════════════════════════

/// Preconditioned Conjugate Gradient solver.
///
/// Stores the solver configuration and an optional cancel token. The solve
/// itself keeps no state between calls and may be invoked concurrently on
/// different systems from multiple threads.
#[derive(Debug, Clone, Default)]
pub struct PcgSolver {
    config: PcgConfig,
    cancel: Option<CancelToken>,
}

impl PcgSolver {
    /// Create a solver. The configuration is validated on every solve.
    pub fn new(config: PcgConfig) -> Self {
        Self {
            config,
            cancel: None,
        }
    }

    /// Attach a token that stops the solve at the next iteration boundary.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// The configuration used by [`solve`](Self::solve).
    #[inline]
    pub fn config(&self) -> &PcgConfig {
        &self.config
    }

    /// Solve `A x = b`, overwriting `x` with the solution.
    ///
    /// # Errors
    ///
    /// * [`SolverError::InvalidInput`] -- length/dimension mismatch, bad
    ///   tolerance, non-finite entries in `x` or `b`.
    /// * [`SolverError::MemoryLimitExceeded`] / [`SolverError::AllocationFailed`]
    ///   -- scratch vectors could not be provided.
    /// * [`SolverError::NumericalInstability`] -- breakdown at a division
    ///   point (`A` or `M` not SPD, overflow).
    /// * [`SolverError::OperatorFailed`] -- `A` or `M` returned an error.
    /// * [`SolverError::ThreadPool`] -- a fixed-size pool could not be built.
    pub fn solve<A, M>(
        &self,
        a: &mut A,
        m: &mut M,
        x: &mut [f64],
        b: &[f64],
    ) -> Result<PcgOutcome, SolverError>
    where
        A: LinearOperator + ?Sized,
        M: LinearOperator + ?Sized,
    {
        self.solve_instrumented(a, m, x, b, &mut NoopInstrument)
    }

    /// Like [`solve`](Self::solve), reporting phases and events to
    /// `instrument`.
    ///
    /// # Errors
    ///
    /// Same as [`solve`](Self::solve).
    pub fn solve_instrumented<A, M, I>(
        &self,
        a: &mut A,
        m: &mut M,
        x: &mut [f64],
        b: &[f64],
        instrument: &mut I,
    ) -> Result<PcgOutcome, SolverError>
    where
        A: LinearOperator + ?Sized,
        M: LinearOperator + ?Sized,
        I: Instrument + ?Sized,
    {
        validate_config(&self.config)?;
        validate_system(a, m, x, b)?;

        match self.config.parallelism {
            Parallelism::Serial => self.run(Execution::Serial, a, m, x, b, instrument),
            Parallelism::Global => self.run(Execution::Parallel, a, m, x, b, instrument),
            Parallelism::Threads(threads) => run_on_pool(threads, || {
                self.run(Execution::Parallel, a, m, x, b, instrument)
            })?,
        }
    }

    // -------------------------------------------------------------------
    // Instrumented wrapper
    // -------------------------------------------------------------------

    fn run<A, M, I>(
        &self,
        exec: Execution,
        a: &mut A,
        m: &mut M,
        x: &mut [f64],
        b: &[f64],
        instrument: &mut I,
    ) -> Result<PcgOutcome, SolverError>
    where
        A: LinearOperator + ?Sized,
        M: LinearOperator + ?Sized,
        I: Instrument + ?Sized,
    {
        let mut budget = BudgetEnforcer::new(self.config.max_time, self.cancel.clone());

        instrument.start(Phase::Solve);
        instrument.record(&SolverEvent::SolveStarted {
            n: b.len(),
            max_iterations: self.config.max_iterations,
            relative_tolerance: self.config.relative_tolerance,
            parallelism: self.config.parallelism,
        });

        let result = self.iterate(exec, a, m, x, b, &mut budget, instrument);

        match &result {
            Ok(outcome) => {
                debug!(
                    n = b.len(),
                    iterations = outcome.iterations,
                    converged = outcome.converged,
                    stop_reason = ?outcome.stop_reason,
                    budget_checks = budget.iterations_checked(),
                    "PCG: {} steps, residual reduction {:.3e} ({} tol {:.1e}); time {:?}",
                    outcome.iterations,
                    outcome.relative_residual(),
                    if outcome.converged { "<=" } else { ">" },
                    self.config.relative_tolerance,
                    outcome.wall_time,
                );
                instrument.record(&SolverEvent::SolveFinished {
                    iterations: outcome.iterations,
                    reduction_ratio: outcome.reduction_ratio,
                    converged: outcome.converged,
                    stop_reason: outcome.stop_reason,
                    wall_time: outcome.wall_time,
                });
            }
            Err(SolverError::NumericalInstability { iteration, detail }) => {
                instrument.record(&SolverEvent::Breakdown {
                    iteration: *iteration,
                    detail: detail.clone(),
                });
            }
            Err(_) => {}
        }

        instrument.stop(Phase::Solve);
        result
    }

    // -------------------------------------------------------------------
    // Core PCG algorithm
    // -------------------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    fn iterate<A, M, I>(
        &self,
        exec: Execution,
        a: &mut A,
        m: &mut M,
        x: &mut [f64],
        b: &[f64],
        budget: &mut BudgetEnforcer,
        instrument: &mut I,
    ) -> Result<PcgOutcome, SolverError>
    where
        A: LinearOperator + ?Sized,
        M: LinearOperator + ?Sized,
        I: Instrument + ?Sized,
    {
        let n = b.len();
        let max_iterations = self.config.max_iterations;
        let tol = self.config.relative_tolerance;

        // --- Trivial case: zero-dimensional system ---
        if n == 0 {
            return Ok(outcome(StopReason::ZeroInitialResidual, 0, 0.0, 0.0, Vec::new(), budget));
        }

        // --- Allocate working vectors ---
        let bytes = scratch_bytes(n).ok_or(SolverError::AllocationFailed { bytes: usize::MAX })?;
        budget.check_memory(bytes, self.config.memory_limit)?;
        let mut workspace = Workspace::allocate(n)?;
        let Workspace { r, z, p, q } = &mut workspace;

        // --- r = b - A*x ---
        instrument.start(Phase::InitialResidual);
        let initial = apply_operator(a, OperatorRole::System, 0, x, r);
        if initial.is_ok() {
            exec.residual_in_place(b, r);
        }
        instrument.stop(Phase::InitialResidual);
        initial?;

        // --- z = M^{-1} * r;  rho0 = r . z ---
        precondition(m, r, z, 0, instrument)?;
        let rho0 = reduce(exec, r, z, instrument);

        if !rho0.is_finite() || rho0 < 0.0 {
            warn!("PCG: invalid initial rho = {rho0:.4e}");
            return Err(SolverError::NumericalInstability {
                iteration: 0,
                detail: format!("initial r . M^-1 r = {rho0:.6e}; preconditioner may not be SPD"),
            });
        }

        if rho0 == 0.0 {
            let r_norm = vector::norm2(r);
            if r_norm > 0.0 {
                warn!(
                    "PCG: preconditioner annihilated a non-zero residual (||r|| = {r_norm:.4e}); \
                     treating as converged"
                );
            } else {
                debug!("PCG: initial guess is exact, nothing to do");
            }
            return Ok(outcome(StopReason::ZeroInitialResidual, 0, 0.0, rho0, Vec::new(), budget));
        }

        // --- p = z ---
        p.copy_from_slice(z);

        let tol2 = tol * tol;
        let mut rho = rho0;
        let mut reduction_ratio = 1.0;
        let mut iterations = 0;
        let mut stop_reason = StopReason::MaxIterations;
        let mut history = if self.config.record_history {
            Vec::with_capacity(max_iterations.min(256))
        } else {
            Vec::new()
        };

        debug!(
            "PCG: n={}, tol={:.2e}, max_iter={}, rho0={:.6e}",
            n, tol, max_iterations, rho0
        );

        // ===============================================================
        // Main PCG loop
        // ===============================================================
        for step in 0..max_iterations {
            if let Some(reason) = budget.check_iteration() {
                debug!("PCG: stopping at iteration {step}: {reason:?}");
                stop_reason = reason;
                break;
            }

            // --- q = A * p ---
            instrument.start(Phase::SystemOperator);
            let applied = apply_operator(a, OperatorRole::System, step, p, q);
            instrument.stop(Phase::SystemOperator);
            applied?;

            // --- alpha = rho / (p . q) ---
            let pq = reduce(exec, p, q, instrument);

            // Guard: p.q <= 0 means A is not SPD or we hit numerical breakdown.
            if !pq.is_finite() || pq <= 0.0 {
                warn!("PCG: non-positive p.q = {pq:.4e} at iteration {step}");
                return Err(SolverError::NumericalInstability {
                    iteration: step,
                    detail: format!("p.Ap = {pq:.6e}; operator may not be SPD"),
                });
            }

            let alpha = rho / pq;
            if !alpha.is_finite() {
                return Err(SolverError::NumericalInstability {
                    iteration: step,
                    detail: format!("alpha = {rho:.6e} / {pq:.6e} is not finite"),
                });
            }

            // --- x = x + alpha * p;  r = r - alpha * q ---
            instrument.start(Phase::SolutionUpdate);
            exec.update_solution_and_residual(alpha, p, q, x, r);
            instrument.stop(Phase::SolutionUpdate);

            // --- z = M^{-1} * r;  rho = r . z ---
            precondition(m, r, z, step, instrument)?;
            let rho_prev = rho;
            rho = reduce(exec, r, z, instrument);

            if !rho.is_finite() || rho < 0.0 {
                warn!("PCG: invalid rho = {rho:.4e} at iteration {step}");
                return Err(SolverError::NumericalInstability {
                    iteration: step,
                    detail: format!("r . M^-1 r = {rho:.6e}; preconditioner may not be SPD"),
                });
            }

            iterations = step + 1;
            reduction_ratio = rho / rho0;

            if self.config.record_history {
                history.push(ConvergenceInfo {
                    iteration: step,
                    reduction_ratio,
                });
            }
            instrument.record(&SolverEvent::IterationCompleted {
                iteration: step,
                reduction_ratio,
                elapsed: budget.elapsed(),
            });
            trace!(
                "PCG iter {step}: rho = {rho:.6e}, ratio = {reduction_ratio:.6e}, alpha = {alpha:.4e}"
            );

            // --- Convergence check: rho / rho0 < tol^2 ---
            if reduction_ratio < tol2 {
                stop_reason = StopReason::Converged;
                break;
            }

            // --- p = z + beta * p ---  (rho_prev > 0: it did not meet tol^2)
            let beta = rho / rho_prev;
            instrument.start(Phase::DirectionUpdate);
            exec.xpay(z, beta, p);
            instrument.stop(Phase::DirectionUpdate);
        }

        Ok(outcome(
            stop_reason,
            iterations,
            reduction_ratio,
            rho0,
            history,
            budget,
        ))
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════════════════════

fn outcome(
    stop_reason: StopReason,
    iterations: usize,
    reduction_ratio: f64,
    initial_rho: f64,
    history: Vec<ConvergenceInfo>,
    budget: &BudgetEnforcer,
) -> PcgOutcome {
    PcgOutcome {
        reduction_ratio,
        iterations,
        converged: stop_reason.is_converged(),
        stop_reason,
        initial_rho,
        wall_time: budget.elapsed(),
        history,
    }
}

fn apply_operator<O>(
    op: &mut O,
    role: OperatorRole,
    iteration: usize,
    input: &[f64],
    output: &mut [f64],
) -> Result<(), SolverError>
where
    O: LinearOperator + ?Sized,
{
    op.apply(input, output)
        .map_err(|source| SolverError::OperatorFailed {
            role,
            iteration,
            source,
        })
}

fn precondition<M, I>(
    m: &mut M,
    r: &[f64],
    z: &mut [f64],
    iteration: usize,
    instrument: &mut I,
) -> Result<(), SolverError>
where
    M: LinearOperator + ?Sized,
    I: Instrument + ?Sized,
{
    instrument.start(Phase::Preconditioner);
    let applied = apply_operator(m, OperatorRole::Preconditioner, iteration, r, z);
    instrument.stop(Phase::Preconditioner);
    applied
}

#[inline]
fn reduce<I>(exec: Execution, x: &[f64], y: &[f64], instrument: &mut I) -> f64
where
    I: Instrument + ?Sized,
{
    instrument.start(Phase::Reduction);
    let value = exec.dot(x, y);
    instrument.stop(Phase::Reduction);
    value
}

#[cfg(feature = "parallel")]
fn run_on_pool<R, OP>(threads: usize, op: OP) -> Result<R, SolverError>
where
    R: Send,
    OP: FnOnce() -> R + Send,
{
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("pcg-worker-{i}"))
        .build()
        .map_err(|e| SolverError::ThreadPool(e.to_string()))?;
    Ok(pool.install(op))
}

#[cfg(not(feature = "parallel"))]
fn run_on_pool<R, OP>(_threads: usize, op: OP) -> Result<R, SolverError>
where
    R: Send,
    OP: FnOnce() -> R + Send,
{
    Ok(op())
}

// ═══════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════
