//! Configuration and result types for the PCG engine.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// How the data-parallel kernels are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parallelism {
    /// Serial kernels on the calling thread.
    Serial,
    /// Rayon's global pool.
    #[default]
    Global,
    /// A private pool with exactly this many workers, built for one solve.
    Threads(usize),
}

/// Solver configuration.
///
/// Deserialises from JSON/TOML with every field optional:
///
/// ```
/// use pcg_solver::types::{Parallelism, PcgConfig};
///
/// let config = PcgConfig::default()
///     .with_max_iterations(200)
///     .with_relative_tolerance(1e-10)
///     .with_parallelism(Parallelism::Threads(2));
/// assert_eq!(config.max_iterations, 200);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PcgConfig {
    /// Upper bound on PCG iterations. Zero only forms the initial residual.
    pub max_iterations: usize,

    /// Relative tolerance on the `M^{-1}`-norm of the residual.
    ///
    /// The solve converges when `||r||_{M^{-1}} / ||r_0||_{M^{-1}} < tol`,
    /// evaluated as `rho / rho0 < tol^2`.
    pub relative_tolerance: f64,

    /// Scheduling of the vector kernels.
    pub parallelism: Parallelism,

    /// Optional wall-clock limit, checked at the top of every iteration.
    pub max_time: Option<Duration>,

    /// Optional ceiling in bytes for the solver's scratch vectors.
    pub memory_limit: Option<usize>,

    /// Record the reduction ratio after every iteration in
    /// [`PcgOutcome::history`].
    pub record_history: bool,
}

impl Default for PcgConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            relative_tolerance: 1e-6,
            parallelism: Parallelism::Global,
            max_time: None,
            memory_limit: None,
            record_history: false,
        }
    }
}

impl PcgConfig {
    /// Configuration with the given iteration cap and tolerance.
    pub fn new(max_iterations: usize, relative_tolerance: f64) -> Self {
        Self {
            max_iterations,
            relative_tolerance,
            ..Self::default()
        }
    }

    /// Set the iteration cap.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the relative tolerance.
    pub fn with_relative_tolerance(mut self, relative_tolerance: f64) -> Self {
        self.relative_tolerance = relative_tolerance;
        self
    }

    /// Set kernel scheduling.
    pub fn with_parallelism(mut self, parallelism: Parallelism) -> Self {
        self.parallelism = parallelism;
        self
    }

    /// Set a wall-clock limit.
    pub fn with_max_time(mut self, max_time: Duration) -> Self {
        self.max_time = Some(max_time);
        self
    }

    /// Set a scratch memory ceiling in bytes.
    pub fn with_memory_limit(mut self, bytes: usize) -> Self {
        self.memory_limit = Some(bytes);
        self
    }

    /// Enable or disable per-iteration history.
    pub fn with_history(mut self, record_history: bool) -> Self {
        self.record_history = record_history;
        self
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Why the iteration loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// `rho / rho0 < tol^2`.
    Converged,
    /// The initial `rho0` was zero, so there was nothing to reduce.
    ZeroInitialResidual,
    /// `max_iterations` steps ran without meeting the tolerance.
    MaxIterations,
    /// The wall-clock limit was reached.
    TimeLimit,
    /// The attached cancel token was triggered.
    Cancelled,
}

impl StopReason {
    /// `true` for the reasons that meet the tolerance.
    #[inline]
    pub fn is_converged(self) -> bool {
        matches!(self, StopReason::Converged | StopReason::ZeroInitialResidual)
    }
}

/// Per-iteration convergence snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceInfo {
    /// Iteration index (0-based).
    pub iteration: usize,
    /// `rho / rho0` after this iteration's update.
    pub reduction_ratio: f64,
}

/// Result of a solve that ran to a normal stop.
///
/// The solution itself is written into the caller's `x`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PcgOutcome {
    /// Final `rho / rho0 = ||r||^2_{M^{-1}} / ||r_0||^2_{M^{-1}}`.
    pub reduction_ratio: f64,
    /// Completed iterations (updates applied to `x`).
    pub iterations: usize,
    /// Whether the tolerance was met.
    pub converged: bool,
    /// Why the loop stopped.
    pub stop_reason: StopReason,
    /// Initial `rho0 = <r_0, M^{-1} r_0>`.
    pub initial_rho: f64,
    /// Wall-clock time of the solve.
    pub wall_time: Duration,
    /// Per-iteration ratios, when [`PcgConfig::record_history`] is set.
    pub history: Vec<ConvergenceInfo>,
}

impl PcgOutcome {
    /// `sqrt(reduction_ratio)`: the relative `M^{-1}`-norm residual reduction.
    #[inline]
    pub fn relative_residual(&self) -> f64 {
        self.reduction_ratio.sqrt()
    }
}
