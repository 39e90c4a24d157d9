//! Structured events emitted during a solve.
//!
//! The engine hands every [`SolverEvent`] to the solve's
//! [`Instrument`](crate::instrument::Instrument), giving full observability of
//! the run (what was requested, how the reduction ratio evolved, why the loop
//! stopped) without any formatted text on the hot path.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{Parallelism, StopReason};

/// Events emitted during a solver invocation.
///
/// Events are tagged with `#[serde(tag = "type")]` so they serialise as
/// `{ "type": "SolveStarted", ... }` for easy ingestion into event stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SolverEvent {
    /// A solve passed validation and is about to allocate.
    SolveStarted {
        /// Problem dimension.
        n: usize,
        /// Iteration cap.
        max_iterations: usize,
        /// Relative tolerance.
        relative_tolerance: f64,
        /// Kernel scheduling.
        parallelism: Parallelism,
    },

    /// One iteration completed.
    IterationCompleted {
        /// Iteration number (0-indexed).
        iteration: usize,
        /// `rho / rho0` after the update.
        reduction_ratio: f64,
        /// Wall time elapsed since the solve began.
        elapsed: Duration,
    },

    /// A numerical breakdown aborted the solve.
    Breakdown {
        /// Iteration at which it was detected.
        iteration: usize,
        /// Human-readable explanation.
        detail: String,
    },

    /// The loop stopped normally.
    SolveFinished {
        /// Completed iterations.
        iterations: usize,
        /// Final `rho / rho0`.
        reduction_ratio: f64,
        /// Whether the tolerance was met.
        converged: bool,
        /// Why the loop stopped.
        stop_reason: StopReason,
        /// Total wall time.
        wall_time: Duration,
    },
}
