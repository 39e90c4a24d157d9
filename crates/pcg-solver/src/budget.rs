//! Cooperative budget enforcement for a solve.
//!
//! [`BudgetEnforcer`] tracks wall-clock time and an optional [`CancelToken`].
//! The engine calls [`check_iteration`](BudgetEnforcer::check_iteration) at
//! the top of each iteration and
//! [`check_memory`](BudgetEnforcer::check_memory) before allocating its
//! scratch vectors.
//!
//! Hitting the time limit or being cancelled ends the loop with a
//! [`StopReason`]; it is a normal outcome, not an error. Exceeding the memory
//! ceiling is an error because nothing has been computed yet.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::SolverError;
use crate::types::StopReason;

/// Shared flag that asks a running solve to stop at its next iteration.
///
/// Clones share the flag, so one clone can be handed to the solver and
/// another kept by the thread that decides to cancel.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// A token that has not been cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Whether cancellation was requested.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Enforces wall-time, cancellation and memory limits during a solve.
///
/// Create one at the start of a solve. The enforcer is non-`Clone` so that
/// each solve owns exactly one.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use pcg_solver::budget::BudgetEnforcer;
///
/// let mut enforcer = BudgetEnforcer::new(Some(Duration::from_secs(5)), None);
/// assert!(enforcer.check_iteration().is_none());
/// enforcer.check_memory(1024, Some(4096)).unwrap();
/// ```
#[derive(Debug)]
pub struct BudgetEnforcer {
    /// Monotonic clock snapshot taken when the enforcer was created.
    start_time: Instant,
    max_time: Option<Duration>,
    cancel: Option<CancelToken>,
    iterations_checked: usize,
}

impl BudgetEnforcer {
    /// Create a new enforcer. The wall-clock timer starts immediately.
    pub fn new(max_time: Option<Duration>, cancel: Option<CancelToken>) -> Self {
        Self {
            start_time: Instant::now(),
            max_time,
            cancel,
            iterations_checked: 0,
        }
    }

    /// Check whether the next iteration may run.
    ///
    /// Must be called once per iteration, at the top of the loop body.
    /// Returns the reason to stop, if any. Cancellation takes precedence over
    /// the time limit.
    pub fn check_iteration(&mut self) -> Option<StopReason> {
        self.iterations_checked += 1;

        if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            return Some(StopReason::Cancelled);
        }

        match self.max_time {
            Some(limit) if self.start_time.elapsed() > limit => Some(StopReason::TimeLimit),
            _ => None,
        }
    }

    /// Check a scratch allocation of `requested` bytes against `limit`.
    ///
    /// # Errors
    ///
    /// Returns [`SolverError::MemoryLimitExceeded`] if `requested > limit`.
    pub fn check_memory(&self, requested: usize, limit: Option<usize>) -> Result<(), SolverError> {
        match limit {
            Some(limit) if requested > limit => {
                Err(SolverError::MemoryLimitExceeded { requested, limit })
            }
            _ => Ok(()),
        }
    }

    /// Wall-clock duration elapsed since the enforcer was created.
    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Number of iteration checks performed so far.
    #[inline]
    pub fn iterations_checked(&self) -> usize {
        self.iterations_checked
    }
}
