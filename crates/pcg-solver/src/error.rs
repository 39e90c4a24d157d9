//! Error types for the PCG engine.
//!
//! Provides structured error variants for invalid inputs, scratch allocation
//! failures, numerical breakdown and external operator failures. All errors
//! implement `std::error::Error` via `thiserror`.
//!
//! Running out of iterations, hitting the wall-time limit or being cancelled
//! are *not* errors: they are reported through
//! [`PcgOutcome`](crate::types::PcgOutcome).

use std::fmt;

use serde::{Deserialize, Serialize};

/// Primary error type for solver operations.
#[derive(Debug, thiserror::Error)]
pub enum SolverError {
    /// The caller supplied invalid input (dimensions, parameters, etc.).
    #[error("invalid input: {0}")]
    InvalidInput(#[from] ValidationError),

    /// The scratch vectors could not be allocated.
    #[error("failed to allocate {bytes} bytes of scratch space")]
    AllocationFailed {
        /// Number of bytes requested.
        bytes: usize,
    },

    /// The scratch vectors would exceed the configured memory ceiling.
    #[error("scratch space of {requested} bytes exceeds memory limit of {limit} bytes")]
    MemoryLimitExceeded {
        /// Bytes the solve would need.
        requested: usize,
        /// Configured ceiling.
        limit: usize,
    },

    /// A numerical breakdown was detected at one of the division points
    /// (non-positive curvature, negative or non-finite inner products).
    #[error("numerical instability at iteration {iteration}: {detail}")]
    NumericalInstability {
        /// Iteration at which the instability was detected.
        iteration: usize,
        /// Human-readable explanation.
        detail: String,
    },

    /// The system operator or the preconditioner reported a failure.
    #[error("{role} failed at iteration {iteration}: {source}")]
    OperatorFailed {
        /// Which operator failed.
        role: OperatorRole,
        /// Iteration during which the call was made (0 for the initial
        /// residual).
        iteration: usize,
        /// Error returned by the operator.
        #[source]
        source: OperatorError,
    },

    /// The worker pool for a fixed thread count could not be built.
    #[error("failed to build worker pool: {0}")]
    ThreadPool(String),
}

/// Validation errors for solver inputs.
///
/// These are raised eagerly before any allocation or iteration so that
/// callers get clear diagnostics rather than mysterious numerical failures.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    /// Vector or operator dimensions are inconsistent.
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// A value is NaN or infinite where a finite number is required.
    #[error("non-finite value detected: {0}")]
    NonFiniteValue(String),

    /// A parameter is outside its valid range.
    #[error("parameter out of range: {name} = {value} (expected {expected})")]
    ParameterOutOfRange {
        /// Name of the parameter.
        name: String,
        /// The invalid value (as a string for flexibility).
        value: String,
        /// Human-readable description of the valid range.
        expected: String,
    },
}

/// Error reported by a [`LinearOperator`](crate::traits::LinearOperator)
/// implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct OperatorError {
    message: String,
}

impl OperatorError {
    /// Create an operator error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The message supplied by the operator.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Which of the two operators consumed by the engine a call was made to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperatorRole {
    /// The system operator `A`.
    System,
    /// The preconditioner `M^{-1}`.
    Preconditioner,
}

impl fmt::Display for OperatorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperatorRole::System => write!(f, "system operator"),
            OperatorRole::Preconditioner => write!(f, "preconditioner"),
        }
    }
}
