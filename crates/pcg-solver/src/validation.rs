//! Input validation for solver operations.
//!
//! All checks run eagerly before any scratch space is allocated or any
//! operator is called, so callers receive clear diagnostics instead of
//! numerical failures halfway through a solve. Every function returns
//! [`ValidationError`] on failure, which converts into
//! [`SolverError::InvalidInput`](crate::error::SolverError::InvalidInput)
//! via `From`.

use crate::error::ValidationError;
use crate::traits::LinearOperator;
use crate::types::{Parallelism, PcgConfig};

/// Maximum solver iterations to prevent runaway computation.
pub const MAX_ITERATIONS: usize = 10_000_000;

/// Validate the solver configuration.
///
/// # Errors
///
/// - tolerance not positive and finite;
/// - `max_iterations` above [`MAX_ITERATIONS`];
/// - `Parallelism::Threads(0)`.
pub fn validate_config(config: &PcgConfig) -> Result<(), ValidationError> {
    let tol = config.relative_tolerance;
    if !tol.is_finite() || tol <= 0.0 {
        return Err(ValidationError::ParameterOutOfRange {
            name: "relative_tolerance".into(),
            value: tol.to_string(),
            expected: "positive finite value".into(),
        });
    }

    if config.max_iterations > MAX_ITERATIONS {
        return Err(ValidationError::ParameterOutOfRange {
            name: "max_iterations".into(),
            value: config.max_iterations.to_string(),
            expected: format!("<= {MAX_ITERATIONS}"),
        });
    }

    if config.parallelism == Parallelism::Threads(0) {
        return Err(ValidationError::ParameterOutOfRange {
            name: "parallelism.threads".into(),
            value: "0".into(),
            expected: ">= 1".into(),
        });
    }

    Ok(())
}

/// Validate the system `A x = b` before solving.
///
/// Checks, in order:
///
/// 1. `x` and `b` have the same length `n`.
/// 2. Both operators, when they report a dimension, agree with `n`.
/// 3. `b` and `x` contain only finite values.
///
/// # Errors
///
/// Returns [`ValidationError`] describing the first violation found.
pub fn validate_system<A, M>(a: &A, m: &M, x: &[f64], b: &[f64]) -> Result<(), ValidationError>
where
    A: LinearOperator + ?Sized,
    M: LinearOperator + ?Sized,
{
    let n = b.len();
    if x.len() != n {
        return Err(ValidationError::DimensionMismatch(format!(
            "solution length {} does not match rhs length {n}",
            x.len(),
        )));
    }

    if let Some(dim) = a.dim() {
        if dim != n {
            return Err(ValidationError::DimensionMismatch(format!(
                "system operator has dimension {dim} but rhs has length {n}",
            )));
        }
    }

    if let Some(dim) = m.dim() {
        if dim != n {
            return Err(ValidationError::DimensionMismatch(format!(
                "preconditioner has dimension {dim} but rhs has length {n}",
            )));
        }
    }

    validate_finite("rhs", b)?;
    validate_finite("initial guess", x)?;

    Ok(())
}

/// Ensure every entry of `v` is finite.
///
/// # Errors
///
/// Returns [`ValidationError::NonFiniteValue`] naming the first offending
/// index.
pub fn validate_finite(name: &str, v: &[f64]) -> Result<(), ValidationError> {
    match v.iter().position(|x| !x.is_finite()) {
        Some(i) => Err(ValidationError::NonFiniteValue(format!(
            "{name}[{i}] = {}",
            v[i],
        ))),
        None => Ok(()),
    }
}
