//! Operator contract consumed by the engine.
//!
//! The engine never sees a matrix. It multiplies by `A` and applies `M^{-1}`
//! through [`LinearOperator`], so any representation (dense, sparse,
//! matrix-free, an external factorisation) can be plugged in. Any state the
//! operator needs travels with the operator value itself.

use crate::error::OperatorError;

/// A linear operator `y = Op(x)` over `f64` vectors.
///
/// Implementations must write every element of `output` and must not retain
/// references to either buffer beyond the call. The borrow rules already
/// guarantee that `input` and `output` never alias and that `input` is left
/// unmodified.
///
/// Closures `FnMut(&[f64], &mut [f64])` are operators through a blanket impl,
/// which makes small matrix-free operators one-liners:
///
/// ```
/// use pcg_solver::traits::LinearOperator;
///
/// let mut double = |x: &[f64], y: &mut [f64]| {
///     for (yi, xi) in y.iter_mut().zip(x) {
///         *yi = 2.0 * xi;
///     }
/// };
/// let mut y = [0.0; 2];
/// double.apply(&[1.0, 3.0], &mut y).unwrap();
/// assert_eq!(y, [2.0, 6.0]);
/// ```
pub trait LinearOperator: Send {
    /// Compute `output = Op(input)`.
    ///
    /// Both slices have the problem dimension `n`.
    ///
    /// # Errors
    ///
    /// Returns [`OperatorError`] if the operator cannot be applied; the
    /// engine aborts the solve and reports which operator failed.
    fn apply(&mut self, input: &[f64], output: &mut [f64]) -> Result<(), OperatorError>;

    /// Dimension of the operator, if known.
    ///
    /// When `Some(d)`, the engine checks `d` against the problem size before
    /// allocating anything.
    fn dim(&self) -> Option<usize> {
        None
    }
}

impl<F> LinearOperator for F
where
    F: FnMut(&[f64], &mut [f64]) + Send,
{
    #[inline]
    fn apply(&mut self, input: &[f64], output: &mut [f64]) -> Result<(), OperatorError> {
        self(input, output);
        Ok(())
    }
}
