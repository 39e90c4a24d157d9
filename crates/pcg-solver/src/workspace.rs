//! Per-solve scratch space.
//!
//! [`Workspace`] owns the four working vectors of one PCG solve: the residual
//! `r`, the preconditioned residual `z`, the search direction `p` and
//! `q = A p`. It is created at solve entry and dropped on every exit path,
//! including early returns on errors, so scratch memory never outlives the
//! call.

use crate::error::SolverError;

/// Number of length-`n` vectors a PCG solve needs.
pub const SCRATCH_VECTORS: usize = 4;

/// Bytes of scratch space a solve of dimension `n` allocates, or `None` on
/// overflow.
pub fn scratch_bytes(n: usize) -> Option<usize> {
    n.checked_mul(SCRATCH_VECTORS)?
        .checked_mul(std::mem::size_of::<f64>())
}

/// Scratch vectors of one solve.
#[derive(Debug)]
pub struct Workspace {
    /// Residual `b - A x`.
    pub r: Vec<f64>,
    /// Preconditioned residual `M^{-1} r`.
    pub z: Vec<f64>,
    /// Search direction.
    pub p: Vec<f64>,
    /// `A p`.
    pub q: Vec<f64>,
}

impl Workspace {
    /// Allocate four zeroed vectors of length `n`.
    ///
    /// # Errors
    ///
    /// Returns [`SolverError::AllocationFailed`] if the allocator refuses the
    /// request; nothing is computed in that case.
    pub fn allocate(n: usize) -> Result<Self, SolverError> {
        let bytes = scratch_bytes(n).ok_or(SolverError::AllocationFailed { bytes: usize::MAX })?;
        Ok(Self {
            r: zeroed(n, bytes)?,
            z: zeroed(n, bytes)?,
            p: zeroed(n, bytes)?,
            q: zeroed(n, bytes)?,
        })
    }
}

fn zeroed(n: usize, total_bytes: usize) -> Result<Vec<f64>, SolverError> {
    let mut v = Vec::new();
    v.try_reserve_exact(n)
        .map_err(|_| SolverError::AllocationFailed { bytes: total_bytes })?;
    v.resize(n, 0.0);
    Ok(v)
}
