//! Dense vector kernels driving the PCG recurrence.
//!
//! Every kernel comes in two forms: a serial `*_serial` variant and a
//! data-parallel variant built on rayon (enabled by the `parallel` feature).
//! Parallel variants split their inputs into contiguous chunks of
//! [`PARALLEL_CHUNK`] elements; each chunk is processed by exactly one worker
//! with the serial kernel, so workers only ever write disjoint ranges.
//!
//! # Reproducibility
//!
//! The elementwise kernels produce bit-identical results regardless of the
//! worker count. The reduction in [`dot`] combines per-chunk partial sums in
//! an order chosen by the scheduler, so its result may differ in the last
//! bits between thread counts. This is expected floating-point
//! reassociation, not a defect.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Number of elements handed to one worker in the parallel kernels.
///
/// Inputs no longer than this are processed serially.
pub const PARALLEL_CHUNK: usize = 4096;

// ═══════════════════════════════════════════════════════════════════════════
// Reduction primitive
// ═══════════════════════════════════════════════════════════════════════════

/// Inner product `sum_i x[i] * y[i]` as a data-parallel reduction.
///
/// An empty input yields `0.0`. Pass `&v[..n]` to reduce over a prefix.
///
/// # Panics
///
/// Panics if `x.len() != y.len()`.
pub fn dot(x: &[f64], y: &[f64]) -> f64 {
    assert_eq!(x.len(), y.len(), "dot: length mismatch");
    if x.len() <= PARALLEL_CHUNK {
        return dot_serial(x, y);
    }
    dot_parallel(x, y)
}

/// Serial inner product with 4-wide accumulation.
///
/// Four independent accumulators shorten the dependency chain and let the
/// compiler keep the loop in registers.
///
/// # Panics
///
/// Panics if `x.len() != y.len()`.
#[inline]
pub fn dot_serial(x: &[f64], y: &[f64]) -> f64 {
    assert_eq!(x.len(), y.len(), "dot_serial: length mismatch");

    let n = x.len();
    let chunks = n / 4;
    let remainder = n % 4;

    let mut acc0: f64 = 0.0;
    let mut acc1: f64 = 0.0;
    let mut acc2: f64 = 0.0;
    let mut acc3: f64 = 0.0;

    for i in 0..chunks {
        let j = i * 4;
        acc0 += x[j] * y[j];
        acc1 += x[j + 1] * y[j + 1];
        acc2 += x[j + 2] * y[j + 2];
        acc3 += x[j + 3] * y[j + 3];
    }

    let base = chunks * 4;
    for i in 0..remainder {
        acc0 += x[base + i] * y[base + i];
    }

    (acc0 + acc1) + (acc2 + acc3)
}

#[cfg(feature = "parallel")]
fn dot_parallel(x: &[f64], y: &[f64]) -> f64 {
    x.par_chunks(PARALLEL_CHUNK)
        .zip(y.par_chunks(PARALLEL_CHUNK))
        .map(|(xc, yc)| dot_serial(xc, yc))
        .sum()
}

#[cfg(not(feature = "parallel"))]
fn dot_parallel(x: &[f64], y: &[f64]) -> f64 {
    dot_serial(x, y)
}

/// Euclidean norm `sqrt(dot(x, x))`.
#[inline]
pub fn norm2(x: &[f64]) -> f64 {
    dot(x, x).sqrt()
}

// ═══════════════════════════════════════════════════════════════════════════
// Elementwise kernels
// ═══════════════════════════════════════════════════════════════════════════

/// `y[i] = x[i] + beta * y[i]` (search-direction update `p = z + beta p`).
///
/// # Panics
///
/// Panics if `x.len() != y.len()`.
pub fn xpay(x: &[f64], beta: f64, y: &mut [f64]) {
    assert_eq!(x.len(), y.len(), "xpay: length mismatch");
    if x.len() <= PARALLEL_CHUNK {
        return xpay_serial(x, beta, y);
    }

    #[cfg(feature = "parallel")]
    y.par_chunks_mut(PARALLEL_CHUNK)
        .zip(x.par_chunks(PARALLEL_CHUNK))
        .for_each(|(yc, xc)| xpay_serial(xc, beta, yc));

    #[cfg(not(feature = "parallel"))]
    xpay_serial(x, beta, y);
}

/// Serial form of [`xpay`].
#[inline]
pub fn xpay_serial(x: &[f64], beta: f64, y: &mut [f64]) {
    assert_eq!(x.len(), y.len(), "xpay_serial: length mismatch");
    for (yi, &xi) in y.iter_mut().zip(x) {
        *yi = xi + beta * *yi;
    }
}

/// `y[i] += alpha * x[i]` (AXPY).
///
/// # Panics
///
/// Panics if `x.len() != y.len()`.
pub fn axpy(alpha: f64, x: &[f64], y: &mut [f64]) {
    assert_eq!(x.len(), y.len(), "axpy: length mismatch");
    if x.len() <= PARALLEL_CHUNK {
        return axpy_serial(alpha, x, y);
    }

    #[cfg(feature = "parallel")]
    y.par_chunks_mut(PARALLEL_CHUNK)
        .zip(x.par_chunks(PARALLEL_CHUNK))
        .for_each(|(yc, xc)| axpy_serial(alpha, xc, yc));

    #[cfg(not(feature = "parallel"))]
    axpy_serial(alpha, x, y);
}

/// Serial form of [`axpy`].
#[inline]
pub fn axpy_serial(alpha: f64, x: &[f64], y: &mut [f64]) {
    assert_eq!(x.len(), y.len(), "axpy_serial: length mismatch");
    for (yi, &xi) in y.iter_mut().zip(x) {
        *yi += alpha * xi;
    }
}

/// Fused step update: `x[i] += alpha * p[i]` and `r[i] -= alpha * q[i]`.
///
/// Both updates share one pass so each index of the four vectors is visited
/// once per iteration.
///
/// # Panics
///
/// Panics if the four slices do not share one length.
pub fn update_solution_and_residual(
    alpha: f64,
    p: &[f64],
    q: &[f64],
    x: &mut [f64],
    r: &mut [f64],
) {
    assert_eq!(p.len(), q.len(), "update: p/q length mismatch");
    assert_eq!(p.len(), x.len(), "update: p/x length mismatch");
    assert_eq!(p.len(), r.len(), "update: p/r length mismatch");
    if p.len() <= PARALLEL_CHUNK {
        return update_solution_and_residual_serial(alpha, p, q, x, r);
    }

    #[cfg(feature = "parallel")]
    x.par_chunks_mut(PARALLEL_CHUNK)
        .zip(r.par_chunks_mut(PARALLEL_CHUNK))
        .zip(p.par_chunks(PARALLEL_CHUNK).zip(q.par_chunks(PARALLEL_CHUNK)))
        .for_each(|((xc, rc), (pc, qc))| {
            update_solution_and_residual_serial(alpha, pc, qc, xc, rc)
        });

    #[cfg(not(feature = "parallel"))]
    update_solution_and_residual_serial(alpha, p, q, x, r);
}

/// Serial form of [`update_solution_and_residual`].
#[inline]
pub fn update_solution_and_residual_serial(
    alpha: f64,
    p: &[f64],
    q: &[f64],
    x: &mut [f64],
    r: &mut [f64],
) {
    assert_eq!(p.len(), q.len(), "update_serial: p/q length mismatch");
    assert_eq!(p.len(), x.len(), "update_serial: p/x length mismatch");
    assert_eq!(p.len(), r.len(), "update_serial: p/r length mismatch");
    for i in 0..p.len() {
        x[i] += alpha * p[i];
        r[i] -= alpha * q[i];
    }
}

/// Turn `r = A x` into the residual `r = b - A x` in place.
///
/// # Panics
///
/// Panics if `b.len() != r.len()`.
pub fn residual_in_place(b: &[f64], r: &mut [f64]) {
    assert_eq!(b.len(), r.len(), "residual_in_place: length mismatch");
    if b.len() <= PARALLEL_CHUNK {
        return residual_in_place_serial(b, r);
    }

    #[cfg(feature = "parallel")]
    r.par_chunks_mut(PARALLEL_CHUNK)
        .zip(b.par_chunks(PARALLEL_CHUNK))
        .for_each(|(rc, bc)| residual_in_place_serial(bc, rc));

    #[cfg(not(feature = "parallel"))]
    residual_in_place_serial(b, r);
}

/// Serial form of [`residual_in_place`].
#[inline]
pub fn residual_in_place_serial(b: &[f64], r: &mut [f64]) {
    assert_eq!(b.len(), r.len(), "residual_in_place_serial: length mismatch");
    for (ri, &bi) in r.iter_mut().zip(b) {
        *ri = bi - *ri;
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Execution mode
// ═══════════════════════════════════════════════════════════════════════════

/// Kernel dispatch used by the engine: either always serial, or the
/// data-parallel variants on whichever rayon pool is current.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Execution {
    Serial,
    Parallel,
}

impl Execution {
    #[inline]
    pub(crate) fn dot(self, x: &[f64], y: &[f64]) -> f64 {
        match self {
            Execution::Serial => dot_serial(x, y),
            Execution::Parallel => dot(x, y),
        }
    }

    #[inline]
    pub(crate) fn xpay(self, x: &[f64], beta: f64, y: &mut [f64]) {
        match self {
            Execution::Serial => xpay_serial(x, beta, y),
            Execution::Parallel => xpay(x, beta, y),
        }
    }

    #[inline]
    pub(crate) fn update_solution_and_residual(
        self,
        alpha: f64,
        p: &[f64],
        q: &[f64],
        x: &mut [f64],
        r: &mut [f64],
    ) {
        match self {
            Execution::Serial => update_solution_and_residual_serial(alpha, p, q, x, r),
            Execution::Parallel => update_solution_and_residual(alpha, p, q, x, r),
        }
    }

    #[inline]
    pub(crate) fn residual_in_place(self, b: &[f64], r: &mut [f64]) {
        match self {
            Execution::Serial => residual_in_place_serial(b, r),
            Execution::Parallel => residual_in_place(b, r),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════
