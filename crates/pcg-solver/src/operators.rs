//! Reference operators.
//!
//! The engine only needs [`LinearOperator`]; these types cover the common
//! cases (identity, diagonal scaling, Jacobi preconditioning, dense and CSR
//! matrices) so that small problems can be set up without writing an
//! operator by hand.

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::error::{OperatorError, ValidationError};
use crate::traits::LinearOperator;

/// Rows per worker in the row-parallel matrix-vector products.
const ROWS_PER_TASK: usize = 256;

fn check_lengths(dim: usize, input: &[f64], output: &[f64]) -> Result<(), OperatorError> {
    if input.len() != dim || output.len() != dim {
        return Err(OperatorError::new(format!(
            "operator of dimension {dim} applied to input of length {} and output of length {}",
            input.len(),
            output.len(),
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Identity / diagonal / Jacobi
// ---------------------------------------------------------------------------

/// `y = x`. Passing this as the preconditioner yields plain CG.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentityOperator {
    n: usize,
}

impl IdentityOperator {
    /// Identity of dimension `n`.
    pub fn new(n: usize) -> Self {
        Self { n }
    }
}

impl LinearOperator for IdentityOperator {
    fn apply(&mut self, input: &[f64], output: &mut [f64]) -> Result<(), OperatorError> {
        check_lengths(self.n, input, output)?;
        output.copy_from_slice(input);
        Ok(())
    }

    fn dim(&self) -> Option<usize> {
        Some(self.n)
    }
}

/// `y[i] = d[i] * x[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct DiagonalOperator {
    diag: Vec<f64>,
}

impl DiagonalOperator {
    /// Diagonal operator with the given entries.
    pub fn new(diag: Vec<f64>) -> Self {
        Self { diag }
    }

    /// The diagonal entries.
    pub fn diagonal(&self) -> &[f64] {
        &self.diag
    }
}

impl LinearOperator for DiagonalOperator {
    fn apply(&mut self, input: &[f64], output: &mut [f64]) -> Result<(), OperatorError> {
        check_lengths(self.diag.len(), input, output)?;
        for ((yi, &xi), &di) in output.iter_mut().zip(input).zip(&self.diag) {
            *yi = di * xi;
        }
        Ok(())
    }

    fn dim(&self) -> Option<usize> {
        Some(self.diag.len())
    }
}

/// Jacobi (diagonal) preconditioner: `z[i] = r[i] / a_ii`.
///
/// Zero or near-zero diagonal entries are replaced with `1.0` so the
/// preconditioner stays finite.
#[derive(Debug, Clone, PartialEq)]
pub struct JacobiPreconditioner {
    inv_diag: Vec<f64>,
}

impl JacobiPreconditioner {
    /// Build from the diagonal of `A`.
    pub fn from_diagonal(diag: &[f64]) -> Self {
        let inv_diag = diag
            .iter()
            .map(|&d| if d.abs() > f64::EPSILON { 1.0 / d } else { 1.0 })
            .collect();
        Self { inv_diag }
    }

    /// Build from the diagonal of a CSR matrix.
    pub fn from_csr(matrix: &CsrMatrix) -> Self {
        Self::from_diagonal(&matrix.diagonal())
    }

    /// Build from the diagonal of a dense matrix.
    pub fn from_dense(matrix: &DenseMatrix) -> Self {
        let diag: Vec<f64> = (0..matrix.n).map(|i| matrix.get(i, i)).collect();
        Self::from_diagonal(&diag)
    }

    /// Reciprocal diagonal used by [`apply`](LinearOperator::apply).
    pub fn inverse_diagonal(&self) -> &[f64] {
        &self.inv_diag
    }
}

impl LinearOperator for JacobiPreconditioner {
    fn apply(&mut self, input: &[f64], output: &mut [f64]) -> Result<(), OperatorError> {
        check_lengths(self.inv_diag.len(), input, output)?;
        for ((zi, &ri), &inv) in output.iter_mut().zip(input).zip(&self.inv_diag) {
            *zi = inv * ri;
        }
        Ok(())
    }

    fn dim(&self) -> Option<usize> {
        Some(self.inv_diag.len())
    }
}

// ---------------------------------------------------------------------------
// DenseMatrix
// ---------------------------------------------------------------------------

/// Square dense matrix stored row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseMatrix {
    n: usize,
    data: Vec<f64>,
}

impl DenseMatrix {
    /// Build from row-major storage of an `n x n` matrix.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::DimensionMismatch`] if `data.len() != n * n`.
    pub fn from_row_major(n: usize, data: Vec<f64>) -> Result<Self, ValidationError> {
        if n.checked_mul(n) != Some(data.len()) {
            return Err(ValidationError::DimensionMismatch(format!(
                "dense storage of length {} cannot hold a {n}x{n} matrix",
                data.len(),
            )));
        }
        Ok(Self { n, data })
    }

    /// Build from a slice of rows.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::DimensionMismatch`] if any row length
    /// differs from the number of rows.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self, ValidationError> {
        let n = rows.len();
        let mut data = Vec::with_capacity(n * n);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != n {
                return Err(ValidationError::DimensionMismatch(format!(
                    "row {i} has {} entries, expected {n}",
                    row.len(),
                )));
            }
            data.extend_from_slice(row);
        }
        Ok(Self { n, data })
    }

    /// Identity matrix of dimension `n`.
    pub fn identity(n: usize) -> Self {
        let mut data = vec![0.0; n * n];
        for i in 0..n {
            data[i * n + i] = 1.0;
        }
        Self { n, data }
    }

    /// Number of rows (and columns).
    #[inline]
    pub fn n(&self) -> usize {
        self.n
    }

    /// Entry `(i, j)`.
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.n + j]
    }

    /// Row `i` as a slice.
    #[inline]
    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.n..(i + 1) * self.n]
    }

    /// `y = A x`, parallel over blocks of rows.
    ///
    /// # Panics
    ///
    /// Panics if `x` or `y` does not have length `n`.
    pub fn matvec(&self, x: &[f64], y: &mut [f64]) {
        assert_eq!(x.len(), self.n, "matvec: x length must equal n");
        assert_eq!(y.len(), self.n, "matvec: y length must equal n");
        let n = self.n;
        if n == 0 {
            return;
        }

        #[cfg(feature = "parallel")]
        y.par_chunks_mut(ROWS_PER_TASK)
            .zip(self.data.par_chunks(ROWS_PER_TASK * n))
            .for_each(|(yc, block)| dense_rows(block, n, x, yc));

        #[cfg(not(feature = "parallel"))]
        for (yc, block) in y
            .chunks_mut(ROWS_PER_TASK)
            .zip(self.data.chunks(ROWS_PER_TASK * n))
        {
            dense_rows(block, n, x, yc);
        }
    }
}

fn dense_rows(block: &[f64], n: usize, x: &[f64], y: &mut [f64]) {
    for (yi, row) in y.iter_mut().zip(block.chunks_exact(n)) {
        *yi = crate::vector::dot_serial(row, x);
    }
}

impl LinearOperator for DenseMatrix {
    fn apply(&mut self, input: &[f64], output: &mut [f64]) -> Result<(), OperatorError> {
        check_lengths(self.n, input, output)?;
        self.matvec(input, output);
        Ok(())
    }

    fn dim(&self) -> Option<usize> {
        Some(self.n)
    }
}

// ---------------------------------------------------------------------------
// CsrMatrix
// ---------------------------------------------------------------------------

/// Square Compressed Sparse Row (CSR) matrix.
///
/// # Layout
///
/// For a matrix with `n` rows and `nnz` non-zeros:
/// - `row_ptr` has length `n + 1`
/// - `col_indices` and `values` each have length `nnz`
/// - Row `i` spans indices `row_ptr[i]..row_ptr[i+1]`
#[derive(Debug, Clone, PartialEq)]
pub struct CsrMatrix {
    /// Row pointers: `row_ptr[i]` is the start index in `col_indices`/`values`
    /// for row `i`.
    pub row_ptr: Vec<usize>,
    /// Column indices for each non-zero entry.
    pub col_indices: Vec<usize>,
    /// Values for each non-zero entry.
    pub values: Vec<f64>,
    /// Number of rows (and columns).
    pub n: usize,
}

impl CsrMatrix {
    /// Build an `n x n` CSR matrix from COO (coordinate) triplets.
    ///
    /// Entries are sorted by (row, col); entries at the same position are
    /// summed.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::DimensionMismatch`] if any index is out of
    /// bounds.
    pub fn from_coo(
        n: usize,
        entries: impl IntoIterator<Item = (usize, usize, f64)>,
    ) -> Result<Self, ValidationError> {
        let mut sorted: Vec<_> = entries.into_iter().collect();
        if let Some(&(r, c, _)) = sorted.iter().find(|(r, c, _)| *r >= n || *c >= n) {
            return Err(ValidationError::DimensionMismatch(format!(
                "entry ({r}, {c}) out of bounds for a {n}x{n} matrix",
            )));
        }
        sorted.sort_unstable_by_key(|(r, c, _)| (*r, *c));

        let mut row_ptr = vec![0usize; n + 1];
        let mut col_indices: Vec<usize> = Vec::with_capacity(sorted.len());
        let mut values: Vec<f64> = Vec::with_capacity(sorted.len());
        let mut last: Option<(usize, usize)> = None;

        for (r, c, v) in sorted {
            if last == Some((r, c)) {
                if let Some(acc) = values.last_mut() {
                    *acc += v;
                }
                continue;
            }
            row_ptr[r + 1] += 1;
            col_indices.push(c);
            values.push(v);
            last = Some((r, c));
        }
        for i in 1..=n {
            row_ptr[i] += row_ptr[i - 1];
        }

        Ok(Self {
            row_ptr,
            col_indices,
            values,
            n,
        })
    }

    /// Identity matrix of dimension `n` in CSR format.
    pub fn identity(n: usize) -> Self {
        Self {
            row_ptr: (0..=n).collect(),
            col_indices: (0..n).collect(),
            values: vec![1.0; n],
            n,
        }
    }

    /// Number of non-zero entries.
    #[inline]
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Diagonal entries (zero where a row stores no diagonal).
    pub fn diagonal(&self) -> Vec<f64> {
        (0..self.n)
            .map(|row| {
                let (start, end) = (self.row_ptr[row], self.row_ptr[row + 1]);
                self.col_indices[start..end]
                    .iter()
                    .zip(&self.values[start..end])
                    .filter(|(&c, _)| c == row)
                    .map(|(_, &v)| v)
                    .sum::<f64>()
            })
            .collect()
    }

    /// Sparse matrix-vector multiply `y = A x`, parallel over blocks of rows.
    ///
    /// # Panics
    ///
    /// Panics if `x` or `y` does not have length `n`.
    pub fn spmv(&self, x: &[f64], y: &mut [f64]) {
        assert_eq!(x.len(), self.n, "spmv: x length must equal n");
        assert_eq!(y.len(), self.n, "spmv: y length must equal n");

        #[cfg(feature = "parallel")]
        y.par_chunks_mut(ROWS_PER_TASK)
            .enumerate()
            .for_each(|(chunk, yc)| self.spmv_rows(chunk * ROWS_PER_TASK, x, yc));

        #[cfg(not(feature = "parallel"))]
        self.spmv_rows(0, x, y);
    }

    fn spmv_rows(&self, first_row: usize, x: &[f64], y: &mut [f64]) {
        for (offset, yi) in y.iter_mut().enumerate() {
            let row = first_row + offset;
            let (start, end) = (self.row_ptr[row], self.row_ptr[row + 1]);
            let mut sum = 0.0f64;
            for idx in start..end {
                sum += self.values[idx] * x[self.col_indices[idx]];
            }
            *yi = sum;
        }
    }
}

impl LinearOperator for CsrMatrix {
    fn apply(&mut self, input: &[f64], output: &mut [f64]) -> Result<(), OperatorError> {
        check_lengths(self.n, input, output)?;
        self.spmv(input, output);
        Ok(())
    }

    fn dim(&self) -> Option<usize> {
        Some(self.n)
    }
}
