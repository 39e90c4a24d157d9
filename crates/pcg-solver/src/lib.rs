//! Parallel preconditioned conjugate gradient for opaque SPD operators.
//!
//! This crate solves `Ax = b` where `A` (symmetric positive-definite) and the
//! preconditioner `M^{-1}` are supplied as [`LinearOperator`]s: anything that
//! can compute `y = Op(x)`, either a closure or a type implementing the trait.
//! The vector kernels (dot products, fused updates) are data-parallel over
//! rayon when the `parallel` feature is enabled (the default).
//!
//! # Modules
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`pcg`] | [`PcgSolver`] and the [`pcg()`](pcg::pcg) entry point |
//! | [`vector`] | `dot`, `norm2`, `axpy`, `xpay`, fused update kernels |
//! | [`operators`] | Identity, diagonal, Jacobi, dense and CSR operators |
//! | [`instrument`] | Phase timing and event capture |
//! | [`budget`] | Time limit and cancellation |
//!
//! # Example
//!
//! ```rust
//! use pcg_solver::operators::{CsrMatrix, JacobiPreconditioner};
//! use pcg_solver::{PcgConfig, PcgSolver, StopReason};
//!
//! // 1-D Laplacian-like SPD system.
//! let n = 64;
//! let mut entries = Vec::new();
//! for i in 0..n {
//!     if i > 0 { entries.push((i, i - 1, -1.0)); }
//!     entries.push((i, i, 4.0));
//!     if i + 1 < n { entries.push((i, i + 1, -1.0)); }
//! }
//! let mut a = CsrMatrix::from_coo(n, entries).unwrap();
//! let mut m = JacobiPreconditioner::from_csr(&a);
//! let b = vec![1.0; n];
//! let mut x = vec![0.0; n];
//!
//! let solver = PcgSolver::new(PcgConfig::new(200, 1e-10));
//! let outcome = solver.solve(&mut a, &mut m, &mut x, &b).unwrap();
//! assert_eq!(outcome.stop_reason, StopReason::Converged);
//! assert!(outcome.reduction_ratio < 1e-20);
//! ```

pub mod budget;
pub mod error;
pub mod events;
pub mod instrument;
pub mod operators;
pub mod pcg;
pub mod traits;
pub mod types;
pub mod validation;
pub mod vector;
pub mod workspace;

pub use budget::CancelToken;
pub use error::{OperatorError, OperatorRole, SolverError, ValidationError};
pub use events::SolverEvent;
pub use instrument::{Instrument, NoopInstrument, Phase};
pub use pcg::{pcg, PcgSolver};
pub use traits::LinearOperator;
pub use types::{ConvergenceInfo, Parallelism, PcgConfig, PcgOutcome, StopReason};
pub use vector::{dot, norm2};
