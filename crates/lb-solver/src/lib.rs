//! Linear solvers for technology matrices.
//!
//! A technology matrix `A` is square; the core operations are solving
//! `A s = d e_i` for one demand, inverting `A`, and multiplying matrices.
//! Two backends exist: a dense LU solver and a preconditioned iterative
//! solver for large sparse systems. [`solver_for`] picks one by inspecting
//! the matrix, never by caller preference.

pub mod config;
pub mod dense;
pub mod error;
pub mod iterative;
pub mod solver;

pub use config::SolverConfig;
pub use dense::DenseSolver;
pub use error::{SolverError, SolverResult};
pub use iterative::SparseSolver;
pub use solver::{MatrixSolver, is_sparse_system, solver_for};
