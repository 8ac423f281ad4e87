//! Error types for solver operations.

use lb_core::CoreError;
use thiserror::Error;

/// Errors that can occur while solving a technology matrix.
#[derive(Error, Debug)]
pub enum SolverError {
    #[error("Matrix is singular: {what}")]
    Singular { what: String },

    #[error("Iterative solve did not converge after {iterations} iterations (residual {residual:e})")]
    NotConverged { iterations: usize, residual: f64 },

    #[error("Dimension mismatch: {0}")]
    Dimension(#[from] CoreError),

    #[error("Column {column} out of range for a {size}x{size} system")]
    ColumnOob { column: usize, size: usize },
}

pub type SolverResult<T> = Result<T, SolverError>;
