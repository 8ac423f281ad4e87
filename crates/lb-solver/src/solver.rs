//! The solver seam.

use std::sync::Arc;

use lb_core::Real;
use lb_matrix::Matrix;
use nalgebra::DMatrix;

use crate::config::SolverConfig;
use crate::dense::DenseSolver;
use crate::error::{SolverError, SolverResult};
use crate::iterative::SparseSolver;

/// Numeric operations needed by the calculation layer.
///
/// Implementations are stateless and shareable between threads.
pub trait MatrixSolver: Send + Sync {
    fn name(&self) -> &'static str;

    /// Solve `A s = x` for an arbitrary right-hand side.
    fn solve_vec(&self, a: &Matrix, rhs: &[Real]) -> SolverResult<Vec<Real>>;

    /// Invert `A` into dense storage.
    fn invert(&self, a: &Matrix) -> SolverResult<DMatrix<Real>>;

    /// Solve `A s = demand * e_column`.
    fn solve(&self, a: &Matrix, column: usize, demand: Real) -> SolverResult<Vec<Real>> {
        let n = a.rows();
        if column >= n {
            return Err(SolverError::ColumnOob { column, size: n });
        }
        let mut rhs = vec![0.0; n];
        rhs[column] = demand;
        self.solve_vec(a, &rhs)
    }

    fn multiply(&self, a: &Matrix, b: &Matrix) -> Matrix {
        a.multiply(b)
    }

    fn multiply_vec(&self, a: &Matrix, x: &[Real]) -> Vec<Real> {
        a.mul_vec(x)
    }
}

/// True for sparse storage, or a large matrix with a density at or below
/// the configured threshold.
pub fn is_sparse_system(a: &Matrix, config: &SolverConfig) -> bool {
    let large = a.rows() >= config.min_sparse_size;
    a.is_sparse() || (large && a.density() <= config.sparse_threshold)
}

/// Pick a solver for the given technology matrix: the iterative solver for
/// sparse systems, see [`is_sparse_system`], the dense solver otherwise.
pub fn solver_for(a: &Matrix, config: &SolverConfig) -> Arc<dyn MatrixSolver> {
    if is_sparse_system(a, config) {
        tracing::debug!(size = a.rows(), nnz = a.nnz(), "selected sparse solver");
        Arc::new(SparseSolver::new(*config))
    } else {
        tracing::debug!(size = a.rows(), "selected dense solver");
        Arc::new(DenseSolver)
    }
}

pub(crate) fn check_square(a: &Matrix, rhs_len: usize) -> SolverResult<()> {
    if !a.is_square() || a.rows() != rhs_len {
        return Err(lb_core::CoreError::shape("linear system", (rhs_len, rhs_len), a.shape()).into());
    }
    Ok(())
}
